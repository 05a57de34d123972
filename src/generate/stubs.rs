//! Deterministic backends for unit tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GeneratedImage, GenerationError, ImageBackend, ImageJob, TextBackend};
use crate::stories::{GeneratedStory, StoreError, StorySink};

/// Text backend replaying a script, one entry per call. The last entry repeats.
pub struct ScriptedText {
    script: Vec<Result<String, GenerationError>>,
    calls: AtomicU32,
}

impl ScriptedText {
    pub fn new(script: Vec<Result<String, GenerationError>>) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }

    /// Always answer with the same text
    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// Always fail with the same error
    pub fn failing(err: GenerationError) -> Self {
        Self::new(vec![Err(err)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextBackend for ScriptedText {
    async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let idx = n.min(self.script.len() - 1);
        self.script[idx].clone()
    }
}

/// Image backend whose job finishes on a given poll
pub struct ScriptedImages {
    url: String,
    ready_on_poll: Option<u32>,
    hang: bool,
    submit_error: Option<GenerationError>,
    submits: AtomicU32,
    polls: AtomicU32,
    last_job: Mutex<Option<ImageJob>>,
}

impl ScriptedImages {
    /// Image is available from poll `k` (1-based)
    pub fn ready_on(k: u32, url: &str) -> Self {
        Self {
            url: url.to_string(),
            ready_on_poll: Some(k),
            hang: false,
            submit_error: None,
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            last_job: Mutex::new(None),
        }
    }

    /// Job never finishes
    pub fn never() -> Self {
        Self {
            ready_on_poll: None,
            ..Self::ready_on(1, "")
        }
    }

    /// Every poll blocks forever
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::never()
        }
    }

    /// Submission fails
    pub fn rejecting(err: GenerationError) -> Self {
        Self {
            submit_error: Some(err),
            ..Self::never()
        }
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn last_job(&self) -> Option<ImageJob> {
        self.last_job.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBackend for ScriptedImages {
    async fn submit(&self, job: &ImageJob) -> Result<String, GenerationError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_job.lock().unwrap() = Some(job.clone());
        match &self.submit_error {
            Some(err) => Err(err.clone()),
            None => Ok(format!("job-{}", n + 1)),
        }
    }

    async fn poll(&self, _job_id: &str) -> Result<Vec<GeneratedImage>, GenerationError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang {
            std::future::pending::<()>().await;
        }
        match self.ready_on_poll {
            Some(k) if n >= k => Ok(vec![GeneratedImage {
                url: self.url.clone(),
            }]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Story sink recording everything it is asked to save
#[derive(Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<GeneratedStory>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every save fails
    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<GeneratedStory> {
        self.saved.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl StorySink for RecordingSink {
    async fn save(&self, story: &GeneratedStory) -> Result<(), StoreError> {
        self.saved.lock().unwrap().push(story.clone());
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

/// Story text mentioning `name` exactly `n` times
pub fn story_mentioning(name: &str, n: usize) -> String {
    let mut text = String::from("Once upon a time.");
    for _ in 0..n {
        text.push_str(&format!(" {} smiled.", name));
    }
    text
}
