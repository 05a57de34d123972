//! Common test utilities - StoryTest harness for end-to-end testing

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use storyd::generate::{GeneratedImage, GenerationError, ImageBackend, ImageJob, TextBackend};
use storyd::{Server, Settings};
use tokio::task::JoinHandle;

/// Text backend that always returns the same story
pub struct FixedText {
    text: String,
    pub calls: AtomicU32,
}

impl FixedText {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextBackend for FixedText {
    async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Image backend whose jobs finish on the first poll, or never
pub struct InstantImages {
    url: Option<String>,
    pub submits: AtomicU32,
    pub polls: AtomicU32,
}

impl InstantImages {
    pub fn ready(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: Some(url.to_string()),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        })
    }

    pub fn never() -> Arc<Self> {
        Arc::new(Self {
            url: None,
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        })
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for InstantImages {
    async fn submit(&self, _job: &ImageJob) -> Result<String, GenerationError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(format!("job-{}", n))
    }

    async fn poll(&self, _job_id: &str) -> Result<Vec<GeneratedImage>, GenerationError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .url
            .iter()
            .map(|url| GeneratedImage { url: url.clone() })
            .collect())
    }
}

/// Test harness that runs a storyd server on a random port
pub struct StoryTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl StoryTest {
    /// Start a server with in-memory storage and fast polling
    pub async fn start(text: Arc<dyn TextBackend>, images: Arc<dyn ImageBackend>) -> Result<Self> {
        Self::start_with(Settings::default(), text, images).await
    }

    /// Start a server with custom settings. Address and polling are overridden.
    pub async fn start_with(
        mut settings: Settings,
        text: Arc<dyn TextBackend>,
        images: Arc<dyn ImageBackend>,
    ) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        settings.bind_addr = addr;
        settings.generation.poll_interval_ms = 5;
        settings.generation.max_polls = 5;

        let server = Arc::new(Server::with_backends(settings, text, images).await?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Submit the story form
    pub async fn submit(
        &self,
        name: &str,
        age: &str,
        story_type: &str,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/generate", self.base_url()))
            .form(&[
                ("child_name", name),
                ("child_age", age),
                ("story_type", story_type),
            ])
            .send()
            .await?)
    }

    /// Number of stored stories
    pub async fn story_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories")
            .fetch_one(self.server.db().pool())
            .await?;
        Ok(count)
    }
}

impl Drop for StoryTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// A story naming `name` three times
pub fn good_story(name: &str) -> String {
    format!(
        "{name} woke early. The garden whispered to {name}. That night {name} dreamed of stars."
    )
}
