//! Story illustration pipeline
//!
//! Three steps:
//! 1. Build an image prompt from the opening of the story
//! 2. Submit a generation job to the image service
//! 3. Poll at a fixed interval until an image appears or the budget runs out
//!
//! Finished references are cached by story text. Running out of polls is not
//! an error: the caller gets the static fallback illustration instead.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{GenerationError, ImageBackend, ImageJob, TtlCache};

/// Static illustration used when no generated image is available
pub const FALLBACK_IMAGE: &str = "/static/images/default_story.svg";

const PROMPT_PREFIX: &str = "child-friendly, colorful illustration for a children's story: ";
const PROMPT_EXCERPT_CHARS: usize = 200;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_POLLS: u32 = 30;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_IMAGE_SIZE: u32 = 512;

/// Illustration reference handed back to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IllustrationResult {
    pub image_reference: String,
    pub cached: bool,
}

impl IllustrationResult {
    /// The static fallback illustration
    pub fn fallback() -> Self {
        Self {
            image_reference: FALLBACK_IMAGE.to_string(),
            cached: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.image_reference == FALLBACK_IMAGE
    }
}

/// Build the image prompt from the first characters of a story
pub fn image_prompt(story_text: &str) -> String {
    let excerpt: String = story_text.trim().chars().take(PROMPT_EXCERPT_CHARS).collect();
    format!("{}{}", PROMPT_PREFIX, excerpt)
}

/// Illustration generator with a shared result cache
pub struct IllustrationGenerator {
    backend: Arc<dyn ImageBackend>,
    cache: Arc<TtlCache>,
    poll_interval: Duration,
    max_polls: u32,
    width: u32,
    height: u32,
}

impl IllustrationGenerator {
    /// Create a generator with the default polling policy and image size
    pub fn new(backend: Arc<dyn ImageBackend>, cache: Arc<TtlCache>) -> Self {
        Self {
            backend,
            cache,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
        }
    }

    /// Override the polling policy
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Override the requested image dimensions
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Wall-clock limit for the polling phase: every poll slot plus one spare
    fn poll_budget(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.max_polls.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }

    fn job_for(&self, story_text: &str) -> ImageJob {
        ImageJob {
            prompt: image_prompt(story_text),
            width: self.width,
            height: self.height,
            prompt_magic: true,
            nsfw_filter: true,
        }
    }

    /// Illustrate a story
    pub async fn generate(&self, story_text: &str) -> Result<IllustrationResult, GenerationError> {
        if let Some(image_reference) = self.cache.get(story_text).await {
            debug!("Illustration cache hit");
            return Ok(IllustrationResult {
                image_reference,
                cached: true,
            });
        }

        let job = self.job_for(story_text);
        let job_id = self.backend.submit(&job).await?;
        debug!("Submitted illustration job {}", job_id);

        match tokio::time::timeout(self.poll_budget(), self.wait_for_image(&job_id)).await {
            Ok(Ok(Some(url))) => {
                info!("Illustration job {} finished", job_id);
                self.cache.insert(story_text, url.clone()).await;
                Ok(IllustrationResult {
                    image_reference: url,
                    cached: false,
                })
            }
            Ok(Ok(None)) => {
                warn!(
                    "Illustration job {} not ready after {} polls, using fallback",
                    job_id, self.max_polls
                );
                Ok(IllustrationResult::fallback())
            }
            Err(_) => {
                warn!(
                    "Illustration job {} exceeded {:?}, using fallback",
                    job_id,
                    self.poll_budget()
                );
                Ok(IllustrationResult::fallback())
            }
            Ok(Err(e)) => Err(e),
        }
    }

    /// Poll until the job reports an image. `None` once every poll is used.
    async fn wait_for_image(&self, job_id: &str) -> Result<Option<String>, GenerationError> {
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let images = self.backend.poll(job_id).await?;
            if let Some(image) = images.into_iter().next() {
                debug!("Job {} produced an image on poll {}", job_id, attempt);
                return Ok(Some(image.url));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::stubs::ScriptedImages;

    fn generator(backend: &Arc<ScriptedImages>) -> IllustrationGenerator {
        IllustrationGenerator::new(backend.clone(), Arc::new(TtlCache::new(DEFAULT_CACHE_TTL)))
    }

    #[test]
    fn test_prompt_uses_story_opening() {
        let story = "x".repeat(500);
        let prompt = image_prompt(&story);
        assert!(prompt.starts_with(PROMPT_PREFIX));
        assert_eq!(prompt.len(), PROMPT_PREFIX.len() + 200);
    }

    #[test]
    fn test_prompt_truncates_on_char_boundary() {
        let story = "é".repeat(300);
        let prompt = image_prompt(&story);
        assert_eq!(prompt.chars().count(), PROMPT_PREFIX.chars().count() + 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_parameters() {
        let backend = Arc::new(ScriptedImages::ready_on(1, "https://img/1.png"));
        generator(&backend).generate("Mia found a dragon.").await.unwrap();

        let job = backend.last_job().unwrap();
        assert_eq!(job.width, 512);
        assert_eq!(job.height, 512);
        assert!(job.prompt_magic);
        assert!(job.nsfw_filter);
        assert!(job.prompt.ends_with("Mia found a dragon."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_on_poll_k() {
        for k in [1, 7, 30] {
            let backend = Arc::new(ScriptedImages::ready_on(k, "https://img/k.png"));
            let start = tokio::time::Instant::now();
            let result = generator(&backend).generate("A story").await.unwrap();

            assert_eq!(result.image_reference, "https://img/k.png");
            assert!(!result.cached);
            assert_eq!(backend.polls(), k);
            assert_eq!(start.elapsed().as_secs(), k as u64);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_fallback() {
        let backend = Arc::new(ScriptedImages::ready_on(31, "https://img/late.png"));
        let result = generator(&backend).generate("A story").await.unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.image_reference, FALLBACK_IMAGE);
        assert!(!result.cached);
        assert_eq!(backend.polls(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_poll_is_cut_off() {
        let backend = Arc::new(ScriptedImages::hanging());
        let start = tokio::time::Instant::now();
        let result = generator(&backend).generate("A story").await.unwrap();

        assert!(result.is_fallback());
        assert!(!result.cached);
        assert_eq!(backend.polls(), 1);
        // 30 poll slots plus one interval of grace
        assert_eq!(start.elapsed().as_secs(), 31);
    }

    #[test]
    fn test_poll_budget_saturates() {
        let backend = Arc::new(ScriptedImages::never());
        let generator = generator(&backend).with_polling(Duration::from_secs(1), u32::MAX);
        assert_eq!(generator.poll_budget(), Duration::from_secs(u64::from(u32::MAX)));

        let generator = generator.with_polling(Duration::MAX, 2);
        assert_eq!(generator.poll_budget(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_polling_policy() {
        let backend = Arc::new(ScriptedImages::never());
        let generator = generator(&backend).with_polling(Duration::from_millis(250), 4);

        let start = tokio::time::Instant::now();
        let result = generator.generate("A story").await.unwrap();

        assert!(result.is_fallback());
        assert_eq!(backend.polls(), 4);
        assert_eq!(start.elapsed().as_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_error_propagates() {
        let backend = Arc::new(ScriptedImages::rejecting(GenerationError::Api {
            status: 400,
            message: "bad prompt".into(),
        }));
        let err = generator(&backend).generate("A story").await.unwrap_err();

        assert!(matches!(err, GenerationError::Api { status: 400, .. }));
        assert_eq!(backend.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_backend() {
        let backend = Arc::new(ScriptedImages::ready_on(2, "https://img/c.png"));
        let generator = generator(&backend);

        let first = generator.generate("Same story").await.unwrap();
        let second = generator.generate("Same story").await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.image_reference, "https://img/c.png");
        assert_eq!(backend.submits(), 1);
        assert_eq!(backend.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires() {
        let backend = Arc::new(ScriptedImages::ready_on(1, "https://img/e.png"));
        let generator = generator(&backend);

        generator.generate("Same story").await.unwrap();
        tokio::time::advance(DEFAULT_CACHE_TTL).await;
        let again = generator.generate("Same story").await.unwrap();

        assert!(!again.cached);
        assert_eq!(backend.submits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_is_not_cached() {
        let backend = Arc::new(ScriptedImages::never());
        let generator = generator(&backend).with_polling(Duration::from_secs(1), 2);

        generator.generate("Slow story").await.unwrap();
        let again = generator.generate("Slow story").await.unwrap();

        assert!(!again.cached);
        assert_eq!(backend.submits(), 2);
    }
}
