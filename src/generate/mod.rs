//! Story and illustration generation pipeline
//!
//! Provides:
//! - Backend traits for text and image generation services
//! - Story generation with a name-occurrence check and bounded retries
//! - Illustration generation with fixed-interval polling and a TTL cache
//! - The orchestrator tying both to storage with a three-tier failure policy

mod cache;
mod illustration;
mod pipeline;
mod story;

#[cfg(test)]
pub(crate) mod stubs;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use cache::TtlCache;
pub use illustration::{IllustrationGenerator, IllustrationResult, FALLBACK_IMAGE};
pub use pipeline::{Failure, Orchestrator, Outcome, StoryRun, Warning};
pub use story::{count_name_occurrences, story_prompt, StoryGenerator, StoryResult};

/// Errors from the generation backends and the story quality check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// A required credential is missing
    #[error("not configured: {0}")]
    Configuration(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Generated story did not mention the child often enough
    #[error("story did not meet the personalisation check after {attempts} attempts")]
    InsufficientQuality { attempts: u32 },
}

impl GenerationError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Configuration(_))
    }
}

/// Text generation service
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Complete a single prompt and return the generated text
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Parameters of one image generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageJob {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub prompt_magic: bool,
    pub nsfw_filter: bool,
}

/// A finished image reported by the image service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
}

/// Asynchronous image generation service
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Submit a job and return its ID
    async fn submit(&self, job: &ImageJob) -> Result<String, GenerationError>;

    /// Fetch the images finished so far for a job (empty while pending)
    async fn poll(&self, job_id: &str) -> Result<Vec<GeneratedImage>, GenerationError>;
}
