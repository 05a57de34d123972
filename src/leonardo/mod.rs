//! Leonardo image generation client
//!
//! Generation is asynchronous: a job is submitted, then its status is
//! fetched until images appear. Implements [`ImageBackend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LeonardoSettings;
use crate::generate::{GeneratedImage, GenerationError, ImageBackend, ImageJob};

/// Generation job request
#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    #[serde(rename = "modelId")]
    model_id: &'a str,
    width: u32,
    height: u32,
    num_images: u32,
    #[serde(rename = "promptMagic")]
    prompt_magic: bool,
    #[serde(rename = "nsfwFilter")]
    nsfw_filter: bool,
}

/// Response to a job submission
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "sdGenerationJob")]
    job: SubmittedJob,
}

#[derive(Debug, Deserialize)]
struct SubmittedJob {
    #[serde(rename = "generationId")]
    generation_id: String,
}

/// Response to a status poll
#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    generations_by_pk: Option<Generation>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    generated_images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    url: String,
}

impl PollResponse {
    fn into_images(self) -> Vec<GeneratedImage> {
        self.generations_by_pk
            .map(|g| {
                g.generated_images
                    .into_iter()
                    .map(|i| GeneratedImage { url: i.url })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Leonardo API client
#[derive(Debug)]
pub struct LeonardoClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model_id: String,
}

impl LeonardoClient {
    /// Create a new client from settings
    pub fn new(settings: &LeonardoSettings) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                GenerationError::Transport(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model_id: settings.model_id.clone(),
        })
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, GenerationError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| {
                GenerationError::Configuration("LEONARDO_API_KEY is not set".to_string())
            })?;
        Ok(builder
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Accept", "application/json"))
    }

    /// Send a request, mapping transport failures and non-2xx statuses
    async fn send(builder: RequestBuilder) -> Result<Response, GenerationError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Leonardo API error: {} - {}", status, body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageBackend for LeonardoClient {
    async fn submit(&self, job: &ImageJob) -> Result<String, GenerationError> {
        let request = GenerationRequest {
            prompt: &job.prompt,
            model_id: &self.model_id,
            width: job.width,
            height: job.height,
            num_images: 1,
            prompt_magic: job.prompt_magic,
            nsfw_filter: job.nsfw_filter,
        };

        debug!("Submitting image generation job to Leonardo");

        let builder = self
            .authorized(self.client.post(format!("{}/generations", self.base_url)))?
            .json(&request);
        let response: SubmitResponse = Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        Ok(response.job.generation_id)
    }

    async fn poll(&self, job_id: &str) -> Result<Vec<GeneratedImage>, GenerationError> {
        let builder =
            self.authorized(self.client.get(format!("{}/generations/{}", self.base_url, job_id)))?;
        let response: PollResponse = Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        if let Some(status) = response
            .generations_by_pk
            .as_ref()
            .and_then(|g| g.status.as_deref())
        {
            debug!("Leonardo job {} status: {}", job_id, status);
        }

        Ok(response.into_images())
    }
}
