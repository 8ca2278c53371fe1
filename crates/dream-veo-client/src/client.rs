//! Veo HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use dream_models::GenerationConfig;

use crate::capability::capabilities_for;
use crate::error::{VeoError, VeoResult};
use crate::generator::{MediaFetcher, VideoGenerator};
use crate::keys::ApiKeyStore;
use crate::types::{Operation, PredictRequest, PromptInstance, VideoParameters};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Veo client.
#[derive(Debug, Clone)]
pub struct VeoClientConfig {
    /// Base URL of the Generative Language API
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Fixed delay between operation polls
    pub poll_interval: Duration,
    /// Give up after this many polls (unbounded when `None`)
    pub max_poll_attempts: Option<u32>,
}

impl Default for VeoClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: None,
        }
    }
}

impl VeoClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("VEO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("VEO_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            poll_interval: Duration::from_secs(
                std::env::var("VEO_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_poll_attempts: std::env::var("VEO_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// Client for Veo video generation.
pub struct VeoClient {
    http: Client,
    config: VeoClientConfig,
    keys: ApiKeyStore,
}

impl VeoClient {
    /// Create a new client reading its key from `keys` on every request.
    pub fn new(config: VeoClientConfig, keys: ApiKeyStore) -> VeoResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VeoError::Network)?;

        Ok(Self { http, config, keys })
    }

    /// Create from environment variables.
    pub fn from_env(keys: ApiKeyStore) -> VeoResult<Self> {
        Self::new(VeoClientConfig::from_env(), keys)
    }

    pub fn config(&self) -> &VeoClientConfig {
        &self.config
    }

    /// Build the submit body, including `resolution` only for models that
    /// accept it.
    pub fn build_request(prompt: &str, config: &GenerationConfig, model: &str) -> PredictRequest {
        let capabilities = capabilities_for(model);

        PredictRequest {
            instances: vec![PromptInstance {
                prompt: prompt.to_string(),
            }],
            parameters: VideoParameters {
                aspect_ratio: config.aspect_ratio,
                sample_count: 1,
                resolution: capabilities
                    .supports_resolution
                    .then_some(config.resolution),
            },
        }
    }

    /// Submit a generation request and return the new operation.
    pub async fn submit(&self, prompt: &str, config: &GenerationConfig, model: &str) -> VeoResult<Operation> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let body = Self::build_request(prompt, config, model);

        debug!(model = %model, "Submitting video generation request to {}", url);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let operation: Operation = Self::decode(response).await?;
        info!(model = %model, operation = %operation.name, "Video generation submitted");
        Ok(operation)
    }

    /// Fetch the current state of an operation.
    pub async fn poll(&self, operation_name: &str) -> VeoResult<Operation> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/v1beta/{}",
            self.config.base_url.trim_end_matches('/'),
            operation_name
        );

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Submit, poll until done, and return the first generated video's locator.
    pub async fn generate_video(&self, prompt: &str, config: &GenerationConfig, model: &str) -> VeoResult<String> {
        let mut operation = self.submit(prompt, config, model).await?;
        let mut polls = 0u32;

        while !operation.done {
            if let Some(max) = self.config.max_poll_attempts {
                if polls >= max {
                    warn!(operation = %operation.name, "Giving up after {} polls", polls);
                    return Err(VeoError::Timeout(polls));
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
            polls += 1;
            debug!(operation = %operation.name, poll = polls, "Polling video operation");
            operation = self.poll(&operation.name).await?;
        }

        if let Some(error) = operation.error.take() {
            let message = if error.message.is_empty() {
                "Unknown generation error".to_string()
            } else {
                error.message
            };
            return Err(VeoError::Operation {
                code: error.code,
                message,
            });
        }

        let uri = operation.first_video_uri().ok_or(VeoError::NoMedia)?.to_string();
        info!(operation = %operation.name, polls, "Video generation finished");
        Ok(uri)
    }

    /// Download the media behind `remote_locator`, authenticating with the
    /// `key` query parameter.
    pub async fn download(&self, remote_locator: &str) -> VeoResult<Vec<u8>> {
        let api_key = self.api_key()?;
        let url = Self::media_url(remote_locator, &api_key)?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VeoError::MediaStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(VeoError::EmptyMedia);
        }

        debug!("Downloaded {} bytes of media", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Append the API key to a remote locator, keeping any existing query.
    pub fn media_url(remote_locator: &str, api_key: &str) -> VeoResult<Url> {
        let mut url = Url::parse(remote_locator)
            .map_err(|e| VeoError::InvalidLocator(format!("{}: {}", remote_locator, e)))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    fn api_key(&self) -> VeoResult<String> {
        self.keys.get().ok_or(VeoError::MissingApiKey)
    }

    async fn check_status(response: Response) -> VeoResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(VeoError::from_http_status(status.as_u16(), &body))
    }

    /// Check the status, then parse the body as JSON.
    async fn decode<T: DeserializeOwned>(response: Response) -> VeoResult<T> {
        let bytes = Self::check_status(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl VideoGenerator for VeoClient {
    async fn generate(&self, prompt: &str, config: &GenerationConfig, model: &str) -> VeoResult<String> {
        self.generate_video(prompt, config, model).await
    }
}

#[async_trait]
impl MediaFetcher for VeoClient {
    async fn fetch(&self, remote_locator: &str) -> VeoResult<Vec<u8>> {
        self.download(remote_locator).await
    }
}
