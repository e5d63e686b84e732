//! Remote AI vision provider.
//!
//! Sends `{ image, prompt, schema }` as JSON to the configured endpoint with
//! an optional bearer key. The response is either the analysis object itself
//! or `{ "result": <analysis> }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::vision::provider::{ProviderAnalysis, VisionProvider};

const PROVIDER: &str = "remote";

/// Instructions sent alongside every image.
pub const ANALYSIS_PROMPT: &str = "You are the Smart Ranch AI Vision system. Analyse this image of cattle. \
Identify visual health patterns, body condition score (BCS), posture and behaviour. \
If the image contains no cattle, return a count of 0 and a null score. \
For each issue found, give a clear visual description and possible veterinary or management causes. \
Be precise and technical.";

/// JSON schema the provider is asked to answer with.
pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cattleCount": { "type": "number" },
            "healthScore": { "type": "number" },
            "identifiedIssues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "issue": { "type": "string" },
                        "description": { "type": "string" },
                        "possibleCauses": { "type": "array", "items": { "type": "string" } }
                    }
                }
            },
            "recommendations": { "type": "array", "items": { "type": "string" } },
            "summary": { "type": "string" }
        }
    })
}

#[derive(Debug, Serialize)]
struct VisionRequest<'a> {
    image: &'a str,
    prompt: &'a str,
    schema: Value,
}

/// Provider backed by an HTTP endpoint.
pub struct RemoteVisionProvider {
    client: Client,
    config: VisionConfig,
    url: String,
}

impl RemoteVisionProvider {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let url = config.url.clone().ok_or_else(|| VisionError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: "no endpoint URL configured".to_string(),
        })?;

        let timeout = if config.timeout.is_zero() {
            Duration::from_secs(120)
        } else {
            config.timeout
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            url,
        })
    }
}

#[async_trait]
impl VisionProvider for RemoteVisionProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn analyze(&self, image_base64: &str) -> Result<ProviderAnalysis, VisionError> {
        let body = VisionRequest {
            image: image_base64,
            prompt: ANALYSIS_PROMPT,
            schema: analysis_schema(),
        };

        tracing::debug!(url = %self.url, image_len = image_base64.len(), "Sending image to vision provider");

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Vision provider request failed: {}", e);
            VisionError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_text = response.text().await.unwrap_or_default();

        tracing::debug!(status = %status, "Vision provider responded");

        if !status.is_success() {
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(VisionError::AuthFailed {
                    provider: PROVIDER.to_string(),
                });
            }
            if status.as_u16() == 429 {
                let retry_after = headers
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);

                return Err(VisionError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after,
                });
            }
            let reason = if response_text.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, response_text)
            };
            return Err(VisionError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason,
            });
        }

        let payload: Value =
            serde_json::from_str(&response_text).map_err(|e| VisionError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("JSON parse error: {}", e),
            })?;

        ProviderAnalysis::from_json(&payload).ok_or_else(|| VisionError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "expected a JSON object".to_string(),
        })
    }
}
