//! Client for an OpenAI-compatible image generation endpoint.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::{ApiErrorResponse, DesignError};
use crate::config::ImageGenerationConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    b64_json: Option<String>,
    url: Option<String>,
}

/// Image generation API client.
#[derive(Clone)]
pub struct ImageGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    model: String,
    size: String,
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl ImageGenerator {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ImageGenerationConfig) -> Result<Self, DesignError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            size: config.size.clone(),
        })
    }

    #[must_use]
    pub fn size(&self) -> &str {
        &self.size
    }

    /// Generate `count` images and return their raw bytes.
    ///
    /// Base64 payloads are decoded; URL payloads are downloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API rejects it, or the
    /// response carries no usable image.
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str, count: u8) -> Result<Vec<Vec<u8>>, DesignError> {
        let request = GenerationRequest {
            model: &self.model,
            prompt,
            n: count,
            size: &self.size,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map_or_else(|_| body.clone(), |e| e.error.message);
            return Err(DesignError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerationResponse = serde_json::from_str(&body)
            .map_err(|e| DesignError::Parse(format!("Failed to parse response: {e}")))?;

        let mut images = Vec::with_capacity(parsed.data.len());
        for image in parsed.data {
            images.push(self.image_bytes(image).await?);
        }
        if images.is_empty() {
            return Err(DesignError::Parse("response contained no images".to_string()));
        }
        Ok(images)
    }

    async fn image_bytes(&self, image: GeneratedImage) -> Result<Vec<u8>, DesignError> {
        if let Some(b64) = image.b64_json {
            return Ok(STANDARD.decode(b64)?);
        }
        let Some(url) = image.url else {
            return Err(DesignError::Parse("image entry has neither b64_json nor url".to_string()));
        };
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerationRequest {
            model: "gpt-image-1",
            prompt: "A ring",
            n: 2,
            size: "1024x1024",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "gpt-image-1", "prompt": "A ring", "n": 2, "size": "1024x1024"})
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"created": 1, "data": [{"b64_json": "aGVsbG8="}, {"url": "https://img.example/a.png"}]}"#;
        let parsed: GenerationResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(
            STANDARD.decode(parsed.data[0].b64_json.as_deref().unwrap()).unwrap(),
            b"hello"
        );
        assert_eq!(parsed.data[1].url.as_deref(), Some("https://img.example/a.png"));
    }
}
