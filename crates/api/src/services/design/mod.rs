//! AI-assisted jewelry design.
//!
//! [`DesignStudio`] turns a prompt into stored image URLs. When no generator is
//! configured, or generation or storage fails, it returns placeholder images
//! instead so the design request still succeeds.

mod client;
mod error;
pub mod prompt;
pub mod storage;

pub use client::ImageGenerator;
pub use error::DesignError;
pub use prompt::{DesignPrompt, StoneAttributes};
pub use storage::{BlobClient, ImageStorage};

use crate::config::ApiConfig;
use crate::models::GenerationOutcome;
use crate::services::uploads::UploadStore;

const DEFAULT_PLACEHOLDER_SIZE: &str = "1024x1024";

/// Placeholder image URLs labelled with the design.
#[must_use]
pub fn placeholder_urls(size: &str, label: &str, count: u8) -> Vec<String> {
    (1..=count)
        .map(|n| {
            let text = if count > 1 {
                format!("{label} {n}")
            } else {
                label.to_owned()
            };
            let text: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
            format!("https://placehold.co/{size}?text={text}")
        })
        .collect()
}

/// Image generation with storage and placeholder fallback.
#[derive(Debug, Clone)]
pub struct DesignStudio {
    generator: Option<ImageGenerator>,
    storage: ImageStorage,
    image_count: u8,
}

impl DesignStudio {
    #[must_use]
    pub const fn new(generator: Option<ImageGenerator>, storage: ImageStorage, image_count: u8) -> Self {
        Self {
            generator,
            storage,
            image_count,
        }
    }

    /// Build from configuration: blob storage when configured, else local files.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::Http` if an HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig, uploads: &UploadStore) -> Result<Self, DesignError> {
        let generator = config
            .image_generation
            .as_ref()
            .map(ImageGenerator::new)
            .transpose()?;
        let storage = match &config.blob_storage {
            Some(blob) => ImageStorage::Blob(BlobClient::new(blob)?),
            None => ImageStorage::Local(uploads.clone()),
        };

        if generator.is_none() {
            tracing::warn!("Image generation not configured; designs will use placeholder images");
        }

        Ok(Self::new(generator, storage, config.design_image_count))
    }

    /// Number of images generated for a new design.
    #[must_use]
    pub const fn image_count(&self) -> u8 {
        self.image_count
    }

    #[must_use]
    pub const fn storage(&self) -> &ImageStorage {
        &self.storage
    }

    /// Generate and store `count` images for `prompt`. Never fails: errors
    /// are logged and answered with placeholders labelled `label`.
    pub async fn generate(&self, prompt: &str, count: u8, label: &str) -> GenerationOutcome {
        let size = self
            .generator
            .as_ref()
            .map_or(DEFAULT_PLACEHOLDER_SIZE, ImageGenerator::size);

        let Some(generator) = &self.generator else {
            return Self::placeholders(size, label, count);
        };

        match self.generate_and_store(generator, prompt, count).await {
            Ok(images) => GenerationOutcome {
                images,
                used_placeholder: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Image generation failed; using placeholders");
                Self::placeholders(size, label, count)
            }
        }
    }

    async fn generate_and_store(
        &self,
        generator: &ImageGenerator,
        prompt: &str,
        count: u8,
    ) -> Result<Vec<String>, DesignError> {
        let images = generator.generate(prompt, count).await?;
        let mut urls = Vec::with_capacity(images.len());
        for bytes in images {
            match self.storage.store_png(bytes).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    self.storage.remove(&urls).await;
                    return Err(e);
                }
            }
        }
        Ok(urls)
    }

    fn placeholders(size: &str, label: &str, count: u8) -> GenerationOutcome {
        GenerationOutcome {
            images: placeholder_urls(size, label, count),
            used_placeholder: true,
        }
    }
}
