//! Multipart upload handling.
//!
//! File parts are routed by field name to an [`UploadField`] category, checked
//! against that category's extension and MIME allow-lists, streamed to
//! `{upload_dir}/{category}/{uuid}.{ext}` and exposed under `/uploads`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::models::gem::MAX_GEM_IMAGES;

/// URL prefix under which the upload directory is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

const MIB: usize = 1024 * 1024;
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Errors from parsing or storing uploads.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unexpected file field '{0}'")]
    UnknownField(String),

    #[error("{field}: file type not allowed ({detail})")]
    DisallowedType { field: &'static str, detail: String },

    #[error("{field}: file exceeds {max_mib} MiB")]
    TooLarge { field: &'static str, max_mib: usize },

    #[error("{field}: at most {max} files allowed")]
    TooManyFiles { field: &'static str, max: usize },

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownField(_) | Self::DisallowedType { .. } | Self::TooManyFiles { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Multipart(e) => e.status(),
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// File field names accepted by upload endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadField {
    Images,
    Certificate,
    ProfileImage,
    CoverImage,
    IdDocument,
}

impl UploadField {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "images" => Some(Self::Images),
            "certificate" => Some(Self::Certificate),
            "profile_image" => Some(Self::ProfileImage),
            "cover_image" => Some(Self::CoverImage),
            "id_document" => Some(Self::IdDocument),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Certificate => "certificate",
            Self::ProfileImage => "profile_image",
            Self::CoverImage => "cover_image",
            Self::IdDocument => "id_document",
        }
    }

    /// Subdirectory of the upload root.
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Images => "gems",
            Self::Certificate => "certificates",
            Self::ProfileImage => "profiles",
            Self::CoverImage => "blog",
            Self::IdDocument => "documents",
        }
    }

    #[must_use]
    pub const fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Images | Self::ProfileImage | Self::CoverImage => IMAGE_EXTENSIONS,
            Self::Certificate | Self::IdDocument => DOCUMENT_EXTENSIONS,
        }
    }

    #[must_use]
    pub fn accepts_mime(self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        match self {
            Self::Images | Self::ProfileImage | Self::CoverImage => mime.starts_with("image/"),
            Self::Certificate | Self::IdDocument => {
                mime == "application/pdf" || mime.starts_with("image/")
            }
        }
    }

    #[must_use]
    pub const fn max_bytes(self) -> usize {
        match self {
            Self::Images | Self::ProfileImage | Self::CoverImage => 5 * MIB,
            Self::Certificate | Self::IdDocument => 10 * MIB,
        }
    }

    #[must_use]
    pub const fn max_files(self) -> usize {
        match self {
            Self::Images => MAX_GEM_IMAGES,
            _ => 1,
        }
    }

    /// Lowercased extension of `file_name` if this field allows it.
    fn checked_extension(self, file_name: &str) -> Result<String, UploadError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if self.allowed_extensions().contains(&ext.as_str()) {
            Ok(ext)
        } else {
            Err(UploadError::DisallowedType {
                field: self.name(),
                detail: format!("extension '{ext}'"),
            })
        }
    }
}

/// Local file storage rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream one multipart file to disk, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::DisallowedType` for a bad extension or MIME type,
    /// `UploadError::TooLarge` past the field's size limit, or an I/O error.
    pub async fn save(&self, field: UploadField, mut part: Field<'_>) -> Result<String, UploadError> {
        let file_name = part.file_name().unwrap_or_default().to_owned();
        let ext = field.checked_extension(&file_name)?;
        let mime = part.content_type().unwrap_or_default().to_owned();
        if !field.accepts_mime(&mime) {
            return Err(UploadError::DisallowedType {
                field: field.name(),
                detail: format!("content type '{mime}'"),
            });
        }

        let dir = self.root.join(field.dir());
        fs::create_dir_all(&dir).await?;
        let stored_name = format!("{}.{ext}", Uuid::new_v4());
        let path = dir.join(&stored_name);

        let mut file = fs::File::create(&path).await?;
        let mut written = 0usize;
        let result: Result<(), UploadError> = async {
            while let Some(chunk) = part.chunk().await? {
                written += chunk.len();
                if written > field.max_bytes() {
                    return Err(UploadError::TooLarge {
                        field: field.name(),
                        max_mib: field.max_bytes() / MIB,
                    });
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }

        Ok(format!("{PUBLIC_PREFIX}/{}/{stored_name}", field.dir()))
    }

    /// Save raw bytes under a category directory, returning the public URL.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub async fn save_bytes(&self, dir: &str, ext: &str, bytes: &[u8]) -> Result<String, std::io::Error> {
        let target = self.root.join(dir);
        fs::create_dir_all(&target).await?;
        let stored_name = format!("{}.{ext}", Uuid::new_v4());
        fs::write(target.join(&stored_name), bytes).await?;
        Ok(format!("{PUBLIC_PREFIX}/{dir}/{stored_name}"))
    }

    /// Map a public URL back to a path inside the upload root.
    ///
    /// Returns `None` for URLs outside `/uploads` or containing traversal segments.
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        if relative.is_empty() || relative.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Delete a stored file by its public URL. Missing files and foreign URLs are ignored.
    pub async fn remove_url(&self, url: &str) {
        let Some(path) = self.path_for(url) else {
            return;
        };
        if let Err(e) = fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove upload");
        }
    }

    /// Delete several stored files.
    pub async fn discard(&self, urls: &[String]) {
        for url in urls {
            self.remove_url(url).await;
        }
    }
}

/// A parsed multipart request: text fields plus stored file URLs per field.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<UploadField, Vec<String>>,
}

impl MultipartForm {
    /// Read the whole body. Files go to `store`; only fields in `allowed` are accepted.
    ///
    /// Files already written are removed if a later part fails.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnknownField` for a file part not in `allowed`, or
    /// any error from [`UploadStore::save`].
    pub async fn read(
        mut multipart: Multipart,
        store: &UploadStore,
        allowed: &[UploadField],
    ) -> Result<Self, UploadError> {
        let mut form = Self::default();
        match form.read_parts(&mut multipart, store, allowed).await {
            Ok(()) => Ok(form),
            Err(e) => {
                store.discard(&form.all_files()).await;
                Err(e)
            }
        }
    }

    async fn read_parts(
        &mut self,
        multipart: &mut Multipart,
        store: &UploadStore,
        allowed: &[UploadField],
    ) -> Result<(), UploadError> {
        while let Some(part) = multipart.next_field().await? {
            let name = part.name().unwrap_or_default().to_owned();

            if part.file_name().is_none() {
                let value = part.text().await?;
                self.fields.insert(name, value);
                continue;
            }

            let field = UploadField::from_name(&name)
                .filter(|f| allowed.contains(f))
                .ok_or_else(|| UploadError::UnknownField(name.clone()))?;

            if self.files(field).len() >= field.max_files() {
                return Err(UploadError::TooManyFiles {
                    field: field.name(),
                    max: field.max_files(),
                });
            }
            let url = store.save(field, part).await?;
            self.files.entry(field).or_default().push(url);
        }
        Ok(())
    }

    /// A trimmed text field, `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Stored URLs for a file field, in upload order.
    #[must_use]
    pub fn files(&self, field: UploadField) -> &[String] {
        self.files.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first stored URL for a single-file field.
    #[must_use]
    pub fn file(&self, field: UploadField) -> Option<&str> {
        self.files(field).first().map(String::as_str)
    }

    /// Every stored URL, for cleanup when later work fails.
    #[must_use]
    pub fn all_files(&self) -> Vec<String> {
        self.files.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_field_routing() {
        assert_eq!(UploadField::from_name("images"), Some(UploadField::Images));
        assert_eq!(UploadField::from_name("id_document"), Some(UploadField::IdDocument));
        assert_eq!(UploadField::from_name("avatar"), None);
        assert_eq!(UploadField::CoverImage.dir(), "blog");
        assert_eq!(UploadField::Certificate.dir(), "certificates");
    }

    #[test]
    fn test_extension_allow_lists() {
        assert_eq!(UploadField::Images.checked_extension("ruby.JPG").unwrap(), "jpg");
        assert!(UploadField::Images.checked_extension("ruby.pdf").is_err());
        assert!(UploadField::Images.checked_extension("ruby").is_err());
        assert_eq!(UploadField::Certificate.checked_extension("gia.pdf").unwrap(), "pdf");
        assert!(UploadField::IdDocument.checked_extension("id.webp").is_err());
    }

    #[test]
    fn test_mime_allow_lists() {
        assert!(UploadField::Images.accepts_mime("image/png"));
        assert!(!UploadField::Images.accepts_mime("application/pdf"));
        assert!(UploadField::Certificate.accepts_mime("application/pdf"));
        assert!(UploadField::IdDocument.accepts_mime("IMAGE/JPEG"));
        assert!(!UploadField::ProfileImage.accepts_mime("text/html"));
        assert!(!UploadField::CoverImage.accepts_mime(""));
    }

    #[test]
    fn test_limits() {
        assert_eq!(UploadField::Images.max_bytes(), 5 * MIB);
        assert_eq!(UploadField::Certificate.max_bytes(), 10 * MIB);
        assert_eq!(UploadField::Images.max_files(), 8);
        assert_eq!(UploadField::ProfileImage.max_files(), 1);
    }

    #[test]
    fn test_error_status() {
        assert_eq!(
            UploadError::UnknownField("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::TooLarge {
                field: "images",
                max_mib: 5
            }
            .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let store = UploadStore::new(PathBuf::from("/srv/uploads"));
        assert_eq!(
            store.path_for("/uploads/gems/a.png"),
            Some(PathBuf::from("/srv/uploads/gems/a.png"))
        );
        assert_eq!(store.path_for("/uploads/../etc/passwd"), None);
        assert_eq!(store.path_for("https://cdn.example.com/a.png"), None);
        assert_eq!(store.path_for("/uploads/"), None);
    }

    #[tokio::test]
    async fn test_save_bytes_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf());

        let url = store.save_bytes("designs", "png", b"png-bytes").await.unwrap();
        assert!(url.starts_with("/uploads/designs/"));
        assert!(url.ends_with(".png"));

        let path = store.path_for(&url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        store.remove_url(&url).await;
        assert!(!path.exists());
        store.remove_url(&url).await;
    }

    #[tokio::test]
    async fn test_discard_removes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf());

        let image = store.save_bytes("gems", "png", b"a").await.unwrap();
        let certificate = store.save_bytes("certificates", "pdf", b"b").await.unwrap();
        let paths = [store.path_for(&image).unwrap(), store.path_for(&certificate).unwrap()];

        store
            .discard(&[image, certificate, "https://cdn.example.com/x.png".to_string()])
            .await;
        assert!(paths.iter().all(|p| !p.exists()));
    }
}
