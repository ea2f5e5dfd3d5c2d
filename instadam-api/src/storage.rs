//! Local filesystem storage for uploaded images.
//!
//! Files live under `<root>/<project_id>/<uuid>.<ext>` and are served back at
//! `<url_prefix>/<project_id>/<uuid>.<ext>`.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::db::Db;
use crate::errors::AppError;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Matches `images.image_name`.
pub const MAX_IMAGE_NAME_LEN: usize = 256;

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    url_prefix: String,
}

/// Where a freshly written image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub name: String,
    pub storage_path: String,
    pub url: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn project_dir(&self, project_id: i32) -> PathBuf {
        self.root.join(project_id.to_string())
    }

    /// Write `bytes` as a new image of `project_id`. `original_name` must
    /// already carry a valid extension.
    pub async fn save(
        &self,
        project_id: i32,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, AppError> {
        let ext = image_extension(original_name)?;
        let name = base_name(original_name);
        if name.chars().count() > MAX_IMAGE_NAME_LEN {
            return Err(AppError::bad_request(format!(
                "File name must be at most {MAX_IMAGE_NAME_LEN} characters"
            )));
        }
        let dir = self.project_dir(project_id);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{ext}", Uuid::new_v4());
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;

        Ok(StoredImage {
            name: name.to_string(),
            storage_path: path.to_string_lossy().into_owned(),
            url: format!("{}/{project_id}/{file_name}", self.url_prefix),
        })
    }

    /// Write an uploaded archive next to the project's images.
    pub async fn save_archive(&self, project_id: i32, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let dir = self.project_dir(project_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("upload-{}.zip", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Best-effort removal of a file written by [`ImageStore::save`].
    pub async fn discard(&self, stored: &StoredImage) {
        if let Err(e) = tokio::fs::remove_file(&stored.storage_path).await {
            tracing::warn!("Failed to remove {}: {e}", stored.storage_path);
        }
    }

    pub async fn remove_project_dir(&self, project_id: i32) -> Result<(), AppError> {
        let dir = self.project_dir(project_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write an image and insert its `images` row. The file is removed again if
/// the row cannot be written.
pub async fn add_image(
    db: &Db,
    store: &ImageStore,
    project_id: i32,
    original_name: &str,
    bytes: &[u8],
) -> Result<StoredImage, AppError> {
    let stored = store.save(project_id, original_name, bytes).await?;

    let inserted = sqlx::query(
        "INSERT INTO images (project_id, image_name, image_url, image_storage_path) VALUES ($1, $2, $3, $4)",
    )
    .bind(project_id)
    .bind(&stored.name)
    .bind(&stored.url)
    .bind(&stored.storage_path)
    .execute(db)
    .await;

    if let Err(e) = inserted {
        store.discard(&stored).await;
        return Err(e.into());
    }
    Ok(stored)
}

/// Lower-cased extension of `file_name` if it is an accepted image type.
pub fn image_extension(file_name: &str) -> Result<String, AppError> {
    let lower = file_name.to_lowercase();
    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext) => {
            Ok(ext.to_string())
        }
        _ => Err(AppError::bad_request(format!(
            "Invalid file extension for {file_name}"
        ))),
    }
}

/// Strip any directory components a client or archive may have sent along.
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
}
