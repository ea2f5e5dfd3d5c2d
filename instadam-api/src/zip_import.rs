//! Background extraction of zip uploads into project images.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::mpsc;
use zip::ZipArchive;

use crate::db::Db;
use crate::errors::AppError;
use crate::storage::{add_image, base_name, image_extension, ImageStore};

/// Whether an archive entry should become a project image.
pub fn is_importable(entry_name: &str) -> bool {
    if entry_name.starts_with("__MACOSX/") || entry_name.ends_with('/') {
        return false;
    }
    let name = base_name(entry_name);
    !name.starts_with('.') && image_extension(name).is_ok()
}

/// Read the whole of `reader` unless it yields more than `limit` bytes.
fn read_limited(reader: impl Read, limit: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut data)?;
    Ok((data.len() <= limit).then_some(data))
}

/// Decompress importable entries one at a time and hand each to `visit`.
/// Entries over `max_entry_bytes` are skipped; the sizes in the archive
/// headers are never trusted. `visit` returns `false` to stop early.
pub fn for_each_image_entry(
    path: &Path,
    max_entry_bytes: usize,
    mut visit: impl FnMut(String, Vec<u8>) -> bool,
) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("failed to read zip {}", path.display()))?;

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if !entry.is_file() || !is_importable(entry.name()) {
            continue;
        }
        let name = base_name(entry.name()).to_string();
        match read_limited(entry, max_entry_bytes)? {
            Some(data) => {
                if !visit(name, data) {
                    break;
                }
            }
            None => tracing::warn!("Skipping {name}: larger than {max_entry_bytes} bytes"),
        }
    }
    Ok(())
}

/// Store and register every image in the archive. Entries the store rejects
/// (bad names) are skipped. Returns the number of images added.
pub async fn import_archive(
    db: &Db,
    store: &ImageStore,
    project_id: i32,
    archive_path: &Path,
    max_entry_bytes: usize,
) -> anyhow::Result<usize> {
    // One slot: the reader blocks until the previous entry has been stored.
    let (tx, mut rx) = mpsc::channel::<(String, Vec<u8>)>(1);
    let path = archive_path.to_path_buf();
    let reader = tokio::task::spawn_blocking(move || {
        for_each_image_entry(&path, max_entry_bytes, |name, data| {
            tx.blocking_send((name, data)).is_ok()
        })
    });

    let mut added = 0usize;
    while let Some((name, data)) = rx.recv().await {
        match add_image(db, store, project_id, &name, &data).await {
            Ok(stored) => {
                tracing::debug!("Imported {} into project {project_id}", stored.name);
                added += 1;
            }
            Err(AppError::BadRequest(msg)) => tracing::warn!("Skipping {name}: {msg}"),
            Err(e) => return Err(anyhow::Error::from(e).context(format!("failed to import {name}"))),
        }
    }

    reader.await??;
    Ok(added)
}

/// Run [`import_archive`] on a detached task. Failures are only logged, and
/// the archive is deleted whatever the outcome.
pub fn spawn(
    db: Db,
    store: ImageStore,
    project_id: i32,
    archive_path: PathBuf,
    max_entry_bytes: usize,
) {
    tokio::spawn(async move {
        match import_archive(&db, &store, project_id, &archive_path, max_entry_bytes).await {
            Ok(n) => tracing::info!("Zip import finished: {n} images added to project {project_id}"),
            Err(e) => tracing::error!("Zip import for project {project_id} failed: {e:#}"),
        }
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            tracing::warn!("Failed to remove archive {}: {e}", archive_path.display());
        }
    });
}
