//! Image decoding helpers. Everything here is CPU-bound and blocking; async
//! callers go through `tokio::task::spawn_blocking`.

use std::io::Cursor;
use std::path::Path;

use image::{GenericImageView, ImageFormat};

use crate::errors::AppError;

pub const MAX_THUMBNAIL_SIDE: u32 = 4096;

/// Width and height of an encoded image held in memory.
pub fn dimensions_from_bytes(bytes: &[u8]) -> Result<(u32, u32), AppError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AppError::bad_request(format!("Unable to decode image: {e}")))?;
    Ok(img.dimensions())
}

/// Width and height of an image on disk, reading only its header.
pub fn dimensions_from_path(path: &Path) -> Result<(u32, u32), AppError> {
    image::image_dimensions(path)
        .map_err(|e| AppError::bad_request(format!("Unable to read image: {e}")))
}

/// PNG-encoded copy of the image scaled down to fit inside `max_w` x `max_h`.
/// Images already inside the box are re-encoded at their original size.
pub fn thumbnail_png(path: &Path, max_w: u32, max_h: u32) -> Result<Vec<u8>, AppError> {
    let img = image::open(path)
        .map_err(|e| AppError::bad_request(format!("Unable to read image: {e}")))?;

    let (w, h) = img.dimensions();
    let thumb = if w <= max_w && h <= max_h {
        img
    } else {
        img.thumbnail(max_w, max_h)
    };

    let mut buf = Cursor::new(Vec::new());
    thumb
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Thumbnail encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

pub fn validate_thumbnail_size(w: u32, h: u32) -> Result<(), AppError> {
    let valid = 1..=MAX_THUMBNAIL_SIDE;
    if !valid.contains(&w) || !valid.contains(&h) {
        return Err(AppError::bad_request(format!(
            "Thumbnail size must be between 1 and {MAX_THUMBNAIL_SIDE}"
        )));
    }
    Ok(())
}
