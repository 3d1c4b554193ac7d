use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;

use crate::clipboard::{ClipboardError, ClipboardImage, ClipboardService};

#[derive(Debug, Error)]
pub enum ImageSourceError {
    #[error("cannot access {path}: {source}")]
    Path {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read image {path}: {source}")]
    Open {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("clipboard holds no image")]
    EmptyClipboard,
    #[error("clipboard image is invalid ({width}x{height}, {len} bytes)")]
    InvalidBuffer {
        width: usize,
        height: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    File(PathBuf),
    /// Lives only in memory for the current session.
    Clipboard,
}

impl ImageOrigin {
    /// Path stored with the history record; empty for clipboard captures.
    pub fn history_path(&self) -> String {
        match self {
            ImageOrigin::File(path) => path.to_string_lossy().to_string(),
            ImageOrigin::Clipboard => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub origin: ImageOrigin,
    pub pixels: RgbaImage,
}

pub fn load_file(path: &Path) -> Result<AcquiredImage, ImageSourceError> {
    let resolved = fs::canonicalize(path).map_err(|source| ImageSourceError::Path {
        path: path.to_path_buf(),
        source,
    })?;
    let pixels = image::open(&resolved)
        .map_err(|source| ImageSourceError::Open {
            path: resolved.clone(),
            source,
        })?
        .to_rgba8();

    Ok(AcquiredImage {
        origin: ImageOrigin::File(resolved),
        pixels,
    })
}

pub fn capture_clipboard(
    clipboard: &dyn ClipboardService,
) -> Result<AcquiredImage, ImageSourceError> {
    let image = clipboard
        .read_image()?
        .ok_or(ImageSourceError::EmptyClipboard)?;
    Ok(AcquiredImage {
        origin: ImageOrigin::Clipboard,
        pixels: raster_from_clipboard(image)?,
    })
}

fn raster_from_clipboard(image: ClipboardImage) -> Result<RgbaImage, ImageSourceError> {
    let invalid = ImageSourceError::InvalidBuffer {
        width: image.width,
        height: image.height,
        len: image.bytes.len(),
    };

    let expected = image.expected_len();
    if expected == 0 || image.bytes.len() < expected {
        return Err(invalid);
    }
    let (Ok(width), Ok(height)) = (u32::try_from(image.width), u32::try_from(image.height)) else {
        return Err(invalid);
    };

    let mut bytes = image.bytes;
    bytes.truncate(expected);
    RgbaImage::from_raw(width, height, bytes).ok_or(invalid)
}
