use image::RgbaImage;
use thiserror::Error;

mod format;
pub mod multi;

pub use format::{format_symbols, payload_text, symbology_label};
pub use multi::MultiFormatProvider;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("barcode reader failed: {0}")]
    Provider(String),
}

/// One symbol found in an image, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedSymbol {
    /// Raw symbology identifier, e.g. `QRCODE` or `EAN13`.
    pub symbology: String,
    pub payload: Vec<u8>,
}

impl DetectedSymbol {
    pub fn new(symbology: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            symbology: symbology.into(),
            payload: payload.into(),
        }
    }
}

/// Seam for the barcode library doing the actual detection. Order of the
/// returned symbols is whatever the provider produces.
pub trait DecodeProvider: Send + Sync {
    fn detect(&self, image: &RgbaImage) -> Result<Vec<DetectedSymbol>, DecodeError>;
}
