use std::sync::Arc;

use thiserror::Error;

pub mod system;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard access failed: {0}")]
    Access(String),
}

/// Snapshot of an image held on the clipboard, RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

impl ClipboardImage {
    pub fn expected_len(&self) -> usize {
        self.width * self.height * 4
    }
}

pub trait ClipboardService: Send + Sync {
    /// `Ok(None)` when the clipboard holds no image.
    fn read_image(&self) -> Result<Option<ClipboardImage>, ClipboardError>;
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
}

pub fn default_service() -> Arc<dyn ClipboardService> {
    Arc::new(system::SystemClipboard::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_is_four_bytes_per_pixel() {
        let image = ClipboardImage {
            width: 3,
            height: 2,
            bytes: Vec::new(),
        };
        assert_eq!(image.expected_len(), 24);
    }
}
