use arboard::Clipboard;
#[cfg(target_os = "linux")]
use arboard::SetExtLinux;
use tracing::info;

use super::{ClipboardError, ClipboardImage, ClipboardService};

/// X11 and Wayland drop a selection when its owning process exits. On Linux
/// `set_text` keeps serving the text until another application takes over.
pub const HOLDS_SELECTION_UNTIL_REPLACED: bool = cfg!(target_os = "linux");

/// Platform clipboard through `arboard`. A fresh handle is opened per call so
/// the service holds no OS resources between actions.
#[derive(Debug, Clone, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    fn open() -> Result<Clipboard, ClipboardError> {
        Clipboard::new().map_err(|err| ClipboardError::Unavailable(err.to_string()))
    }
}

impl ClipboardService for SystemClipboard {
    fn read_image(&self) -> Result<Option<ClipboardImage>, ClipboardError> {
        let mut clipboard = Self::open()?;
        match clipboard.get_image() {
            Ok(image) => Ok(Some(ClipboardImage {
                width: image.width,
                height: image.height,
                bytes: image.bytes.into_owned(),
            })),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(ClipboardError::Access(err.to_string())),
        }
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = Self::open()?;
        if HOLDS_SELECTION_UNTIL_REPLACED {
            info!("serving clipboard text until another application replaces it");
        }
        store_text(&mut clipboard, text).map_err(|err| ClipboardError::Access(err.to_string()))
    }
}

#[cfg(target_os = "linux")]
fn store_text(clipboard: &mut Clipboard, text: &str) -> Result<(), arboard::Error> {
    clipboard.set().wait().text(text)
}

#[cfg(not(target_os = "linux"))]
fn store_text(clipboard: &mut Clipboard, text: &str) -> Result<(), arboard::Error> {
    clipboard.set_text(text)
}
