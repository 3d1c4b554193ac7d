use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clipboard::ClipboardService;
use crate::db::{HistoryRecord, HistoryStore};
use crate::decoder::{format_symbols, DecodeProvider};
use crate::error::{AppError, AppResult};
use crate::services::image_source::{self, AcquiredImage, ImageSourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded(HistoryRecord),
    /// The provider found nothing. Not an error and not persisted.
    NothingDetected,
}

#[derive(Debug)]
pub struct ReopenedRecord {
    pub record: HistoryRecord,
    /// `Ok(None)` for clipboard captures, which keep no image. A stored path
    /// that no longer loads is reported as an error here, not by the store.
    pub image: Result<Option<AcquiredImage>, ImageSourceError>,
}

pub struct DecodeEngine {
    store: Arc<HistoryStore>,
    provider: Arc<dyn DecodeProvider>,
    clipboard: Arc<dyn ClipboardService>,
}

impl DecodeEngine {
    pub fn new(
        store: Arc<HistoryStore>,
        provider: Arc<dyn DecodeProvider>,
        clipboard: Arc<dyn ClipboardService>,
    ) -> Self {
        Self {
            store,
            provider,
            clipboard,
        }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn load_file(&self, path: &Path) -> AppResult<AcquiredImage> {
        let image = image_source::load_file(path)?;
        info!(path = %image.origin.history_path(), "loaded image");
        Ok(image)
    }

    pub fn paste_from_clipboard(&self) -> AppResult<AcquiredImage> {
        let image = image_source::capture_clipboard(self.clipboard.as_ref())?;
        info!(
            width = image.pixels.width(),
            height = image.pixels.height(),
            "captured clipboard image"
        );
        Ok(image)
    }

    pub fn decode(&self, image: &AcquiredImage) -> AppResult<DecodeOutcome> {
        let symbols = self.provider.detect(&image.pixels)?;
        if symbols.is_empty() {
            info!("no symbols detected");
            return Ok(DecodeOutcome::NothingDetected);
        }

        let content = format_symbols(&symbols);
        let record = self
            .store
            .record_decode(&content, &image.origin.history_path())?;
        info!(id = record.id, symbols = symbols.len(), code_type = %record.code_type, "decode recorded");
        Ok(DecodeOutcome::Decoded(record))
    }

    pub fn decode_file(&self, path: &Path) -> AppResult<DecodeOutcome> {
        let image = self.load_file(path)?;
        self.decode(&image)
    }

    pub fn decode_clipboard(&self) -> AppResult<DecodeOutcome> {
        let image = self.paste_from_clipboard()?;
        self.decode(&image)
    }

    pub fn reopen(&self, id: i64) -> AppResult<ReopenedRecord> {
        let record = self.store.get(id)?.ok_or(AppError::NotFound(id))?;
        let image = if record.has_image_file() {
            image_source::load_file(Path::new(&record.image_path)).map(Some)
        } else {
            Ok(None)
        };

        if let Err(err) = &image {
            warn!(id, "history image no longer loads: {err}");
        }

        Ok(ReopenedRecord { record, image })
    }

    /// Puts a record's decoded text on the clipboard.
    pub fn copy_record(&self, id: i64) -> AppResult<HistoryRecord> {
        let record = self.store.get(id)?.ok_or(AppError::NotFound(id))?;
        self.clipboard.set_text(&record.content)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::sync::Mutex;

    use image::{Rgba, RgbaImage};
    use uuid::Uuid;

    use super::*;
    use crate::clipboard::{ClipboardError, ClipboardImage};
    use crate::decoder::{DecodeError, DetectedSymbol};

    struct FixedProvider {
        symbols: Vec<DetectedSymbol>,
    }

    impl DecodeProvider for FixedProvider {
        fn detect(&self, _image: &RgbaImage) -> Result<Vec<DetectedSymbol>, DecodeError> {
            Ok(self.symbols.clone())
        }
    }

    #[derive(Default)]
    struct MemoryClipboard {
        image: Mutex<Option<ClipboardImage>>,
        text: Mutex<Option<String>>,
    }

    impl ClipboardService for MemoryClipboard {
        fn read_image(&self) -> Result<Option<ClipboardImage>, ClipboardError> {
            Ok(self.image.lock().expect("lock").clone())
        }

        fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
            *self.text.lock().expect("lock") = Some(text.to_string());
            Ok(())
        }
    }

    fn engine_with(
        symbols: Vec<DetectedSymbol>,
        clipboard: Arc<MemoryClipboard>,
    ) -> DecodeEngine {
        let store = Arc::new(HistoryStore::open_in_memory().expect("db init"));
        DecodeEngine::new(store, Arc::new(FixedProvider { symbols }), clipboard)
    }

    fn write_png(dir: &Path) -> std::path::PathBuf {
        fs::create_dir_all(dir).expect("create dir");
        let path = dir.join("scan.png");
        RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]))
            .save(&path)
            .expect("save png");
        path
    }

    fn temp_dir() -> std::path::PathBuf {
        env::temp_dir().join(format!("qrdecoder-engine-{}", Uuid::new_v4()))
    }

    #[test]
    fn decoded_file_is_recorded_with_formatted_content() {
        let dir = temp_dir();
        let path = write_png(&dir);
        let engine = engine_with(
            vec![
                DetectedSymbol::new("QRCODE", "https://example.com"),
                DetectedSymbol::new("CODE128", "ABC-123"),
            ],
            Arc::new(MemoryClipboard::default()),
        );

        let outcome = engine.decode_file(&path).expect("decode");
        let DecodeOutcome::Decoded(record) = outcome else {
            panic!("expected a decoded record");
        };

        assert_eq!(
            record.content,
            "[二维码]\nhttps://example.com\n\n[Code 128条形码]\nABC-123"
        );
        assert_eq!(record.code_type, "二维码");
        assert!(Path::new(&record.image_path).is_absolute());
        assert_eq!(engine.store().list_all().expect("list"), vec![record]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn nothing_detected_is_not_persisted() {
        let dir = temp_dir();
        let path = write_png(&dir);
        let engine = engine_with(Vec::new(), Arc::new(MemoryClipboard::default()));

        let outcome = engine.decode_file(&path).expect("decode");

        assert_eq!(outcome, DecodeOutcome::NothingDetected);
        assert!(engine.store().list_all().expect("list").is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_file_writes_no_history() {
        let engine = engine_with(
            vec![DetectedSymbol::new("QRCODE", "x")],
            Arc::new(MemoryClipboard::default()),
        );
        let missing = temp_dir().join("missing.png");

        let err = engine.decode_file(&missing).expect_err("missing file");

        assert!(matches!(err, AppError::Image(_)));
        assert!(engine.store().list_all().expect("list").is_empty());
    }

    #[test]
    fn clipboard_decode_records_empty_image_path() {
        let clipboard = Arc::new(MemoryClipboard::default());
        *clipboard.image.lock().expect("lock") = Some(ClipboardImage {
            width: 2,
            height: 1,
            bytes: vec![0; 8],
        });
        let engine = engine_with(vec![DetectedSymbol::new("EAN8", "96385074")], clipboard);

        let DecodeOutcome::Decoded(record) = engine.decode_clipboard().expect("decode") else {
            panic!("expected a decoded record");
        };

        assert_eq!(record.image_path, "");
        assert_eq!(record.code_type, "EAN-8条形码");

        let reopened = engine.reopen(record.id).expect("reopen");
        assert!(matches!(reopened.image, Ok(None)));
    }

    #[test]
    fn reopen_reports_stale_image_path() {
        let dir = temp_dir();
        let path = write_png(&dir);
        let engine = engine_with(
            vec![DetectedSymbol::new("QRCODE", "x")],
            Arc::new(MemoryClipboard::default()),
        );
        let DecodeOutcome::Decoded(record) = engine.decode_file(&path).expect("decode") else {
            panic!("expected a decoded record");
        };

        let fresh = engine.reopen(record.id).expect("reopen");
        assert!(matches!(fresh.image, Ok(Some(_))));

        fs::remove_dir_all(&dir).expect("remove image");
        let stale = engine.reopen(record.id).expect("reopen");
        assert_eq!(stale.record, record);
        assert!(stale.image.is_err());
    }

    #[test]
    fn reopen_unknown_id_is_not_found() {
        let engine = engine_with(Vec::new(), Arc::new(MemoryClipboard::default()));
        assert!(matches!(engine.reopen(42), Err(AppError::NotFound(42))));
    }

    #[test]
    fn copy_record_puts_content_on_clipboard() {
        let clipboard = Arc::new(MemoryClipboard::default());
        let engine = engine_with(Vec::new(), clipboard.clone());
        let record = engine
            .store()
            .record_decode("[二维码]\nhello", "")
            .expect("record");

        engine.copy_record(record.id).expect("copy");

        assert_eq!(
            clipboard.text.lock().expect("lock").as_deref(),
            Some("[二维码]\nhello")
        );
    }
}
