use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("image error: {0}")]
    Image(#[from] crate::services::image_source::ImageSourceError),
    #[error("decode error: {0}")]
    Decode(#[from] crate::decoder::DecodeError),
    #[error("clipboard error: {0}")]
    Clipboard(#[from] crate::clipboard::ClipboardError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("history record {0} not found")]
    NotFound(i64),
}

pub type AppResult<T> = Result<T, AppError>;
