use std::env;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

pub const APP_DIR_NAME: &str = "qrdecoder";
pub const DB_FILE_NAME: &str = "qrcode_history.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Uses `data_dir` when given, otherwise the platform data directory.
    /// Relative paths are resolved against the working directory.
    pub fn resolve(data_dir: Option<PathBuf>) -> AppResult<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or_else(|| AppError::Config("no platform data directory".to_string()))?,
        };

        let data_dir = if data_dir.is_absolute() {
            data_dir
        } else {
            env::current_dir()
                .map_err(|err| AppError::Config(format!("failed to read working directory: {err}")))?
                .join(data_dir)
        };

        Ok(Self { data_dir })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_holds_database_file() {
        let config = AppConfig::resolve(Some(PathBuf::from("/var/lib/qr"))).expect("config");
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/qr/qrcode_history.db"));
    }

    #[test]
    fn relative_dir_is_made_absolute() {
        let config = AppConfig::resolve(Some(PathBuf::from("state"))).expect("config");
        assert!(config.data_dir().is_absolute());
        assert!(config.data_dir().ends_with("state"));
    }
}
