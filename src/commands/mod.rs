use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::Subcommand;

use crate::db::{BatchOutcome, ExportFormat, HistoryRecord};
use crate::services::decode_engine::{DecodeEngine, DecodeOutcome};

const SUMMARY_CHARS: usize = 100;

pub struct AppState {
    pub engine: DecodeEngine,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode every QR code or barcode in an image file
    Decode { path: PathBuf },
    /// Decode the image currently on the clipboard
    Paste,
    /// List history, favorites first
    List,
    /// Show one history record and whether its image still loads
    Show { id: i64 },
    /// Toggle the favorite flag of the given records
    Favorite {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Permanently delete the given records
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Export all records, oldest first
    Export {
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        dest: PathBuf,
    },
    /// Snapshot the database into the backups directory
    Backup,
    /// Reclaim unused space and refresh query statistics
    Optimize,
    /// Show database metadata
    Info,
    /// Copy a record's decoded text to the clipboard. On Linux the command
    /// keeps running until another application replaces the clipboard.
    Copy { id: i64 },
}

/// Runs one user action to completion. Failures come back as the single
/// message shown to the user.
pub fn dispatch(state: &AppState, command: Command) -> Result<String, String> {
    match command {
        Command::Decode { path } => decode_image(state, &path),
        Command::Paste => paste_image(state),
        Command::List => list_history(state),
        Command::Show { id } => show_record(state, id),
        Command::Favorite { ids } => toggle_favorite(state, &ids),
        Command::Delete { ids } => delete_records(state, &ids),
        Command::Export { format, dest } => export_history(state, format, &dest),
        Command::Backup => backup_database(state),
        Command::Optimize => optimize_database(state),
        Command::Info => database_info(state),
        Command::Copy { id } => copy_result(state, id),
    }
}

pub fn decode_image(state: &AppState, path: &Path) -> Result<String, String> {
    state
        .engine
        .decode_file(path)
        .map(describe_outcome)
        .map_err(|err| format!("decode failed: {err}"))
}

pub fn paste_image(state: &AppState) -> Result<String, String> {
    state
        .engine
        .decode_clipboard()
        .map(describe_outcome)
        .map_err(|err| format!("decode failed: {err}"))
}

pub fn list_history(state: &AppState) -> Result<String, String> {
    let records = state
        .engine
        .store()
        .list_all()
        .map_err(|err| format!("failed to load history: {err}"))?;
    if records.is_empty() {
        return Ok("history is empty".to_string());
    }
    Ok(records
        .iter()
        .map(summarize_record)
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn show_record(state: &AppState, id: i64) -> Result<String, String> {
    let reopened = state.engine.reopen(id).map_err(|err| err.to_string())?;
    let record = &reopened.record;

    let mut out = String::new();
    let _ = writeln!(out, "#{} {} [{}]", record.id, record.timestamp, record.code_type);
    if record.is_favorite {
        let _ = writeln!(out, "favorite");
    }
    match &reopened.image {
        Ok(Some(image)) => {
            let _ = writeln!(
                out,
                "image: {} ({}x{})",
                record.image_path,
                image.pixels.width(),
                image.pixels.height()
            );
        }
        Ok(None) => {
            let _ = writeln!(out, "image: clipboard capture, not kept");
        }
        Err(err) => {
            let _ = writeln!(out, "image: {} could not be loaded ({err})", record.image_path);
        }
    }
    out.push_str(&record.content);
    Ok(out)
}

pub fn toggle_favorite(state: &AppState, ids: &[i64]) -> Result<String, String> {
    state
        .engine
        .store()
        .toggle_favorite(ids)
        .map(|outcome| describe_batch("favorite flag toggled", &outcome))
        .map_err(|err| format!("failed to update favorites: {err}"))
}

pub fn delete_records(state: &AppState, ids: &[i64]) -> Result<String, String> {
    state
        .engine
        .store()
        .delete_records(ids)
        .map(|outcome| describe_batch("deleted", &outcome))
        .map_err(|err| format!("failed to delete history: {err}"))
}

pub fn export_history(
    state: &AppState,
    format: ExportFormat,
    dest: &Path,
) -> Result<String, String> {
    let written = state
        .engine
        .store()
        .export_to_path(format, dest)
        .map_err(|err| format!("export failed: {err}"))?;
    Ok(format!(
        "exported {written} records as {format} to {}",
        dest.display()
    ))
}

pub fn backup_database(state: &AppState) -> Result<String, String> {
    let path = state
        .engine
        .store()
        .backup()
        .map_err(|err| format!("backup failed: {err}"))?;
    Ok(format!("database backed up to {}", path.display()))
}

pub fn optimize_database(state: &AppState) -> Result<String, String> {
    state
        .engine
        .store()
        .optimize()
        .map_err(|err| format!("optimize failed: {err}"))?;
    Ok("database optimized".to_string())
}

pub fn database_info(state: &AppState) -> Result<String, String> {
    let store = state.engine.store();
    let info = store.db_info().map_err(|err| err.to_string())?;
    let count = store.list_all().map_err(|err| err.to_string())?.len();
    let location = store
        .location()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    Ok(format!(
        "database: {location}\nversion: {}\ncreated: {}\nrecords: {count}",
        info.version, info.created_at
    ))
}

pub fn copy_result(state: &AppState, id: i64) -> Result<String, String> {
    state
        .engine
        .copy_record(id)
        .map(|record| format!("copied record #{} to clipboard", record.id))
        .map_err(|err| format!("copy failed: {err}"))
}

fn describe_outcome(outcome: DecodeOutcome) -> String {
    match outcome {
        DecodeOutcome::Decoded(record) => {
            format!("{}\n\nsaved as #{}", record.content, record.id)
        }
        DecodeOutcome::NothingDetected => "no QR code or barcode detected".to_string(),
    }
}

fn describe_batch(action: &str, outcome: &BatchOutcome) -> String {
    let mut message = format!("{action}: {} record(s)", outcome.applied.len());
    if !outcome.skipped.is_empty() {
        let skipped: Vec<String> = outcome.skipped.iter().map(i64::to_string).collect();
        let _ = write!(message, ", not found: {}", skipped.join(", "));
    }
    message
}

/// One list line: favorite marker, id, timestamp and the first characters of
/// the content on a single line.
pub fn summarize_record(record: &HistoryRecord) -> String {
    let preview: String = record
        .content
        .chars()
        .take(SUMMARY_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    let ellipsis = if record.content.chars().count() > SUMMARY_CHARS {
        "..."
    } else {
        ""
    };
    let marker = if record.is_favorite { "★ " } else { "" };
    format!(
        "{marker}#{} {}: {preview}{ellipsis}",
        record.id, record.timestamp
    )
}
