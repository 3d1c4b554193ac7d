pub const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
  content TEXT,
  image_path TEXT,
  code_type TEXT,
  is_favorite BOOLEAN DEFAULT 0
);
"#;

pub const CREATE_DB_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS db_info (
  key TEXT PRIMARY KEY,
  value TEXT
);
"#;

pub const CREATE_INDEX_FAVORITE_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_history_favorite_timestamp ON history(is_favorite DESC, timestamp DESC);";

/// Columns added after the first release of the `history` table, with the
/// DDL that brings an older table up to date.
pub const LATE_HISTORY_COLUMNS: [(&str, &str); 2] = [
    ("code_type", "ALTER TABLE history ADD COLUMN code_type TEXT"),
    (
        "is_favorite",
        "ALTER TABLE history ADD COLUMN is_favorite BOOLEAN DEFAULT 0",
    ),
];

pub const SCHEMA_VERSION: &str = "1.0.0";
