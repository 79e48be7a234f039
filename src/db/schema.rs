/// Durable schema: a current-state table upserted by identity key, and an
/// append-only change log. Rows in `changes` are never updated or deleted.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    link TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    pub_date TEXT,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    has_correction INTEGER NOT NULL DEFAULT 0,
    correction_keywords TEXT,
    UNIQUE(source, link)
);

CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    link TEXT NOT NULL,
    change_type TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    detected_at TEXT NOT NULL,
    change_summary TEXT,
    has_correction INTEGER NOT NULL DEFAULT 0,
    correction_keywords TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source);
CREATE INDEX IF NOT EXISTS idx_articles_link ON articles(link);
CREATE INDEX IF NOT EXISTS idx_changes_source ON changes(source);
CREATE INDEX IF NOT EXISTS idx_changes_detected_at ON changes(detected_at);
"#;
