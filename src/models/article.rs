use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current-state snapshot of one tracked article, keyed by `(source, link)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source: String,
    pub link: String,
    pub title: String,
    pub description: Option<String>,
    /// Publication timestamp as reported by the feed, kept opaque.
    pub pub_date: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Recomputed from the current description on every write, never carried
    /// over from history.
    pub has_correction: bool,
    pub correction_keywords: Vec<String>,
}

impl Article {
    /// Description as stored; NULL and empty string both read as "".
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// One parsed feed entry, as handed to the classifier. The parser guarantees
/// `title` and `link` are non-empty; `description` may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingArticle {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}
