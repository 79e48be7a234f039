use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of transitions recorded in the change log.
///
/// `CorrectionRemoved` is synthesized alongside a `DescriptionChanged` event
/// when an edit makes a correction notice disappear; it never occurs alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    New,
    TitleChanged,
    DescriptionChanged,
    DescriptionAdded,
    CorrectionRemoved,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::New => "new",
            ChangeType::TitleChanged => "title_changed",
            ChangeType::DescriptionChanged => "description_changed",
            ChangeType::DescriptionAdded => "description_added",
            ChangeType::CorrectionRemoved => "correction_removed",
        }
    }

    pub fn from_str(s: &str) -> Option<ChangeType> {
        match s {
            "new" => Some(ChangeType::New),
            "title_changed" => Some(ChangeType::TitleChanged),
            "description_changed" => Some(ChangeType::DescriptionChanged),
            "description_added" => Some(ChangeType::DescriptionAdded),
            "correction_removed" => Some(ChangeType::CorrectionRemoved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable history record of one detected transition. Append-only; rows are
/// never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: i64,
    pub source: String,
    pub link: String,
    pub change_type: ChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub detected_at: DateTime<Utc>,
    /// Opaque annotation from an external collaborator; the store only sets it
    /// for the fixed correction-removed note.
    pub change_summary: Option<String>,
    /// Correction status after this change was applied.
    pub has_correction: bool,
    pub correction_keywords: Vec<String>,
}
