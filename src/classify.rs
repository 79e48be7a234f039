//! Change classification: given the stored snapshot of an article and a
//! freshly fetched version, decide what (if anything) happened.
//!
//! This is a pure, total function. It does no I/O and never fails on valid
//! input; malformed records (missing title or link) are filtered out at the
//! parse boundary and never reach it. The store applies the returned decision
//! transactionally.

use crate::correction::{CorrectionVocabulary, Detection};
use crate::models::{Article, IncomingArticle};

/// The decision for one `(prior, incoming)` pair on one fetch cycle.
///
/// `detection` is always the correction status computed from the incoming
/// description, which becomes the article's stored status after the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No prior record for this `(source, link)`.
    New { detection: Detection },
    /// Title and description both match the stored snapshot. Only
    /// `last_seen` is bumped; no change event is written.
    Unchanged,
    /// Title differs. Takes priority over a simultaneous description change:
    /// only the title event is emitted this cycle, and the stored description
    /// is left alone (a still-differing description is picked up on the next
    /// fetch). Correction flags are still recomputed from the incoming
    /// description.
    TitleChanged {
        old_title: String,
        detection: Detection,
    },
    /// Title unchanged, description differs.
    DescriptionChanged {
        old_description: Option<String>,
        /// The prior description was empty or NULL, so this is an addition.
        added: bool,
        detection: Detection,
        correction: CorrectionTransition,
    },
}

/// How the correction flag moved across a description change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionTransition {
    Unchanged,
    /// false -> true: notification-worthy, but not a stored change type.
    Added,
    /// true -> false: a correction notice silently disappeared. The store
    /// appends a synthetic `correction_removed` event for this.
    Removed,
}

/// Classifies one incoming article against its stored prior, if any.
///
/// Re-invoking with the same inputs always yields the same decision; calling
/// it with an incoming record equal to the stored state yields `Unchanged`.
pub fn classify(
    prior: Option<&Article>,
    incoming: &IncomingArticle,
    vocab: &CorrectionVocabulary,
) -> Classification {
    let detection = vocab.detect(&incoming.description);

    let Some(prior) = prior else {
        return Classification::New { detection };
    };

    if prior.title != incoming.title {
        return Classification::TitleChanged {
            old_title: prior.title.clone(),
            detection,
        };
    }

    if prior.description_text() != incoming.description {
        let added = prior.description_text().is_empty();
        let correction = match (prior.has_correction, detection.has_correction) {
            (false, true) => CorrectionTransition::Added,
            (true, false) => CorrectionTransition::Removed,
            _ => CorrectionTransition::Unchanged,
        };
        return Classification::DescriptionChanged {
            old_description: prior.description.clone(),
            added,
            detection,
            correction,
        };
    }

    Classification::Unchanged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vocab() -> CorrectionVocabulary {
        CorrectionVocabulary::default()
    }

    fn stored(title: &str, description: &str) -> Article {
        let detection = vocab().detect(description);
        Article {
            id: 1,
            source: "NHK首都圏ニュース".into(),
            link: "20250101/1000001.html".into(),
            title: title.into(),
            description: if description.is_empty() {
                None
            } else {
                Some(description.into())
            },
            pub_date: Some("2025-01-01T09:00:00+09:00".into()),
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            has_correction: detection.has_correction,
            correction_keywords: detection.keywords,
        }
    }

    fn incoming(title: &str, description: &str) -> IncomingArticle {
        IncomingArticle {
            title: title.into(),
            link: "20250101/1000001.html".into(),
            description: description.into(),
            pub_date: "2025-01-01T09:00:00+09:00".into(),
        }
    }

    #[test]
    fn no_prior_record_is_new() {
        let result = classify(None, &incoming("A", "plain text"), &vocab());
        match result {
            Classification::New { detection } => {
                assert!(!detection.has_correction);
                assert!(detection.keywords.is_empty());
            }
            other => panic!("expected New, got {other:?}"),
        }
    }

    #[test]
    fn new_article_with_correction_is_detected() {
        let result = classify(None, &incoming("A", "※当初の内容を訂正しました"), &vocab());
        match result {
            Classification::New { detection } => assert!(detection.has_correction),
            other => panic!("expected New, got {other:?}"),
        }
    }

    #[test]
    fn identical_incoming_is_unchanged() {
        let prior = stored("A", "本文です。");
        let result = classify(Some(&prior), &incoming("A", "本文です。"), &vocab());
        assert_eq!(result, Classification::Unchanged);
        // Idempotent under repetition.
        let again = classify(Some(&prior), &incoming("A", "本文です。"), &vocab());
        assert_eq!(again, Classification::Unchanged);
    }

    #[test]
    fn empty_prior_and_incoming_descriptions_are_unchanged() {
        let prior = stored("A", "");
        let result = classify(Some(&prior), &incoming("A", ""), &vocab());
        assert_eq!(result, Classification::Unchanged);
    }

    #[test]
    fn title_change_wins_over_description_change() {
        let prior = stored("旧タイトル", "旧本文です。");
        let result = classify(Some(&prior), &incoming("新タイトル", "新本文です。"), &vocab());
        match result {
            Classification::TitleChanged { old_title, .. } => {
                assert_eq!(old_title, "旧タイトル");
            }
            other => panic!("expected TitleChanged, got {other:?}"),
        }
    }

    #[test]
    fn title_change_recomputes_correction_flags() {
        let prior = stored("旧タイトル", "本文です。");
        let result = classify(
            Some(&prior),
            &incoming("新タイトル", "本文です。※当初の記述を訂正しました"),
            &vocab(),
        );
        match result {
            Classification::TitleChanged { detection, .. } => {
                assert!(detection.has_correction);
            }
            other => panic!("expected TitleChanged, got {other:?}"),
        }
    }

    #[test]
    fn description_edit_is_description_changed() {
        let prior = stored("A", "旧本文です。");
        let result = classify(Some(&prior), &incoming("A", "新本文です。"), &vocab());
        match result {
            Classification::DescriptionChanged {
                old_description,
                added,
                correction,
                ..
            } => {
                assert_eq!(old_description.as_deref(), Some("旧本文です。"));
                assert!(!added);
                assert_eq!(correction, CorrectionTransition::Unchanged);
            }
            other => panic!("expected DescriptionChanged, got {other:?}"),
        }
    }

    #[test]
    fn description_appearing_is_an_addition() {
        let prior = stored("A", "");
        let result = classify(Some(&prior), &incoming("A", "本文が追加されました。"), &vocab());
        match result {
            Classification::DescriptionChanged { added, .. } => assert!(added),
            other => panic!("expected DescriptionChanged, got {other:?}"),
        }
    }

    #[test]
    fn correction_appearing_is_flagged_added() {
        let prior = stored("A", "normal text");
        let result = classify(
            Some(&prior),
            &incoming("A", "normal text※当初Xと掲載しましたが誤りでした。失礼しました。"),
            &vocab(),
        );
        match result {
            Classification::DescriptionChanged {
                detection,
                correction,
                ..
            } => {
                assert!(detection.has_correction);
                assert_eq!(correction, CorrectionTransition::Added);
            }
            other => panic!("expected DescriptionChanged, got {other:?}"),
        }
    }

    #[test]
    fn correction_disappearing_is_flagged_removed() {
        let prior = stored("A", "本文※誤りがありました。失礼しました。");
        assert!(prior.has_correction);
        let result = classify(Some(&prior), &incoming("A", "plain replacement text"), &vocab());
        match result {
            Classification::DescriptionChanged {
                detection,
                correction,
                ..
            } => {
                assert!(!detection.has_correction);
                assert_eq!(correction, CorrectionTransition::Removed);
            }
            other => panic!("expected DescriptionChanged, got {other:?}"),
        }
    }
}
