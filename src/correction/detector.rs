//! Correction-notice detection.
//!
//! NHK marks corrections inside the article body itself: a `※` glyph followed
//! by prose like 「当初◯◯と掲載しましたが誤りでした。失礼しました。」. Detection is
//! deliberately a plain substring test against a fixed keyword vocabulary, not
//! a semantic classifier.

/// Result of running the detector over one block of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub has_correction: bool,
    /// Matched vocabulary entries, in vocabulary order (not text order). One
    /// entry per keyword regardless of how often it occurs.
    pub keywords: Vec<String>,
}

impl Detection {
    pub fn none() -> Detection {
        Detection {
            has_correction: false,
            keywords: Vec::new(),
        }
    }
}

/// The marker-keyword vocabulary, injectable so the taxonomy can be extended
/// or swapped in tests without touching classifier logic.
#[derive(Debug, Clone)]
pub struct CorrectionVocabulary {
    keywords: Vec<String>,
}

impl Default for CorrectionVocabulary {
    fn default() -> Self {
        // The phrasing NHK uses in its own corrections, plus the note glyph.
        CorrectionVocabulary::new(["当初", "掲載", "失礼しました", "※"])
    }
}

impl CorrectionVocabulary {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CorrectionVocabulary {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Tests each vocabulary keyword for containment in `text`.
    ///
    /// Pure and deterministic; empty text never matches.
    pub fn detect(&self, text: &str) -> Detection {
        if text.is_empty() {
            return Detection::none();
        }

        let keywords: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .cloned()
            .collect();

        Detection {
            has_correction: !keywords.is_empty(),
            keywords,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_correction() {
        let vocab = CorrectionVocabulary::default();
        let detection = vocab.detect("");
        assert!(!detection.has_correction);
        assert!(detection.keywords.is_empty());
    }

    #[test]
    fn plain_news_text_has_no_correction() {
        let vocab = CorrectionVocabulary::default();
        let detection = vocab.detect("普通のニュースです");
        assert!(!detection.has_correction);
        assert!(detection.keywords.is_empty());
    }

    #[test]
    fn full_correction_notice_matches_all_keywords() {
        let vocab = CorrectionVocabulary::default();
        let detection = vocab.detect("※当初、Xと掲載しましたが誤りでした。失礼しました。");
        assert!(detection.has_correction);
        assert_eq!(detection.keywords, vec!["当初", "掲載", "失礼しました", "※"]);
    }

    #[test]
    fn keywords_follow_vocabulary_order_not_text_order() {
        let vocab = CorrectionVocabulary::default();
        // Note glyph appears first in the text but last in the vocabulary.
        let detection = vocab.detect("※この記事は当初の内容から変わりました");
        assert_eq!(detection.keywords, vec!["当初", "※"]);
    }

    #[test]
    fn repeated_keyword_is_reported_once() {
        let vocab = CorrectionVocabulary::default();
        let detection = vocab.detect("※注記です。※再度の注記です。");
        assert_eq!(detection.keywords, vec!["※"]);
    }

    #[test]
    fn custom_vocabulary_is_honored() {
        let vocab = CorrectionVocabulary::new(["訂正", "お詫び"]);
        let detection = vocab.detect("お詫びと訂正があります");
        assert_eq!(detection.keywords, vec!["訂正", "お詫び"]);
        assert!(vocab.detect("※だけでは一致しない").keywords.is_empty());
    }
}
