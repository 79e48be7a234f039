//! Copyright-safe excerpting of correction notices.
//!
//! Reports must never republish a full article body, only the sentences that
//! carry the correction itself. Lengths and offsets are measured in chars, not
//! bytes; the inputs are Japanese text.

/// The note glyph that introduces a correction remark.
pub(crate) const NOTE_MARKER: &str = "※";
/// The apology phrase that closes an NHK correction. Sentences carrying it are
/// the legally operative statement and are never truncated.
pub(crate) const APOLOGY_PHRASE: &str = "失礼しました";

const ELLIPSIS: &str = "...";
const CHARS_BEFORE_MARKER: usize = 30;
const CHARS_AFTER_MARKER: usize = 50;

/// Extracts the correction-relevant sentences from `text`, bounded to roughly
/// `max_length` chars.
///
/// Sentences containing the note glyph or the apology phrase are retained and
/// joined with newlines. If the joined result exceeds `max_length`, apology
/// sentences pass through whole while marker-only sentences are windowed
/// around the glyph. Text with no markers at all falls back to a plain
/// `max_length`-char prefix. Empty input yields an empty string.
pub fn extract_correction_excerpt(text: &str, max_length: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let correction_sentences: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|s| s.contains(NOTE_MARKER) || s.contains(APOLOGY_PHRASE))
        .collect();

    if correction_sentences.is_empty() {
        return clip_chars(text, max_length);
    }

    let joined = correction_sentences.join("\n");
    if char_len(&joined) <= max_length {
        return joined;
    }

    // Over budget: keep apology sentences whole, window the rest.
    let shortened: Vec<String> = correction_sentences
        .iter()
        .filter_map(|sentence| {
            if sentence.contains(APOLOGY_PHRASE) {
                Some((*sentence).to_string())
            } else if sentence.contains(NOTE_MARKER) {
                Some(window_around_marker(sentence))
            } else {
                None
            }
        })
        .collect();

    shortened.join("\n")
}

/// Splits on the Japanese full stop (kept attached to its sentence) and on
/// literal newlines, trimming each piece.
fn split_sentences(text: &str) -> Vec<&str> {
    text.split('\n')
        .flat_map(|line| line.split_inclusive('。'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Keeps a fixed window of chars around the first note glyph, marking clipped
/// sides with an ellipsis.
fn window_around_marker(sentence: &str) -> String {
    let chars: Vec<char> = sentence.chars().collect();
    let marker_char = NOTE_MARKER.chars().next().unwrap_or('※');
    let idx = chars
        .iter()
        .position(|&c| c == marker_char)
        .unwrap_or_default();

    let start = idx.saturating_sub(CHARS_BEFORE_MARKER);
    let end = (idx + CHARS_AFTER_MARKER).min(chars.len());

    let mut excerpt: String = chars[start..end].iter().collect();
    if start > 0 {
        excerpt = format!("{ELLIPSIS}{excerpt}");
    }
    if end < chars.len() {
        excerpt.push_str(ELLIPSIS);
    }
    excerpt
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `max_length` chars of `s`, with an ellipsis when clipped.
fn clip_chars(s: &str, max_length: usize) -> String {
    if char_len(s) <= max_length {
        return s.to_string();
    }
    let clipped: String = s.chars().take(max_length).collect();
    format!("{clipped}{ELLIPSIS}")
}
