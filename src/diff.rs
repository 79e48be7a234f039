//! Character-level diff rendering for change reports.
//!
//! Produces a marked-up old/new pair for one description change. Three
//! NHK-specific behaviors live here on top of the plain LCS edit script:
//! the redundant trailing title some feeds append is stripped before diffing,
//! diffs that survive only as whitespace noise collapse to "no change", and
//! text without a correction notice is windowed down to the region around the
//! first edit so a report never republishes a full article body.

use crate::correction::{extract_correction_excerpt, CorrectionVocabulary};

/// How a span reads across the two sides of the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffTag {
    Equal,
    Removed,
    Inserted,
}

/// One contiguous run of same-tagged text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub tag: DiffTag,
    pub text: String,
}

impl DiffSpan {
    fn new(tag: DiffTag, text: String) -> DiffSpan {
        DiffSpan { tag, text }
    }
}

/// Chars of leading context kept before the first edit when windowing.
const WINDOW_CONTEXT_CHARS: usize = 200;
/// Hard per-side cap on windowed output, in chars.
const WINDOW_SIDE_CAP: usize = 600;
/// Minimum trailing-window char overlap for fuzzy title-suffix stripping.
const TITLE_OVERLAP_THRESHOLD: f64 = 0.7;
/// Excerpt budget applied to correction-marked text before diffing.
const CORRECTION_EXCERPT_CHARS: usize = 200;
/// DP size guard; beyond this the middle is rendered as a whole replace.
const MAX_DP_CELLS: usize = 4_000_000;

const ELLIPSIS: &str = "...";

/// Renders a character-level diff of one description change.
///
/// Returns `None` when there is nothing real to show: both sides empty, both
/// sides identical once the trailing title artifact is stripped, or every
/// difference is whitespace-only. Text carrying correction markers is reduced
/// to its correction excerpt (both sides) and shown unwindowed; anything else
/// is windowed around the first edit for copyright safety.
pub fn render_diff(
    old_text: &str,
    new_text: &str,
    title_hint: &str,
    vocab: &CorrectionVocabulary,
) -> Option<(Vec<DiffSpan>, Vec<DiffSpan>)> {
    let old = strip_title_suffix(old_text, title_hint);
    let new = strip_title_suffix(new_text, title_hint);

    if old.is_empty() && new.is_empty() {
        return None;
    }
    if old == new {
        return None;
    }

    let has_markers =
        vocab.detect(&old).has_correction || vocab.detect(&new).has_correction;

    let (old, new) = if has_markers {
        (
            extract_correction_excerpt(&old, CORRECTION_EXCERPT_CHARS),
            extract_correction_excerpt(&new, CORRECTION_EXCERPT_CHARS),
        )
    } else {
        (old, new)
    };
    if old == new {
        return None;
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let (old_spans, new_spans) = diff_spans(&old_chars, &new_chars);

    if is_whitespace_only_change(&old_spans) && is_whitespace_only_change(&new_spans) {
        return None;
    }

    if has_markers {
        return Some((old_spans, new_spans));
    }

    let first_edit = first_edit_offset(&new_spans).min(first_edit_offset(&old_spans));
    let start = first_edit.saturating_sub(WINDOW_CONTEXT_CHARS);
    Some((
        window_spans(old_spans, start, WINDOW_SIDE_CAP),
        window_spans(new_spans, start, WINDOW_SIDE_CAP),
    ))
}

/// Strips a redundant trailing occurrence of the article title.
///
/// Exact suffix match strips outright; otherwise the trailing window of the
/// title's length is compared by multiset char overlap and stripped past the
/// threshold. Whitespace left dangling at the cut is trimmed.
fn strip_title_suffix(text: &str, title_hint: &str) -> String {
    if title_hint.is_empty() {
        return text.to_string();
    }

    if let Some(stripped) = text.strip_suffix(title_hint) {
        return stripped.trim_end().to_string();
    }

    let text_chars: Vec<char> = text.chars().collect();
    let title_chars: Vec<char> = title_hint.chars().collect();
    if title_chars.is_empty() || text_chars.len() < title_chars.len() {
        return text.to_string();
    }

    let window = &text_chars[text_chars.len() - title_chars.len()..];
    if char_overlap(window, &title_chars) > TITLE_OVERLAP_THRESHOLD {
        let kept: String = text_chars[..text_chars.len() - title_chars.len()]
            .iter()
            .collect();
        return kept.trim_end().to_string();
    }

    text.to_string()
}

/// Multiset overlap: shared char count over title length.
fn char_overlap(window: &[char], title: &[char]) -> f64 {
    let mut counts: std::collections::HashMap<char, usize> = std::collections::HashMap::new();
    for &c in title {
        *counts.entry(c).or_insert(0) += 1;
    }
    let mut shared = 0usize;
    for &c in window {
        if let Some(n) = counts.get_mut(&c) {
            if *n > 0 {
                *n -= 1;
                shared += 1;
            }
        }
    }
    shared as f64 / title.len() as f64
}

/// LCS-based character alignment. Equal runs appear on both sides; runs only
/// in `old` come back tagged `Removed`, runs only in `new` tagged `Inserted`.
fn diff_spans(old: &[char], new: &[char]) -> (Vec<DiffSpan>, Vec<DiffSpan>) {
    // Trim the common prefix and suffix first; edits to news copy are
    // typically a short run in the middle of an otherwise identical text.
    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mid_old = &old[prefix..old.len() - suffix];
    let mid_new = &new[prefix..new.len() - suffix];

    let mut old_out = SpanBuilder::default();
    let mut new_out = SpanBuilder::default();

    for &c in &old[..prefix] {
        old_out.push(DiffTag::Equal, c);
        new_out.push(DiffTag::Equal, c);
    }

    if mid_old.len().saturating_mul(mid_new.len()) > MAX_DP_CELLS {
        // Too large to align precisely; render the middle as a replace.
        for &c in mid_old {
            old_out.push(DiffTag::Removed, c);
        }
        for &c in mid_new {
            new_out.push(DiffTag::Inserted, c);
        }
    } else {
        for step in lcs_walk(mid_old, mid_new) {
            match step {
                EditStep::Equal(c) => {
                    old_out.push(DiffTag::Equal, c);
                    new_out.push(DiffTag::Equal, c);
                }
                EditStep::Removed(c) => old_out.push(DiffTag::Removed, c),
                EditStep::Inserted(c) => new_out.push(DiffTag::Inserted, c),
            }
        }
    }

    for &c in &old[old.len() - suffix..] {
        old_out.push(DiffTag::Equal, c);
        new_out.push(DiffTag::Equal, c);
    }

    (old_out.finish(), new_out.finish())
}

enum EditStep {
    Equal(char),
    Removed(char),
    Inserted(char),
}

/// Classic LCS table + backtrack over the trimmed middle.
fn lcs_walk(old: &[char], new: &[char]) -> Vec<EditStep> {
    let m = old.len();
    let n = new.len();
    let mut table = vec![0u32; (m + 1) * (n + 1)];
    let idx = |i: usize, j: usize| i * (n + 1) + j;

    for i in 1..=m {
        for j in 1..=n {
            table[idx(i, j)] = if old[i - 1] == new[j - 1] {
                table[idx(i - 1, j - 1)] + 1
            } else {
                table[idx(i - 1, j)].max(table[idx(i, j - 1)])
            };
        }
    }

    let mut steps = Vec::with_capacity(m + n);
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            steps.push(EditStep::Equal(old[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[idx(i, j - 1)] >= table[idx(i - 1, j)]) {
            steps.push(EditStep::Inserted(new[j - 1]));
            j -= 1;
        } else {
            steps.push(EditStep::Removed(old[i - 1]));
            i -= 1;
        }
    }
    steps.reverse();
    steps
}

/// Accumulates chars into runs, merging consecutive same-tag pushes.
#[derive(Default)]
struct SpanBuilder {
    spans: Vec<DiffSpan>,
}

impl SpanBuilder {
    fn push(&mut self, tag: DiffTag, c: char) {
        match self.spans.last_mut() {
            Some(last) if last.tag == tag => last.text.push(c),
            _ => self.spans.push(DiffSpan::new(tag, c.to_string())),
        }
    }

    fn finish(self) -> Vec<DiffSpan> {
        self.spans
    }
}

/// True when every non-equal span is whitespace.
fn is_whitespace_only_change(spans: &[DiffSpan]) -> bool {
    spans
        .iter()
        .filter(|s| s.tag != DiffTag::Equal)
        .all(|s| s.text.trim().is_empty())
}

/// Char offset of the first non-equal span, or the total length if none.
fn first_edit_offset(spans: &[DiffSpan]) -> usize {
    let mut offset = 0;
    for span in spans {
        if span.tag != DiffTag::Equal {
            return offset;
        }
        offset += span.text.chars().count();
    }
    offset
}

/// Re-slices a span list to the char range `[start, start + cap)`, marking
/// clipped boundaries with ellipsis context spans.
fn window_spans(spans: Vec<DiffSpan>, start: usize, cap: usize) -> Vec<DiffSpan> {
    let total: usize = spans.iter().map(|s| s.text.chars().count()).sum();
    if start == 0 && total <= cap {
        return spans;
    }

    let mut out = Vec::new();
    if start > 0 {
        out.push(DiffSpan::new(DiffTag::Equal, ELLIPSIS.to_string()));
    }

    let mut pos = 0usize;
    let mut taken = 0usize;
    let end = start + cap;
    for span in spans {
        let len = span.text.chars().count();
        let span_start = pos;
        let span_end = pos + len;
        pos = span_end;

        if span_end <= start {
            continue;
        }
        if span_start >= end {
            break;
        }

        let take_from = start.max(span_start) - span_start;
        let take_to = end.min(span_end) - span_start;
        let text: String = span
            .text
            .chars()
            .skip(take_from)
            .take(take_to - take_from)
            .collect();
        taken += take_to - take_from;
        out.push(DiffSpan::new(span.tag, text));
    }

    if start + taken < total {
        out.push(DiffSpan::new(DiffTag::Equal, ELLIPSIS.to_string()));
    }
    out
}
