//! Plain-text change report, one file per run.
//!
//! Consumes the change log plus the diff renderer and the correction excerpt
//! extractor. Diff markup uses wdiff-style markers: deleted runs as
//! `[-text-]`, inserted runs as `{+text+}`.

use std::path::{Path, PathBuf};

use chrono::{Duration, Local, Utc};

use crate::config::Config;
use crate::correction::{extract_correction_excerpt, CorrectionVocabulary};
use crate::db::Repository;
use crate::diff::{render_diff, DiffSpan, DiffTag};
use crate::error::Result;
use crate::models::{ChangeEvent, ChangeType};

/// Excerpt budget for quoted correction notices.
const EXCERPT_CHARS: usize = 200;

/// Writes the report for the configured look-back window. Returns `None`
/// when there were no changes to report.
pub async fn write_change_report(
    repo: &Repository,
    config: &Config,
    vocab: &CorrectionVocabulary,
) -> Result<Option<PathBuf>> {
    let since = Utc::now() - Duration::hours(config.report.hours);
    let changes = repo.recent_changes(since, None).await?;
    if changes.is_empty() {
        return Ok(None);
    }

    let mut body = String::new();
    render_header(&mut body, &changes, config.report.hours);
    for change in &changes {
        let title = repo
            .get_article(&change.source, &change.link)
            .await?
            .map(|a| a.title)
            .unwrap_or_default();
        render_change(&mut body, change, &title, config, vocab);
    }

    let dir = Path::new(&config.report.output_dir);
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "changes_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, body)?;

    tracing::info!(path = %path.display(), count = changes.len(), "change report written");
    Ok(Some(path))
}

fn render_header(out: &mut String, changes: &[ChangeEvent], hours: i64) {
    let count_of = |t: ChangeType| changes.iter().filter(|c| c.change_type == t).count();
    let desc_count =
        count_of(ChangeType::DescriptionChanged) + count_of(ChangeType::DescriptionAdded);
    let correction_count = changes.iter().filter(|c| c.has_correction).count();

    out.push_str("NHKニュース変更履歴\n");
    out.push_str(&format!(
        "レポート日時: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("対象期間: 過去{hours}時間\n\n"));
    out.push_str(&format!("総変更数: {}\n", changes.len()));
    out.push_str(&format!("新規記事: {}\n", count_of(ChangeType::New)));
    out.push_str(&format!("タイトル変更: {}\n", count_of(ChangeType::TitleChanged)));
    out.push_str(&format!("説明文変更: {desc_count}\n"));
    out.push_str(&format!("訂正記事: {correction_count}\n"));
    out.push_str(&format!(
        "訂正削除: {}\n",
        count_of(ChangeType::CorrectionRemoved)
    ));
}

fn render_change(
    out: &mut String,
    change: &ChangeEvent,
    title: &str,
    config: &Config,
    vocab: &CorrectionVocabulary,
) {
    let label = match change.change_type {
        ChangeType::New => "新規",
        ChangeType::TitleChanged => "タイトル変更",
        ChangeType::DescriptionChanged => "説明文変更",
        ChangeType::DescriptionAdded => "説明文追記",
        ChangeType::CorrectionRemoved => "訂正削除",
    };

    out.push_str(&format!(
        "\n--------------------------------------------------\n[{label}] {}  {}\n",
        change.source,
        change.detected_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    ));
    if !title.is_empty() {
        out.push_str(&format!("記事: {title}\n"));
    }
    out.push_str(&format!("URL: {}\n", resolve_link(config, change)));
    if change.has_correction {
        out.push_str(&format!(
            "おことわり [{}]\n",
            change.correction_keywords.join(",")
        ));
    }
    if let Some(summary) = &change.change_summary {
        out.push_str(&format!("注記: {summary}\n"));
    }

    match change.change_type {
        ChangeType::New => {
            if let Some(new_title) = &change.new_value {
                out.push_str(&format!("タイトル: {new_title}\n"));
            }
        }
        ChangeType::TitleChanged => {
            out.push_str(&format!(
                "旧: {}\n新: {}\n",
                change.old_value.as_deref().unwrap_or(""),
                change.new_value.as_deref().unwrap_or("")
            ));
        }
        ChangeType::DescriptionChanged
        | ChangeType::DescriptionAdded
        | ChangeType::CorrectionRemoved => {
            let old = change.old_value.as_deref().unwrap_or("");
            let new = change.new_value.as_deref().unwrap_or("");
            match render_diff(old, new, title, vocab) {
                Some((old_spans, new_spans)) => {
                    out.push_str(&format!("旧: {}\n", format_spans(&old_spans)));
                    out.push_str(&format!("新: {}\n", format_spans(&new_spans)));
                }
                None => out.push_str("(表示可能な差分はありません)\n"),
            }
            if change.has_correction {
                out.push_str(&format!(
                    "【引用】おことわり部分:\n{}\n",
                    extract_correction_excerpt(new, EXCERPT_CHARS)
                ));
            }
        }
    }
}

fn resolve_link(config: &Config, change: &ChangeEvent) -> String {
    config
        .sources
        .iter()
        .find(|s| s.name == change.source)
        .map(|s| s.full_url(&change.link))
        .unwrap_or_else(|| change.link.clone())
}

fn format_spans(spans: &[DiffSpan]) -> String {
    spans
        .iter()
        .map(|span| match span.tag {
            DiffTag::Equal => span.text.clone(),
            DiffTag::Removed => format!("[-{}-]", span.text),
            DiffTag::Inserted => format!("{{+{}+}}", span.text),
        })
        .collect()
}
