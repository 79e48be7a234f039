//! Desktop notification forwarding.
//!
//! Correction signals surfaced by the store are forwarded to the macOS
//! notification center via `osascript`. On other platforms, or when the
//! command fails, the notification degrades to a log line; a broken notifier
//! must never affect the run.

use std::process::Command;

use crate::db::CorrectionSignal;

pub struct DesktopNotifier {
    enabled: bool,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            enabled: cfg!(target_os = "macos"),
        }
    }

    pub fn send(&self, title: &str, message: &str) {
        if !self.enabled {
            tracing::info!(title, message, "notification");
            return;
        }

        let script = format!(
            r#"display notification "{}" with title "{}""#,
            escape(message),
            escape(title)
        );
        match Command::new("osascript").arg("-e").arg(&script).output() {
            Ok(output) if output.status.success() => {
                tracing::debug!(title, "notification sent");
            }
            Ok(output) => {
                tracing::debug!(
                    title,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "notification command failed"
                );
            }
            Err(e) => {
                tracing::debug!(title, error = %e, "notification unavailable");
            }
        }
    }

    /// Forwards per-source correction signals.
    pub fn notify_corrections(
        &self,
        source: &str,
        added: &[CorrectionSignal],
        removed: &[CorrectionSignal],
    ) {
        for signal in added {
            self.send(
                "NHK追跡システム - 訂正追加",
                &format!("{source}: {} [{}]", signal.title, signal.keywords.join(",")),
            );
        }
        for signal in removed {
            self.send(
                "NHK追跡システム - 訂正削除",
                &format!("{source}: {} (以前のキーワード: {})", signal.title, signal.keywords.join(",")),
            );
        }
    }

    /// End-of-run summary; silent when nothing changed.
    pub fn notify_completion(
        &self,
        new_count: usize,
        updated_count: usize,
        total_count: usize,
        failed_sources: &[String],
    ) {
        if new_count > 0 || updated_count > 0 {
            let mut parts = Vec::new();
            if new_count > 0 {
                parts.push(format!("新規{new_count}件"));
            }
            if updated_count > 0 {
                parts.push(format!("更新{updated_count}件"));
            }
            self.send(
                "NHK追跡システム",
                &format!("{}を検出（総{total_count}件）", parts.join(", ")),
            );
        }

        if !failed_sources.is_empty() {
            self.send(
                "NHK追跡システム - エラー",
                &format!("取得失敗: {}", failed_sources.join(", ")),
            );
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
