use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::classify::{classify, Classification, CorrectionTransition};
use crate::correction::CorrectionVocabulary;
use crate::error::Result;
use crate::models::{Article, ChangeEvent, ChangeType, IncomingArticle};

use super::schema::SCHEMA;

/// Fixed annotation attached to every synthesized correction-removed event.
const CORRECTION_REMOVED_NOTE: &str = "訂正が削除されました";

/// Aggregated result of one classification batch for one source.
#[derive(Debug, Default)]
pub struct UpsertStats {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Articles whose correction notice appeared this run (including new
    /// articles that arrived already carrying one). Notification-worthy.
    pub correction_added: Vec<CorrectionSignal>,
    /// Articles whose correction notice disappeared this run.
    pub correction_removed: Vec<CorrectionSignal>,
    /// Per-article failures, as `(link, error)`. A failing article never
    /// aborts the rest of the batch.
    pub failed: Vec<(String, String)>,
}

impl UpsertStats {
    pub fn absorb(&mut self, other: UpsertStats) {
        self.new += other.new;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.correction_added.extend(other.correction_added);
        self.correction_removed.extend(other.correction_removed);
        self.failed.extend(other.failed);
    }
}

/// What the batch driver forwards to the notifier.
#[derive(Debug, Clone)]
pub struct CorrectionSignal {
    pub title: String,
    pub keywords: Vec<String>,
}

/// Full-state dump for archival export.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub articles: Vec<Article>,
    pub changes: Vec<ChangeEvent>,
    pub exported_at: DateTime<Utc>,
}

/// How many change rows an export carries, newest first.
const EXPORT_CHANGE_LIMIT: usize = 1000;

pub struct Repository {
    conn: Connection,
    vocab: CorrectionVocabulary,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_vocabulary(db_path, CorrectionVocabulary::default()).await
    }

    pub async fn with_vocabulary(db_path: &str, vocab: CorrectionVocabulary) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            // Set busy timeout to 5 seconds to handle concurrent access
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            // Enable WAL mode for better concurrency
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, vocab })
    }

    /// Classifies and persists one batch of fetched articles for `source`.
    ///
    /// Each article's lookup + classification + writes run in a single
    /// transaction, so a crash can never record half a transition. Articles
    /// are applied one at a time in input order; a failure is recorded in
    /// `failed` and processing continues with the rest of the batch.
    pub async fn upsert_and_classify(
        &self,
        source: &str,
        articles: Vec<IncomingArticle>,
    ) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();

        for article in articles {
            let link = article.link.clone();
            let source_owned = source.to_string();
            let vocab = self.vocab.clone();

            let applied = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let outcome = apply_article(&tx, &source_owned, &article, &vocab)?;
                    tx.commit()?;
                    Ok(outcome)
                })
                .await;

            match applied {
                Ok(outcome) => record_outcome(&mut stats, source, outcome),
                Err(e) => {
                    tracing::warn!(source, link = %link, error = %e, "failed to apply article");
                    stats.failed.push((link, e.to_string()));
                }
            }
        }

        tracing::info!(
            source,
            new = stats.new,
            updated = stats.updated,
            unchanged = stats.unchanged,
            failed = stats.failed.len(),
            "batch saved"
        );
        Ok(stats)
    }

    /// Looks up the stored snapshot for one identity key.
    pub async fn get_article(&self, source: &str, link: &str) -> Result<Option<Article>> {
        let source = source.to_string();
        let link = link.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source, link, title, description, pub_date, first_seen, last_seen, has_correction, correction_keywords
                     FROM articles WHERE source = ?1 AND link = ?2",
                )?;
                let article = stmt
                    .query_row(params![source, link], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Change events since `since`, newest first, optionally for one source.
    pub async fn recent_changes(
        &self,
        since: DateTime<Utc>,
        source: Option<&str>,
    ) -> Result<Vec<ChangeEvent>> {
        let cutoff = rfc3339(since);
        let source = source.map(|s| s.to_string());
        let changes = self
            .conn
            .call(move |conn| {
                let sql_base = "SELECT id, source, link, change_type, old_value, new_value, detected_at, change_summary, has_correction, correction_keywords
                     FROM changes WHERE detected_at >= ?1";
                let changes = match source {
                    Some(source) => {
                        let mut stmt = conn.prepare(&format!(
                            "{sql_base} AND source = ?2 ORDER BY detected_at DESC, id DESC"
                        ))?;
                        let rows = stmt
                            .query_map(params![cutoff, source], change_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows.into_iter().flatten().collect::<Vec<_>>()
                    }
                    None => {
                        let mut stmt = conn
                            .prepare(&format!("{sql_base} ORDER BY detected_at DESC, id DESC"))?;
                        let rows = stmt
                            .query_map(params![cutoff], change_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows.into_iter().flatten().collect::<Vec<_>>()
                    }
                };
                Ok(changes)
            })
            .await?;
        Ok(changes)
    }

    /// Full-state dump: every article plus the most recent change events.
    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        let (articles, changes) = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source, link, title, description, pub_date, first_seen, last_seen, has_correction, correction_keywords
                     FROM articles ORDER BY first_seen DESC, id DESC",
                )?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare(
                    "SELECT id, source, link, change_type, old_value, new_value, detected_at, change_summary, has_correction, correction_keywords
                     FROM changes ORDER BY detected_at DESC, id DESC LIMIT ?1",
                )?;
                let changes = stmt
                    .query_map(params![EXPORT_CHANGE_LIMIT], change_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let changes = changes.into_iter().flatten().collect::<Vec<_>>();

                Ok((articles, changes))
            })
            .await?;

        Ok(Snapshot {
            articles,
            changes,
            exported_at: Utc::now(),
        })
    }

    /// Total number of tracked articles.
    pub async fn article_count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }
}

/// Outcome of applying one article, reported back to the batch loop.
#[derive(Debug)]
enum ApplyOutcome {
    New {
        correction: Option<CorrectionSignal>,
    },
    TitleChanged,
    DescriptionChanged {
        correction_added: Option<CorrectionSignal>,
        correction_removed: Option<CorrectionSignal>,
    },
    Unchanged,
}

fn record_outcome(stats: &mut UpsertStats, source: &str, outcome: ApplyOutcome) {
    match outcome {
        ApplyOutcome::New { correction } => {
            stats.new += 1;
            if let Some(signal) = correction {
                tracing::info!(source, title = %signal.title, keywords = ?signal.keywords, "new article carries a correction notice");
                stats.correction_added.push(signal);
            }
        }
        ApplyOutcome::TitleChanged => stats.updated += 1,
        ApplyOutcome::DescriptionChanged {
            correction_added,
            correction_removed,
        } => {
            stats.updated += 1;
            if let Some(signal) = correction_added {
                tracing::info!(source, title = %signal.title, keywords = ?signal.keywords, "correction notice added");
                stats.correction_added.push(signal);
            }
            if let Some(signal) = correction_removed {
                tracing::warn!(source, title = %signal.title, keywords = ?signal.keywords, "correction notice removed");
                stats.correction_removed.push(signal);
            }
        }
        ApplyOutcome::Unchanged => stats.unchanged += 1,
    }
}

/// Looks up the prior snapshot, classifies, and applies the transition inside
/// the caller's transaction.
fn apply_article(
    tx: &Transaction<'_>,
    source: &str,
    incoming: &IncomingArticle,
    vocab: &CorrectionVocabulary,
) -> std::result::Result<ApplyOutcome, rusqlite::Error> {
    let prior = tx
        .query_row(
            "SELECT id, source, link, title, description, pub_date, first_seen, last_seen, has_correction, correction_keywords
             FROM articles WHERE source = ?1 AND link = ?2",
            params![source, incoming.link],
            article_from_row,
        )
        .optional()?;

    let now = rfc3339(Utc::now());

    let outcome = match classify(prior.as_ref(), incoming, vocab) {
        Classification::New { detection } => {
            tx.execute(
                "INSERT INTO articles (source, link, title, description, pub_date, first_seen, last_seen, has_correction, correction_keywords)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?8)",
                params![
                    source,
                    incoming.link,
                    incoming.title,
                    incoming.description,
                    incoming.pub_date,
                    now,
                    detection.has_correction,
                    join_keywords(&detection.keywords),
                ],
            )?;
            tx.execute(
                "INSERT INTO changes (source, link, change_type, new_value, detected_at, has_correction, correction_keywords)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    source,
                    incoming.link,
                    ChangeType::New.as_str(),
                    incoming.title,
                    now,
                    detection.has_correction,
                    join_keywords(&detection.keywords),
                ],
            )?;
            let correction = detection.has_correction.then(|| CorrectionSignal {
                title: incoming.title.clone(),
                keywords: detection.keywords,
            });
            ApplyOutcome::New { correction }
        }

        Classification::TitleChanged {
            old_title,
            detection,
        } => {
            // The stored description is deliberately left alone: if it changed
            // in the same fetch, the next cycle picks that up as its own
            // description event. Correction flags still track the incoming
            // description.
            tx.execute(
                "UPDATE articles SET title = ?1, last_seen = ?2, has_correction = ?3, correction_keywords = ?4
                 WHERE source = ?5 AND link = ?6",
                params![
                    incoming.title,
                    now,
                    detection.has_correction,
                    join_keywords(&detection.keywords),
                    source,
                    incoming.link,
                ],
            )?;
            tx.execute(
                "INSERT INTO changes (source, link, change_type, old_value, new_value, detected_at, has_correction, correction_keywords)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    source,
                    incoming.link,
                    ChangeType::TitleChanged.as_str(),
                    old_title,
                    incoming.title,
                    now,
                    detection.has_correction,
                    join_keywords(&detection.keywords),
                ],
            )?;
            ApplyOutcome::TitleChanged
        }

        Classification::DescriptionChanged {
            old_description,
            added,
            detection,
            correction,
        } => {
            tx.execute(
                "UPDATE articles SET description = ?1, last_seen = ?2, has_correction = ?3, correction_keywords = ?4
                 WHERE source = ?5 AND link = ?6",
                params![
                    incoming.description,
                    now,
                    detection.has_correction,
                    join_keywords(&detection.keywords),
                    source,
                    incoming.link,
                ],
            )?;
            let change_type = if added {
                ChangeType::DescriptionAdded
            } else {
                ChangeType::DescriptionChanged
            };
            tx.execute(
                "INSERT INTO changes (source, link, change_type, old_value, new_value, detected_at, has_correction, correction_keywords)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    source,
                    incoming.link,
                    change_type.as_str(),
                    old_description,
                    incoming.description,
                    now,
                    detection.has_correction,
                    join_keywords(&detection.keywords),
                ],
            )?;

            let mut correction_added = None;
            let mut correction_removed = None;
            match correction {
                CorrectionTransition::Added => {
                    correction_added = Some(CorrectionSignal {
                        title: incoming.title.clone(),
                        keywords: detection.keywords.clone(),
                    });
                }
                CorrectionTransition::Removed => {
                    // The single most important event: a correction notice
                    // silently disappeared. Recorded in addition to the
                    // description change, with the same before/after text.
                    tx.execute(
                        "INSERT INTO changes (source, link, change_type, old_value, new_value, detected_at, change_summary, has_correction, correction_keywords)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                        params![
                            source,
                            incoming.link,
                            ChangeType::CorrectionRemoved.as_str(),
                            old_description,
                            incoming.description,
                            now,
                            CORRECTION_REMOVED_NOTE,
                            false,
                        ],
                    )?;
                    correction_removed = Some(CorrectionSignal {
                        title: incoming.title.clone(),
                        // Surface what disappeared, not the (empty) new state.
                        keywords: prior
                            .as_ref()
                            .map(|p| p.correction_keywords.clone())
                            .unwrap_or_default(),
                    });
                }
                CorrectionTransition::Unchanged => {}
            }
            ApplyOutcome::DescriptionChanged {
                correction_added,
                correction_removed,
            }
        }

        Classification::Unchanged => {
            tx.execute(
                "UPDATE articles SET last_seen = ?1 WHERE source = ?2 AND link = ?3",
                params![now, source, incoming.link],
            )?;
            ApplyOutcome::Unchanged
        }
    };

    Ok(outcome)
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    // Fixed-width fraction keeps lexicographic order aligned with time order.
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn join_keywords(keywords: &[String]) -> Option<String> {
    if keywords.is_empty() {
        None
    } else {
        Some(keywords.join(","))
    }
}

fn split_keywords(joined: Option<String>) -> Vec<String> {
    joined
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        source: row.get(1)?,
        link: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        pub_date: row.get(5)?,
        first_seen: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        last_seen: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        has_correction: row.get(8)?,
        correction_keywords: split_keywords(row.get(9)?),
    })
}

/// Rows with a `change_type` this build does not know are skipped, not
/// mislabeled. They can appear when a newer build wrote to the same database.
fn change_from_row(row: &Row) -> rusqlite::Result<Option<ChangeEvent>> {
    let raw_type: String = row.get(3)?;
    let Some(change_type) = ChangeType::from_str(&raw_type) else {
        tracing::warn!(change_type = %raw_type, "skipping change row with unknown type");
        return Ok(None);
    };
    Ok(Some(ChangeEvent {
        id: row.get(0)?,
        source: row.get(1)?,
        link: row.get(2)?,
        change_type,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        detected_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        change_summary: row.get(7)?,
        has_correction: row.get(8)?,
        correction_keywords: split_keywords(row.get(9)?),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    struct TestRepo {
        repo: Repository,
        _tmpdir: TempDir,
    }

    async fn test_repo() -> TestRepo {
        let tmpdir = tempfile::tempdir().unwrap();
        let db_path = tmpdir.path().join("test.db");
        let repo = Repository::new(db_path.to_string_lossy().as_ref())
            .await
            .unwrap();
        TestRepo {
            repo,
            _tmpdir: tmpdir,
        }
    }

    fn incoming(title: &str, link: &str, description: &str) -> IncomingArticle {
        IncomingArticle {
            title: title.into(),
            link: link.into(),
            description: description.into(),
            pub_date: "2025-01-01T09:00:00+09:00".into(),
        }
    }

    fn hour_ago() -> DateTime<Utc> {
        Utc::now() - Duration::hours(1)
    }

    #[tokio::test]
    async fn first_observation_creates_article_and_new_event() {
        let test = test_repo().await;
        let repo = &test.repo;

        let stats = repo
            .upsert_and_classify(
                "NHK首都圏ニュース",
                vec![incoming("A", "http://x/1", "plain text")],
            )
            .await
            .unwrap();
        assert_eq!((stats.new, stats.updated, stats.unchanged), (1, 0, 0));
        assert!(stats.correction_added.is_empty());

        let article = repo
            .get_article("NHK首都圏ニュース", "http://x/1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.title, "A");
        assert!(!article.has_correction);
        assert!(article.correction_keywords.is_empty());
        assert!(article.first_seen <= article.last_seen);

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::New);
        assert_eq!(changes[0].new_value.as_deref(), Some("A"));
        assert_eq!(changes[0].old_value, None);
    }

    #[tokio::test]
    async fn refetching_identical_batch_writes_no_events() {
        let test = test_repo().await;
        let repo = &test.repo;

        let batch = vec![incoming("A", "1.html", "本文です。")];
        repo.upsert_and_classify("src", batch.clone()).await.unwrap();
        let first_seen = repo
            .get_article("src", "1.html")
            .await
            .unwrap()
            .unwrap()
            .first_seen;

        let stats = repo.upsert_and_classify("src", batch).await.unwrap();
        assert_eq!((stats.new, stats.updated, stats.unchanged), (0, 0, 1));

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(changes.len(), 1); // only the original `new` event

        let article = repo.get_article("src", "1.html").await.unwrap().unwrap();
        assert_eq!(article.first_seen, first_seen); // write-once
    }

    #[tokio::test]
    async fn title_change_takes_priority_over_description_change() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_and_classify("src", vec![incoming("旧タイトル", "1.html", "旧本文。")])
            .await
            .unwrap();
        let stats = repo
            .upsert_and_classify("src", vec![incoming("新タイトル", "1.html", "新本文。")])
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        // Exactly one event this cycle, and it is the title change.
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change_type, ChangeType::TitleChanged);
        assert_eq!(changes[0].old_value.as_deref(), Some("旧タイトル"));
        assert_eq!(changes[0].new_value.as_deref(), Some("新タイトル"));

        // The description was not observed this cycle; the stored snapshot
        // still carries the old text, so the next fetch reports it.
        let article = repo.get_article("src", "1.html").await.unwrap().unwrap();
        assert_eq!(article.description.as_deref(), Some("旧本文。"));

        let stats = repo
            .upsert_and_classify("src", vec![incoming("新タイトル", "1.html", "新本文。")])
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);
        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(changes[0].change_type, ChangeType::DescriptionChanged);
    }

    #[tokio::test]
    async fn correction_appearing_in_description_is_signaled() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_and_classify("src", vec![incoming("A", "1.html", "normal text")])
            .await
            .unwrap();
        let stats = repo
            .upsert_and_classify(
                "src",
                vec![incoming(
                    "A",
                    "1.html",
                    "normal text※当初Xと掲載しましたが誤りでした。失礼しました。",
                )],
            )
            .await
            .unwrap();

        assert_eq!(stats.correction_added.len(), 1);
        assert_eq!(stats.correction_added[0].title, "A");
        assert!(stats.correction_removed.is_empty());

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(changes[0].change_type, ChangeType::DescriptionChanged);
        assert!(changes[0].has_correction);
        assert_eq!(
            changes[0].correction_keywords,
            vec!["当初", "掲載", "失礼しました", "※"]
        );
        // No correction_removed event anywhere.
        assert!(changes
            .iter()
            .all(|c| c.change_type != ChangeType::CorrectionRemoved));
    }

    #[tokio::test]
    async fn correction_disappearing_writes_two_events() {
        let test = test_repo().await;
        let repo = &test.repo;

        let old_desc = "本文です。※失礼しました。";
        repo.upsert_and_classify("src", vec![incoming("A", "1.html", old_desc)])
            .await
            .unwrap();
        let stats = repo
            .upsert_and_classify("src", vec![incoming("A", "1.html", "plain replacement text")])
            .await
            .unwrap();

        assert_eq!(stats.correction_removed.len(), 1);
        // The signal carries the keywords that disappeared.
        assert_eq!(stats.correction_removed[0].keywords, vec!["失礼しました", "※"]);

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        let removal = changes
            .iter()
            .find(|c| c.change_type == ChangeType::CorrectionRemoved)
            .expect("correction_removed event");
        let desc_change = changes
            .iter()
            .find(|c| c.change_type == ChangeType::DescriptionChanged)
            .expect("description_changed event");

        // Both events carry the same before/after text.
        assert_eq!(removal.old_value.as_deref(), Some(old_desc));
        assert_eq!(removal.new_value.as_deref(), Some("plain replacement text"));
        assert_eq!(desc_change.old_value, removal.old_value);
        assert_eq!(desc_change.new_value, removal.new_value);

        assert!(!removal.has_correction);
        assert_eq!(removal.change_summary.as_deref(), Some(CORRECTION_REMOVED_NOTE));

        let article = repo.get_article("src", "1.html").await.unwrap().unwrap();
        assert!(!article.has_correction);
    }

    #[tokio::test]
    async fn empty_description_gaining_text_is_an_addition() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_and_classify("src", vec![incoming("A", "1.html", "")])
            .await
            .unwrap();
        repo.upsert_and_classify("src", vec![incoming("A", "1.html", "本文が追加されました。")])
            .await
            .unwrap();

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(changes[0].change_type, ChangeType::DescriptionAdded);
    }

    #[tokio::test]
    async fn recent_changes_filters_by_source_and_cutoff() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_and_classify("east", vec![incoming("A", "1.html", "a")])
            .await
            .unwrap();
        repo.upsert_and_classify("west", vec![incoming("B", "2.html", "b")])
            .await
            .unwrap();

        let all = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first.
        assert!(all[0].detected_at >= all[1].detected_at);

        let east_only = repo.recent_changes(hour_ago(), Some("east")).await.unwrap();
        assert_eq!(east_only.len(), 1);
        assert_eq!(east_only[0].source, "east");

        let future = repo
            .recent_changes(Utc::now() + Duration::hours(1), None)
            .await
            .unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn snapshot_exports_articles_and_changes() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_and_classify(
            "src",
            vec![
                incoming("A", "1.html", "a"),
                incoming("B", "2.html", "※当初の内容を訂正しました"),
            ],
        )
        .await
        .unwrap();

        let snapshot = repo.export_snapshot().await.unwrap();
        assert_eq!(snapshot.articles.len(), 2);
        assert_eq!(snapshot.changes.len(), 2);
        assert_eq!(repo.article_count().await.unwrap(), 2);

        // Serializable for archival export.
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"articles\""));
        assert!(json.contains("\"changes\""));
    }

    #[tokio::test]
    async fn one_batch_visits_each_identity_key_once() {
        let test = test_repo().await;
        let repo = &test.repo;

        // Same link twice in one batch: the second occurrence classifies
        // against the state the first one just wrote.
        let stats = repo
            .upsert_and_classify(
                "src",
                vec![incoming("A", "1.html", "a"), incoming("A", "1.html", "a")],
            )
            .await
            .unwrap();
        assert_eq!((stats.new, stats.unchanged), (1, 1));
    }

    #[tokio::test]
    async fn unknown_change_type_rows_are_skipped() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_and_classify("src", vec![incoming("A", "1.html", "本文")])
            .await
            .unwrap();

        // A row written by a newer build with a type this one does not know.
        let detected_at = rfc3339(Utc::now());
        repo.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO changes (source, link, change_type, detected_at)
                     VALUES ('src', '1.html', 'merged', ?1)",
                    params![detected_at],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let changes = repo.recent_changes(hour_ago(), None).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::New);

        let snapshot = repo.export_snapshot().await.unwrap();
        assert_eq!(snapshot.changes.len(), 1);
    }
}
