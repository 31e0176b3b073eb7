//! Report assembly for guardians and therapists.
//!
//! [`ReportAssembler`] turns request filters into store queries, runs them
//! on the blocking pool with a per-query time bound, and composes the
//! aggregates into serializable reports.
//!
//! The three parts of a [`ChildReport`] are fetched concurrently and are not
//! read from one snapshot. An attempt written between the sub-queries may
//! show up in `recent` but not yet in `overall`; that skew is accepted.
//! The store holds a single connection behind a mutex, so the sub-queries
//! overlap only in waiting and execute one after another.
//!
//! Writes go through [`ReportAssembler::run_write`], which has no time
//! bound: an error is only returned when nothing was committed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::{by_dimension, rollup, AggregateOptions, GroupKey, GroupStats, Summary};
use super::recent::{recent_attempts, RECENT_LIMIT};
use super::window::Period;
use crate::config::AnalyticsConfig;
use crate::db::{filter_value, AttemptFilter, CategoryFilter, CategoryMatch, Database};
use crate::error::{Error, Result};
use crate::types::{AttemptRecord, PracticeKind};

/// Guardian-facing report for one child.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildReport {
    pub child_id: String,
    /// Rollup over every attempt of the child
    pub overall: Summary,
    /// Per-emotion breakdown, sorted by emotion name
    pub by_emotion: Vec<GroupStats>,
    /// Most recent attempts, newest first
    pub recent: Vec<AttemptRecord>,
}

/// Filters accepted by the stats views. Raw values come straight from the
/// query string; blank and `all` mean no filter.
#[derive(Debug, Clone, Default)]
pub struct StatsQuery {
    pub child_id: Option<String>,
    pub category: Option<String>,
    pub period: Period,
}

/// Reject a missing or blank child id.
pub fn require_child_id(raw: Option<&str>) -> Result<String> {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(Error::validation("childId", "is required")),
    }
}

/// Tunables of the assembler, usually taken from [`AnalyticsConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ReportSettings {
    pub query_timeout: Duration,
    pub category_match: CategoryMatch,
    pub therapist: AggregateOptions,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self::from(&AnalyticsConfig::default())
    }
}

impl From<&AnalyticsConfig> for ReportSettings {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            query_timeout: config.query_timeout(),
            category_match: config.category_match,
            therapist: AggregateOptions::rounded(config.therapist_rate_decimals),
        }
    }
}

/// Builds reports over a shared attempt store.
#[derive(Clone)]
pub struct ReportAssembler {
    db: Arc<Database>,
    settings: ReportSettings,
}

impl ReportAssembler {
    pub fn new(db: Arc<Database>, settings: ReportSettings) -> Self {
        Self { db, settings }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Run a store query on the blocking pool, bounded by the query timeout.
    ///
    /// Dropping the returned future abandons the query result; the store
    /// call itself finishes on its blocking thread.
    pub async fn run_query<T, F>(&self, label: &'static str, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let task = tokio::task::spawn_blocking(move || query(&db));

        match tokio::time::timeout(self.settings.query_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                tracing::error!(query = label, error = %join_error, "Query task failed");
                Err(Error::Aggregation(format!(
                    "{} query did not complete: {}",
                    label, join_error
                )))
            }
            Err(_) => {
                let ms = self.settings.query_timeout.as_millis() as u64;
                tracing::warn!(query = label, timeout_ms = ms, "Query timed out");
                Err(Error::Timeout(ms))
            }
        }
    }

    /// Run a store write on the blocking pool and wait for it to finish.
    ///
    /// Unlike [`run_query`](Self::run_query) there is no timeout, so the
    /// caller never sees a failure for a write that went on to commit.
    pub async fn run_write<T, F>(&self, label: &'static str, write: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || write(&db))
            .await
            .map_err(|join_error| {
                tracing::error!(write = label, error = %join_error, "Write task failed");
                Error::Aggregation(format!("{} did not complete: {}", label, join_error))
            })?
    }

    /// Guardian report: rollup, per-emotion breakdown and recent activity.
    ///
    /// No time window applies. The three sub-queries run concurrently and
    /// the first failure fails the whole report.
    pub async fn child_report(&self, child_id: &str) -> Result<ChildReport> {
        let child_id = require_child_id(Some(child_id))?;

        let overall = {
            let filter = AttemptFilter::for_child(&child_id);
            self.run_query("overall", move |db| {
                db.list_attempts(&filter)
                    .map(|records| rollup(&records, AggregateOptions::default()))
            })
        };

        let by_emotion = {
            let filter = AttemptFilter {
                kind: Some(PracticeKind::Emotion),
                ..AttemptFilter::for_child(&child_id)
            };
            self.run_query("by_emotion", move |db| {
                db.list_attempts(&filter).map(|records| {
                    by_dimension(&records, GroupKey::Emotion, AggregateOptions::default())
                })
            })
        };

        let recent = {
            let id = child_id.clone();
            self.run_query("recent", move |db| recent_attempts(db, &id, RECENT_LIMIT))
        };

        let (overall, by_emotion, recent) = tokio::try_join!(overall, by_emotion, recent)?;

        tracing::debug!(
            child_id = %child_id,
            attempts = overall.attempts,
            emotions = by_emotion.len(),
            "Assembled child report"
        );

        Ok(ChildReport {
            child_id,
            overall,
            by_emotion,
            recent,
        })
    }

    /// Per-child speech breakdown by card title, unrounded.
    pub async fn category_stats(
        &self,
        query: &StatsQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<GroupStats>> {
        let child_id = require_child_id(query.child_id.as_deref())?;
        let filter = AttemptFilter {
            kind: Some(PracticeKind::Speech),
            since: query.period.cutoff(now),
            ..AttemptFilter::for_child(&child_id)
        };

        self.run_query("category_stats", move |db| {
            db.list_attempts(&filter).map(|records| {
                by_dimension(&records, GroupKey::CardTitle, AggregateOptions::default())
            })
        })
        .await
    }

    /// Cross-child speech breakdown by card title, rounded for display.
    pub async fn therapist_stats(
        &self,
        query: &StatsQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<GroupStats>> {
        let filter = AttemptFilter {
            child_id: filter_value(query.child_id.as_deref()),
            kind: Some(PracticeKind::Speech),
            category: CategoryFilter::parse(query.category.as_deref(), self.settings.category_match),
            since: query.period.cutoff(now),
            ..Default::default()
        };
        let options = self.settings.therapist;

        tracing::debug!(
            child_id = ?filter.child_id,
            category = ?filter.category,
            period = query.period.as_str(),
            "Building therapist stats"
        );

        self.run_query("therapist_stats", move |db| {
            db.list_attempts(&filter)
                .map(|records| by_dimension(&records, GroupKey::CardTitle, options))
        })
        .await
    }

    /// Filtered attempt listing, newest first.
    pub async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<AttemptRecord>> {
        self.run_query("list_attempts", move |db| db.list_attempts(&filter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Difficulty, Emotion, NewAttempt, Practice};
    use chrono::Duration as ChronoDuration;

    fn assembler() -> ReportAssembler {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        ReportAssembler::new(Arc::new(db), ReportSettings::default())
    }

    fn happy(child_id: &str, passed: bool, score: f64, stars: u8) -> NewAttempt {
        NewAttempt {
            child_id: child_id.to_string(),
            practice: Practice::Emotion {
                emotion: Emotion::Happy,
                recorded_by: "mentor".to_string(),
            },
            score: Some(score),
            passed,
            stars,
            difficulty: Difficulty::Easy,
        }
    }

    fn speech(child_id: &str, title: &str, category: Category, passed: bool) -> NewAttempt {
        NewAttempt {
            child_id: child_id.to_string(),
            practice: Practice::Speech {
                card_title: title.to_string(),
                category: Some(category),
            },
            score: None,
            passed,
            stars: 1,
            difficulty: Difficulty::Easy,
        }
    }

    #[tokio::test]
    async fn test_child_report_scenario() {
        let assembler = assembler();
        for attempt in [
            happy("C1", true, 0.9, 3),
            happy("C1", false, 0.4, 1),
            happy("C1", true, 0.8, 2),
        ] {
            assembler.db.insert_attempt(&attempt).unwrap();
        }

        let report = assembler.child_report("C1").await.unwrap();
        assert_eq!(report.child_id, "C1");
        assert_eq!(report.overall.attempts, 3);
        assert_eq!(report.overall.passes, 2);
        assert!((report.overall.pass_rate - 0.667).abs() < 0.001);
        assert!((report.overall.avg_score - 0.7).abs() < 1e-9);
        assert!((report.overall.avg_stars - 2.0).abs() < 1e-9);
        assert_eq!(report.by_emotion.len(), 1);
        assert_eq!(report.by_emotion[0].key, "happy");
        assert_eq!(report.recent.len(), 3);
    }

    #[tokio::test]
    async fn test_child_report_without_attempts_is_zero_valued() {
        let report = assembler().child_report("C2").await.unwrap();
        assert_eq!(report.overall, Summary::empty());
        assert!(report.by_emotion.is_empty());
        assert!(report.recent.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"]["attempts"], 0);
        assert_eq!(json["overall"]["passRate"], 0.0);
        assert_eq!(json["byEmotion"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_child_report_requires_child_id() {
        let err = assembler().child_report("  ").await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "childId"));
    }

    #[tokio::test]
    async fn test_category_stats_requires_child_and_respects_period() {
        let assembler = assembler();
        let now = Utc::now();
        assembler
            .db
            .insert_attempt_at(
                &speech("C1", "Apple", Category::Food, true),
                now - ChronoDuration::days(10),
            )
            .unwrap();
        assembler
            .db
            .insert_attempt_at(
                &speech("C1", "Apple", Category::Food, false),
                now - ChronoDuration::days(2),
            )
            .unwrap();

        let missing = assembler
            .category_stats(&StatsQuery::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::Validation { .. }));

        let mut query = StatsQuery {
            child_id: Some("C1".to_string()),
            period: Period::Week,
            ..Default::default()
        };
        let week = assembler.category_stats(&query, now).await.unwrap();
        assert_eq!(week[0].summary.attempts, 1);

        query.period = Period::Month;
        let month = assembler.category_stats(&query, now).await.unwrap();
        assert_eq!(month[0].summary.attempts, 2);
        assert_eq!(month[0].summary.pass_rate, 0.5);
    }

    #[tokio::test]
    async fn test_therapist_stats_rounds_and_matches_category_case_insensitively() {
        let assembler = assembler();
        for attempt in [
            speech("C1", "Apple", Category::Food, true),
            speech("C2", "Apple", Category::Food, false),
            speech("C3", "Apple", Category::Food, false),
            speech("C1", "Mom", Category::Family, true),
            happy("C1", true, 0.9, 3),
        ] {
            assembler.db.insert_attempt(&attempt).unwrap();
        }

        let upper = StatsQuery {
            category: Some("Food".to_string()),
            ..Default::default()
        };
        let lower = StatsQuery {
            category: Some("food".to_string()),
            ..Default::default()
        };
        let now = Utc::now();
        let upper = assembler.therapist_stats(&upper, now).await.unwrap();
        let lower = assembler.therapist_stats(&lower, now).await.unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].key, "Apple");
        assert_eq!(upper[0].summary.pass_rate, 0.33);

        let all = assembler
            .therapist_stats(
                &StatsQuery {
                    category: Some("all".to_string()),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        let keys: Vec<&str> = all.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Apple", "Mom"]);

        let one_child = assembler
            .therapist_stats(
                &StatsQuery {
                    child_id: Some("C2".to_string()),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(one_child.len(), 1);
        assert_eq!(one_child[0].summary.passes, 0);
    }

    #[tokio::test]
    async fn test_case_sensitive_setting_is_honoured() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.insert_attempt(&speech("C1", "Apple", Category::Food, true))
            .unwrap();
        let settings = ReportSettings {
            category_match: CategoryMatch::CaseSensitive,
            ..Default::default()
        };
        let assembler = ReportAssembler::new(Arc::new(db), settings);

        let query = StatsQuery {
            category: Some("Food".to_string()),
            ..Default::default()
        };
        assert!(assembler
            .therapist_stats(&query, Utc::now())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_query_timeout_reports_error() {
        let db = Database::open_in_memory().unwrap();
        let settings = ReportSettings {
            query_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let assembler = ReportAssembler::new(Arc::new(db), settings);

        let result: Result<()> = assembler
            .run_query("slow", |_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(20))));
    }

    #[tokio::test]
    async fn test_write_outlasting_query_timeout_still_succeeds() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let db = Arc::new(db);
        let settings = ReportSettings {
            query_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let assembler = ReportAssembler::new(Arc::clone(&db), settings);

        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = {
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                let _conn = db.connection().unwrap();
                locked_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(100));
            })
        };
        locked_rx.recv().unwrap();

        let attempt = happy("C1", true, 0.9, 3);
        let stored = assembler
            .run_write("insert_attempt", move |db| db.insert_attempt(&attempt))
            .await
            .unwrap();
        holder.join().unwrap();

        assert_eq!(db.count_attempts().unwrap(), 1);
        assert_eq!(db.get_attempt(stored.id).unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_an_empty_report() {
        // Unmigrated database: every query fails
        let db = Database::open_in_memory().unwrap();
        let assembler = ReportAssembler::new(Arc::new(db), ReportSettings::default());
        let err = assembler.child_report("C1").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Aggregation);
    }
}
