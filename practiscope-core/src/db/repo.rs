//! Database repository layer
//!
//! Provides query, insert and maintenance operations for attempts and
//! evaluator thresholds.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// How a category filter compares against stored categories.
///
/// Two screens historically disagreed on this for the same filter, so the
/// choice is explicit and configurable. Stored categories are always
/// lower-case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatch {
    /// `Food`, `FOOD` and `food` all select the `food` category
    #[default]
    CaseInsensitive,
    /// Only the exact stored spelling matches
    CaseSensitive,
}

/// Category predicate for attempt queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFilter {
    pub value: String,
    pub matching: CategoryMatch,
}

impl CategoryFilter {
    /// Build a filter from a raw query value. Blank values and `all` mean
    /// no filter.
    pub fn parse(raw: Option<&str>, matching: CategoryMatch) -> Option<Self> {
        filter_value(raw).map(|value| Self { value, matching })
    }
}

/// Normalize a raw filter value: blank and `all` (any case) become `None`.
pub fn filter_value(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Filter for attempt queries. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct AttemptFilter {
    /// Filter by child
    pub child_id: Option<String>,
    /// Filter by practice kind
    pub kind: Option<PracticeKind>,
    /// Filter by exact card title (implies speech attempts)
    pub card_title: Option<String>,
    /// Filter by category (implies speech attempts)
    pub category: Option<CategoryFilter>,
    /// Only attempts created at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of attempts to return
    pub limit: Option<usize>,
}

impl AttemptFilter {
    /// Filter for every attempt of one child.
    pub fn for_child(child_id: &str) -> Self {
        Self {
            child_id: Some(child_id.to_string()),
            ..Default::default()
        }
    }
}

/// Format a timestamp the way the store persists it.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_column<T: std::str::FromStr<Err = String>>(idx: usize, value: &str) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Database handle (single connection guarded by a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers from blocking behind the occasional write
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Aggregation("database connection lock poisoned".to_string()))
    }

    // ============================================
    // Attempt operations
    // ============================================

    /// Validate and store a new attempt, stamped with the current time.
    pub fn insert_attempt(&self, attempt: &NewAttempt) -> Result<AttemptRecord> {
        self.insert_attempt_at(attempt, Utc::now())
    }

    /// Validate and store a new attempt with an explicit creation time.
    ///
    /// Used for backfills; `created_at` is never changed afterwards.
    pub fn insert_attempt_at(
        &self,
        attempt: &NewAttempt,
        created_at: DateTime<Utc>,
    ) -> Result<AttemptRecord> {
        attempt.validate()?;

        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO attempts (child_id, kind, dimension_key, category, recorded_by,
                                  score, passed, stars, difficulty, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                attempt.child_id.trim(),
                attempt.practice.kind().as_str(),
                attempt.practice.dimension_key().trim(),
                attempt.practice.category().map(|c| c.as_str()),
                attempt.practice.recorded_by(),
                attempt.score,
                attempt.passed,
                attempt.stars,
                attempt.difficulty.as_str(),
                format_ts(&created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(
            id,
            child_id = %attempt.child_id,
            kind = attempt.practice.kind().as_str(),
            "Stored attempt"
        );

        Self::query_attempt(&conn, id)?.ok_or_else(|| Error::not_found("attempt", id))
    }

    /// Get an attempt by ID
    pub fn get_attempt(&self, id: i64) -> Result<Option<AttemptRecord>> {
        let conn = self.connection()?;
        Self::query_attempt(&conn, id)
    }

    fn query_attempt(conn: &Connection, id: i64) -> Result<Option<AttemptRecord>> {
        conn.query_row(
            "SELECT * FROM attempts WHERE id = ?",
            [id],
            Self::row_to_attempt,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List attempts matching `filter`, newest first.
    ///
    /// Ordering is `created_at DESC, id DESC`, a total order even when two
    /// attempts share a timestamp.
    pub fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<AttemptRecord>> {
        let conn = self.connection()?;

        let mut sql = String::from("SELECT * FROM attempts WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(child_id) = &filter.child_id {
            sql.push_str(" AND child_id = ?");
            params.push(Box::new(child_id.clone()));
        }

        if let Some(kind) = &filter.kind {
            sql.push_str(" AND kind = ?");
            params.push(Box::new(kind.as_str().to_string()));
        }

        if let Some(card_title) = &filter.card_title {
            sql.push_str(" AND kind = 'speech' AND dimension_key = ?");
            params.push(Box::new(card_title.clone()));
        }

        if let Some(category) = &filter.category {
            match category.matching {
                CategoryMatch::CaseInsensitive => {
                    sql.push_str(" AND category = ? COLLATE NOCASE")
                }
                CategoryMatch::CaseSensitive => sql.push_str(" AND category = ?"),
            }
            params.push(Box::new(category.value.clone()));
        }

        if let Some(since) = &filter.since {
            sql.push_str(" AND created_at >= ?");
            params.push(Box::new(format_ts(since)));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let attempts = stmt
            .query_map(params_refs.as_slice(), Self::row_to_attempt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(attempts)
    }

    /// Apply an outcome correction. `created_at` is left untouched.
    pub fn update_attempt(&self, id: i64, patch: &AttemptPatch) -> Result<AttemptRecord> {
        patch.validate()?;

        let conn = self.connection()?;
        let changed = conn.execute(
            r#"
            UPDATE attempts SET
                score = COALESCE(?1, score),
                passed = COALESCE(?2, passed),
                stars = COALESCE(?3, stars),
                difficulty = COALESCE(?4, difficulty),
                updated_at = ?5
            WHERE id = ?6
            "#,
            params![
                patch.score,
                patch.passed,
                patch.stars,
                patch.difficulty.map(|d| d.as_str()),
                format_ts(&Utc::now()),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(Error::not_found("attempt", id));
        }

        tracing::info!(id, "Applied attempt correction");

        Self::query_attempt(&conn, id)?.ok_or_else(|| Error::not_found("attempt", id))
    }

    /// Delete an attempt
    pub fn delete_attempt(&self, id: i64) -> Result<()> {
        let conn = self.connection()?;
        let changed = conn.execute("DELETE FROM attempts WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(Error::not_found("attempt", id));
        }
        tracing::info!(id, "Deleted attempt");
        Ok(())
    }

    /// Total number of stored attempts
    #[cfg(test)]
    pub fn count_attempts(&self) -> Result<i64> {
        let conn = self.connection()?;
        let count = conn.query_row("SELECT COUNT(*) FROM attempts", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_attempt(row: &Row) -> rusqlite::Result<AttemptRecord> {
        let kind_str: String = row.get("kind")?;
        let dimension_key: String = row.get("dimension_key")?;
        let category_str: Option<String> = row.get("category")?;
        let recorded_by: Option<String> = row.get("recorded_by")?;
        let difficulty_str: String = row.get("difficulty")?;
        let created_at_str: String = row.get("created_at")?;
        let updated_at_str: Option<String> = row.get("updated_at")?;

        let practice = match parse_column::<PracticeKind>(2, &kind_str)? {
            PracticeKind::Emotion => Practice::Emotion {
                emotion: parse_column(3, &dimension_key)?,
                recorded_by: recorded_by.unwrap_or_default(),
            },
            PracticeKind::Speech => Practice::Speech {
                card_title: dimension_key,
                category: category_str
                    .as_deref()
                    .map(|c| parse_column(4, c))
                    .transpose()?,
            },
        };

        Ok(AttemptRecord {
            id: row.get("id")?,
            child_id: row.get("child_id")?,
            practice,
            score: row.get("score")?,
            passed: row.get("passed")?,
            stars: row.get("stars")?,
            difficulty: parse_column(9, &difficulty_str)?,
            created_at: parse_ts(10, &created_at_str)?,
            updated_at: updated_at_str
                .as_deref()
                .map(|s| parse_ts(11, s))
                .transpose()?,
        })
    }

    // ============================================
    // Threshold operations
    // ============================================

    /// Get the evaluator threshold for a (child, emotion) pair
    pub fn get_threshold(&self, child_id: &str, emotion: Emotion) -> Result<Option<ThresholdConfig>> {
        let conn = self.connection()?;
        Self::query_threshold(&conn, child_id, emotion)
    }

    /// Merge `update` over the stored threshold (or defaults) and write it back.
    ///
    /// Read, merge and write happen in one transaction under one connection
    /// guard, so concurrent partial updates to the same pair all land.
    pub fn update_threshold(
        &self,
        child_id: &str,
        emotion: Emotion,
        update: &ThresholdUpdate,
        now: DateTime<Utc>,
    ) -> Result<ThresholdConfig> {
        update.validate()?;

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let current = Self::query_threshold(&tx, child_id, emotion)?;
        let config = update.apply(child_id, emotion, current.as_ref(), now);
        Self::write_threshold(&tx, &config)?;

        tx.commit()?;
        Ok(config)
    }

    fn query_threshold(
        conn: &Connection,
        child_id: &str,
        emotion: Emotion,
    ) -> Result<Option<ThresholdConfig>> {
        conn.query_row(
            "SELECT * FROM thresholds WHERE child_id = ? AND emotion = ?",
            params![child_id, emotion.as_str()],
            Self::row_to_threshold,
        )
        .optional()
        .map_err(Error::from)
    }

    fn write_threshold(conn: &Connection, config: &ThresholdConfig) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO thresholds (child_id, emotion, level, threshold, hold_ms, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(child_id, emotion) DO UPDATE SET
                level = excluded.level,
                threshold = excluded.threshold,
                hold_ms = excluded.hold_ms,
                updated_at = excluded.updated_at
            "#,
            params![
                config.child_id,
                config.emotion.as_str(),
                config.level,
                config.threshold,
                config.hold_ms as i64,
                format_ts(&config.updated_at),
            ],
        )?;
        Ok(())
    }

    fn row_to_threshold(row: &Row) -> rusqlite::Result<ThresholdConfig> {
        let emotion_str: String = row.get("emotion")?;
        let updated_at_str: String = row.get("updated_at")?;
        let hold_ms: i64 = row.get("hold_ms")?;

        Ok(ThresholdConfig {
            child_id: row.get("child_id")?,
            emotion: parse_column(1, &emotion_str)?,
            level: row.get("level")?,
            threshold: row.get("threshold")?,
            hold_ms: hold_ms.max(0) as u64,
            updated_at: parse_ts(5, &updated_at_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn create_speech_attempt(child_id: &str, title: &str, category: Category) -> NewAttempt {
        NewAttempt {
            child_id: child_id.to_string(),
            practice: Practice::Speech {
                card_title: title.to_string(),
                category: Some(category),
            },
            score: Some(0.8),
            passed: true,
            stars: 2,
            difficulty: Difficulty::Medium,
        }
    }

    fn create_emotion_attempt(child_id: &str, emotion: Emotion) -> NewAttempt {
        NewAttempt {
            child_id: child_id.to_string(),
            practice: Practice::Emotion {
                emotion,
                recorded_by: "mentor-1".to_string(),
            },
            score: None,
            passed: false,
            stars: 0,
            difficulty: Difficulty::Easy,
        }
    }

    #[test]
    fn test_attempt_crud() {
        let db = test_db();

        // Insert
        let stored = db
            .insert_attempt(&create_speech_attempt("C1", "Apple", Category::Food))
            .unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored.practice.card_title(), Some("Apple"));
        assert_eq!(stored.updated_at, None);

        // Read
        let retrieved = db.get_attempt(stored.id).unwrap().unwrap();
        assert_eq!(retrieved, stored);

        // Update outcome only
        let patch = AttemptPatch {
            passed: Some(false),
            stars: Some(0),
            ..Default::default()
        };
        let updated = db.update_attempt(stored.id, &patch).unwrap();
        assert!(!updated.passed);
        assert_eq!(updated.stars, 0);
        assert_eq!(updated.score, Some(0.8));
        assert_eq!(updated.created_at, stored.created_at);
        assert!(updated.updated_at.is_some());

        // Delete
        db.delete_attempt(stored.id).unwrap();
        assert!(db.get_attempt(stored.id).unwrap().is_none());
        assert!(matches!(
            db.delete_attempt(stored.id),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            db.update_attempt(stored.id, &patch),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_invalid_attempt() {
        let db = test_db();
        let mut attempt = create_speech_attempt("", "Apple", Category::Food);
        assert!(matches!(
            db.insert_attempt(&attempt),
            Err(Error::Validation { .. })
        ));
        attempt.child_id = "C1".to_string();
        attempt.stars = 9;
        assert!(db.insert_attempt(&attempt).is_err());
        assert_eq!(db.count_attempts().unwrap(), 0);
    }

    #[test]
    fn test_emotion_attempt_round_trip() {
        let db = test_db();
        let stored = db
            .insert_attempt(&create_emotion_attempt("C1", Emotion::Surprised))
            .unwrap();
        assert_eq!(stored.practice.emotion(), Some(Emotion::Surprised));
        assert_eq!(stored.practice.recorded_by(), Some("mentor-1"));
        assert_eq!(stored.score, None);
    }

    #[test]
    fn test_list_attempts_orders_newest_first_with_id_tiebreak() {
        let db = test_db();
        let now = Utc::now();
        let same = now - Duration::hours(1);

        let a = db
            .insert_attempt_at(&create_speech_attempt("C1", "A", Category::Food), same)
            .unwrap();
        let b = db
            .insert_attempt_at(&create_speech_attempt("C1", "B", Category::Food), same)
            .unwrap();
        let c = db
            .insert_attempt_at(&create_speech_attempt("C1", "C", Category::Food), now)
            .unwrap();

        let ids: Vec<i64> = db
            .list_attempts(&AttemptFilter::for_child("C1"))
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[test]
    fn test_list_attempts_filters() {
        let db = test_db();
        let now = Utc::now();
        db.insert_attempt_at(
            &create_speech_attempt("C1", "Apple", Category::Food),
            now - Duration::days(10),
        )
        .unwrap();
        db.insert_attempt(&create_speech_attempt("C1", "Mom", Category::Family))
            .unwrap();
        db.insert_attempt(&create_speech_attempt("C2", "Apple", Category::Food))
            .unwrap();
        db.insert_attempt(&create_emotion_attempt("C1", Emotion::Happy))
            .unwrap();

        let by_child = db.list_attempts(&AttemptFilter::for_child("C1")).unwrap();
        assert_eq!(by_child.len(), 3);

        let speech = db
            .list_attempts(&AttemptFilter {
                child_id: Some("C1".to_string()),
                kind: Some(PracticeKind::Speech),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(speech.len(), 2);

        let apples = db
            .list_attempts(&AttemptFilter {
                card_title: Some("Apple".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(apples.len(), 2);

        let recent = db
            .list_attempts(&AttemptFilter {
                since: Some(now - Duration::days(7)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(recent.len(), 3);

        let limited = db
            .list_attempts(&AttemptFilter {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_category_filter_matching_modes() {
        let db = test_db();
        db.insert_attempt(&create_speech_attempt("C1", "Apple", Category::Food))
            .unwrap();

        let query = |raw: &str, matching| AttemptFilter {
            category: CategoryFilter::parse(Some(raw), matching),
            ..Default::default()
        };

        let insensitive = db
            .list_attempts(&query("Food", CategoryMatch::CaseInsensitive))
            .unwrap();
        assert_eq!(insensitive.len(), 1);

        let sensitive = db
            .list_attempts(&query("Food", CategoryMatch::CaseSensitive))
            .unwrap();
        assert!(sensitive.is_empty());

        let exact = db
            .list_attempts(&query("food", CategoryMatch::CaseSensitive))
            .unwrap();
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn test_filter_value_treats_all_as_absent() {
        assert_eq!(filter_value(None), None);
        assert_eq!(filter_value(Some("")), None);
        assert_eq!(filter_value(Some("  ")), None);
        assert_eq!(filter_value(Some("all")), None);
        assert_eq!(filter_value(Some("ALL")), None);
        assert_eq!(filter_value(Some(" Apple ")), Some("Apple".to_string()));
    }

    #[test]
    fn test_threshold_update_merges_with_stored_row() {
        let db = test_db();
        assert!(db.get_threshold("C1", Emotion::Happy).unwrap().is_none());

        let created = db
            .update_threshold("C1", Emotion::Happy, &ThresholdUpdate::default(), Utc::now())
            .unwrap();
        assert_eq!(created.threshold, DEFAULT_THRESHOLD);
        assert_eq!(created.hold_ms, DEFAULT_HOLD_MS);

        let update = ThresholdUpdate {
            level: Some(3),
            hold_ms: Some(1500),
            ..Default::default()
        };
        db.update_threshold("C1", Emotion::Happy, &update, Utc::now())
            .unwrap();

        let stored = db.get_threshold("C1", Emotion::Happy).unwrap().unwrap();
        assert_eq!(stored.level, 3);
        assert_eq!(stored.hold_ms, 1500);
        assert_eq!(stored.threshold, DEFAULT_THRESHOLD);
        assert!(db.get_threshold("C1", Emotion::Sad).unwrap().is_none());

        let invalid = ThresholdUpdate {
            threshold: Some(1.5),
            ..Default::default()
        };
        assert!(db
            .update_threshold("C1", Emotion::Happy, &invalid, Utc::now())
            .is_err());
        let unchanged = db.get_threshold("C1", Emotion::Happy).unwrap().unwrap();
        assert_eq!(unchanged.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_concurrent_partial_threshold_updates_both_apply() {
        use std::sync::{Arc, Barrier};

        let db = Arc::new(test_db());

        for round in 0..20u64 {
            let barrier = Arc::new(Barrier::new(2));
            let emotion = Emotion::ALL[(round % 4) as usize];
            let child_id = format!("C{}", round);
            let hold_ms = 1000 + round * 10;

            let hold_writer = {
                let (db, barrier, child_id) = (Arc::clone(&db), Arc::clone(&barrier), child_id.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    let update = ThresholdUpdate {
                        hold_ms: Some(hold_ms),
                        ..Default::default()
                    };
                    db.update_threshold(&child_id, emotion, &update, Utc::now())
                        .unwrap();
                })
            };
            let threshold_writer = {
                let (db, barrier, child_id) = (Arc::clone(&db), Arc::clone(&barrier), child_id.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    let update = ThresholdUpdate {
                        threshold: Some(0.6),
                        ..Default::default()
                    };
                    db.update_threshold(&child_id, emotion, &update, Utc::now())
                        .unwrap();
                })
            };
            hold_writer.join().unwrap();
            threshold_writer.join().unwrap();

            let stored = db.get_threshold(&child_id, emotion).unwrap().unwrap();
            assert_eq!(stored.hold_ms, hold_ms);
            assert_eq!(stored.threshold, 0.6);
        }
    }
}
