//! Pass-rate aggregation over attempt records.
//!
//! One accumulator drives both shapes:
//! - [`by_dimension`] partitions records by a [`GroupKey`] and returns one
//!   [`GroupStats`] row per key, sorted ascending by key.
//! - [`rollup`] folds every record into a single [`Summary`].
//!
//! ## Conventions
//!
//! - `pass_rate` is `passes / attempts`, and exactly `0.0` when there are
//!   no attempts. It is never NaN.
//! - `avg_score` averages only records that carry a score. Records without
//!   one are left out of both numerator and denominator. When no record has
//!   a score the average is `0.0`.
//! - `avg_stars` averages over every record (stars default to 0, so they
//!   are never missing).
//! - Rounding is an explicit [`RateRounding`] option of the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::AttemptRecord;

/// Which label partitions the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// Emotion name; speech attempts are skipped
    Emotion,
    /// Speech card title; emotion attempts are skipped
    CardTitle,
}

impl GroupKey {
    /// The grouping label of `record`, if it has one under this key.
    pub fn extract<'a>(&self, record: &'a AttemptRecord) -> Option<&'a str> {
        match self {
            GroupKey::Emotion => record.practice.emotion().map(|e| e.as_str()),
            GroupKey::CardTitle => record.practice.card_title(),
        }
    }
}

/// Rounding applied to the derived ratios of an aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateRounding {
    /// Full precision
    #[default]
    Exact,
    /// Round half away from zero to this many decimal digits
    Decimals(u32),
}

impl RateRounding {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            RateRounding::Exact => value,
            RateRounding::Decimals(digits) => {
                let factor = 10f64.powi(*digits as i32);
                (value * factor).round() / factor
            }
        }
    }
}

/// Options shared by every aggregator call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    pub rounding: RateRounding,
}

impl AggregateOptions {
    pub fn rounded(digits: u32) -> Self {
        Self {
            rounding: RateRounding::Decimals(digits),
        }
    }
}

/// Aggregate figures for a set of attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub attempts: u64,
    pub passes: u64,
    pub pass_rate: f64,
    pub avg_score: f64,
    pub avg_stars: f64,
    /// Most recent `created_at` in the set
    pub last_at: Option<DateTime<Utc>>,
}

impl Summary {
    /// The zero-valued summary of an empty set.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One row of a per-dimension breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    /// Emotion name or card title
    pub key: String,
    #[serde(flatten)]
    pub summary: Summary,
}

/// Zero-guarded ratio.
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    attempts: u64,
    passes: u64,
    score_sum: f64,
    scored: u64,
    stars_sum: u64,
    last_at: Option<DateTime<Utc>>,
}

impl Accumulator {
    fn add(&mut self, record: &AttemptRecord) {
        self.attempts += 1;
        if record.passed {
            self.passes += 1;
        }
        if let Some(score) = record.score {
            self.score_sum += score;
            self.scored += 1;
        }
        self.stars_sum += u64::from(record.stars);
        self.last_at = self.last_at.max(Some(record.created_at));
    }

    fn finish(self, options: &AggregateOptions) -> Summary {
        let avg_score = if self.scored == 0 {
            0.0
        } else {
            self.score_sum / self.scored as f64
        };
        let round = |v: f64| options.rounding.apply(v);

        Summary {
            attempts: self.attempts,
            passes: self.passes,
            pass_rate: round(rate(self.passes, self.attempts)),
            avg_score: round(avg_score),
            avg_stars: round(rate(self.stars_sum, self.attempts)),
            last_at: self.last_at,
        }
    }
}

/// Partition `records` by `key` and summarize each partition.
///
/// Records without a label under `key` are skipped. Output is sorted
/// ascending by key (byte-wise lexicographic), so repeated calls over the
/// same data render identically.
pub fn by_dimension(
    records: &[AttemptRecord],
    key: GroupKey,
    options: AggregateOptions,
) -> Vec<GroupStats> {
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for record in records {
        if let Some(label) = key.extract(record) {
            groups.entry(label).or_default().add(record);
        }
    }

    groups
        .into_iter()
        .map(|(label, acc)| GroupStats {
            key: label.to_string(),
            summary: acc.finish(&options),
        })
        .collect()
}

/// Summarize all `records` as one group.
pub fn rollup(records: &[AttemptRecord], options: AggregateOptions) -> Summary {
    let mut acc = Accumulator::default();
    for record in records {
        acc.add(record);
    }
    acc.finish(&options)
}
