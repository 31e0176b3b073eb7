//! Core domain types for practiscope
//!
//! These types describe practice attempts as the storage layer records them
//! and as the analytics engine reads them.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Child** | The subject of every attempt, identified by `child_id` |
//! | **Attempt** | One recorded try at a practice task, with a pass/fail outcome |
//! | **Practice** | What was practiced: an emotion scenario or a speech card |
//! | **Dimension** | The grouping label of an attempt (emotion name or card title) |
//! | **Threshold** | Per-child calibration used by the real-time evaluator |
//!
//! The closed vocabularies ([`Emotion`], [`Category`], [`Difficulty`],
//! [`PracticeKind`]) are declared once here. The store, the analytics engine
//! and the HTTP layer all go through these types so producers and consumers
//! of attempt records cannot drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================
// Closed vocabularies
// ============================================

/// Emotions a child can be asked to recognise or perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
}

impl Emotion {
    /// Every emotion, in declaration order.
    pub const ALL: [Emotion; 4] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
        }
    }
}

impl std::str::FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Emotion::Happy),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            "surprised" => Ok(Emotion::Surprised),
            _ => Err(format!("unknown emotion: {}", s)),
        }
    }
}

/// Semantic domain of a speech card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Family,
    Actions,
    Animals,
    Objects,
    Places,
    Feelings,
    Body,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Family => "family",
            Category::Actions => "actions",
            Category::Animals => "animals",
            Category::Objects => "objects",
            Category::Places => "places",
            Category::Feelings => "feelings",
            Category::Body => "body",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "food" => Ok(Category::Food),
            "family" => Ok(Category::Family),
            "actions" => Ok(Category::Actions),
            "animals" => Ok(Category::Animals),
            "objects" => Ok(Category::Objects),
            "places" => Ok(Category::Places),
            "feelings" => Ok(Category::Feelings),
            "body" => Ok(Category::Body),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

/// Difficulty the task was presented at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("unknown difficulty: {}", s)),
        }
    }
}

/// Which kind of practice an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeKind {
    Emotion,
    Speech,
}

impl PracticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeKind::Emotion => "emotion",
            PracticeKind::Speech => "speech",
        }
    }
}

impl std::str::FromStr for PracticeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "emotion" => Ok(PracticeKind::Emotion),
            "speech" => Ok(PracticeKind::Speech),
            _ => Err(format!("unknown practice kind: {}", s)),
        }
    }
}

// ============================================
// Attempts
// ============================================

/// What the child practiced. Serialized with a `kind` tag.
///
/// Emotion scenarios are always authored by a mentor or the system, so
/// `recorded_by` is mandatory there. Speech cards carry a free-text title and
/// an optional category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Practice {
    Emotion {
        emotion: Emotion,
        recorded_by: String,
    },
    Speech {
        card_title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<Category>,
    },
}

impl Practice {
    pub fn kind(&self) -> PracticeKind {
        match self {
            Practice::Emotion { .. } => PracticeKind::Emotion,
            Practice::Speech { .. } => PracticeKind::Speech,
        }
    }

    /// The grouping label: emotion name or card title.
    pub fn dimension_key(&self) -> &str {
        match self {
            Practice::Emotion { emotion, .. } => emotion.as_str(),
            Practice::Speech { card_title, .. } => card_title,
        }
    }

    pub fn emotion(&self) -> Option<Emotion> {
        match self {
            Practice::Emotion { emotion, .. } => Some(*emotion),
            Practice::Speech { .. } => None,
        }
    }

    pub fn card_title(&self) -> Option<&str> {
        match self {
            Practice::Speech { card_title, .. } => Some(card_title),
            Practice::Emotion { .. } => None,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Practice::Speech { category, .. } => *category,
            Practice::Emotion { .. } => None,
        }
    }

    pub fn recorded_by(&self) -> Option<&str> {
        match self {
            Practice::Emotion { recorded_by, .. } => Some(recorded_by),
            Practice::Speech { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Practice::Emotion { recorded_by, .. } if recorded_by.trim().is_empty() => Err(
                Error::validation("recordedBy", "is required for emotion attempts"),
            ),
            Practice::Speech { card_title, .. } if card_title.trim().is_empty() => {
                Err(Error::validation("cardTitle", "must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Maximum number of stars an attempt can earn.
pub const MAX_STARS: u8 = 3;

/// One stored practice attempt.
///
/// Records are append-only from the analytics engine's point of view:
/// `created_at` is assigned once by the store and is the only time axis used
/// for windowing and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Store-assigned identifier, increasing with insertion order
    pub id: i64,
    /// The child who made the attempt
    pub child_id: String,
    /// What was practiced
    #[serde(flatten)]
    pub practice: Practice,
    /// Evaluator confidence in [0, 1], when one was produced
    pub score: Option<f64>,
    /// Outcome reported by the real-time evaluator.
    ///
    /// This is NOT `score >= threshold`. The evaluator applies a hold time
    /// (see [`ThresholdConfig::hold_ms`]) before declaring a pass, so a
    /// high score can still be a fail and the engine never recomputes it.
    pub passed: bool,
    /// Stars awarded, 0 to [`MAX_STARS`]
    pub stars: u8,
    pub difficulty: Difficulty,
    /// When the attempt was stored (immutable)
    pub created_at: DateTime<Utc>,
    /// When an outcome correction was last applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of a new attempt: an [`AttemptRecord`] without store-assigned fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttempt {
    pub child_id: String,
    #[serde(flatten)]
    pub practice: Practice,
    #[serde(default)]
    pub score: Option<f64>,
    pub passed: bool,
    #[serde(default)]
    pub stars: u8,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl NewAttempt {
    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.child_id.trim().is_empty() {
            return Err(Error::validation("childId", "is required"));
        }
        self.practice.validate()?;
        validate_score(self.score)?;
        validate_stars(self.stars)
    }
}

/// Outcome correction applied by the maintenance update path.
///
/// Only outcome fields can change. Identity, practice and `created_at`
/// are fixed at insert time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptPatch {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub stars: Option<u8>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl AttemptPatch {
    /// Reject empty patches and out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("body", "no fields to update"));
        }
        validate_score(self.score)?;
        if let Some(stars) = self.stars {
            validate_stars(stars)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.score.is_none()
            && self.passed.is_none()
            && self.stars.is_none()
            && self.difficulty.is_none()
    }
}

fn validate_score(score: Option<f64>) -> Result<()> {
    match score {
        Some(s) if !s.is_finite() || !(0.0..=1.0).contains(&s) => {
            Err(Error::validation("score", "must be between 0 and 1"))
        }
        _ => Ok(()),
    }
}

fn validate_stars(stars: u8) -> Result<()> {
    if stars > MAX_STARS {
        return Err(Error::validation(
            "stars",
            format!("must be between 0 and {}", MAX_STARS),
        ));
    }
    Ok(())
}

// ============================================
// Thresholds
// ============================================

pub const DEFAULT_LEVEL: u32 = 1;
pub const DEFAULT_THRESHOLD: f64 = 0.75;
pub const DEFAULT_HOLD_MS: u64 = 1000;

/// Calibration for the external real-time evaluator, per (child, emotion).
///
/// A signal must stay above `threshold` for at least `hold_ms` before the
/// evaluator reports the attempt as passed. The analytics engine only
/// consumes the resulting `passed` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub child_id: String,
    pub emotion: Emotion,
    /// Calibration level, starting at 1
    pub level: u32,
    /// Probability in [0, 1]
    pub threshold: f64,
    /// Minimum sustained-above-threshold duration in milliseconds
    pub hold_ms: u64,
    pub updated_at: DateTime<Utc>,
}

/// Body of a threshold write. Absent fields keep their current value, or
/// the default when nothing is stored yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub hold_ms: Option<u64>,
}

impl ThresholdUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.level == Some(0) {
            return Err(Error::validation("level", "must be at least 1"));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() || !(0.0..=1.0).contains(&t) {
                return Err(Error::validation("threshold", "must be between 0 and 1"));
            }
        }
        Ok(())
    }

    /// Merge this update over `current` (or defaults).
    pub fn apply(
        &self,
        child_id: &str,
        emotion: Emotion,
        current: Option<&ThresholdConfig>,
        now: DateTime<Utc>,
    ) -> ThresholdConfig {
        ThresholdConfig {
            child_id: child_id.to_string(),
            emotion,
            level: self
                .level
                .or(current.map(|c| c.level))
                .unwrap_or(DEFAULT_LEVEL),
            threshold: self
                .threshold
                .or(current.map(|c| c.threshold))
                .unwrap_or(DEFAULT_THRESHOLD),
            hold_ms: self
                .hold_ms
                .or(current.map(|c| c.hold_ms))
                .unwrap_or(DEFAULT_HOLD_MS),
            updated_at: now,
        }
    }
}
