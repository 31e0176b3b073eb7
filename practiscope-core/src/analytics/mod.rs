//! Attempt analytics engine
//!
//! Reads attempt records and turns them into performance reports:
//! - [`window`]: period tokens to `created_at` lower bounds
//! - [`aggregate`]: per-dimension breakdowns and rollups with zero-guarded rates
//! - [`recent`]: newest attempts of a child
//! - [`report`]: guardian and therapist report assembly
//!
//! ## Data flow
//!
//! ```text
//! request filters ──► Period::cutoff ──► AttemptFilter ──► Database::list_attempts
//!                                                                 │
//!                           ┌─────────────────────────────────────┤
//!                           ▼                 ▼                   ▼
//!                       rollup()       by_dimension()      recent_attempts()
//!                           └────────────────┬┴───────────────────┘
//!                                            ▼
//!                                    ReportAssembler
//! ```
//!
//! The engine never writes. `passed` is taken as reported by the real-time
//! evaluator and is never re-derived from `score`.

pub mod aggregate;
pub mod recent;
pub mod report;
pub mod window;

pub use aggregate::{
    by_dimension, rate, rollup, AggregateOptions, GroupKey, GroupStats, RateRounding, Summary,
};
pub use recent::{recent_attempts, RECENT_LIMIT};
pub use report::{require_child_id, ChildReport, ReportAssembler, ReportSettings, StatsQuery};
pub use window::Period;
