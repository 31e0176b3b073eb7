//! # practiscope-core
//!
//! Core library for practiscope - the attempt analytics engine behind a
//! children's emotion and speech practice platform.
//!
//! This library provides:
//! - Domain types for attempts, practice kinds and evaluator thresholds
//! - Attempt store on SQLite
//! - Pass-rate aggregation and report assembly
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use practiscope_core::analytics::{ReportAssembler, ReportSettings};
//! use practiscope_core::{Config, Database};
//!
//! # async fn run() -> practiscope_core::Result<()> {
//! let config = Config::load()?;
//!
//! let db = Database::open(&Config::database_path())?;
//! db.migrate()?;
//!
//! let assembler = ReportAssembler::new(Arc::new(db), ReportSettings::from(&config.analytics));
//! let report = assembler.child_report("child-42").await?;
//! println!("{} attempts", report.overall.attempts);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{AttemptFilter, CategoryFilter, CategoryMatch, Database};
pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod types;
