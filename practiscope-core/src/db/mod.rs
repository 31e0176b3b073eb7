//! Database layer for practiscope
//!
//! This module provides the attempt store using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Filtered, totally ordered attempt listing

pub mod repo;
pub mod schema;

pub use repo::{filter_value, AttemptFilter, CategoryFilter, CategoryMatch, Database};
