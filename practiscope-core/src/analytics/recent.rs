//! Recent activity for a single child.

use crate::db::{AttemptFilter, Database};
use crate::error::Result;
use crate::types::AttemptRecord;

/// Number of attempts shown in a child report's recent section.
pub const RECENT_LIMIT: usize = 10;

/// The `limit` most recent attempts of `child_id`, newest first.
///
/// Ties on `created_at` fall back to id descending (insertion order), so
/// the order does not depend on clock resolution.
pub fn recent_attempts(db: &Database, child_id: &str, limit: usize) -> Result<Vec<AttemptRecord>> {
    let filter = AttemptFilter {
        limit: Some(limit),
        ..AttemptFilter::for_child(child_id)
    };
    db.list_attempts(&filter)
}
