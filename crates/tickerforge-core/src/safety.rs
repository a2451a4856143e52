//! Pre-commit safety valve.
//!
//! A transient upstream failure can make an entire feed vanish for one
//! run, which would otherwise delist thousands of healthy records. The
//! valve bounds how many removals a single run may persist.

use thiserror::Error;

use crate::Asset;

/// Fatal, non-retryable run abort: too many records would be removed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("refusing to persist: {removed} records marked delisted exceeds limit {limit}")]
pub struct SafetyViolation {
    pub removed: usize,
    pub limit: usize,
}

/// Number of records in the outgoing generation carrying a delisting date,
/// whether inferred this run or reported by a feed.
pub fn removal_count(assets: &[Asset]) -> usize {
    assets.iter().filter(|asset| asset.is_delisted()).count()
}

/// Fail closed when the removal count exceeds the configured limit.
/// Returns the count so callers can report it on success.
pub fn check_removal_limit(assets: &[Asset], max_removed: usize) -> Result<usize, SafetyViolation> {
    let removed = removal_count(assets);
    if removed > max_removed {
        return Err(SafetyViolation {
            removed,
            limit: max_removed,
        });
    }
    Ok(removed)
}
