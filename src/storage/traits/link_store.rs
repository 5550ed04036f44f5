//! Link store trait.

use std::collections::HashSet;

use crate::models::{AssetLink, ShellId, SpecificAssetId};
use crate::{Error, Result};

/// A constrained, bounded query over the link relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery {
    /// Distinct constraints, all of which must match.
    pub constraints: Vec<AssetLink>,
    /// Maximum number of identifiers to return.
    pub limit: usize,
    /// Inclusive lower bound on the identifiers returned.
    pub start_at: Option<ShellId>,
}

impl LinkQuery {
    /// Creates a query starting from the smallest identifier.
    #[must_use]
    pub const fn new(constraints: Vec<AssetLink>, limit: usize) -> Self {
        Self {
            constraints,
            limit,
            start_at: None,
        }
    }

    /// Resumes the query at `shell` (inclusive).
    #[must_use]
    pub fn starting_at(mut self, shell: Option<ShellId>) -> Self {
        self.start_at = shell;
        self
    }

    /// Number of rows a backend should fetch: one past the limit so the
    /// next page's first identifier is known without a second query.
    #[must_use]
    pub const fn fetch_size(&self) -> usize {
        self.limit.saturating_add(1)
    }
}

/// Identifiers matched by a [`LinkQuery`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellPage {
    /// At most `limit` identifiers in ascending byte order.
    pub ids: Vec<ShellId>,
    /// First matching identifier past the page, if there is one.
    pub next: Option<ShellId>,
}

impl ShellPage {
    /// Splits up to `limit + 1` ordered rows into a page and its continuation.
    #[must_use]
    pub fn from_peeked(mut rows: Vec<ShellId>, limit: usize) -> Self {
        let next = if rows.len() > limit {
            rows.truncate(limit + 1);
            rows.pop()
        } else {
            None
        };
        Self { ids: rows, next }
    }
}

/// Durable store of the relation shell identifier to specific asset ids.
///
/// Every method is atomic: concurrent readers observe either the state
/// before or after a mutation, never a mix.
pub trait LinkStore: Send + Sync {
    /// Short backend name used in logs and metrics labels.
    fn backend_name(&self) -> &'static str;

    /// Replaces the full set of pairs linked to `shell`.
    ///
    /// An empty `pairs` slice removes the shell from the index. Exact
    /// duplicate pairs are stored once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any pair has an empty name or value,
    /// or [`Error::OperationFailed`] if the backend fails. Nothing is written
    /// on error.
    fn put(&self, shell: &ShellId, pairs: &[SpecificAssetId]) -> Result<()>;

    /// Returns the pairs linked to `shell` in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the shell has no pairs.
    fn get(&self, shell: &ShellId) -> Result<Vec<SpecificAssetId>>;

    /// Removes every pair linked to `shell`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the shell has no pairs.
    fn delete(&self, shell: &ShellId) -> Result<()>;

    /// Finds shells linked to every constraint of `query`.
    ///
    /// Constraints are expected to be non-empty; the lookup engine
    /// validates them and drops repeats. Any number of constraints is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the backend fails.
    fn search(&self, query: &LinkQuery) -> Result<ShellPage>;
}

/// Rejects the whole batch if any pair is malformed.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] naming the offending position.
pub fn validate_pairs(pairs: &[SpecificAssetId]) -> Result<()> {
    for (position, pair) in pairs.iter().enumerate() {
        pair.validate().map_err(|e| match e {
            Error::InvalidInput(msg) => Error::InvalidInput(format!("pair {position}: {msg}")),
            other => other,
        })?;
    }
    Ok(())
}

/// Drops exact duplicates, keeping the first occurrence of each pair.
#[must_use]
pub fn distinct_pairs(pairs: &[SpecificAssetId]) -> Vec<&SpecificAssetId> {
    let mut seen = HashSet::with_capacity(pairs.len());
    pairs
        .iter()
        .filter(|pair| {
            let subject = pair
                .external_subject_id
                .as_ref()
                .map(crate::models::Reference::to_json_string);
            seen.insert((pair.name.as_str(), pair.value.as_str(), subject))
        })
        .collect()
}
