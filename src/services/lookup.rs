//! Multi-constraint lookup with keyset pagination.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use crate::config::LookupConfig;
use crate::models::{AssetLink, Cursor, SearchPage};
use crate::storage::{LinkQuery, LinkStore};
use crate::{Error, Result};

/// Resolves shells that carry every one of a set of `(name, value)` pairs.
///
/// Results are ordered by shell identifier, byte-wise. A page holds at most
/// `limit` identifiers; when more matches exist the page carries a cursor
/// naming the first identifier it left out, and passing that cursor back
/// resumes the listing there.
///
/// Input is fully validated before the store is touched.
#[derive(Clone)]
pub struct LookupEngine {
    store: Arc<dyn LinkStore>,
    limits: LookupConfig,
}

impl LookupEngine {
    /// Creates an engine with the default limits (100, clamped at 1000).
    #[must_use]
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self::with_limits(store, LookupConfig::default())
    }

    /// Creates an engine with explicit limits.
    ///
    /// A zero default is raised to 1 and a maximum below the default is
    /// raised to the default.
    #[must_use]
    pub fn with_limits(store: Arc<dyn LinkStore>, limits: LookupConfig) -> Self {
        let default_limit = limits.default_limit.max(1);
        Self {
            store,
            limits: LookupConfig {
                default_limit,
                max_limit: limits.max_limit.max(default_limit),
            },
        }
    }

    /// The effective limits.
    #[must_use]
    pub const fn limits(&self) -> LookupConfig {
        self.limits
    }

    /// Turns a requested page size into the one actually used.
    ///
    /// Absent or zero means the default; anything above the maximum is
    /// clamped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a negative limit.
    pub fn resolve_limit(&self, requested: Option<i64>) -> Result<usize> {
        match requested {
            None | Some(0) => Ok(self.limits.default_limit),
            Some(n) if n < 0 => Err(Error::InvalidInput(format!(
                "limit must not be negative, got {n}"
            ))),
            Some(n) => Ok(usize::try_from(n)
                .unwrap_or(usize::MAX)
                .min(self.limits.max_limit)),
        }
    }

    /// Searches with an encoded cursor as received from a caller.
    ///
    /// An empty cursor string is treated as no cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty name or value, a negative
    /// limit or an undecodable cursor, and [`Error::OperationFailed`] if the
    /// store fails.
    pub fn search(
        &self,
        constraints: &[AssetLink],
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        let cursor = cursor
            .filter(|token| !token.is_empty())
            .map(Cursor::decode)
            .transpose()?;
        self.search_from(constraints, limit, cursor.as_ref())
    }

    /// Searches with an already decoded cursor.
    ///
    /// # Errors
    ///
    /// Same as [`LookupEngine::search`], minus cursor decoding.
    #[allow(clippy::cast_precision_loss)]
    #[instrument(
        skip_all,
        fields(constraints = constraints.len(), limit = ?limit, resumed = cursor.is_some())
    )]
    pub fn search_from(
        &self,
        constraints: &[AssetLink],
        limit: Option<i64>,
        cursor: Option<&Cursor>,
    ) -> Result<SearchPage> {
        let start = Instant::now();

        let limit = self.resolve_limit(limit)?;
        for link in constraints {
            link.validate()?;
        }

        let query = LinkQuery::new(distinct_constraints(constraints), limit)
            .starting_at(cursor.map(|c| c.shell_id().clone()));

        let result = self.store.search(&query);
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "lookup_searches_total",
            "backend" => self.store.backend_name(),
            "status" => status
        )
        .increment(1);

        let page = result?;
        metrics::histogram!("lookup_results_returned").record(page.ids.len() as f64);
        tracing::debug!(
            returned = page.ids.len(),
            has_more = page.next.is_some(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Lookup completed"
        );

        let next = page.next.map(Cursor::resume_at);
        Ok(SearchPage::new(page.ids, next.as_ref()))
    }
}

/// Collapses repeated constraints, keeping first-seen order.
fn distinct_constraints(constraints: &[AssetLink]) -> Vec<AssetLink> {
    let mut seen = HashSet::with_capacity(constraints.len());
    constraints
        .iter()
        .filter(|link| seen.insert(*link))
        .cloned()
        .collect()
}
