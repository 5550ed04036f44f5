//! The discovery facade called by transports.

use std::sync::Arc;

use tracing::instrument;

use crate::config::LookupConfig;
use crate::io::SearchRequest;
use crate::models::{AssetLink, SearchPage, ShellId, SpecificAssetId};
use crate::services::LookupEngine;
use crate::storage::LinkStore;
use crate::{Error, Result};

/// Replace, get, remove and search over encoded shell identifiers.
///
/// Shell identifiers arrive base64url encoded, exactly as they appear in a
/// path segment. Every operation decodes and validates its input before
/// the store is touched, so a rejected request never mutates anything.
///
/// # Example
///
/// ```rust,ignore
/// let service = DiscoveryService::with_defaults(Arc::new(SqliteLinkStore::in_memory()?));
/// let shell = codec::encode_str("urn:aas:example:pump-7");
///
/// service.replace(&shell, &[SpecificAssetId::new("serialNumber", "SN-0007")])?;
/// let page = service.search(&[AssetLink::new("serialNumber", "SN-0007")], None, None)?;
/// assert_eq!(page.ids(), vec!["urn:aas:example:pump-7"]);
/// ```
#[derive(Clone)]
pub struct DiscoveryService {
    store: Arc<dyn LinkStore>,
    lookup: LookupEngine,
}

impl DiscoveryService {
    /// Creates a service with explicit lookup limits.
    #[must_use]
    pub fn new(store: Arc<dyn LinkStore>, limits: LookupConfig) -> Self {
        let lookup = LookupEngine::with_limits(Arc::clone(&store), limits);
        Self { store, lookup }
    }

    /// Creates a service with the default lookup limits.
    #[must_use]
    pub fn with_defaults(store: Arc<dyn LinkStore>) -> Self {
        Self::new(store, LookupConfig::default())
    }

    /// The lookup engine used for searches.
    #[must_use]
    pub const fn lookup(&self) -> &LookupEngine {
        &self.lookup
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LinkStore> {
        &self.store
    }

    /// Replaces the link set of a shell.
    ///
    /// An empty `pairs` slice removes the shell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an undecodable identifier or an
    /// invalid pair, and [`Error::OperationFailed`] if the store fails.
    #[instrument(skip_all, fields(operation = "replace", pairs = pairs.len()))]
    pub fn replace(&self, encoded_shell_id: &str, pairs: &[SpecificAssetId]) -> Result<()> {
        observe("replace", self.replace_inner(encoded_shell_id, pairs))
    }

    fn replace_inner(&self, encoded_shell_id: &str, pairs: &[SpecificAssetId]) -> Result<()> {
        let shell = ShellId::decode(encoded_shell_id)?;
        self.store.put(&shell, pairs)?;
        tracing::info!(shell_id = %shell, pairs = pairs.len(), "Replaced link set");
        Ok(())
    }

    /// Returns the link set of a shell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an undecodable identifier and
    /// [`Error::NotFound`] if the shell has no link set.
    #[instrument(skip_all, fields(operation = "get"))]
    pub fn get(&self, encoded_shell_id: &str) -> Result<Vec<SpecificAssetId>> {
        observe(
            "get",
            ShellId::decode(encoded_shell_id).and_then(|shell| self.store.get(&shell)),
        )
    }

    /// Removes the link set of a shell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an undecodable identifier and
    /// [`Error::NotFound`] if the shell has no link set.
    #[instrument(skip_all, fields(operation = "remove"))]
    pub fn remove(&self, encoded_shell_id: &str) -> Result<()> {
        observe(
            "remove",
            ShellId::decode(encoded_shell_id).and_then(|shell| {
                self.store.delete(&shell)?;
                tracing::info!(shell_id = %shell, "Removed link set");
                Ok(())
            }),
        )
    }

    /// Finds shells carrying every constraint.
    ///
    /// # Errors
    ///
    /// See [`LookupEngine::search`].
    pub fn search(
        &self,
        constraints: &[AssetLink],
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        observe("search", self.lookup.search(constraints, limit, cursor))
    }

    /// Runs a parsed search request.
    ///
    /// # Errors
    ///
    /// See [`LookupEngine::search`].
    pub fn search_request(&self, request: &SearchRequest) -> Result<SearchPage> {
        self.search(
            &request.asset_links,
            request.limit,
            request.cursor.as_deref(),
        )
    }
}

/// Counts rejected requests before handing the result back.
fn observe<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(Error::InvalidInput(reason)) = &result {
        metrics::counter!("discovery_validation_failures_total", "operation" => operation)
            .increment(1);
        tracing::debug!(operation, reason = %reason, "Rejected request");
    }
    result
}
