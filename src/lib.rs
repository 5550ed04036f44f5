//! # discovery-index
//!
//! Discovery index for an asset-registry ecosystem.
//!
//! Each shell identifier owns a *link set*: the full collection of
//! specific asset identifier pairs (`name`, `value`, optional
//! `externalSubjectId`) under which the shell can be discovered. The crate
//! stores link sets transactionally and resolves shells that satisfy every
//! one of an arbitrary number of `(name, value)` constraints, with keyset
//! pagination over the shell identifier.
//!
//! ## Layers
//!
//! - [`storage`]: durable [`LinkStore`] backends (`SQLite`, PostgreSQL)
//! - [`services::LookupEngine`]: AND-search, cursors, limits
//! - [`services::DiscoveryService`]: the four boundary operations
//!   (`replace`, `get`, `remove`, `search`) on encoded identifiers
//! - [`io`]: strict JSON shapes accepted at the boundary
//! - [`cli`]: command implementations behind the `discovery-index` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use discovery_index::services::DiscoveryService;
//! use discovery_index::storage::SqliteLinkStore;
//! use discovery_index::{AssetLink, SpecificAssetId, codec};
//!
//! let store = Arc::new(SqliteLinkStore::in_memory()?);
//! let service = DiscoveryService::with_defaults(store);
//!
//! let shell = codec::encode_str("urn:aas:example:pump-7");
//! service.replace(&shell, &[SpecificAssetId::new("serialNumber", "SN-0007")])?;
//! let page = service.search(&[AssetLink::new("serialNumber", "SN-0007")], Some(10), None)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod codec;
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::DiscoveryConfig;
pub use models::{AssetLink, Cursor, Reference, SearchPage, ShellId, SpecificAssetId};
pub use services::{DiscoveryService, LookupEngine};
pub use storage::LinkStore;

/// Error type for discovery operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Undecodable identifier or cursor, wrong JSON shape, empty name/value, negative limit |
/// | `NotFound` | The shell has no link set |
/// | `OperationFailed` | Transaction, connection or query failure in the backing store |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Always caller-correctable; never worth retrying unchanged.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The addressed shell has no link set.
    #[error("not found: {0}")]
    NotFound(String),

    /// A storage operation failed.
    ///
    /// Raised when:
    /// - A transaction cannot be started, committed or is rolled back
    /// - The database cannot be opened or the pool cannot hand out a client
    /// - A query or row conversion fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Coarse classification of [`Error`], for transports that map outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable input problem.
    Validation,
    /// Expected absence of a link set.
    NotFound,
    /// Fault in the backing store.
    Storage,
}

impl ErrorKind {
    /// HTTP status code conventionally used for this kind.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Storage => 500,
        }
    }
}

impl Error {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::OperationFailed { .. } => ErrorKind::Storage,
        }
    }

    /// Whether replaying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage)
    }
}

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;
