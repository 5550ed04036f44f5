//! Link storage.
//!
//! - [`LinkStore`]: the trait every backend implements
//! - [`SqliteLinkStore`]: default backend, file-backed or in-memory
//! - `PostgresLinkStore`: server backend (feature `postgres`)
//!
//! Backends share one relational layout and one search statement
//! ([`query`]), so both produce identical pages for identical data.

// Dropping a connection guard slightly early buys nothing here.
#![allow(clippy::significant_drop_tightening)]

pub mod metrics;
pub mod query;
pub mod sqlite;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod migrations;
#[cfg(feature = "postgres")]
pub mod postgresql;

#[cfg(feature = "postgres")]
pub use postgresql::PostgresLinkStore;
pub use sqlite::SqliteLinkStore;
pub use traits::{LinkQuery, LinkStore, ShellPage};
