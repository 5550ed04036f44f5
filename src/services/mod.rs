//! Business logic services.
//!
//! - [`LookupEngine`]: AND-search, limits and cursors over a link store
//! - [`DiscoveryService`]: the boundary operations on encoded identifiers
//! - [`BackendFactory`]: opens the configured link store

mod backend_factory;
mod discovery;
mod lookup;

pub use backend_factory::BackendFactory;
pub use discovery::DiscoveryService;
pub use lookup::LookupEngine;
