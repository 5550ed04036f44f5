//! `SQLite` link store.
//!
//! - [`connection`]: mutex handling and pragmas
//! - [`link_store`]: the [`SqliteLinkStore`] itself

mod connection;
mod link_store;

pub use connection::{acquire_lock, configure_connection};
pub use link_store::SqliteLinkStore;
