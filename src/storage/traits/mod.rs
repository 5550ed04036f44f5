//! Storage backend traits.

mod link_store;

pub use link_store::{LinkQuery, LinkStore, ShellPage, distinct_pairs, validate_pairs};
