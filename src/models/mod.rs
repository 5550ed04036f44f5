//! Data models for the discovery index.
//!
//! - [`ShellId`]: caller-supplied shell identifier
//! - [`SpecificAssetId`]: one stored `(name, value, externalSubjectId?)` pair
//! - [`AssetLink`]: one `(name, value)` search constraint
//! - [`Cursor`]: opaque pagination token
//! - [`SearchPage`]: one page of search results

mod asset_link;
mod cursor;
mod search;
mod shell;

pub use asset_link::{AssetLink, Reference, SpecificAssetId};
pub use cursor::Cursor;
pub use search::{PagingMetadata, SearchPage};
pub use shell::ShellId;
