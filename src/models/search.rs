//! Search result pages.

use serde::{Deserialize, Serialize};

use super::{Cursor, ShellId};

/// Paging information returned with every page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingMetadata {
    /// Encoded cursor for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One page of matching shell identifiers.
///
/// Serializes as `{"paging_metadata": {"cursor": ...}, "result": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Paging information.
    pub paging_metadata: PagingMetadata,
    /// Matching identifiers in ascending order.
    pub result: Vec<ShellId>,
}

impl SearchPage {
    /// Builds a page from identifiers and an optional continuation.
    #[must_use]
    pub fn new(result: Vec<ShellId>, next: Option<&Cursor>) -> Self {
        Self {
            paging_metadata: PagingMetadata {
                cursor: next.map(Cursor::encode),
            },
            result,
        }
    }

    /// The encoded cursor for the next page, if any.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging_metadata.cursor.as_deref()
    }

    /// Whether this is the last page.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.paging_metadata.cursor.is_none()
    }

    /// Identifiers as string slices.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.result.iter().map(ShellId::as_str).collect()
    }
}
