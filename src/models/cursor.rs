//! Pagination cursors.

use std::fmt;

use super::ShellId;
use crate::Result;

/// Opaque keyset-pagination token.
///
/// Wraps the identifier of the first matching shell that was not returned on
/// the previous page. Only the lookup engine mints cursors; callers receive
/// them as encoded strings and hand them back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(ShellId);

impl Cursor {
    /// Mints a cursor that resumes at `shell`.
    pub(crate) const fn resume_at(shell: ShellId) -> Self {
        Self(shell)
    }

    /// Parses a cursor token received from a caller.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the token does not decode to
    /// a well-formed identifier.
    pub fn decode(token: &str) -> Result<Self> {
        ShellId::decode(token).map(Self)
    }

    /// Encodes the cursor for the caller.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0.encode()
    }

    /// The identifier the next page starts at.
    #[must_use]
    pub const fn shell_id(&self) -> &ShellId {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
