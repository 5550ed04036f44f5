//! Shell identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result, codec};

/// Globally unique identifier of a shell.
///
/// Opaque to the index: any non-empty UTF-8 string is accepted. Ordering is
/// byte-wise over the UTF-8 representation, which is the order search results
/// and cursors are defined on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShellId(String);

impl ShellId {
    /// Creates a shell identifier from its plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the identifier is empty.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidInput(
                "shell identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Decodes a base64url token into a shell identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the token is not base64url, does not
    /// decode to UTF-8, or decodes to an empty string.
    pub fn decode(token: &str) -> Result<Self> {
        Self::new(codec::decode_str(token)?)
    }

    /// Encodes the identifier for transport in a path segment or cursor.
    #[must_use]
    pub fn encode(&self) -> String {
        codec::encode_str(&self.0)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ShellId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShellId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ShellId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ShellId> for String {
    fn from(id: ShellId) -> Self {
        id.0
    }
}
