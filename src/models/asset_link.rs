//! Specific asset identifier pairs and search constraints.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Opaque reference attached to a pair as `externalSubjectId`.
///
/// The index stores and returns it verbatim and never searches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(serde_json::Value);

impl Reference {
    /// Wraps a JSON value.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the wrapped JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Serializes the reference for storage.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    /// Parses a stored reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the stored text is not JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| Error::OperationFailed {
                operation: "parse_external_subject_id".to_string(),
                cause: e.to_string(),
            })
    }
}

/// A specific asset identifier pair linked to a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificAssetId {
    /// Identifier name, e.g. `serialNumber`.
    pub name: String,
    /// Identifier value.
    pub value: String,
    /// Optional subject the identifier is meaningful for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_subject_id: Option<Reference>,
}

impl SpecificAssetId {
    /// Creates a pair without an external subject.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            external_subject_id: None,
        }
    }

    /// Attaches an external subject reference.
    #[must_use]
    pub fn with_external_subject_id(mut self, reference: Reference) -> Self {
        self.external_subject_id = Some(reference);
        self
    }

    /// Checks that name and value are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either field is empty.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("value", &self.value)
    }
}

/// One `(name, value)` constraint of a search.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetLink {
    /// Identifier name that must match exactly.
    pub name: String,
    /// Identifier value that must match exactly.
    pub value: String,
}

impl AssetLink {
    /// Creates a constraint.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Checks that name and value are present.
    ///
    /// An empty value is rejected rather than treated as a wildcard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either field is empty.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("value", &self.value)
    }
}

impl fmt::Display for AssetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

fn require_non_empty(field: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(Error::InvalidInput(format!(
            "asset link {field} must not be empty"
        )));
    }
    Ok(())
}
