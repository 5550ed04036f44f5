//! Strict parsing of boundary JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{AssetLink, Reference, SpecificAssetId};
use crate::{Error, Result, codec};

/// A decoded search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// Constraints, all of which must match.
    pub asset_links: Vec<AssetLink>,
    /// Requested page size, if any.
    pub limit: Option<i64>,
    /// Encoded cursor, if any.
    pub cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SearchBody {
    asset_links: Option<Value>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct PairBody {
    name: String,
    value: String,
    #[serde(default)]
    external_subject_id: Option<Value>,
}

fn shape_error(what: &str, e: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("{what}: {e}"))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn expect_array<'a>(what: &str, value: &'a Value) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        Error::InvalidInput(format!("{what} must be an array, got {}", json_type(value)))
    })
}

fn parse_link(position: usize, element: &Value) -> Result<AssetLink> {
    if !element.is_object() {
        return Err(Error::InvalidInput(format!(
            "asset link {position} must be an object, got {}",
            json_type(element)
        )));
    }
    let link: AssetLink = serde_json::from_value(element.clone())
        .map_err(|e| shape_error(&format!("asset link {position}"), e))?;
    link.validate()?;
    Ok(link)
}

/// Parses a constraint list: an array of `{"name", "value"}` objects.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the value is not an array, an element
/// is not a two-string object, or a name or value is empty.
pub fn parse_asset_links(value: &Value) -> Result<Vec<AssetLink>> {
    expect_array("asset links", value)?
        .iter()
        .enumerate()
        .map(|(position, element)| parse_link(position, element))
        .collect()
}

/// Parses a search request body.
///
/// `assetLinks` is required and must be an array; it may be empty.
/// `limit` and `cursor` are optional and may be `null`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the body is not an object, has unknown
/// fields, lacks `assetLinks`, or any field has the wrong type.
pub fn parse_search_request(body: &Value) -> Result<SearchRequest> {
    if !body.is_object() {
        return Err(Error::InvalidInput(format!(
            "search request must be an object, got {}",
            json_type(body)
        )));
    }
    let parsed: SearchBody =
        serde_json::from_value(body.clone()).map_err(|e| shape_error("search request", e))?;

    let links = parsed
        .asset_links
        .ok_or_else(|| Error::InvalidInput("search request lacks assetLinks".to_string()))?;

    Ok(SearchRequest {
        asset_links: parse_asset_links(&links)?,
        limit: parsed.limit,
        cursor: parsed.cursor,
    })
}

/// Parses a replace body: an array of specific asset id objects.
///
/// `externalSubjectId`, when present, must be an object; it is kept
/// verbatim.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the body is not an array, an element
/// has the wrong shape, or a name or value is empty.
pub fn parse_specific_asset_ids(body: &Value) -> Result<Vec<SpecificAssetId>> {
    expect_array("specific asset ids", body)?
        .iter()
        .enumerate()
        .map(|(position, element)| {
            let what = format!("specific asset id {position}");
            if !element.is_object() {
                return Err(Error::InvalidInput(format!(
                    "{what} must be an object, got {}",
                    json_type(element)
                )));
            }
            let parsed: PairBody =
                serde_json::from_value(element.clone()).map_err(|e| shape_error(&what, e))?;

            let mut pair = SpecificAssetId::new(parsed.name, parsed.value);
            match parsed.external_subject_id {
                None | Some(Value::Null) => {},
                Some(subject @ Value::Object(_)) => {
                    pair = pair.with_external_subject_id(Reference::new(subject));
                },
                Some(other) => {
                    return Err(Error::InvalidInput(format!(
                        "{what}: externalSubjectId must be an object, got {}",
                        json_type(&other)
                    )));
                },
            }
            pair.validate()
                .map_err(|e| shape_error(&what, e))?;
            Ok(pair)
        })
        .collect()
}

/// Parses the query-string constraint form.
///
/// Each parameter holds one or more comma-separated base64url tokens, each
/// decoding to a JSON `{"name", "value"}` object. Empty pieces are skipped,
/// so an absent or empty parameter means no constraint.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a token is not base64url, does not
/// decode to JSON, or the JSON is not a valid constraint.
pub fn parse_encoded_asset_links<S: AsRef<str>>(params: &[S]) -> Result<Vec<AssetLink>> {
    params
        .iter()
        .flat_map(|param| param.as_ref().split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(position, token)| {
            let bytes = codec::decode(token)?;
            let element: Value = serde_json::from_slice(&bytes)
                .map_err(|e| shape_error(&format!("asset link {position}"), e))?;
            parse_link(position, &element)
        })
        .collect()
}

/// Parses a `limit` query parameter.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is not a decimal integer.
pub fn parse_limit_param(raw: Option<&str>) -> Result<Option<i64>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::InvalidInput(format!("limit '{s}' is not an integer")))
        })
        .transpose()
}
