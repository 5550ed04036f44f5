//! Boundary input shapes.
//!
//! A transport hands raw JSON bodies and query parameters to these
//! functions and gets typed, validated values back. Every shape is strict:
//! wrong JSON types, missing fields and unknown fields are rejected with
//! [`crate::Error::InvalidInput`], never coerced.
//!
//! | Input | Shape | Parser |
//! |-------|-------|--------|
//! | Replace body | `[{"name", "value", "externalSubjectId"?}, ...]` | [`parse_specific_asset_ids`] |
//! | Search body | `{"assetLinks": [{"name", "value"}, ...], "limit"?, "cursor"?}` | [`parse_search_request`] |
//! | Query form | `assetIds=<b64url JSON>[,<b64url JSON>...]`, repeatable | [`parse_encoded_asset_links`] |
//! | Query limit | decimal integer | [`parse_limit_param`] |

mod validation;

pub use validation::{
    SearchRequest, parse_asset_links, parse_encoded_asset_links, parse_limit_param,
    parse_search_request, parse_specific_asset_ids,
};
