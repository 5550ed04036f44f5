//! Link set commands.

use serde_json::{Value, json};

use super::{parse_link_arg, read_json_input, shell_token};
use crate::io::{
    SearchRequest, parse_encoded_asset_links, parse_search_request, parse_specific_asset_ids,
};
use crate::models::SpecificAssetId;
use crate::services::DiscoveryService;
use crate::{Error, Result};

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::OperationFailed {
        operation: "render_output".to_string(),
        cause: e.to_string(),
    })
}

/// `put`: replaces the link set from `--link` arguments and/or a JSON body.
///
/// At least one source is required. An explicit empty JSON array removes
/// the shell.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if neither source is given or the input
/// is invalid, and a storage error if the store fails.
pub fn put(
    service: &DiscoveryService,
    shell_id: &str,
    encoded: bool,
    links: &[String],
    json_source: Option<&str>,
) -> Result<Value> {
    if links.is_empty() && json_source.is_none() {
        return Err(Error::InvalidInput(
            "put needs at least one --link or --json; use delete to remove a shell".to_string(),
        ));
    }

    let mut pairs = match json_source {
        Some(source) => parse_specific_asset_ids(&read_json_input(source)?)?,
        None => Vec::new(),
    };
    for arg in links {
        let link = parse_link_arg(arg)?;
        pairs.push(SpecificAssetId::new(link.name, link.value));
    }

    let token = shell_token(shell_id, encoded);
    service.replace(&token, &pairs)?;
    Ok(json!({ "shell_id": token, "pairs": pairs.len() }))
}

/// `get`: prints the link set.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the shell has no link set.
pub fn get(service: &DiscoveryService, shell_id: &str, encoded: bool) -> Result<Value> {
    to_json(&service.get(&shell_token(shell_id, encoded))?)
}

/// `delete`: removes the link set.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the shell has no link set.
pub fn delete(service: &DiscoveryService, shell_id: &str, encoded: bool) -> Result<Value> {
    let token = shell_token(shell_id, encoded);
    service.remove(&token)?;
    Ok(json!({ "deleted": token }))
}

/// Arguments of the `search` command.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    /// `name=value` constraints.
    pub links: Vec<String>,
    /// Query-string style base64url JSON constraints.
    pub asset_ids: Vec<String>,
    /// Search body file (`-` for stdin).
    pub json_source: Option<String>,
    /// Requested page size.
    pub limit: Option<i64>,
    /// Encoded cursor from a previous page.
    pub cursor: Option<String>,
}

/// `search`: prints one result page.
///
/// Constraints from every source are combined. Explicit `limit` and
/// `cursor` arguments override those in a JSON body.
///
/// # Errors
///
/// Returns an error if any input is invalid or the store fails.
pub fn search(service: &DiscoveryService, args: &SearchArgs) -> Result<Value> {
    let mut request = match &args.json_source {
        Some(source) => parse_search_request(&read_json_input(source)?)?,
        None => SearchRequest::default(),
    };
    request
        .asset_links
        .extend(parse_encoded_asset_links(&args.asset_ids)?);
    for arg in &args.links {
        request.asset_links.push(parse_link_arg(arg)?);
    }
    if args.limit.is_some() {
        request.limit = args.limit;
    }
    if args.cursor.is_some() {
        request.cursor.clone_from(&args.cursor);
    }

    to_json(&service.search_request(&request)?)
}
