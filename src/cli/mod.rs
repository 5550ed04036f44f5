//! CLI command implementations.
//!
//! Each command returns the JSON document the binary prints on stdout.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `put` | Replace the link set of a shell |
//! | `get` | Show the link set of a shell |
//! | `delete` | Remove the link set of a shell |
//! | `search` | Find shells carrying every given link |
//! | `encode` / `decode` | Convert identifiers to and from base64url |
//! | `config` | Show the effective configuration |
//!
//! ```bash
//! discovery-index put urn:aas:example:pump-7 --link serialNumber=SN-0007 --link batch=B-7
//! discovery-index search --link batch=B-7 --limit 10
//! discovery-index get "$(discovery-index encode urn:aas:example:pump-7 | jq -r .encoded)" --encoded
//! ```

mod config;
mod links;

pub use config::show_config;
pub use links::{SearchArgs, delete, get, put, search};

use std::io::Read;

use serde_json::{Value, json};

use crate::models::AssetLink;
use crate::{Error, Result, codec};

/// Returns the encoded form of a shell identifier given on the command line.
///
/// Raw identifiers are encoded; `encoded` passes the token through so the
/// service decodes it exactly as a transport would.
#[must_use]
pub fn shell_token(shell_id: &str, encoded: bool) -> String {
    if encoded {
        shell_id.to_string()
    } else {
        codec::encode_str(shell_id)
    }
}

/// Parses a `name=value` argument.
///
/// Only the first `=` separates; the value may contain more.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if there is no `=` or either side is
/// empty.
pub fn parse_link_arg(arg: &str) -> Result<AssetLink> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| Error::InvalidInput(format!("link '{arg}' is not name=value")))?;
    let link = AssetLink::new(name, value);
    link.validate()?;
    Ok(link)
}

/// Reads a JSON document from a file, or from stdin when `source` is `-`.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the source cannot be read and
/// [`Error::InvalidInput`] if it is not JSON.
pub fn read_json_input(source: &str) -> Result<Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| Error::OperationFailed {
                operation: "read_stdin".to_string(),
                cause: e.to_string(),
            })?;
        buf
    } else {
        std::fs::read_to_string(source).map_err(|e| Error::OperationFailed {
            operation: "read_json_file".to_string(),
            cause: format!("{source}: {e}"),
        })?
    };
    serde_json::from_str(&text).map_err(|e| Error::InvalidInput(format!("{source}: {e}")))
}

/// `encode`: plaintext to base64url.
#[must_use]
pub fn encode(text: &str) -> Value {
    json!({ "plain": text, "encoded": codec::encode_str(text) })
}

/// `decode`: base64url to plaintext.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the token is not base64url UTF-8.
pub fn decode(token: &str) -> Result<Value> {
    Ok(json!({ "encoded": token, "plain": codec::decode_str(token)? }))
}
