//! Wire protocol types and request dispatch.
//!
//! One buffered request document comes in, one reply document goes out.
//! Requests that are not well-formed JSON are dropped without a reply;
//! requests missing a field, including an absent or unrecognized `mode`,
//! get the [`MISSING_FIELD_MARK`] in place of their execution path so the
//! connection survives a sloppy client.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::db::Notebook;

/// Marker returned in place of `execPath` when a required field is absent.
pub const MISSING_FIELD_MARK: &str = "E";

#[derive(Debug, Error)]
enum RequestError {
    #[error("request is not a well-formed document: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("reply serialization failed: {0}")]
    Encode(#[source] serde_json::Error),
}

// `mode` stays a free-form string through parsing: an unknown value is a
// missing-field condition answered with the marker, not a parse failure.
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Payload {
    key: Option<String>,
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct InsertReply {
    #[serde(rename = "execPath")]
    exec_path: String,
}

#[derive(Debug, Serialize)]
struct SearchReply {
    #[serde(rename = "queryResult")]
    query_result: Vec<String>,
    #[serde(rename = "matchedNum")]
    matched_num: usize,
    #[serde(rename = "comparedStr")]
    compared_str: usize,
    #[serde(rename = "comparedChar")]
    compared_char: usize,
    #[serde(rename = "comparedBit")]
    compared_bit: usize,
    #[serde(rename = "execPath")]
    exec_path: String,
}

#[derive(Debug, Serialize)]
struct TreeReply {
    #[serde(rename = "notebookJson")]
    notebook_json: String,
}

/// Handle one buffered request, returning the serialized reply.
///
/// `None` means the request was dropped (unparseable, or the reply could
/// not be encoded); the caller keeps the connection open either way.
pub fn handle_request(notebook: &Notebook, raw: &[u8]) -> Option<Vec<u8>> {
    match dispatch(notebook, raw) {
        Ok(reply) => Some(reply),
        Err(err) => {
            warn!(%err, "dropping request");
            None
        }
    }
}

fn dispatch(notebook: &Notebook, raw: &[u8]) -> Result<Vec<u8>, RequestError> {
    let request: Request = serde_json::from_slice(raw).map_err(RequestError::Parse)?;
    let payload = request.payload.unwrap_or_default();

    match request.mode.as_deref() {
        Some("insert") => match (payload.key, payload.data) {
            (Some(key), Some(data)) => {
                let exec_path = notebook.insert(&key, data);
                encode(&InsertReply { exec_path })
            }
            _ => {
                warn!("insert request without key/data");
                encode(&InsertReply {
                    exec_path: MISSING_FIELD_MARK.to_string(),
                })
            }
        },
        Some("search") => match payload.key {
            Some(key) => {
                let found = notebook.search(&key);
                encode(&SearchReply {
                    matched_num: found.results.len(),
                    query_result: found.results,
                    compared_str: found.stats.compared_str,
                    compared_char: found.stats.compared_char,
                    compared_bit: found.stats.compared_bit,
                    exec_path: found.exec_path,
                })
            }
            None => {
                warn!("search request without key");
                encode(&SearchReply {
                    query_result: Vec::new(),
                    matched_num: 0,
                    compared_str: 0,
                    compared_char: 0,
                    compared_bit: 0,
                    exec_path: MISSING_FIELD_MARK.to_string(),
                })
            }
        },
        Some("get_tree") => {
            let doc = notebook.snapshot();
            let notebook_json = serde_json::to_string(&doc).map_err(RequestError::Encode)?;
            encode(&TreeReply { notebook_json })
        }
        other => {
            warn!(mode = ?other, "request without a recognized mode");
            encode(&InsertReply {
                exec_path: MISSING_FIELD_MARK.to_string(),
            })
        }
    }
}

fn encode<T: Serialize>(reply: &T) -> Result<Vec<u8>, RequestError> {
    serde_json::to_vec(reply).map_err(RequestError::Encode)
}
