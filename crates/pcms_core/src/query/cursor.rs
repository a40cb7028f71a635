//! Opaque page cursor codec.
//!
//! A cursor is base64url (no padding) of a small JSON document carrying the
//! sort key it was minted for and the last row's `(value, id)` position.

use crate::model::content::ContentId;
use crate::repo::content_repo::{PagePosition, SortKey, SortValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    sort: SortKey,
    value: SortValue,
    id: ContentId,
}

/// Encodes a page position for the given sort key.
pub fn encode_cursor(sort: SortKey, position: &PagePosition) -> Result<String, serde_json::Error> {
    let payload = CursorPayload {
        sort,
        value: position.value.clone(),
        id: position.id,
    };
    let json = serde_json::to_vec(&payload)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a cursor into the sort key it was minted for and its position.
///
/// Returns a human-readable reason on malformed input.
pub fn decode_cursor(token: &str) -> Result<(SortKey, PagePosition), String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|err| format!("cursor is not valid base64url: {err}"))?;
    let payload: CursorPayload = serde_json::from_slice(&bytes)
        .map_err(|err| format!("cursor payload is malformed: {err}"))?;
    Ok((
        payload.sort,
        PagePosition {
            value: payload.value,
            id: payload.id,
        },
    ))
}
