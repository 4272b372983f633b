//! Conditional writes guarded by `If-Match`.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BmcError, Result};
use crate::session::{Response, Session};

/// Attempts made before giving up with [`BmcError::ETagConflict`].
const MAX_ATTEMPTS: usize = 2;

/// PATCH `write_path` with the version tag read from `read_path`.
///
/// On `412 Precondition Failed` the tag is re-read and the write retried
/// exactly once. When the resource carries no tag the write is sent
/// unconditionally. Any other non-2xx status fails with [`BmcError::Api`].
///
/// # Errors
/// Returns [`BmcError::ETagConflict`] if both attempts are rejected.
pub async fn patch_if_match(
    session: &Session,
    read_path: &str,
    write_path: &str,
    body: &Value,
) -> Result<Response> {
    for attempt in 1..=MAX_ATTEMPTS {
        let etag = session.get(read_path).await?.error_for_status()?.etag();
        debug!(path = %write_path, etag = ?etag, attempt, "Conditional PATCH");

        let response = session.patch(write_path, body, etag.as_deref()).await?;
        if response.status != StatusCode::PRECONDITION_FAILED {
            return response.error_for_status();
        }

        warn!(path = %write_path, attempt, "ETag mismatch, refetching");
    }

    Err(BmcError::ETagConflict(write_path.to_string()))
}
