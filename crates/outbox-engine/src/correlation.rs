//! Correlation id generation.
//!
//! `"<app_id>:<base64url(sha256(payload))>:<uuidv7>"`. The first two
//! segments are a deterministic function of `(app_id, payload)`, giving
//! consumers a stable value to compare across redeliveries; the uuidv7
//! suffix carries a millisecond timestamp for rough temporal ordering and
//! is what makes repeated calls with identical inputs still unique.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Mints a new correlation id for `payload` dispatched by `app_id`.
pub fn new_correlation_id(app_id: &str, payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    let content_hash = URL_SAFE.encode(digest);
    format!("{app_id}:{content_hash}:{}", Uuid::now_v7())
}

/// The deterministic `app_id:content_hash` prefix shared by every
/// correlation id minted for the same `(app_id, payload)` pair, regardless
/// of the unique uuid suffix. Exposed for consumer-side dedup callers that
/// want to compare on content rather than the full id.
pub fn content_prefix(app_id: &str, payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    format!("{app_id}:{}", URL_SAFE.encode(digest))
}
