//! Request signing
//!
//! Every call to the flo API carries an `x-api-hash` header holding
//! `hex(HMAC-SHA256(secret, lowercase(verb) + ":" + path + ":" + timestamp + body))`.
//! The server recomputes the same digest from the headers it receives, so the
//! path, timestamp and body given here must be byte-for-byte what goes on the wire.

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded request signature
pub fn sign(secret: &str, verb: &str, path: &str, timestamp: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");

    mac.update(verb.to_lowercase().as_bytes());
    mac.update(b":");
    mac.update(path.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

/// Serializes a request body the way it is signed: empty when absent, JSON text otherwise
pub fn serialize_body(body: Option<&Value>) -> String {
    body.map(Value::to_string).unwrap_or_default()
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
