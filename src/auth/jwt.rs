// Bearer token inspection
// Reads the `exp` claim of a JWT without verifying its signature

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Tokens with this many seconds or less left are treated as expired,
/// so they cannot lapse while the request is in flight.
pub const EXPIRY_LEEWAY_SECS: f64 = 10.0;

/// The only claim we care about
#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Check whether a bearer token is expired (or about to be).
///
/// Signatures are never checked: the server decides whether a token is
/// authentic. Anything we cannot read (empty string, wrong number of
/// segments, bad base64, non-JSON payload, missing `exp`) counts as expired,
/// which pushes the caller towards a refresh instead of a decode error.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Same as [`is_expired`] against an explicit clock
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    let Some(exp) = expiry_claim(token) else {
        return true;
    };

    let now = now.timestamp_millis() as f64 / 1000.0;
    exp - now <= EXPIRY_LEEWAY_SECS
}

/// Expiration time of a token, if it carries a readable `exp` claim
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = expiry_claim(token)?;
    DateTime::from_timestamp_millis((exp * 1000.0) as i64)
}

fn expiry_claim(token: &str) -> Option<f64> {
    decode_claims(token)?.exp
}

fn decode_claims(token: &str) -> Option<Claims> {
    if token.is_empty() {
        return None;
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return None;
    };

    // The header must at least be a JSON object, like any parser would demand
    let _: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&decode_segment(header)?).ok()?;

    serde_json::from_slice(&decode_segment(payload)?).ok()
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .ok()
}
