//! Opaque pagination cursors for [`crate::manager::TaskManager::list`].
//!
//! A cursor encodes the last-seen sort key (`created_at`, `task_id`) so a
//! follow-up call can resume exactly where the previous page ended without
//! the caller needing to understand the ordering itself.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};

/// Encode the last key on a returned page as an opaque, URL-safe-ish token.
pub fn encode(created_at: DateTime<Utc>, task_id: &str) -> String {
    let raw = format!("{}:{}", created_at.timestamp_nanos_opt().unwrap_or(0), task_id);
    STANDARD.encode(raw)
}

/// Decode a cursor produced by [`encode`]. Malformed cursors decode to
/// `None`, which callers should treat as "start from the first page".
pub fn decode(cursor: &str) -> Option<(DateTime<Utc>, String)> {
    let raw = STANDARD.decode(cursor).ok()?;
    let raw = String::from_utf8(raw).ok()?;
    let (nanos, task_id) = raw.split_once(':')?;
    let nanos: i64 = nanos.parse().ok()?;
    let created_at = DateTime::from_timestamp_nanos(nanos);
    Some((created_at, task_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_and_decode() {
        let now = Utc::now();
        let cursor = encode(now, "abc123");
        let (decoded_at, decoded_id) = decode(&cursor).expect("cursor should decode");
        assert_eq!(decoded_id, "abc123");
        assert_eq!(decoded_at.timestamp_nanos_opt(), now.timestamp_nanos_opt());
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(decode("not valid base64 at all!!").is_none());
    }
}
