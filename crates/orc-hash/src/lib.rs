//! Canonical hashing — the Hasher (C1).
//!
//! One canonicalization routine, reused by the Artifact Ledger (content
//! hashes) and the Event Log (hash chain). Changing the canonical form here
//! is a breaking protocol version bump for every stored hash.

use orc_schemas::Event;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sort object keys so two semantically equal values always
/// serialize to the same bytes.
pub fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Canonical compact JSON string for any serializable value.
pub fn canonical_json<T: Serialize>(v: &T) -> Result<String, serde_json::Error> {
    let raw = serde_json::to_value(v)?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted)
}

/// SHA-256 over the canonical JSON form, hex-encoded.
pub fn hash_value<T: Serialize>(v: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(v)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Content hash for an artifact body. Never includes `created_at` or any
/// other wall-clock field — callers pass only the hashable payload.
pub fn content_hash(content: &Value, input_hashes: &[String]) -> String {
    #[derive(Serialize)]
    struct Hashable<'a> {
        content: &'a Value,
        input_hashes: &'a [String],
    }
    let h = Hashable {
        content,
        input_hashes,
    };
    hash_value(&h).expect("serde_json::Value always serializes")
}

/// Hash chain link for an `Event`. `created_at` is excluded by construction:
/// the hashed payload is the event with `hash_self` cleared, never the
/// `created_at` timestamp.
pub fn compute_event_hash(ev: &Event) -> String {
    #[derive(Serialize)]
    struct Hashable<'a> {
        request_id: &'a uuid::Uuid,
        seq: u64,
        event_type: &'a str,
        payload: &'a Value,
        hash_prev: &'a Option<String>,
    }
    let h = Hashable {
        request_id: &ev.request_id,
        seq: ev.seq,
        event_type: &ev.event_type,
        payload: &ev.payload,
        hash_prev: &ev.hash_prev,
    };
    hash_value(&h).expect("serde_json::Value always serializes")
}

/// Result of verifying a sequence of events' hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { count: usize },
    Broken { seq: u64, reason: String },
}

/// Verify that `events` (already ordered by `seq`) form an unbroken hash
/// chain: each `hash_prev` matches the previous `hash_self`, and each
/// `hash_self` is the correct recomputation of its own content.
pub fn verify_chain(events: &[Event]) -> VerifyResult {
    let mut prev_hash: Option<String> = None;
    for (i, ev) in events.iter().enumerate() {
        if ev.hash_prev != prev_hash {
            return VerifyResult::Broken {
                seq: ev.seq,
                reason: format!(
                    "hash_prev mismatch at index {i}: expected {prev_hash:?}, got {:?}",
                    ev.hash_prev
                ),
            };
        }
        let recomputed = compute_event_hash(ev);
        if recomputed != ev.hash_self {
            return VerifyResult::Broken {
                seq: ev.seq,
                reason: format!(
                    "hash_self mismatch at seq {}: claimed {}, recomputed {}",
                    ev.seq, ev.hash_self, recomputed
                ),
            };
        }
        prev_hash = Some(ev.hash_self.clone());
    }
    VerifyResult::Valid {
        count: events.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn make_chain(n: usize) -> Vec<Event> {
        let request_id = Uuid::new_v4();
        let mut events = Vec::new();
        let mut prev: Option<String> = None;
        for i in 0..n {
            let mut ev = Event {
                event_id: Uuid::new_v4(),
                request_id,
                seq: i as u64,
                event_type: format!("test_event_{i}"),
                payload: json!({"index": i}),
                hash_prev: prev.clone(),
                hash_self: String::new(),
                created_at: Utc::now(),
            };
            let h = compute_event_hash(&ev);
            ev.hash_self = h.clone();
            prev = Some(h);
            events.push(ev);
        }
        events
    }

    #[test]
    fn untampered_chain_verifies() {
        let events = make_chain(5);
        assert_eq!(verify_chain(&events), VerifyResult::Valid { count: 5 });
    }

    #[test]
    fn tampered_payload_detected() {
        let mut events = make_chain(5);
        events[2].payload = json!({"index": "TAMPERED"});
        match verify_chain(&events) {
            VerifyResult::Broken { seq, reason } => {
                assert_eq!(seq, 2);
                assert!(reason.contains("hash_self mismatch"));
            }
            other => panic!("expected broken chain, got {other:?}"),
        }
    }

    #[test]
    fn removed_event_breaks_chain() {
        let mut events = make_chain(5);
        events.remove(2);
        match verify_chain(&events) {
            VerifyResult::Broken { reason, .. } => {
                assert!(reason.contains("hash_prev mismatch"));
            }
            other => panic!("expected broken chain, got {other:?}"),
        }
    }

    #[test]
    fn empty_chain_is_valid() {
        assert_eq!(verify_chain(&[]), VerifyResult::Valid { count: 0 });
    }

    #[test]
    fn canonical_json_is_key_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }
}
