//! Tamper-evidence for vote payloads.
//!
//! The digest is SHA-256 over the payload's canonical JSON: every object's
//! keys sorted lexicographically, no insignificant whitespace. It is not a
//! secret and uses no key.

use std::collections::BTreeMap;

use rocket::serde::json::serde_json::{self, Value};
use sha2::{Digest, Sha256};

use crate::model::vote::{PayloadHash, VotePayload};

/// The exact bytes that get hashed for a payload.
pub fn canonical_bytes(payload: &VotePayload) -> Vec<u8> {
    let value = serde_json::to_value(payload).expect("Serialisation is infallible");
    serde_json::to_vec(&sort_keys(value)).expect("Serialisation is infallible")
}

/// Rebuild every object with its keys in sorted order. This holds whether
/// or not `serde_json` preserves insertion order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Compute the integrity hash of a payload.
pub fn hash_payload(payload: &VotePayload) -> PayloadHash {
    let digest: [u8; 32] = Sha256::digest(canonical_bytes(payload)).into();
    PayloadHash::from_digest(&digest)
}

/// Recompute a payload's hash and compare it to a stored one.
pub fn verify_payload(payload: &VotePayload, hash: &PayloadHash) -> bool {
    hash_payload(payload) == *hash
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::model::{candidate::Ballot, mongodb::Id, vote::Selection, vote::SelectionSet};
    use crate::protocol::build_payload;

    fn fixed_payload() -> VotePayload {
        VotePayload {
            election_id: "65f1c0ffee0000000000abcd".parse().unwrap(),
            timestamp: DateTime::parse_from_rfc3339("2024-03-01T09:30:00.123Z")
                .unwrap()
                .with_timezone(&Utc),
            selections: vec![
                Selection {
                    position: "President".to_string(),
                    candidate_id: "65f1c0ffee0000000000abce".parse().unwrap(),
                },
                Selection {
                    position: "Treasurer".to_string(),
                    candidate_id: "65f1c0ffee0000000000abcf".parse().unwrap(),
                },
            ],
        }
    }

    #[test]
    fn canonical_form_sorts_keys_at_every_level() {
        let bytes = canonical_bytes(&fixed_payload());
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"election_id":"65f1c0ffee0000000000abcd","selections":[{"candidate_id":"65f1c0ffee0000000000abce","position":"President"},{"candidate_id":"65f1c0ffee0000000000abcf","position":"Treasurer"}],"timestamp":"2024-03-01T09:30:00.123Z"}"#
        );
    }

    #[test]
    fn known_digest() {
        let hash = hash_payload(&fixed_payload());
        assert_eq!(
            hash.as_str(),
            "9a0f19558fcd78c60cb2c268e2b1b8875eb41b4bf473b04d5f46168ed5f141c8"
        );
        assert_eq!(hash.as_str().len(), PayloadHash::HEX_LEN);
    }

    #[test]
    fn verifies_its_own_hash() {
        let payload = fixed_payload();
        assert!(verify_payload(&payload, &hash_payload(&payload)));
    }

    #[test]
    fn any_single_field_change_breaks_verification() {
        let original = fixed_payload();
        let hash = hash_payload(&original);

        let mut changed = original.clone();
        changed.election_id = Id::new();
        assert!(!verify_payload(&changed, &hash));

        let mut changed = original.clone();
        changed.timestamp = changed.timestamp + Duration::milliseconds(1);
        assert!(!verify_payload(&changed, &hash));

        let mut changed = original.clone();
        changed.selections[0].candidate_id = Id::new();
        assert!(!verify_payload(&changed, &hash));

        let mut changed = original.clone();
        changed.selections[1].position = "Auditor".to_string();
        assert!(!verify_payload(&changed, &hash));

        let mut changed = original.clone();
        changed.selections.pop();
        assert!(!verify_payload(&changed, &hash));

        let mut changed = original;
        changed.selections.swap(0, 1);
        assert!(!verify_payload(&changed, &hash));
    }

    #[test]
    fn selection_order_does_not_affect_the_digest() {
        let ballot = Ballot::example();
        let choices: Vec<_> = SelectionSet::example(&ballot)
            .iter()
            .map(|(p, id)| (p.clone(), *id))
            .collect();

        let mut forwards = SelectionSet::new();
        for (position, id) in choices.iter() {
            forwards.select(position.clone(), *id);
        }
        let mut backwards = SelectionSet::new();
        for (position, id) in choices.iter().rev() {
            backwards.select(position.clone(), *id);
        }

        let now = Utc::now();
        let a = build_payload(&forwards, &ballot, now).unwrap();
        let b = build_payload(&backwards, &ballot, now).unwrap();
        assert_eq!(hash_payload(&a), hash_payload(&b));
    }

    #[test]
    fn stored_payloads_hash_the_same_after_a_round_trip() {
        let payload = fixed_payload();
        let json = serde_json::to_string(&payload).unwrap();
        let back: VotePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(hash_payload(&back), hash_payload(&payload));
    }
}
