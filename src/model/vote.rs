use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::mongodb::Id;

/// A voter's in-progress choices: position label to chosen candidate.
///
/// Keyed by position, so a position can only be filled once, and iteration
/// order is the lexicographic order of position labels regardless of the
/// order in which choices were made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeMap<String, Id>);

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose a candidate for a position, replacing any earlier choice.
    pub fn select(&mut self, position: impl Into<String>, candidate: Id) -> Option<Id> {
        self.0.insert(position.into(), candidate)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Id)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Id)> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = (String, Id)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One entry of a vote payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub position: String,
    pub candidate_id: Id,
}

/// The canonical record of a voter's choices, as hashed and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotePayload {
    pub election_id: Id,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// One entry per ballot position, ordered by position label.
    pub selections: Vec<Selection>,
}

/// Timestamps are kept at millisecond precision in `Z`-suffixed RFC 3339, so
/// a payload read back from storage hashes exactly as it did when built.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

/// A random per-vote token. It carries no information about the voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VoteToken(Uuid);

impl VoteToken {
    /// Generate a fresh random (version 4) token.
    pub fn generate() -> Self {
        Self(uuid::Builder::from_random_bytes(rand::random()).into_uuid())
    }
}

impl Display for VoteToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for VoteToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl TryFrom<String> for VoteToken {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VoteToken> for String {
    fn from(token: VoteToken) -> Self {
        token.to_string()
    }
}

impl<'a> FromParam<'a> for VoteToken {
    type Error = uuid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for VoteToken {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] VoteToken);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid payload hash '{0}': expected 64 lowercase hex characters")]
pub struct PayloadHashError(String);

/// Hex-encoded SHA-256 digest of a canonicalised [`VotePayload`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PayloadHash(String);

impl PayloadHash {
    pub const HEX_LEN: usize = 64;

    /// Hex-encode a raw SHA-256 digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(HEXLOWER.encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PayloadHash {
    type Err = PayloadHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == Self::HEX_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(PayloadHashError(s.to_string()))
        }
    }
}

impl TryFrom<String> for PayloadHash {
    type Error = PayloadHashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PayloadHash> for String {
    fn from(hash: PayloadHash) -> Self {
        hash.0
    }
}

impl Display for PayloadHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted vote. Append-only and anonymous: nothing here identifies the
/// voter who cast it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(rename = "_id")]
    pub vote_token: VoteToken,
    pub election_id: Id,
    pub payload: VotePayload,
    pub payload_hash: PayloadHash,
}

/// What the voter gets back after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub election_id: Id,
    pub vote_token: VoteToken,
    pub payload_hash: PayloadHash,
    pub submitted_at: DateTime<Utc>,
}


#[cfg(test)]
mod tests {
    use super::*;
    use rocket::serde::json::serde_json;

    #[test]
    fn tokens_are_random_v4_uuids() {
        let a = VoteToken::generate();
        let b = VoteToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.0.get_version_num(), 4);
        assert_eq!(a.to_string().parse::<VoteToken>().unwrap(), a);
    }

    #[test]
    fn payload_hash_must_be_lowercase_hex() {
        let good = "a".repeat(64);
        assert!(good.parse::<PayloadHash>().is_ok());
        assert!("A".repeat(64).parse::<PayloadHash>().is_err());
        assert!("a".repeat(63).parse::<PayloadHash>().is_err());
        assert!("g".repeat(64).parse::<PayloadHash>().is_err());
    }

    #[test]
    fn selection_sets_deserialize_from_objects() {
        let json = r#"{"Treasurer":"65f1c0ffee0000000000abcd","President":"65f1c0ffee0000000000abce"}"#;
        let selections: SelectionSet = serde_json::from_str(json).unwrap();
        assert_eq!(selections.len(), 2);
        let positions: Vec<_> = selections.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(positions, ["President", "Treasurer"]);
    }

    #[test]
    fn timestamp_keeps_millisecond_format() {
        let payload = VotePayload {
            election_id: Id::new(),
            timestamp: DateTime::parse_from_rfc3339("2024-03-01T09:30:00.123Z")
                .unwrap()
                .with_timezone(&Utc),
            selections: Vec::new(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["timestamp"], "2024-03-01T09:30:00.123Z");
        let back: VotePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
