//! Public, voter-independent views used to check the integrity of an election.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    candidate::{Ballot, Candidate},
    election::Election,
    mongodb::Id,
    results::ElectionResults,
    vote::{PayloadHash, VoteRecord, VoteToken},
};
use crate::protocol::verify_payload;

/// The number of votes recorded for an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub election_id: Id,
    pub count: u64,
}

/// Outcome of re-hashing one stored vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteVerification {
    pub vote_token: VoteToken,
    pub election_id: Id,
    pub payload_hash: PayloadHash,
    /// Whether the stored payload still hashes to the stored hash.
    pub valid: bool,
}

impl VoteVerification {
    pub fn check(record: &VoteRecord) -> Self {
        Self {
            vote_token: record.vote_token,
            election_id: record.election_id,
            payload_hash: record.payload_hash.clone(),
            valid: verify_payload(&record.payload, &record.payload_hash),
        }
    }
}

/// Everything needed to audit an election offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDump {
    pub election: Election,
    pub candidates: Vec<Candidate>,
    pub votes: Vec<VoteRecord>,
}

/// A reason a dump fails its audit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditFailure {
    #[error("Vote {0} does not match its payload hash")]
    Tampered(VoteToken),
    #[error("Vote {token} belongs to election {election_id}")]
    ForeignElection { token: VoteToken, election_id: Id },
    #[error("Vote {token} names election {payload} in its payload but is filed under {record}")]
    MismatchedElection {
        token: VoteToken,
        payload: Id,
        record: Id,
    },
    #[error("Vote token {0} appears more than once")]
    DuplicateToken(VoteToken),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub failures: Vec<AuditFailure>,
    /// Tally over the votes that passed every check.
    pub results: ElectionResults,
}

impl AuditReport {
    pub fn is_verified(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ElectionDump {
    /// Re-verify every vote and tally the ones that pass.
    pub fn audit(&self) -> AuditReport {
        let election_id = self.election.id;
        let mut failures = Vec::new();
        let mut seen = HashSet::new();
        let mut counted = Vec::with_capacity(self.votes.len());

        for record in self.votes.iter() {
            let token = record.vote_token;
            if !seen.insert(token) {
                failures.push(AuditFailure::DuplicateToken(token));
                continue;
            }
            if record.election_id != election_id {
                failures.push(AuditFailure::ForeignElection {
                    token,
                    election_id: record.election_id,
                });
                continue;
            }
            if record.payload.election_id != record.election_id {
                failures.push(AuditFailure::MismatchedElection {
                    token,
                    payload: record.payload.election_id,
                    record: record.election_id,
                });
                continue;
            }
            if !verify_payload(&record.payload, &record.payload_hash) {
                failures.push(AuditFailure::Tampered(token));
                continue;
            }
            counted.push(record);
        }

        let ballot = Ballot::new(self.election.clone(), self.candidates.clone());
        AuditReport {
            failures,
            results: ElectionResults::tally(&ballot, counted),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::vote::SelectionSet;
    use crate::protocol::{build_payload, hash_payload};

    fn record(ballot: &Ballot) -> VoteRecord {
        let payload = build_payload(&SelectionSet::example(ballot), ballot, Utc::now()).unwrap();
        VoteRecord {
            vote_token: VoteToken::generate(),
            election_id: ballot.election.id,
            payload_hash: hash_payload(&payload),
            payload,
        }
    }

    fn dump() -> ElectionDump {
        let ballot = Ballot::example();
        let votes = vec![record(&ballot), record(&ballot), record(&ballot)];
        ElectionDump {
            election: ballot.election,
            candidates: ballot.candidates,
            votes,
        }
    }

    #[test]
    fn untouched_dump_verifies() {
        let report = dump().audit();
        assert!(report.is_verified());
        assert_eq!(report.results.ballots_cast, 3);
        assert_eq!(report.results.positions[0].candidates[0].vote_count, 3);
    }

    #[test]
    fn edited_vote_is_detected() {
        let mut dump = dump();
        let chosen = &dump.votes[1].payload.selections[0];
        let other = dump
            .candidates
            .iter()
            .find(|c| c.position == chosen.position && c.id != chosen.candidate_id)
            .unwrap()
            .id;
        dump.votes[1].payload.selections[0].candidate_id = other;
        let token = dump.votes[1].vote_token;

        let report = dump.audit();
        assert_eq!(report.failures, [AuditFailure::Tampered(token)]);
        assert_eq!(report.results.ballots_cast, 2);
    }

    #[test]
    fn foreign_and_duplicate_votes_are_detected() {
        let mut dump = dump();
        let copy = dump.votes[0].clone();
        dump.votes.push(copy.clone());
        dump.votes[2].election_id = Id::new();

        let report = dump.audit();
        assert!(!report.is_verified());
        assert!(report
            .failures
            .contains(&AuditFailure::DuplicateToken(copy.vote_token)));
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f, AuditFailure::ForeignElection { .. })));
    }

    #[test]
    fn verification_view_reports_validity() {
        let ballot = Ballot::example();
        let mut record = record(&ballot);
        assert!(VoteVerification::check(&record).valid);

        record.payload.selections.pop();
        assert!(!VoteVerification::check(&record).valid);
    }
}
