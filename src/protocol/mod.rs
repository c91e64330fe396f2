//! The vote submission protocol.
//!
//! A submission runs strictly in order: the eligibility gate re-reads the
//! voter's status, the payload is built from the selections against the
//! active election's roster, the payload is hashed, and finally the
//! sequencer performs the two durable writes. Each backend call completes
//! before the next is issued, and nothing is retried automatically.

use serde::Serialize;
use thiserror::Error;

use crate::model::{mongodb::Id, voter::StudentId};
use crate::store::StoreError;

pub mod eligibility;
pub mod hash;
pub mod payload;
pub mod submission;

pub use eligibility::ensure_eligible;
pub use hash::{hash_payload, verify_payload};
pub use payload::build_payload;
pub use submission::{record_vote, submit_vote};

/// How the caller should react to a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionErrorKind {
    /// The voter may not vote. Terminal, no retry.
    Eligibility,
    /// The selections are incomplete or invalid. Back to the ballot.
    Validation,
    /// The store failed before anything was recorded. Safe to retry.
    TransientStore,
    /// The vote was recorded but the voter was not marked. Must not retry.
    PartialWrite,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("No voter is registered with student ID {0}")]
    UnknownVoter(StudentId),
    #[error("Voter {0} is not active and cannot vote")]
    InactiveVoter(StudentId),
    #[error("Voter {0} has already voted")]
    AlreadyVoted(StudentId),
    #[error("No election is currently accepting votes")]
    NoActiveElection,
    #[error("Expected a selection for each of the {expected} positions, got {actual}")]
    SelectionCount { expected: usize, actual: usize },
    #[error("'{0}' is not a position on this ballot")]
    UnknownPosition(String),
    #[error("Candidate {candidate} is not standing for '{position}'")]
    WrongCandidate { position: String, candidate: Id },
    #[error("Your vote could not be recorded, please try again ({0})")]
    Store(#[source] StoreError),
    #[error(
        "Your vote was recorded but your voting status could not be updated. \
        Do not vote again; please contact an election administrator"
    )]
    PartialWrite(#[source] StoreError),
}

impl SubmissionError {
    pub fn kind(&self) -> SubmissionErrorKind {
        match self {
            Self::UnknownVoter(_) | Self::InactiveVoter(_) | Self::AlreadyVoted(_) => {
                SubmissionErrorKind::Eligibility
            }
            Self::NoActiveElection
            | Self::SelectionCount { .. }
            | Self::UnknownPosition(_)
            | Self::WrongCandidate { .. } => SubmissionErrorKind::Validation,
            Self::Store(_) => SubmissionErrorKind::TransientStore,
            Self::PartialWrite(_) => SubmissionErrorKind::PartialWrite,
        }
    }
}
