//! The persistence backend the vote submission protocol runs against.
//!
//! [`VoteStore`] is the whole surface the rest of the crate sees.
//! [`MongoStore`] backs the real server; [`MemoryStore`] keeps everything
//! in-process and can be told to fail on demand.

use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::model::{
    candidate::Candidate,
    election::{Election, ElectionStatus},
    mongodb::Id,
    vote::{VoteRecord, VoteToken},
    voter::{StudentId, Voter, VoterStatus},
};

mod memory;
mod mongo;

pub use memory::{CallCounts, MemoryStore};
pub use mongo::MongoStore;

/// The store handle kept in Rocket's managed state.
pub type Store = std::sync::Arc<dyn VoteStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    /// Look up a voter by student ID.
    async fn find_voter(&self, student_id: &StudentId) -> StoreResult<Option<Voter>>;

    /// Read a voter's current voting status.
    /// A missing voter is a [`StoreError::NotFound`].
    async fn get_voter_status(&self, student_id: &StudentId) -> StoreResult<VoterStatus>;

    /// Set `has_voted` for the voter. Idempotent.
    async fn set_voter_voted(&self, student_id: &StudentId) -> StoreResult<()>;

    /// All registered voters.
    async fn list_voters(&self) -> StoreResult<Vec<Voter>>;

    /// Register a voter. Fails with a conflict if the student ID is taken.
    async fn insert_voter(&self, voter: &Voter) -> StoreResult<()>;

    /// The election currently in the running state, if any.
    async fn get_active_election(&self) -> StoreResult<Option<Election>>;

    async fn get_election(&self, id: Id) -> StoreResult<Option<Election>>;

    async fn list_elections(&self) -> StoreResult<Vec<Election>>;

    async fn insert_election(&self, election: &Election) -> StoreResult<()>;

    /// Move an election to the given status. Fails with a conflict when
    /// setting `Running` while a different election is already running.
    async fn set_election_status(&self, id: Id, status: ElectionStatus) -> StoreResult<()>;

    /// The election's candidates, ordered by party then position.
    async fn list_candidates(&self, election_id: Id) -> StoreResult<Vec<Candidate>>;

    async fn insert_candidate(&self, candidate: &Candidate) -> StoreResult<()>;

    /// Append a vote record. Never updates an existing record.
    async fn insert_vote_record(&self, record: &VoteRecord) -> StoreResult<()>;

    async fn find_vote_record(&self, token: VoteToken) -> StoreResult<Option<VoteRecord>>;

    async fn list_vote_records(&self, election_id: Id) -> StoreResult<Vec<VoteRecord>>;

    async fn count_vote_records(&self, election_id: Id) -> StoreResult<u64>;
}
