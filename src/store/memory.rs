use std::collections::BTreeMap;
use std::sync::Arc;

use rocket::tokio::sync::Mutex;

use crate::model::{
    candidate::Candidate,
    election::{Election, ElectionStatus},
    mongodb::Id,
    vote::{VoteRecord, VoteToken},
    voter::{StudentId, Voter, VoterStatus},
};

use super::{StoreError, StoreResult, VoteStore};

/// How many times each durable write has been attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub insert_vote_record: usize,
    pub set_voter_voted: usize,
}

#[derive(Default)]
struct Inner {
    voters: BTreeMap<StudentId, Voter>,
    elections: Vec<Election>,
    candidates: Vec<Candidate>,
    votes: Vec<VoteRecord>,
    fail_vote_inserts: bool,
    fail_status_updates: bool,
    calls: CallCounts,
}

/// An in-process [`VoteStore`].
///
/// Clones share the same tables. Writes can be made to fail on demand to
/// exercise the submission error paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert_vote_record` fail (or succeed again).
    pub async fn fail_vote_inserts(&self, fail: bool) {
        self.inner.lock().await.fail_vote_inserts = fail;
    }

    /// Make every subsequent `set_voter_voted` fail (or succeed again).
    pub async fn fail_status_updates(&self, fail: bool) {
        self.inner.lock().await.fail_status_updates = fail;
    }

    pub async fn calls(&self) -> CallCounts {
        self.inner.lock().await.calls
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn find_voter(&self, student_id: &StudentId) -> StoreResult<Option<Voter>> {
        Ok(self.inner.lock().await.voters.get(student_id).cloned())
    }

    async fn get_voter_status(&self, student_id: &StudentId) -> StoreResult<VoterStatus> {
        self.inner
            .lock()
            .await
            .voters
            .get(student_id)
            .map(Voter::status)
            .ok_or_else(|| StoreError::NotFound(format!("Voter '{student_id}'")))
    }

    async fn set_voter_voted(&self, student_id: &StudentId) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.set_voter_voted += 1;
        if inner.fail_status_updates {
            return Err(StoreError::Unavailable("simulated status update failure".into()));
        }
        let voter = inner
            .voters
            .get_mut(student_id)
            .ok_or_else(|| StoreError::NotFound(format!("Voter '{student_id}'")))?;
        voter.has_voted = true;
        Ok(())
    }

    async fn list_voters(&self) -> StoreResult<Vec<Voter>> {
        Ok(self.inner.lock().await.voters.values().cloned().collect())
    }

    async fn insert_voter(&self, voter: &Voter) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.voters.contains_key(&voter.student_id) {
            return Err(StoreError::Conflict(format!(
                "Voter '{}' already exists",
                voter.student_id
            )));
        }
        inner.voters.insert(voter.student_id.clone(), voter.clone());
        Ok(())
    }

    async fn get_active_election(&self) -> StoreResult<Option<Election>> {
        Ok(self
            .inner
            .lock()
            .await
            .elections
            .iter()
            .find(|e| e.status == ElectionStatus::Running)
            .cloned())
    }

    async fn get_election(&self, id: Id) -> StoreResult<Option<Election>> {
        Ok(self
            .inner
            .lock()
            .await
            .elections
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn list_elections(&self) -> StoreResult<Vec<Election>> {
        Ok(self.inner.lock().await.elections.clone())
    }

    async fn insert_election(&self, election: &Election) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if election.status == ElectionStatus::Running
            && inner
                .elections
                .iter()
                .any(|e| e.status == ElectionStatus::Running)
        {
            return Err(StoreError::Conflict("Another election is already running".into()));
        }
        inner.elections.push(election.clone());
        Ok(())
    }

    async fn set_election_status(&self, id: Id, status: ElectionStatus) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if status == ElectionStatus::Running
            && inner
                .elections
                .iter()
                .any(|e| e.status == ElectionStatus::Running && e.id != id)
        {
            return Err(StoreError::Conflict("Another election is already running".into()));
        }
        let election = inner
            .elections
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Election '{id}'")))?;
        election.status = status;
        Ok(())
    }

    async fn list_candidates(&self, election_id: Id) -> StoreResult<Vec<Candidate>> {
        let mut candidates: Vec<_> = self
            .inner
            .lock()
            .await
            .candidates
            .iter()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| (&a.party, &a.position).cmp(&(&b.party, &b.position)));
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> StoreResult<()> {
        self.inner.lock().await.candidates.push(candidate.clone());
        Ok(())
    }

    async fn insert_vote_record(&self, record: &VoteRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.insert_vote_record += 1;
        if inner.fail_vote_inserts {
            return Err(StoreError::Unavailable("simulated vote insert failure".into()));
        }
        if inner.votes.iter().any(|v| v.vote_token == record.vote_token) {
            return Err(StoreError::Conflict(format!(
                "Vote token '{}' already used",
                record.vote_token
            )));
        }
        inner.votes.push(record.clone());
        Ok(())
    }

    async fn find_vote_record(&self, token: VoteToken) -> StoreResult<Option<VoteRecord>> {
        Ok(self
            .inner
            .lock()
            .await
            .votes
            .iter()
            .find(|v| v.vote_token == token)
            .cloned())
    }

    async fn list_vote_records(&self, election_id: Id) -> StoreResult<Vec<VoteRecord>> {
        Ok(self
            .inner
            .lock()
            .await
            .votes
            .iter()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn count_vote_records(&self, election_id: Id) -> StoreResult<u64> {
        let count = self
            .inner
            .lock()
            .await
            .votes
            .iter()
            .filter(|v| v.election_id == election_id)
            .count();
        Ok(count as u64)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn set_voter_voted_is_idempotent() {
        let (store, _) = MemoryStore::example().await;
        let id = StudentId::example();

        store.set_voter_voted(&id).await.unwrap();
        let once = store.find_voter(&id).await.unwrap();
        store.set_voter_voted(&id).await.unwrap();
        let twice = store.find_voter(&id).await.unwrap();

        assert_eq!(once, twice);
        assert!(store.get_voter_status(&id).await.unwrap().has_voted);
        // The other voter is untouched.
        assert!(!store.get_voter_status(&StudentId::example2()).await.unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn only_one_election_runs_at_a_time() {
        let (store, ballot) = MemoryStore::example().await;
        let other = Election::planned_example();
        store.insert_election(&other).await.unwrap();

        let result = store.set_election_status(other.id, ElectionStatus::Running).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        store
            .set_election_status(ballot.election.id, ElectionStatus::Closed)
            .await
            .unwrap();
        store
            .set_election_status(other.id, ElectionStatus::Running)
            .await
            .unwrap();
        assert_eq!(store.get_active_election().await.unwrap().unwrap().id, other.id);
    }

    #[rocket::async_test]
    async fn unknown_voter_status_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get_voter_status(&StudentId::example()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn duplicate_voters_conflict() {
        let (store, _) = MemoryStore::example().await;
        let result = store.insert_voter(&Voter::example()).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }
}
