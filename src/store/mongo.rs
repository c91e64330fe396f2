use mongodb::{bson::doc, options::FindOptions, Database};
use rocket::futures::TryStreamExt;

use crate::model::{
    candidate::Candidate,
    election::{Election, ElectionStatus},
    mongodb::{is_duplicate_key_error, Coll, Id},
    vote::{VoteRecord, VoteToken},
    voter::{StudentId, Voter, VoterStatus},
};

use super::{StoreError, StoreResult, VoteStore};

/// A [`VoteStore`] backed by MongoDB.
#[derive(Clone)]
pub struct MongoStore {
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<VoteRecord>,
}

impl MongoStore {
    pub fn from_db(db: &Database) -> Self {
        Self {
            voters: Coll::from_db(db),
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }
}

/// Map a duplicate key error to a conflict with the given message.
fn conflict_on_duplicate(err: mongodb::error::Error, msg: impl FnOnce() -> String) -> StoreError {
    if is_duplicate_key_error(&err) {
        StoreError::Conflict(msg())
    } else {
        StoreError::Db(err)
    }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn find_voter(&self, student_id: &StudentId) -> StoreResult<Option<Voter>> {
        let filter = doc! { "_id": student_id.as_str() };
        Ok(self.voters.find_one(filter, None).await?)
    }

    async fn get_voter_status(&self, student_id: &StudentId) -> StoreResult<VoterStatus> {
        self.find_voter(student_id)
            .await?
            .map(|voter| voter.status())
            .ok_or_else(|| StoreError::NotFound(format!("Voter '{student_id}'")))
    }

    async fn set_voter_voted(&self, student_id: &StudentId) -> StoreResult<()> {
        // A plain `$set`, so repeating it is harmless.
        let filter = doc! { "_id": student_id.as_str() };
        let update = doc! {
            "$set": {
                "has_voted": true,
            }
        };
        let result = self.voters.update_one(filter, update, None).await?;
        if result.matched_count != 1 {
            return Err(StoreError::NotFound(format!("Voter '{student_id}'")));
        }
        Ok(())
    }

    async fn list_voters(&self) -> StoreResult<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let voters: Vec<Voter> = self
            .voters
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }

    async fn insert_voter(&self, voter: &Voter) -> StoreResult<()> {
        self.voters
            .insert_one(voter, None)
            .await
            .map_err(|e| {
                conflict_on_duplicate(e, || format!("Voter '{}' already exists", voter.student_id))
            })?;
        Ok(())
    }

    async fn get_active_election(&self) -> StoreResult<Option<Election>> {
        let filter = doc! { "status": ElectionStatus::Running };
        Ok(self.elections.find_one(filter, None).await?)
    }

    async fn get_election(&self, id: Id) -> StoreResult<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn list_elections(&self) -> StoreResult<Vec<Election>> {
        let options = FindOptions::builder().sort(doc! { "start_at": -1 }).build();
        let elections: Vec<Election> = self
            .elections
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn insert_election(&self, election: &Election) -> StoreResult<()> {
        let result = self.elections.insert_one(election, None).await;
        match result {
            Err(e) if election.status == ElectionStatus::Running => {
                Err(conflict_on_duplicate(e, || "Another election is already running".into()))
            }
            Err(e) => Err(e.into()),
            Ok(_) => Ok(()),
        }
    }

    async fn set_election_status(&self, id: Id, status: ElectionStatus) -> StoreResult<()> {
        // The partial unique index on running elections rejects a second one.
        let update = doc! {
            "$set": {
                "status": status,
            }
        };
        let result = self
            .elections
            .update_one(id.as_doc(), update, None)
            .await
            .map_err(|e| conflict_on_duplicate(e, || "Another election is already running".into()))?;
        if result.matched_count != 1 {
            return Err(StoreError::NotFound(format!("Election '{id}'")));
        }
        Ok(())
    }

    async fn list_candidates(&self, election_id: Id) -> StoreResult<Vec<Candidate>> {
        let filter = doc! { "election_id": election_id };
        let options = FindOptions::builder()
            .sort(doc! { "party": 1, "position": 1 })
            .build();
        let candidates: Vec<Candidate> = self
            .candidates
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> StoreResult<()> {
        self.candidates.insert_one(candidate, None).await?;
        Ok(())
    }

    async fn insert_vote_record(&self, record: &VoteRecord) -> StoreResult<()> {
        // The token is the primary key, so a reused token can never
        // overwrite an earlier vote.
        self.votes.insert_one(record, None).await.map_err(|e| {
            conflict_on_duplicate(e, || format!("Vote token '{}' already used", record.vote_token))
        })?;
        Ok(())
    }

    async fn find_vote_record(&self, token: VoteToken) -> StoreResult<Option<VoteRecord>> {
        let filter = doc! { "_id": token.to_string() };
        Ok(self.votes.find_one(filter, None).await?)
    }

    async fn list_vote_records(&self, election_id: Id) -> StoreResult<Vec<VoteRecord>> {
        let filter = doc! { "election_id": election_id };
        let records: Vec<VoteRecord> = self
            .votes
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(records)
    }

    async fn count_vote_records(&self, election_id: Id) -> StoreResult<u64> {
        let filter = doc! { "election_id": election_id };
        Ok(self.votes.count_documents(filter, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{candidate::Ballot, vote::SelectionSet};
    use crate::protocol::{build_payload, hash_payload};

    fn example_record(ballot: &Ballot) -> VoteRecord {
        let payload = build_payload(&SelectionSet::example(ballot), ballot, Utc::now()).unwrap();
        VoteRecord {
            vote_token: VoteToken::generate(),
            election_id: ballot.election.id,
            payload_hash: hash_payload(&payload),
            payload,
        }
    }

    #[db_test]
    async fn set_voter_voted_is_idempotent(store: MongoStore) {
        let id = StudentId::example();
        store.insert_voter(&Voter::example()).await.unwrap();
        store.insert_voter(&Voter::example2()).await.unwrap();

        store.set_voter_voted(&id).await.unwrap();
        let once = store.find_voter(&id).await.unwrap();
        store.set_voter_voted(&id).await.unwrap();
        let twice = store.find_voter(&id).await.unwrap();

        assert_eq!(once, twice);
        assert!(store.get_voter_status(&id).await.unwrap().has_voted);
        assert!(!store.get_voter_status(&StudentId::example2()).await.unwrap().has_voted);
    }

    #[db_test]
    async fn marking_unknown_voter_is_not_found(store: MongoStore) {
        let result = store.set_voter_voted(&StudentId::example()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let result = store.get_voter_status(&StudentId::example()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[db_test]
    async fn only_one_election_runs_at_a_time(store: MongoStore) {
        let running = Election::running_example();
        let planned = Election::planned_example();
        store.insert_election(&running).await.unwrap();
        store.insert_election(&planned).await.unwrap();

        // A second running election is refused on insert and on update.
        let result = store.insert_election(&Election::running_example()).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        let result = store.set_election_status(planned.id, ElectionStatus::Running).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.get_active_election().await.unwrap().unwrap().id, running.id);

        store
            .set_election_status(running.id, ElectionStatus::Closed)
            .await
            .unwrap();
        store
            .set_election_status(planned.id, ElectionStatus::Running)
            .await
            .unwrap();
        assert_eq!(store.get_active_election().await.unwrap().unwrap().id, planned.id);

        let result = store.set_election_status(Id::new(), ElectionStatus::Closed).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[db_test]
    async fn duplicate_planned_election_is_a_database_error(store: MongoStore) {
        let planned = Election::planned_example();
        store.insert_election(&planned).await.unwrap();

        let result = store.insert_election(&planned).await;
        assert!(matches!(result, Err(StoreError::Db(_))));
    }

    #[db_test]
    async fn reused_vote_token_is_a_conflict(store: MongoStore) {
        let ballot = Ballot::example();
        let record = example_record(&ballot);
        store.insert_vote_record(&record).await.unwrap();

        let mut reused = example_record(&ballot);
        reused.vote_token = record.vote_token;
        let result = store.insert_vote_record(&reused).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        // The first vote is untouched.
        assert_eq!(store.count_vote_records(ballot.election.id).await.unwrap(), 1);
        let stored = store.find_vote_record(record.vote_token).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }
}
