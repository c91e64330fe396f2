use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::model::{
    candidate::Ballot,
    vote::{SelectionSet, SubmissionReceipt, VoteRecord, VoteToken},
    voter::StudentId,
};
use crate::store::VoteStore;

use super::{build_payload, ensure_eligible, hash_payload, SubmissionError};

/// Durably record a vote and mark the voter as having voted.
///
/// The vote record is inserted first; the voter is only marked once that
/// insert has succeeded. If the insert fails nothing has changed and the
/// voter may try again. If marking the voter fails the vote already exists,
/// so the error must not be retried: a second submission would record a
/// second, unlinked vote.
pub async fn record_vote(
    store: &dyn VoteStore,
    student_id: &StudentId,
    record: &VoteRecord,
) -> Result<(), SubmissionError> {
    store.insert_vote_record(record).await.map_err(|e| {
        warn!("Failed to record vote in election {}: {e}", record.election_id);
        SubmissionError::Store(e)
    })?;
    debug!("Recorded vote in election {}", record.election_id);

    store.set_voter_voted(student_id).await.map_err(|e| {
        // The token is left out so this line cannot link voter to vote.
        error!(
            "Vote recorded in election {} but voter {student_id} could not be marked \
            as voted: {e}. The voter must be marked manually",
            record.election_id
        );
        SubmissionError::PartialWrite(e)
    })?;

    Ok(())
}

/// Run a complete submission for one voter.
///
/// The voter's identity is passed in explicitly from their session; nothing
/// about the voter is cached between calls.
pub async fn submit_vote(
    store: &dyn VoteStore,
    student_id: &StudentId,
    selections: &SelectionSet,
    now: DateTime<Utc>,
) -> Result<SubmissionReceipt, SubmissionError> {
    ensure_eligible(store, student_id).await?;

    // Establish the election context.
    let election = store
        .get_active_election()
        .await
        .map_err(SubmissionError::Store)?
        .filter(|e| e.is_open(now))
        .ok_or(SubmissionError::NoActiveElection)?;
    let candidates = store
        .list_candidates(election.id)
        .await
        .map_err(SubmissionError::Store)?;
    if candidates.is_empty() {
        return Err(SubmissionError::NoActiveElection);
    }
    let ballot = Ballot::new(election, candidates);

    let payload = build_payload(selections, &ballot, now)?;
    let payload_hash = hash_payload(&payload);
    let record = VoteRecord {
        vote_token: VoteToken::generate(),
        election_id: ballot.election.id,
        payload,
        payload_hash,
    };

    record_vote(store, student_id, &record).await?;
    info!("Vote submitted in election {}", record.election_id);

    Ok(SubmissionReceipt {
        election_id: record.election_id,
        vote_token: record.vote_token,
        payload_hash: record.payload_hash,
        submitted_at: record.payload.timestamp,
    })
}
