use log::{debug, warn};

use crate::model::voter::StudentId;
use crate::store::{StoreError, VoteStore};

use super::SubmissionError;

/// Re-read the voter's record and refuse anyone who may not vote now.
///
/// This deliberately ignores anything cached in the session: the voter may
/// have voted from another session since their ballot was loaded.
pub async fn ensure_eligible(
    store: &dyn VoteStore,
    student_id: &StudentId,
) -> Result<(), SubmissionError> {
    let voter = store
        .find_voter(student_id)
        .await
        .map_err(SubmissionError::Store)?
        .ok_or_else(|| SubmissionError::UnknownVoter(student_id.clone()))?;
    if !voter.is_active {
        warn!("Inactive voter {student_id} attempted to vote");
        return Err(SubmissionError::InactiveVoter(student_id.clone()));
    }

    let status = store
        .get_voter_status(student_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => SubmissionError::UnknownVoter(student_id.clone()),
            e => SubmissionError::Store(e),
        })?;
    if status.has_voted {
        warn!("Voter {student_id} attempted to vote again");
        return Err(SubmissionError::AlreadyVoted(student_id.clone()));
    }

    debug!("Voter {student_id} is eligible");
    Ok(())
}
