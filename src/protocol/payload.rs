use chrono::{DateTime, SubsecRound, Utc};

use crate::model::{
    candidate::Ballot,
    vote::{Selection, SelectionSet, VotePayload},
};

use super::SubmissionError;

/// Turn a voter's selections into the canonical payload for the ballot's
/// election.
///
/// The selections must name exactly one candidate for every position on the
/// ballot, and each candidate must be standing for the position it is
/// chosen for. The timestamp is kept to millisecond precision.
pub fn build_payload(
    selections: &SelectionSet,
    ballot: &Ballot,
    now: DateTime<Utc>,
) -> Result<VotePayload, SubmissionError> {
    let expected = ballot.required_positions();
    if selections.len() != expected {
        return Err(SubmissionError::SelectionCount {
            expected,
            actual: selections.len(),
        });
    }

    let positions = ballot.positions();
    let mut entries = Vec::with_capacity(expected);
    for (position, candidate_id) in selections.iter() {
        if !positions.contains(position.as_str()) {
            return Err(SubmissionError::UnknownPosition(position.clone()));
        }
        match ballot.candidate(*candidate_id) {
            Some(candidate) if &candidate.position == position => {}
            _ => {
                return Err(SubmissionError::WrongCandidate {
                    position: position.clone(),
                    candidate: *candidate_id,
                })
            }
        }
        entries.push(Selection {
            position: position.clone(),
            candidate_id: *candidate_id,
        });
    }

    Ok(VotePayload {
        election_id: ballot.election.id,
        timestamp: now.trunc_subsecs(3),
        selections: entries,
    })
}
