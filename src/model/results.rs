use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{
    candidate::{Ballot, Candidate},
    mongodb::Id,
    vote::VoteRecord,
    voter::Voter,
};

/// Ratio of active voters who have voted to all active voters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Turnout {
    pub total: u64,
    pub voted: u64,
    /// Percentage rounded to two decimal places.
    pub percentage: f64,
}

impl Turnout {
    /// Compute turnout over the given voters. Inactive voters are ignored.
    pub fn from_voters<'a>(voters: impl IntoIterator<Item = &'a Voter>) -> Self {
        let (total, voted) = voters
            .into_iter()
            .filter(|v| v.is_active)
            .fold((0, 0), |(total, voted), v| {
                (total + 1, voted + u64::from(v.has_voted))
            });
        Self {
            total,
            voted,
            percentage: percentage(voted, total),
        }
    }
}

/// `value / total` as a percentage rounded to two decimals, or zero.
fn percentage(value: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (value as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// The number of votes received by one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: Id,
    pub name: String,
    pub party: String,
    pub position: String,
    pub vote_count: u64,
    /// Share of the votes cast for this position.
    pub percentage: f64,
}

/// Results for a single position, highest count first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResults {
    pub position: String,
    pub candidates: Vec<CandidateResult>,
}

/// Results for a single party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyResults {
    pub party: String,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

/// Tallied results of one election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: Id,
    /// Number of vote records counted.
    pub ballots_cast: u64,
    pub positions: Vec<PositionResults>,
    pub parties: Vec<PartyResults>,
}

impl ElectionResults {
    /// Tally the given vote records against the ballot.
    /// Records for other elections, and selections naming unknown
    /// candidates, are not counted.
    pub fn tally<'a>(ballot: &Ballot, records: impl IntoIterator<Item = &'a VoteRecord>) -> Self {
        let election_id = ballot.election.id;
        let mut counts: HashMap<Id, u64> = HashMap::new();
        let mut ballots_cast = 0;
        for record in records {
            if record.election_id != election_id {
                continue;
            }
            ballots_cast += 1;
            for selection in record.payload.selections.iter() {
                let known = ballot
                    .candidate(selection.candidate_id)
                    .filter(|c| c.position == selection.position)
                    .is_some();
                if known {
                    *counts.entry(selection.candidate_id).or_default() += 1;
                }
            }
        }

        let positions: Vec<PositionResults> = ballot
            .by_position()
            .into_iter()
            .map(|group| {
                let position_total: u64 = group
                    .candidates
                    .iter()
                    .map(|c| counts.get(&c.id).copied().unwrap_or(0))
                    .sum();
                let mut candidates: Vec<_> = group
                    .candidates
                    .iter()
                    .map(|c| candidate_result(c, &counts, position_total))
                    .collect();
                sort_by_votes(&mut candidates);
                PositionResults {
                    position: group.position,
                    candidates,
                }
            })
            .collect();

        let mut parties: BTreeMap<String, PartyResults> = BTreeMap::new();
        for position in positions.iter() {
            for result in position.candidates.iter() {
                let party = parties
                    .entry(result.party.clone())
                    .or_insert_with(|| PartyResults {
                        party: result.party.clone(),
                        total_votes: 0,
                        candidates: Vec::new(),
                    });
                party.total_votes += result.vote_count;
                party.candidates.push(result.clone());
            }
        }
        let parties = parties
            .into_values()
            .map(|mut party| {
                sort_by_votes(&mut party.candidates);
                party
            })
            .collect();

        Self {
            election_id,
            ballots_cast,
            positions,
            parties,
        }
    }
}

fn candidate_result(candidate: &Candidate, counts: &HashMap<Id, u64>, total: u64) -> CandidateResult {
    let vote_count = counts.get(&candidate.id).copied().unwrap_or(0);
    CandidateResult {
        candidate_id: candidate.id,
        name: candidate.name.clone(),
        party: candidate.party_label().to_string(),
        position: candidate.position.clone(),
        vote_count,
        percentage: percentage(vote_count, total),
    }
}

/// Highest count first, ties broken by name.
fn sort_by_votes(results: &mut [CandidateResult]) {
    results.sort_by(|a, b| b.vote_count.cmp(&a.vote_count).then_with(|| a.name.cmp(&b.name)));
}
