use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{election::Election, mongodb::Id};

/// Party label used when a candidate has none.
pub const INDEPENDENT: &str = "Independent";

/// Core candidate data, as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub party: String,
    pub position: String,
}

/// A candidate standing for one position in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub name: String,
    pub party: String,
    pub position: String,
}

impl Candidate {
    pub fn from_spec(election_id: Id, spec: CandidateSpec) -> Self {
        Self {
            id: Id::new(),
            election_id,
            name: spec.name,
            party: spec.party,
            position: spec.position,
        }
    }

    /// The party label, falling back to [`INDEPENDENT`].
    pub fn party_label(&self) -> &str {
        if self.party.trim().is_empty() {
            INDEPENDENT
        } else {
            &self.party
        }
    }
}

/// The positions and candidates a voter may choose among for one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub election: Election,
    pub candidates: Vec<Candidate>,
}

impl Ballot {
    pub fn new(election: Election, candidates: Vec<Candidate>) -> Self {
        Self {
            election,
            candidates,
        }
    }

    /// The distinct positions on this ballot.
    pub fn positions(&self) -> BTreeSet<&str> {
        self.candidates.iter().map(|c| c.position.as_str()).collect()
    }

    /// How many selections a complete vote must contain.
    /// Derived from the roster rather than fixed.
    pub fn required_positions(&self) -> usize {
        self.positions().len()
    }

    /// Find the candidate with the given ID.
    pub fn candidate(&self, id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Candidates grouped by position, in the order each position first
    /// appears in the roster.
    pub fn by_position(&self) -> Vec<PositionCandidates> {
        let mut groups: Vec<PositionCandidates> = Vec::new();
        for candidate in self.candidates.iter() {
            match groups.iter_mut().find(|g| g.position == candidate.position) {
                Some(group) => group.candidates.push(candidate.clone()),
                None => groups.push(PositionCandidates {
                    position: candidate.position.clone(),
                    candidates: vec![candidate.clone()],
                }),
            }
        }
        groups
    }

    /// Candidates grouped by party label.
    pub fn by_party(&self) -> BTreeMap<String, Vec<Candidate>> {
        let mut groups: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for candidate in self.candidates.iter() {
            groups
                .entry(candidate.party_label().to_string())
                .or_default()
                .push(candidate.clone());
        }
        groups
    }
}

/// All candidates standing for a single position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCandidates {
    pub position: String,
    pub candidates: Vec<Candidate>,
}

/// A ballot as presented to a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotView {
    pub election: Election,
    /// Number of selections a complete vote must contain.
    pub required_positions: usize,
    pub positions: Vec<PositionCandidates>,
    /// The same roster keyed by party label.
    pub parties: BTreeMap<String, Vec<Candidate>>,
}

impl From<&Ballot> for BallotView {
    fn from(ballot: &Ballot) -> Self {
        Self {
            election: ballot.election.clone(),
            required_positions: ballot.required_positions(),
            positions: ballot.by_position(),
            parties: ballot.by_party(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    /// The ten positions of the seeded student council election.
    pub const POSITIONS: [&str; 10] = [
        "President",
        "Vice President",
        "Secretary",
        "Treasurer",
        "Auditor",
        "Public Relations Officer",
        "Business Manager",
        "Grade 10 Representative",
        "Grade 11 Representative",
        "Grade 12 Representative",
    ];

    impl Candidate {
        /// Two candidates per position, one from each party.
        pub fn examples(election_id: Id) -> Vec<Self> {
            let mut candidates = Vec::new();
            for (party, prefix) in [("Unity Party", "A"), ("Progress Party", "B")] {
                for position in POSITIONS {
                    candidates.push(Candidate::from_spec(
                        election_id,
                        CandidateSpec {
                            name: format!("{prefix} {position}"),
                            party: party.to_string(),
                            position: position.to_string(),
                        },
                    ));
                }
            }
            candidates
        }
    }

    impl Ballot {
        pub fn example() -> Self {
            let election = Election::running_example();
            let candidates = Candidate::examples(election.id);
            Self::new(election, candidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_positions_come_from_the_roster() {
        let mut ballot = Ballot::example();
        assert_eq!(ballot.required_positions(), 10);

        ballot.candidates.retain(|c| c.position != "Auditor");
        assert_eq!(ballot.required_positions(), 9);
    }

    #[test]
    fn groups_by_position_in_roster_order() {
        let ballot = Ballot::example();
        let groups = ballot.by_position();
        assert_eq!(groups.len(), 10);
        assert_eq!(groups[0].position, "President");
        assert!(groups.iter().all(|g| g.candidates.len() == 2));
    }

    #[test]
    fn blank_party_is_independent() {
        let mut ballot = Ballot::example();
        ballot.candidates[0].party = " ".to_string();
        let parties = ballot.by_party();
        assert_eq!(parties[INDEPENDENT].len(), 1);
        assert_eq!(parties["Unity Party"].len(), 9);
        assert_eq!(parties["Progress Party"].len(), 10);
    }
}
