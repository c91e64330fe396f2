use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// States in the election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Created, but voting has not opened.
    Planned,
    /// Accepting votes. At most one election is running at a time.
    Running,
    /// Voting has ended.
    Closed,
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Core election data, as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// An election, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ElectionStatus,
}

impl Election {
    /// Create a new planned election from an admin's spec.
    pub fn from_spec(spec: ElectionSpec) -> Self {
        Self {
            id: Id::new(),
            title: spec.title,
            start_at: spec.start_at,
            end_at: spec.end_at,
            status: ElectionStatus::Planned,
        }
    }

    /// Is the election accepting votes at the given instant?
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == ElectionStatus::Running && self.start_at <= now && now <= self.end_at
    }
}
