use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of every student ID issued by the school.
const STUDENT_ID_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid student ID '{0}': expected {STUDENT_ID_LEN} digits")]
pub struct StudentIdError(String);

/// An externally assigned student ID, e.g. `2021001`.
/// This is the unique key for a voter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StudentId(String);

impl StudentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StudentId {
    type Err = StudentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == STUDENT_ID_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(StudentIdError(s.to_string()))
        }
    }
}

impl TryFrom<String> for StudentId {
    type Error = StudentIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}

impl Display for StudentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> FromParam<'a> for StudentId {
    type Error = StudentIdError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for StudentId {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] StudentId);

/// A registered voter, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub student_id: StudentId,
    pub name: String,
    pub is_active: bool,
    /// Flips from false to true exactly once, never back.
    pub has_voted: bool,
}

impl Voter {
    /// Register a new voter who has not yet voted.
    pub fn new(student_id: StudentId, name: impl Into<String>) -> Self {
        Self {
            student_id,
            name: name.into(),
            is_active: true,
            has_voted: false,
        }
    }

    pub fn status(&self) -> VoterStatus {
        VoterStatus {
            has_voted: self.has_voted,
        }
    }
}

/// The freshly-read voting status of a voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatus {
    pub has_voted: bool,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_id_format() {
        assert!("2021001".parse::<StudentId>().is_ok());
        assert!("202100".parse::<StudentId>().is_err());
        assert!("20210011".parse::<StudentId>().is_err());
        assert!("20a1001".parse::<StudentId>().is_err());
        assert!("".parse::<StudentId>().is_err());
    }

    #[test]
    fn new_voters_have_not_voted() {
        let voter = Voter::example();
        assert!(voter.is_active);
        assert_eq!(voter.status(), VoterStatus { has_voted: false });
    }
}
