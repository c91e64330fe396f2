use log::{error, warn};
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::protocol::{SubmissionError, SubmissionErrorKind};
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Store(StoreError::NotFound(_)) => Status::NotFound,
            Self::Store(StoreError::Conflict(_)) => Status::Conflict,
            Self::Store(StoreError::Unavailable(_)) => Status::ServiceUnavailable,
            Self::Store(StoreError::Db(_)) => Status::InternalServerError,
            Self::Submission(SubmissionError::NoActiveElection) => Status::Conflict,
            Self::Submission(err) => match err.kind() {
                SubmissionErrorKind::Eligibility => Status::Forbidden,
                SubmissionErrorKind::Validation => Status::UnprocessableEntity,
                SubmissionErrorKind::TransientStore => Status::ServiceUnavailable,
                SubmissionErrorKind::PartialWrite => Status::InternalServerError,
            },
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
        }
    }

    /// Machine-readable error category, sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submission(SubmissionError::NoActiveElection) => "no_active_election",
            Self::Submission(err) => match err.kind() {
                SubmissionErrorKind::Eligibility => "eligibility",
                SubmissionErrorKind::Validation => "validation",
                SubmissionErrorKind::TransientStore => "transient_store",
                SubmissionErrorKind::PartialWrite => "partial_write",
            },
            Self::Store(StoreError::NotFound(_)) | Self::NotFound(_) => "not_found",
            Self::Store(StoreError::Conflict(_)) | Self::Conflict(_) => "conflict",
            Self::Store(_) => "store",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::voter::StudentId;

    #[test]
    fn submission_errors_map_to_distinct_statuses() {
        let cases = [
            (
                Error::from(SubmissionError::AlreadyVoted(StudentId::example())),
                Status::Forbidden,
            ),
            (
                Error::from(SubmissionError::SelectionCount {
                    expected: 10,
                    actual: 8,
                }),
                Status::UnprocessableEntity,
            ),
            (
                Error::from(SubmissionError::NoActiveElection),
                Status::Conflict,
            ),
            (
                Error::from(SubmissionError::Store(StoreError::Unavailable(
                    "down".to_string(),
                ))),
                Status::ServiceUnavailable,
            ),
            (
                Error::from(SubmissionError::PartialWrite(StoreError::Unavailable(
                    "down".to_string(),
                ))),
                Status::InternalServerError,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn partial_write_tells_the_voter_not_to_retry() {
        let err = Error::from(SubmissionError::PartialWrite(StoreError::Unavailable(
            "down".to_string(),
        )));
        assert_eq!(err.kind(), "partial_write");
        assert!(err.to_string().contains("Do not vote again"));
    }
}
