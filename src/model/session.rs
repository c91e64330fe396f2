//! Request guards identifying who is calling.

use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    Request,
};
use thiserror::Error;

use crate::config::Config;
use crate::model::voter::{StudentId, StudentIdError};

/// Name of the private cookie holding the logged-in voter's student ID.
pub const SESSION_COOKIE: &str = "student_id";

/// Header carrying the admin secret.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Missing `{SESSION_COOKIE}` cookie")]
    Missing,
    #[error(transparent)]
    Invalid(#[from] StudentIdError),
}

/// The voter a request is made on behalf of.
///
/// This is the only session state kept for a voter. Everything else about
/// them is re-read from the store when it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterSession {
    pub student_id: StudentId,
}

impl VoterSession {
    pub fn new(student_id: StudentId) -> Self {
        Self { student_id }
    }

    /// Build the cookie to be stored with `add_private`.
    pub fn into_cookie(self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, self.student_id.to_string())
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterSession {
    type Error = SessionError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let cookie = try_outcome!(req
            .cookies()
            .get_private(SESSION_COOKIE)
            .into_outcome((Status::Unauthorized, SessionError::Missing)));

        let student_id: StudentId = try_outcome!(cookie
            .value()
            .parse()
            .map_err(SessionError::Invalid)
            .into_outcome(Status::Unauthorized));

        Outcome::Success(Self::new(student_id))
    }
}

#[derive(Debug, Error)]
pub enum AdminTokenError {
    #[error("Missing `{ADMIN_TOKEN_HEADER}` header")]
    Missing,
    #[error("Incorrect admin token")]
    Incorrect,
    #[error("Application config is not loaded")]
    Unconfigured,
}

/// Proof that the request carried the configured admin secret.
#[derive(Debug, Clone, Copy)]
pub struct AdminToken;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = AdminTokenError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    AdminTokenError::Unconfigured,
                ))
            }
        };

        match req.headers().get_one(ADMIN_TOKEN_HEADER) {
            Some(token) if token == config.admin_token() => Outcome::Success(AdminToken),
            Some(_) => Outcome::Failure((Status::Unauthorized, AdminTokenError::Incorrect)),
            None => Outcome::Failure((Status::Unauthorized, AdminTokenError::Missing)),
        }
    }
}
