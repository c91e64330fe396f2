use chrono::Utc;
use log::info;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    candidate::{Ballot, BallotView},
    session::{VoterSession, SESSION_COOKIE},
    vote::{SelectionSet, SubmissionReceipt},
    voter::{StudentId, Voter, VoterStatus},
};
use crate::protocol::{ensure_eligible, submit_vote, SubmissionError};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![login, logout, status, ballot, vote]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub student_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub selections: SelectionSet,
}

#[post("/voter/login", data = "<login>", format = "json")]
pub async fn login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    store: &State<Store>,
) -> Result<Json<Voter>> {
    let student_id = login
        .student_id
        .parse::<StudentId>()
        .map_err(|e| Error::BadRequest(e.to_string()))?;

    ensure_eligible(store.inner().as_ref(), &student_id).await?;
    let voter = store
        .find_voter(&student_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {student_id}")))?;

    cookies.add_private(VoterSession::new(student_id).into_cookie());
    Ok(Json(voter))
}

#[post("/voter/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove_private(Cookie::named(SESSION_COOKIE));
    Status::Ok
}

#[get("/voter/status")]
pub async fn status(session: VoterSession, store: &State<Store>) -> Result<Json<VoterStatus>> {
    let status = store.get_voter_status(&session.student_id).await?;
    Ok(Json(status))
}

#[get("/voter/ballot")]
pub async fn ballot(_session: VoterSession, store: &State<Store>) -> Result<Json<BallotView>> {
    let election = store
        .get_active_election()
        .await?
        .filter(|e| e.is_open(Utc::now()))
        .ok_or(SubmissionError::NoActiveElection)?;
    let candidates = store.list_candidates(election.id).await?;
    Ok(Json(BallotView::from(&Ballot::new(election, candidates))))
}

#[post("/voter/vote", data = "<vote>", format = "json")]
pub async fn vote(
    session: VoterSession,
    vote: Json<VoteRequest>,
    store: &State<Store>,
    request_id: &RequestId,
) -> Result<Json<SubmissionReceipt>> {
    let receipt = submit_vote(
        store.inner().as_ref(),
        &session.student_id,
        &vote.selections,
        Utc::now(),
    )
    .await?;
    info!("req{request_id} vote accepted");
    Ok(Json(receipt))
}
