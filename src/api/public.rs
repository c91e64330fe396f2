use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    audit::{ElectionDump, VoteCount, VoteVerification},
    candidate::Candidate,
    election::Election,
    mongodb::Id,
    vote::VoteToken,
};
use crate::store::{Store, VoteStore};

pub fn routes() -> Vec<Route> {
    routes![
        active_election,
        election_candidates,
        vote_count,
        verify_vote,
        election_dump,
    ]
}

async fn election_or_404(store: &dyn VoteStore, election_id: Id) -> Result<Election> {
    store
        .get_election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}

#[get("/elections/active")]
pub async fn active_election(store: &State<Store>) -> Result<Json<Election>> {
    let election = store
        .get_active_election()
        .await?
        .ok_or_else(|| Error::not_found("Running election"))?;
    Ok(Json(election))
}

#[get("/elections/<election_id>/candidates")]
pub async fn election_candidates(
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<Vec<Candidate>>> {
    election_or_404(store.inner().as_ref(), election_id).await?;
    let candidates = store.list_candidates(election_id).await?;
    Ok(Json(candidates))
}

#[get("/elections/<election_id>/votes/count")]
pub async fn vote_count(election_id: Id, store: &State<Store>) -> Result<Json<VoteCount>> {
    election_or_404(store.inner().as_ref(), election_id).await?;
    let count = store.count_vote_records(election_id).await?;
    Ok(Json(VoteCount { election_id, count }))
}

#[get("/votes/<vote_token>/verify")]
pub async fn verify_vote(
    vote_token: VoteToken,
    store: &State<Store>,
) -> Result<Json<VoteVerification>> {
    let record = store
        .find_vote_record(vote_token)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote with token '{vote_token}'")))?;
    Ok(Json(VoteVerification::check(&record)))
}

#[get("/elections/<election_id>/dump")]
pub async fn election_dump(election_id: Id, store: &State<Store>) -> Result<Json<ElectionDump>> {
    let election = election_or_404(store.inner().as_ref(), election_id).await?;
    let candidates = store.list_candidates(election_id).await?;
    let votes = store.list_vote_records(election_id).await?;
    Ok(Json(ElectionDump {
        election,
        candidates,
        votes,
    }))
}
