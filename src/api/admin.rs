use log::{info, warn};
use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    candidate::{Ballot, Candidate, CandidateSpec},
    election::{Election, ElectionSpec, ElectionStatus},
    mongodb::Id,
    results::{ElectionResults, Turnout},
    session::AdminToken,
    voter::{StudentId, Voter, VoterStatus},
};
use crate::store::{Store, VoteStore};

pub fn routes() -> Vec<Route> {
    routes![
        turnout,
        elections,
        election_results,
        create_election,
        set_election_status,
        add_candidate,
        add_voter,
        mark_voted,
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ElectionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVoter {
    pub student_id: String,
    pub name: String,
}

async fn election_or_404(store: &dyn VoteStore, election_id: Id) -> Result<Election> {
    store
        .get_election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}

#[get("/admin/turnout")]
pub async fn turnout(_token: AdminToken, store: &State<Store>) -> Result<Json<Turnout>> {
    let voters = store.list_voters().await?;
    Ok(Json(Turnout::from_voters(voters.iter())))
}

#[get("/admin/elections")]
pub async fn elections(_token: AdminToken, store: &State<Store>) -> Result<Json<Vec<Election>>> {
    Ok(Json(store.list_elections().await?))
}

#[get("/admin/elections/<election_id>/results")]
pub async fn election_results(
    _token: AdminToken,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<ElectionResults>> {
    let election = election_or_404(store.inner().as_ref(), election_id).await?;
    let candidates = store.list_candidates(election_id).await?;
    let records = store.list_vote_records(election_id).await?;
    let ballot = Ballot::new(election, candidates);
    Ok(Json(ElectionResults::tally(&ballot, records.iter())))
}

#[post("/admin/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    _token: AdminToken,
    spec: Json<ElectionSpec>,
    store: &State<Store>,
) -> Result<Json<Election>> {
    if spec.title.trim().is_empty() {
        return Err(Error::BadRequest("Election title must not be empty".to_string()));
    }
    if spec.start_at >= spec.end_at {
        return Err(Error::BadRequest(
            "Election must start before it ends".to_string(),
        ));
    }

    let election = Election::from_spec(spec.into_inner());
    store.insert_election(&election).await?;
    info!("Created election {} '{}'", election.id, election.title);
    Ok(Json(election))
}

#[put("/admin/elections/<election_id>/status", data = "<update>", format = "json")]
pub async fn set_election_status(
    _token: AdminToken,
    election_id: Id,
    update: Json<StatusUpdate>,
    store: &State<Store>,
) -> Result<Json<Election>> {
    election_or_404(store.inner().as_ref(), election_id).await?;
    store
        .set_election_status(election_id, update.status)
        .await?;
    info!("Election {election_id} is now {:?}", update.status);
    Ok(Json(
        election_or_404(store.inner().as_ref(), election_id).await?,
    ))
}

#[post("/admin/elections/<election_id>/candidates", data = "<spec>", format = "json")]
pub async fn add_candidate(
    _token: AdminToken,
    election_id: Id,
    spec: Json<CandidateSpec>,
    store: &State<Store>,
) -> Result<Json<Candidate>> {
    let election = election_or_404(store.inner().as_ref(), election_id).await?;
    // The roster decides how many selections a vote needs, so it is frozen
    // once voting opens.
    if election.status != ElectionStatus::Planned {
        return Err(Error::Conflict(format!(
            "Election {election_id} is no longer accepting candidates"
        )));
    }
    if spec.name.trim().is_empty() || spec.position.trim().is_empty() {
        return Err(Error::BadRequest(
            "Candidate name and position must not be empty".to_string(),
        ));
    }

    let candidate = Candidate::from_spec(election_id, spec.into_inner());
    store.insert_candidate(&candidate).await?;
    Ok(Json(candidate))
}

#[post("/admin/voters", data = "<voter>", format = "json")]
pub async fn add_voter(
    _token: AdminToken,
    voter: Json<NewVoter>,
    store: &State<Store>,
) -> Result<Json<Voter>> {
    let student_id = voter
        .student_id
        .parse::<StudentId>()
        .map_err(|e| Error::BadRequest(e.to_string()))?;
    let voter = Voter::new(student_id, voter.into_inner().name);
    store.insert_voter(&voter).await?;
    Ok(Json(voter))
}

/// Mark a voter as having voted, for reconciling a submission whose vote was
/// recorded but whose status update failed.
#[post("/admin/voters/<student_id>/voted")]
pub async fn mark_voted(
    _token: AdminToken,
    student_id: StudentId,
    store: &State<Store>,
) -> Result<Json<VoterStatus>> {
    store.set_voter_voted(&student_id).await?;
    warn!("Voter {student_id} manually marked as voted");
    Ok(Json(store.get_voter_status(&student_id).await?))
}
