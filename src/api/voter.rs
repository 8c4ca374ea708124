use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        body::{JsonBody, RequestBody},
        pagination::{Paginated, Pagination},
        voter::{EligibilityStatus, VoterDescription, VoterSpec, VoterStatusChange},
    },
    mongodb::Id,
};
use crate::voting::VoterRegistry;

pub fn routes() -> Vec<Route> {
    routes![
        register_voter,
        get_voters,
        get_voter,
        change_voter_identity,
        set_voter_status,
        delete_voter,
        get_voter_by_external_id,
        get_eligibility_by_external_id,
    ]
}

#[post("/voters", data = "<spec>")]
async fn register_voter(
    spec: JsonBody<'_, VoterSpec>,
    registry: &State<VoterRegistry>,
) -> Result<(Status, Json<VoterDescription>)> {
    let spec = VoterSpec::from_body(spec)?;
    let voter = registry.register(&spec.external_id).await?;
    Ok((Status::Created, Json(voter.into())))
}

#[get("/voters")]
async fn get_voters(
    pagination: Pagination,
    registry: &State<VoterRegistry>,
) -> Result<Json<Paginated<VoterDescription>>> {
    let page = registry.voters(pagination).await?;
    Ok(Json(page.map(Into::into)))
}

#[get("/voters/<voter_id>")]
async fn get_voter(voter_id: Id, registry: &State<VoterRegistry>) -> Result<Json<VoterDescription>> {
    Ok(Json(registry.voter(voter_id).await?.into()))
}

#[put("/voters/<voter_id>", data = "<spec>")]
async fn change_voter_identity(
    voter_id: Id,
    spec: JsonBody<'_, VoterSpec>,
    registry: &State<VoterRegistry>,
) -> Result<Json<VoterDescription>> {
    let spec = VoterSpec::from_body(spec)?;
    let voter = registry.change_identity(voter_id, &spec.external_id).await?;
    Ok(Json(voter.into()))
}

#[patch("/voters/<voter_id>/status", data = "<change>")]
async fn set_voter_status(
    voter_id: Id,
    change: JsonBody<'_, VoterStatusChange>,
    registry: &State<VoterRegistry>,
) -> Result<Json<VoterDescription>> {
    let change = VoterStatusChange::from_body(change)?;
    let voter = registry.set_active(voter_id, change.active).await?;
    Ok(Json(voter.into()))
}

#[delete("/voters/<voter_id>")]
async fn delete_voter(voter_id: Id, registry: &State<VoterRegistry>) -> Result<Status> {
    registry.remove(voter_id).await?;
    Ok(Status::NoContent)
}

#[get("/voters/external/<external_id>")]
async fn get_voter_by_external_id(
    external_id: &str,
    registry: &State<VoterRegistry>,
) -> Result<Json<VoterDescription>> {
    Ok(Json(registry.voter_by_external_id(external_id).await?.into()))
}

#[get("/voters/external/<external_id>/status")]
async fn get_eligibility_by_external_id(
    external_id: &str,
    registry: &State<VoterRegistry>,
) -> Result<Json<EligibilityStatus>> {
    let voter = registry.voter_by_external_id(external_id).await?;
    Ok(Json(voter.is_eligible().into()))
}
