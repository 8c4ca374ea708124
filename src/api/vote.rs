use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        body::{JsonBody, RequestBody},
        vote::{VoteDescription, VoteSpec},
    },
    common::Tally,
    mongodb::Id,
};
use crate::voting::TallyEngine;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, get_votes, get_tally]
}

#[post("/motions/<motion_id>/votes", data = "<spec>")]
async fn cast_vote(
    motion_id: Id,
    spec: JsonBody<'_, VoteSpec>,
    tally: &State<TallyEngine>,
) -> Result<(Status, Json<VoteDescription>)> {
    let (voter_id, choice) = VoteSpec::from_body(spec)?.parse()?;
    let vote = tally.cast_vote(motion_id, voter_id, choice).await?;
    Ok((Status::Created, Json(vote.into())))
}

#[get("/motions/<motion_id>/votes")]
async fn get_votes(motion_id: Id, tally: &State<TallyEngine>) -> Result<Json<Vec<VoteDescription>>> {
    let votes = tally.votes(motion_id).await?;
    Ok(Json(votes.into_iter().map(Into::into).collect()))
}

#[get("/motions/<motion_id>/votes/tally")]
async fn get_tally(motion_id: Id, tally: &State<TallyEngine>) -> Result<Json<Tally>> {
    Ok(Json(tally.tally(motion_id).await?))
}
