use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        body::{is_empty_body, JsonBody, RequestBody},
        motion::{MotionDescription, MotionSpec, OpenSessionRequest},
        pagination::{Paginated, Pagination},
    },
    mongodb::Id,
};
use crate::voting::{Clock, MotionStore, SharedClock, VotingSession};

pub fn routes() -> Vec<Route> {
    routes![
        create_motion,
        get_motions,
        get_motion,
        open_session,
        session_status
    ]
}

#[post("/motions", data = "<spec>")]
async fn create_motion(
    spec: JsonBody<'_, MotionSpec>,
    motions: &State<MotionStore>,
    clock: &State<SharedClock>,
) -> Result<(Status, Json<MotionDescription>)> {
    let spec = MotionSpec::from_body(spec)?;
    let motion = motions.create(&spec.title, &spec.description).await?;
    Ok((
        Status::Created,
        Json(MotionDescription::new(motion, clock.now())),
    ))
}

#[get("/motions")]
async fn get_motions(
    pagination: Pagination,
    motions: &State<MotionStore>,
    clock: &State<SharedClock>,
) -> Result<Json<Paginated<MotionDescription>>> {
    let now = clock.now();
    let page = motions.list(pagination).await?;
    Ok(Json(page.map(|motion| MotionDescription::new(motion, now))))
}

#[get("/motions/<motion_id>")]
async fn get_motion(
    motion_id: Id,
    motions: &State<MotionStore>,
    clock: &State<SharedClock>,
) -> Result<Json<MotionDescription>> {
    let motion = motions.get(motion_id).await?;
    Ok(Json(MotionDescription::new(motion, clock.now())))
}

/// The body is optional; without one the configured default duration is used.
/// A body that is present must be well-formed.
#[post("/motions/<motion_id>/session", data = "<request>")]
async fn open_session(
    motion_id: Id,
    request: JsonBody<'_, OpenSessionRequest>,
    session: &State<VotingSession>,
    clock: &State<SharedClock>,
) -> Result<Json<MotionDescription>> {
    let duration_minutes = if is_empty_body(&request) {
        None
    } else {
        OpenSessionRequest::from_body(request)?.duration_minutes
    };
    let motion = session.open(motion_id, duration_minutes).await?;
    Ok(Json(MotionDescription::new(motion, clock.now())))
}

#[get("/motions/<motion_id>/session/status")]
async fn session_status(motion_id: Id, session: &State<VotingSession>) -> Result<Json<bool>> {
    Ok(Json(session.is_open(motion_id).await?))
}
