use std::sync::Arc;
use rocket::{Build, Rocket, State, catchers, delete, get, post, routes, http::Status, serde::json::Json};
use tracing::{debug, instrument};
use shared::{CreatePollRequest, Poll, UserInfo, VoteReceipt, VoteRequest};
use crate::{
    catchers::{bad_request, forbidden, internal_error, not_found, too_many_requests, unprocessable},
    config::AppConfig,
    error::ApiError,
    polls::PollStore,
    rate_limiter::RateLimiter,
    table::PollTable,
    utils::{check_options_for_profanity, parse_poll_id},
};

pub struct AppState {
    pub polls: PollStore,
    pub create_limiter: RateLimiter,
}

impl AppState {
    pub fn new(table: Arc<dyn PollTable>, config: &AppConfig) -> Self {
        Self {
            polls: PollStore::new(table),
            create_limiter: RateLimiter::new(config.create_poll_limit, config.create_poll_window_minutes),
        }
    }
}

pub fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount("/api", routes![create_poll, get_poll, delete_poll, cast_vote])
        .register(
            "/",
            catchers![
                forbidden,
                too_many_requests,
                bad_request,
                unprocessable,
                internal_error,
                not_found
            ],
        )
}

#[instrument(skip(state, request, user_info), fields(user = %user_info.user_id))]
#[post("/polls", format = "json", data = "<request>")]
pub async fn create_poll(
    state: &State<AppState>,
    request: Json<CreatePollRequest>,
    user_info: UserInfo,
) -> Result<Json<Poll>, ApiError> {
    let request = request.into_inner();

    let poll = Poll::new(user_info.user_id.clone(), &request.options)
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    check_options_for_profanity(&request.options).map_err(ApiError::InvalidRequest)?;

    let rate_limit_key = format!("create_poll:{}", user_info.user_id);
    state.create_limiter.check(&rate_limit_key).map_err(ApiError::RateLimited)?;

    state.polls.create(&poll).await?;
    debug!("Poll {} created", poll.id);
    Ok(Json(poll))
}

#[get("/polls/<id>")]
pub async fn get_poll(state: &State<AppState>, id: &str) -> Result<Json<Poll>, ApiError> {
    let id = parse_poll_id(id)?;
    Ok(Json(state.polls.load(id).await?))
}

#[instrument(skip(state, user_info), fields(poll_id = %id))]
#[delete("/polls/<id>")]
pub async fn delete_poll(state: &State<AppState>, id: &str, user_info: UserInfo) -> Result<Status, ApiError> {
    let id = parse_poll_id(id)?;
    let poll = state.polls.load(id).await?;

    if poll.owner != user_info.user_id {
        return Err(ApiError::Forbidden);
    }

    state.polls.remove(id).await?;
    Ok(Status::NoContent)
}

#[instrument(skip(state, request, user_info), fields(poll_id = %id))]
#[post("/polls/<id>/votes", format = "json", data = "<request>")]
pub async fn cast_vote(
    state: &State<AppState>,
    id: &str,
    request: Json<VoteRequest>,
    user_info: UserInfo,
) -> Result<Json<VoteReceipt>, ApiError> {
    let poll_id = parse_poll_id(id)?;
    let VoteRequest { option } = request.into_inner();

    state.polls.vote(poll_id, &user_info.user_id, &option).await?;

    Ok(Json(VoteReceipt {
        poll_id,
        option,
        user: user_info.user_id,
    }))
}
