use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tracing::{info, instrument, warn};

use crate::dates::parse_date_time;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest};
use crate::users::repo::{Role, User, UserChanges, UserDraft};

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/search/username/:username", get(get_users_by_username))
        .route("/users/search/email/:email", get(get_user_by_email))
        .route("/users/search/role/:role", get(get_users_by_role))
        .route("/users/search/createdAfter/:date", get(get_users_created_after))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", put(update_user))
        .route("/users/:id", delete(delete_user))
}

#[instrument(skip(state))]
async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let started = Instant::now();
    let users = state.users.find_all().await?;
    info!(
        count = users.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "listed users"
    );
    Ok(Json(users))
}

#[instrument(skip(state))]
async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<User>> {
    let user = state.users.find_by_id(id).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
async fn get_users_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.users.find_by_username(&username).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state.users.find_by_email(&email).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
async fn get_users_by_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> ApiResult<Json<Vec<User>>> {
    let Some(role) = Role::parse(&role) else {
        warn!(%role, "invalid role parameter");
        return Err(ApiError::BadRequest(format!("invalid role: {role}")));
    };
    let users = state.users.find_by_role(role).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
async fn get_users_created_after(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Json<Vec<User>>> {
    let Some(date) = parse_date_time(&date) else {
        warn!(%date, "invalid date parameter");
        return Err(ApiError::BadRequest(format!("invalid date: {date}")));
    };
    let users = state.users.find_by_created_at_after(date).await?;
    Ok(Json(users))
}

#[instrument(skip(state, body))]
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .users
        .save(UserDraft {
            id: None,
            username: body.username,
            email: body.email,
            password: body.password,
            role: body.role,
        })
        .await?;
    info!(id = user.id, "user created");
    Ok(Json(user))
}

#[instrument(skip(state, body))]
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .users
        .update(
            id,
            UserChanges {
                username: body.username,
                email: body.email,
                password: body.password,
                role: body.role,
            },
        )
        .await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    // Existence re-check ahead of the service's own; keeps 404 symmetric
    // with the read path.
    state.users.find_by_id(id).await?;
    state.users.delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
