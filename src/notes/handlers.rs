use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tracing::{info, instrument};

use crate::dates::{parse_day_end, parse_day_start};
use crate::error::{ApiError, ApiResult};
use crate::notes::dto::{CreateNoteRequest, CreatedBetweenParams, UpdateNoteRequest};
use crate::notes::repo::{Note, NoteChanges, NoteDraft};
use crate::state::AppState;

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/notes", get(list_notes))
        .route("/notes/:id", get(get_note))
        .route("/notes/user/:user_id", get(get_notes_by_user))
        .route("/notes/title/:title", get(get_notes_by_title))
        .route("/notes/created-between", get(get_notes_created_between))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/notes", post(create_note))
        .route("/notes/:id", put(update_note))
        .route("/notes/:id", delete(delete_note))
}

#[instrument(skip(state))]
async fn list_notes(State(state): State<AppState>) -> ApiResult<Json<Vec<Note>>> {
    let started = Instant::now();
    let notes = state.notes.find_all().await?;
    info!(
        count = notes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "listed notes"
    );
    Ok(Json(notes))
}

#[instrument(skip(state))]
async fn get_note(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Note>> {
    let note = state.notes.find_by_id(id).await?;
    Ok(Json(note))
}

#[instrument(skip(state))]
async fn get_notes_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<Note>>> {
    let notes = state.notes.find_by_user(user_id).await?;
    Ok(Json(notes))
}

#[instrument(skip(state))]
async fn get_notes_by_title(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> ApiResult<Json<Vec<Note>>> {
    let notes = state.notes.find_by_title(&title).await?;
    Ok(Json(notes))
}

#[instrument(skip(state))]
async fn get_notes_created_between(
    State(state): State<AppState>,
    Query(params): Query<CreatedBetweenParams>,
) -> ApiResult<Json<Vec<Note>>> {
    let start = parse_day_start(&params.start_date)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid date '{}'", params.start_date)))?;
    let end = parse_day_end(&params.end_date)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid date '{}'", params.end_date)))?;
    let notes = state.notes.find_by_created_at_between(start, end).await?;
    Ok(Json(notes))
}

#[instrument(skip(state, body))]
async fn create_note(
    State(state): State<AppState>,
    Json(body): Json<CreateNoteRequest>,
) -> ApiResult<Json<Note>> {
    let note = state
        .notes
        .save(NoteDraft {
            id: None,
            title: body.title,
            content: body.content,
            user_id: body.user_id,
        })
        .await?;
    info!(id = note.id, "note created");
    Ok(Json(note))
}

#[instrument(skip(state, body))]
async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateNoteRequest>,
) -> ApiResult<Json<Note>> {
    let note = state
        .notes
        .update(
            id,
            NoteChanges {
                title: body.title,
                content: body.content,
            },
        )
        .await?;
    Ok(Json(note))
}

#[instrument(skip(state))]
async fn delete_note(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    // Existence re-check ahead of the service's own; keeps 404 symmetric
    // with the read path.
    state.notes.find_by_id(id).await?;
    state.notes.delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
