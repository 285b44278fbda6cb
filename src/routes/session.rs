use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::session_dto::{CreateSessionRequest, SendMessageRequest, SubmitAnswerRequest};
use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Response> {
    req.validate()?;
    let view = state.sessions.create_session(req.candidate.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let view = state.sessions.get_session(id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response> {
    req.validate()?;
    let resp = state.sessions.send_message(id, &req.message).await?;
    Ok(Json(resp).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Response> {
    req.validate()?;
    let resp = state.sessions.submit_answer(id, &req.selection).await?;
    Ok(Json(resp).into_response())
}

#[axum::debug_handler]
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let resp = state.sessions.end_session(id).await?;
    Ok(Json(resp).into_response())
}
