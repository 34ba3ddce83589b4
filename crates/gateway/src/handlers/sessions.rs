//! Session management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use lexroute_common::{
    errors::{AppError, Result},
    models::ConversationTurn,
};
use lexroute_context::{
    session::{is_exit_sentinel, FAREWELL, GREETING},
    ComplexityTier, ResponseContext, Session,
};
use lexroute_search::SubqueryLedger;

/// Create session response
#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub greeting: String,
    pub created_at: DateTime<Utc>,
}

/// Session state response
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub turns_handled: usize,
    pub closed: bool,
    pub summary: String,
    pub history: Vec<ConversationTurn>,
    pub last_ledger: SubqueryLedger,
}

/// Turn request
#[derive(Debug, Deserialize, Validate)]
pub struct TurnRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,
}

/// Turn response
#[derive(Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<ComplexityTier>,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ResponseContext>,
    pub classification_fallback: bool,
    pub processing_time_ms: u64,
}

/// Create a new session
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    let session = Session::start(state.engine.clone()).await;
    let created_at = session.created_at();
    let session_id = state.sessions.insert(session).await;

    tracing::info!(session_id = %session_id, "Session created");

    Ok((StatusCode::CREATED, Json(CreateSessionResponse {
        session_id,
        greeting: GREETING.to_string(),
        created_at,
    })))
}

/// Get session state
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let handle = state.sessions.get(session_id).await?;
    let session = handle.lock().await;

    Ok(Json(SessionResponse {
        session_id,
        created_at: session.created_at(),
        turns_handled: session.turns_handled(),
        closed: session.is_closed(),
        summary: session.memory().summary().to_string(),
        history: session.memory().turns().to_vec(),
        last_ledger: session.last_ledger().clone(),
    }))
}

/// Close and forget a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    let handle = state.sessions.remove(session_id).await?;
    handle.lock().await.close();

    tracing::info!(session_id = %session_id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Handle one user query within a session
///
/// Sending the exit sentinel ends the session: it is removed from the
/// store and the farewell is returned with `closed: true`.
pub async fn create_turn(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let start = Instant::now();
    let handle = state.sessions.get(session_id).await?;

    let result = {
        let mut session = handle.lock().await;
        session.handle_turn(&request.query).await
    };

    let processing_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => Ok(Json(TurnResponse {
            session_id,
            closed: false,
            tier: Some(outcome.tier),
            response: outcome.response,
            context: Some(outcome.context),
            classification_fallback: outcome.classification_fallback,
            processing_time_ms,
        })),
        Err(AppError::SessionClosed) if is_exit_sentinel(&request.query) => {
            state.sessions.remove(session_id).await?;
            tracing::info!(session_id = %session_id, "Session ended by user");

            Ok(Json(TurnResponse {
                session_id,
                closed: true,
                tier: None,
                response: FAREWELL.to_string(),
                context: None,
                classification_fallback: false,
                processing_time_ms,
            }))
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Turn failed");
            Err(e)
        }
    }
}
