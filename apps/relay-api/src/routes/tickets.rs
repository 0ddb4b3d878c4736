//! Internal ticket-minting endpoint.
//!
//! Only the platform backend calls this route, authenticated with the shared
//! service secret. The backend has already verified the user; the relay just
//! binds that identity to a single-use ticket the browser presents in its
//! IDENTIFY frame.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::tickets;
use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/internal/v1/tickets", post(create_ticket))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketResponse {
    pub ticket: String,
    pub expires_in: u64,
}

#[utoipa::path(
    post,
    path = "/internal/v1/tickets",
    tag = "Tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket minted", body = TicketResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiErrorBody),
        (status = 401, description = "Missing or wrong service secret", body = crate::error::ApiErrorBody),
    ),
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let secret = headers
        .get("x-relay-secret")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing service secret"))?;

    if secret != state.config.service_secret {
        return Err(ApiError::unauthorized("Invalid service secret"));
    }

    if body.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id is required"));
    }
    if body.display_name.trim().is_empty() {
        return Err(ApiError::bad_request("display_name is required"));
    }

    let ticket = tickets::generate_ws_ticket();
    tickets::store_ws_ticket(
        state.kv.as_ref(),
        &ticket,
        &tickets::WsTicketData {
            user_id: body.user_id,
            display_name: body.display_name,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(TicketResponse {
            ticket,
            expires_in: tickets::WS_TICKET_TTL_SECS,
        }),
    ))
}
