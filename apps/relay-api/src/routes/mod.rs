pub mod health;
pub mod tickets;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(tickets::router())
        .merge(crate::relay::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Tickets
        tickets::create_ticket,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Route request/response types
            tickets::CreateTicketRequest,
            tickets::TicketResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Tickets", description = "Internal WebSocket ticket minting"),
    )
)]
pub struct ApiDoc;
