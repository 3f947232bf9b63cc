use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use raznet::coordinator::welcome_message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct SessionResponse {
    welcome: String,
    provider: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// Start a session: the greeting to show and the provider answering it
async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    match welcome_message() {
        Ok(welcome) => {
            tracing::debug!(provider = state.provider, "starting session");
            (
                StatusCode::OK,
                Json(SessionResponse {
                    welcome,
                    provider: state.provider.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to render welcome message: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to start session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/session", get(start_session))
        .with_state(state)
}
