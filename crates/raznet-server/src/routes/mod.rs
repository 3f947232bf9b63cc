// Export route modules
pub mod reply;
pub mod session;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(reply::routes(state.clone()))
        .merge(session::routes(state))
}

#[cfg(test)]
pub(crate) mod test_support;
