mod errors;
mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};

pub use errors::HttpError;
pub use state::HttpState;

pub fn router(state: HttpState) -> Router<()> {
    let api = Router::new()
        .route("/import", post(handlers::import))
        .route("/import_status", post(handlers::import_status))
        .route("/import_history", post(handlers::import_history))
        .route("/import_run", post(handlers::import_run))
        .route("/costs", post(handlers::costs))
        .route("/requests", post(handlers::requests))
        .route("/models", post(handlers::models));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state)
}
