//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Mines game lifecycle
        .route("/api/mines/bet", post(place_bet_handler))
        .route("/api/mines/:game_id/reveal", post(reveal_tile_handler))
        .route("/api/mines/:game_id/cashout", post(cashout_handler))
        .route("/api/mines/:game_id", get(get_session_handler))
        // Fairness verification
        .route("/api/mines/verify", post(verify_handler))
        // Wallet surface consumed by the engine
        .route("/api/wallet/:user_id/balance", get(balance_handler))
        .route("/api/wallet/:user_id/credit", post(credit_handler))
        // Attach shared state
        .with_state(state)
}
