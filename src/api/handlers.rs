//! Request Handlers
//!
//! HTTP endpoints for the Mines game and the minimal wallet surface the
//! engine consumes.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::games::commitment::{generate_mine_locations, hash_server_seed};
use crate::games::MinesEngine;
use crate::ledger::Ledger;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub engine: Arc<MinesEngine>,
    pub ledger: Arc<Ledger>,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// POST /api/mines/bet
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceBetRequest>,
) -> Result<Json<GameSessionResponse>, ApiError> {
    let bet_micros = micros_from_amount(request.bet_amount).ok_or_else(|| {
        ApiError::bad_request(
            request_id.0.clone(),
            format!("bet_amount {} is not a valid positive amount", request.bet_amount),
        )
    })?;

    let view = state
        .engine
        .place_bet(
            &request.user_id,
            bet_micros,
            request.mine_count,
            &request.client_seed,
        )
        .await
        .map_err(|e| ApiError::engine(request_id.0.clone(), e))?;

    Ok(Json(view.into()))
}

/// POST /api/mines/:game_id/reveal
pub async fn reveal_tile_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    Json(request): Json<RevealTileRequest>,
) -> Result<Json<GameSessionResponse>, ApiError> {
    let view = state
        .engine
        .reveal_tile(&request.user_id, &game_id, request.tile_index)
        .await
        .map_err(|e| ApiError::engine(request_id.0.clone(), e))?;

    Ok(Json(view.into()))
}

/// POST /api/mines/:game_id/cashout
pub async fn cashout_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    Json(request): Json<CashoutRequest>,
) -> Result<Json<GameSessionResponse>, ApiError> {
    let view = state
        .engine
        .cashout(&request.user_id, &game_id)
        .await
        .map_err(|e| ApiError::engine(request_id.0.clone(), e))?;

    Ok(Json(view.into()))
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub user_id: String,
}

/// GET /api/mines/:game_id?user_id={id}
pub async fn get_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<GameSessionResponse>, ApiError> {
    let view = state
        .engine
        .session(&query.user_id, &game_id)
        .await
        .map_err(|e| ApiError::engine(request_id.0.clone(), e))?;

    Ok(Json(view.into()))
}

/// POST /api/mines/verify
///
/// Recompute the mine layout from a disclosed seed triple so a player can
/// check the game they experienced against the commitment they were shown.
pub async fn verify_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let grid_size = request
        .grid_size
        .unwrap_or(state.engine.config().grid_size);

    let mine_locations = generate_mine_locations(
        &request.server_seed,
        &request.client_seed,
        request.nonce,
        grid_size,
        request.mine_count,
    )
    .map_err(|e| ApiError::engine(request_id.0.clone(), e))?;

    Ok(Json(VerifyResponse {
        server_seed_hash: hash_server_seed(&request.server_seed),
        mine_locations,
    }))
}

/// GET /api/wallet/:user_id/balance
pub async fn balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance_micros = state
        .ledger
        .balance_micros(&user_id)
        .map_err(|e| ApiError::engine(request_id.0, e))?;
    Ok(Json(BalanceResponse {
        user_id,
        balance: amount_from_micros(balance_micros),
        balance_micros,
    }))
}

/// POST /api/wallet/:user_id/credit
///
/// Funding stand-in for the external wallet platform's deposit flow.
pub async fn credit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<CreditRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let amount_micros = micros_from_amount(request.amount).ok_or_else(|| {
        ApiError::bad_request(
            request_id.0.clone(),
            format!("amount {} is not a valid positive amount", request.amount),
        )
    })?;

    let balance_micros = state
        .ledger
        .credit(&user_id, amount_micros, "funding")
        .await
        .map_err(|e| ApiError::engine(request_id.0, e))?;

    Ok(Json(BalanceResponse {
        user_id,
        balance: amount_from_micros(balance_micros),
        balance_micros,
    }))
}
