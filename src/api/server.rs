//! API Server Module
//!
//! This module implements the REST endpoints for Digital Product Passports.
//! Each request is validated, handed to the chain layer, and the result is
//! reshaped into JSON.

use super::models::{
    CreateResponse, DppPayload, DppView, IdQuery, UpdateFailure, UpdatePayload, UpdateResponse,
    parse_id,
};
use super::ApiError;
use crate::{DppFields, DppId, chain::DppLedger, config::ApiConfig};
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared application state that is accessible across all request handlers
///
/// Holds the chain client constructed at startup. Handlers never build their
/// own connection.
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<dyn DppLedger>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn DppLedger>) -> Self {
        Self { ledger }
    }
}

/// The main API server struct
///
/// Encapsulates the listener configuration and application state.
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Listener configuration (host, port)
    /// * `ledger` - Chain client shared by every handler
    pub fn new(config: ApiConfig, ledger: Arc<dyn DppLedger>) -> Self {
        Self {
            config,
            state: AppState::new(ledger),
        }
    }

    /// Starts the API server and serves until Ctrl-C is received
    ///
    /// # Returns
    /// `Ok(())` after a clean shutdown, or an error if binding fails
    pub async fn start(self) -> anyhow::Result<()> {
        let app = router(self.state);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

/// Build the router with every passport route
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/dpp", post(create_dpp))
        .route("/dpp/update", put(update_dpp_from_body))
        .route("/dpp/history", get(history_by_query))
        .route("/dpp/first", get(first_by_query))
        .route("/dpp/last", get(last_by_query))
        .route("/dpp/:id", put(update_dpp))
        .route("/dpp/:id/history", get(history))
        .route("/dpp/:id/first", get(first))
        .route("/dpp/:id/last", get(last))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Liveness only; the chain connection is never consulted
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Debug, Clone, Copy)]
enum ReadKind {
    History,
    First,
    Last,
}

async fn read(state: &AppState, kind: ReadKind, id: DppId) -> Result<Json<Vec<DppView>>, ApiError> {
    info!("Reading {:?} of DPP {}", kind, id);

    let records = match kind {
        ReadKind::History => state.ledger.history(id).await?,
        ReadKind::First => state.ledger.first(id).await?.into_iter().collect(),
        ReadKind::Last => state.ledger.last(id).await?.into_iter().collect(),
    };

    Ok(Json(records.into_iter().map(DppView::from).collect()))
}

async fn read_by_path(state: &AppState, kind: ReadKind, raw: &str) -> Result<Json<Vec<DppView>>, ApiError> {
    let id = parse_id(raw)?;
    read(state, kind, id).await
}

async fn read_by_query(
    state: &AppState,
    kind: ReadKind,
    query: IdQuery,
) -> Result<Json<Vec<DppView>>, ApiError> {
    let raw = query
        .dpp_id
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'dppId' query parameter".to_string()))?;
    read_by_path(state, kind, &raw).await
}

async fn history(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<DppView>>, ApiError> {
    read_by_path(&state, ReadKind::History, &id).await
}

async fn first(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<DppView>>, ApiError> {
    read_by_path(&state, ReadKind::First, &id).await
}

async fn last(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<DppView>>, ApiError> {
    read_by_path(&state, ReadKind::Last, &id).await
}

async fn history_by_query(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<DppView>>, ApiError> {
    read_by_query(&state, ReadKind::History, query).await
}

async fn first_by_query(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<DppView>>, ApiError> {
    read_by_query(&state, ReadKind::First, query).await
}

async fn last_by_query(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<DppView>>, ApiError> {
    read_by_query(&state, ReadKind::Last, query).await
}

/// Unwrap a JSON body, turning axum's rejection into a 400
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

async fn create_dpp(
    State(state): State<AppState>,
    payload: Result<Json<DppPayload>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
    let fields = json_body(payload)?.into_fields()?;
    info!("Creating DPP for {} / {}", fields.company_name, fields.product_type);

    let created = state.ledger.add(fields).await?;
    Ok(Json(created.into()))
}

async fn update_dpp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DppPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let fields = json_body(payload)?.into_fields()?;
    submit_update(&state, id, fields).await
}

async fn update_dpp_from_body(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = json_body(payload)?;
    let id = payload.id()?;
    let fields = payload.fields.into_fields()?;
    submit_update(&state, id, fields).await
}

async fn submit_update(state: &AppState, id: DppId, fields: DppFields) -> Result<Response, ApiError> {
    info!("Updating DPP {}", id);

    match state.ledger.update(id, fields).await? {
        Some(receipt) => Ok(Json(UpdateResponse {
            status: "success",
            transaction: receipt.into(),
        })
        .into_response()),
        None => {
            warn!("Update of DPP {} produced no receipt", id);
            Ok((StatusCode::BAD_REQUEST, Json(UpdateFailure::default())).into_response())
        }
    }
}
