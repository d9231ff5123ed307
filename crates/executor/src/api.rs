//! HTTP API for the executor service.
//!
//! Endpoints:
//! - `POST /orders` - create an order and enqueue its execution job
//! - `GET /orders/{id}` - current order record
//! - `GET /users/{user_id}/orders` - latest orders for a user, newest first
//! - `GET /health` - health check
//!
//! Authentication and wallet validation happen upstream; requests arrive
//! with an already-validated user id and wallet address.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::subjects::JOB_SUBJECT;
use common::{Order, OrderJob, TokenRegistry};
use nats_client::NatsClient;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::store::OrderStore;

/// Default page size for user order listings.
const DEFAULT_LIST_LIMIT: usize = 20;

/// Application state shared across handlers.
pub struct AppState {
    pub store: OrderStore,
    pub nats: NatsClient,
    pub registry: TokenRegistry,
    pub venues: Vec<&'static str>,
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/orders", post(create_order_handler))
        .route("/orders/{id}", get(get_order_handler))
        .route("/users/{user_id}/orders", get(list_orders_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// API error response.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl ErrorResponse {
    fn new(error: impl ToString, code: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}

/// Order creation request.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub wallet_address: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    /// Acceptable slippage fraction; defaults to 1%.
    #[serde(default)]
    pub slippage: Option<Decimal>,
}

/// Order creation response.
#[derive(Serialize)]
struct CreateOrderResponse {
    order_id: Uuid,
    status: String,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    venues: Vec<&'static str>,
    active_orders: usize,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active_orders = state.store.active_count().await.unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        venues: state.venues.clone(),
        active_orders,
    })
}

/// Create an order record and enqueue its job.
/// POST /orders
async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    if req.amount <= Decimal::ZERO {
        return bad_request("Amount must be greater than 0", "INVALID_AMOUNT");
    }

    let slippage = req.slippage.unwrap_or(Decimal::new(1, 2));
    if slippage < Decimal::ZERO || slippage > Decimal::ONE {
        return bad_request("Slippage must be between 0 and 1", "INVALID_SLIPPAGE");
    }

    if let Err(e) = state.registry.validate_pair(&req.token_in, &req.token_out) {
        return bad_request(e, "INVALID_PAIR");
    }

    let token_in = req.token_in.to_uppercase();
    let token_out = req.token_out.to_uppercase();

    // The record must exist in `pending` before the job is visible to any
    // worker.
    let order = Order::new(req.user_id, token_in.clone(), token_out.clone(), req.amount);
    if let Err(e) = state.store.create(&order).await {
        error!("Order create failed: {}", e);
        return internal_error();
    }

    let job = OrderJob {
        order_id: order.id,
        user_id: req.user_id,
        wallet_address: req.wallet_address,
        token_in,
        token_out,
        amount_in: req.amount,
        slippage,
    };

    let payload = match serde_json::to_vec(&job) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Job serialization failed: {}", e);
            return internal_error();
        }
    };

    // Dedup id = order id: a duplicate enqueue inside the window is dropped
    // by the queue server.
    if let Err(e) = state
        .nats
        .publish_job(JOB_SUBJECT, &order.id.to_string(), payload.into())
        .await
    {
        error!("Job enqueue failed for order {}: {}", order.id, e);
        return internal_error();
    }

    info!("Order {} accepted for user {}", order.id, req.user_id);

    (
        StatusCode::CREATED,
        Json(
            serde_json::to_value(CreateOrderResponse {
                order_id: order.id,
                status: order.status.to_string(),
            })
            .unwrap(),
        ),
    )
}

/// Fetch one order.
/// GET /orders/{id}
async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.get(&id).await {
        Ok(Some(order)) => (StatusCode::OK, Json(serde_json::to_value(order).unwrap())),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::to_value(ErrorResponse::new("Order not found", "NOT_FOUND")).unwrap()),
        ),
        Err(e) => {
            error!("Order fetch failed: {}", e);
            internal_error()
        }
    }
}

/// Listing query parameters.
#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

/// List a user's latest orders, newest first.
/// GET /users/{user_id}/orders?limit=N
async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    match state.store.list_for_user(user_id, limit).await {
        Ok(orders) => (StatusCode::OK, Json(serde_json::to_value(orders).unwrap())),
        Err(e) => {
            error!("Order listing failed: {}", e);
            internal_error()
        }
    }
}

fn bad_request(error: impl ToString, code: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::to_value(ErrorResponse::new(error, code)).unwrap()),
    )
}

fn internal_error() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(
            serde_json::to_value(ErrorResponse::new("Internal server error", "INTERNAL")).unwrap(),
        ),
    )
}
