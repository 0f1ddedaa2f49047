use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use mandi_common::error::MarketError;
use mandi_common::evaluate::Coverage;
use mandi_common::identity::{Actor, ActorRole};
use mandi_common::message::{Message, SenderRole};
use mandi_common::order::{Order, OrderId, OrderItem};
use mandi_common::quotation::{Quotation, QuotationId, QuotationItem};
use mandi_common::ranking::{self, CoverageFilter, PriceSort};

use crate::market::Market;
use crate::persist;

/// Shared server state: the market core plus the optional snapshot file.
pub struct AppState {
    pub market: Market,
    pub data_file: Option<PathBuf>,
}

type Rejection = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Map a core error onto the HTTP surface. Clients branch on `kind`;
/// `invalid_transition` means someone already acted on the order, while
/// `validation_error` means the caller's own input needs fixing.
fn reject(err: MarketError) -> Rejection {
    let status = match &err {
        MarketError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::InvalidTransition(_) | MarketError::ChannelClosed(_) => StatusCode::CONFLICT,
        MarketError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind(),
        }),
    )
}

/// Read the already-authenticated session identity the gateway attaches
/// to every request.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Rejection> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| reject(MarketError::Forbidden("missing x-actor-id header".into())))?;
    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .and_then(ActorRole::parse)
        .ok_or_else(|| reject(MarketError::Forbidden("missing or unknown x-actor-role header".into())))?;
    Ok(Actor {
        id: id.to_string(),
        role,
    })
}

fn require_role(actor: &Actor, role: ActorRole) -> Result<(), Rejection> {
    if actor.role != role {
        return Err(reject(MarketError::Forbidden(format!(
            "operation requires the {} role",
            role.label()
        ))));
    }
    Ok(())
}

// ─── API types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateOrderRequest {
    items: Vec<OrderItem>,
}

#[derive(Serialize)]
struct OrdersResponse {
    orders: Vec<Order>,
}

#[derive(Deserialize)]
struct OrderListQuery {
    buyer: Option<String>,
}

#[derive(Deserialize)]
struct QuotationRequest {
    items: Vec<QuotationItem>,
    #[serde(default)]
    discount: u64,
}

#[derive(Deserialize)]
struct QuotationListQuery {
    coverage: Option<String>,
    sort: Option<String>,
}

/// Per-quotation comparison line for the buyer's list view.
#[derive(Serialize)]
struct QuotationSummary {
    quotation_id: QuotationId,
    coverage: Coverage,
    total_price: u64,
    is_best_price: bool,
}

#[derive(Serialize)]
struct QuotationsResponse {
    quotations: Vec<Quotation>,
    summary: Vec<QuotationSummary>,
}

#[derive(Deserialize)]
struct AcceptRequest {
    quotation_id: QuotationId,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    quotation_id: QuotationId,
    message: String,
}

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<Message>,
    open: bool,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

// ─── Order handlers ──────────────────────────────────────────────────────────

async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    require_role(&actor, ActorRole::Buyer)?;
    let order = state
        .market
        .create_order(actor.buyer_id(), req.items)
        .await
        .map_err(reject)?;
    tracing::info!(order = %order.id.0, buyer = %actor.id, "order created");
    save_snapshot(&state).await?;
    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderListQuery>,
) -> Json<OrdersResponse> {
    let buyer = query.buyer.map(mandi_common::identity::BuyerId);
    let orders = state.market.list_orders(buyer.as_ref()).await;
    Json(OrdersResponse { orders })
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, Rejection> {
    let order = state
        .market
        .get_order(&OrderId(order_id))
        .await
        .map_err(reject)?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    require_role(&actor, ActorRole::Buyer)?;
    let order = state
        .market
        .cancel_order(&OrderId(order_id), &actor.buyer_id())
        .await
        .map_err(reject)?;
    tracing::info!(order = %order.id.0, "order cancelled");
    save_snapshot(&state).await?;
    Ok(Json(order))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, Rejection> {
    let order = state
        .market
        .complete_order(&OrderId(order_id))
        .await
        .map_err(reject)?;
    tracing::info!(order = %order.id.0, "order completed");
    save_snapshot(&state).await?;
    Ok(Json(order))
}

// ─── Quotation handlers ──────────────────────────────────────────────────────

async fn submit_quotation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    Json(req): Json<QuotationRequest>,
) -> Result<Json<Quotation>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    require_role(&actor, ActorRole::Seller)?;
    let quotation = state
        .market
        .submit_quotation(&OrderId(order_id), actor.seller_id(), req.items, req.discount)
        .await
        .map_err(reject)?;
    tracing::info!(
        quotation = %quotation.id.0,
        order = %quotation.order_id.0,
        seller = %actor.id,
        total = quotation.total_amount(),
        "quotation submitted"
    );
    save_snapshot(&state).await?;
    Ok(Json(quotation))
}

async fn list_quotations(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Query(query): Query<QuotationListQuery>,
) -> Result<Json<QuotationsResponse>, Rejection> {
    let coverage = match query.coverage.as_deref() {
        None => CoverageFilter::All,
        Some(raw) => CoverageFilter::parse(raw).ok_or_else(|| {
            reject(MarketError::Validation(format!(
                "unknown coverage filter '{raw}'"
            )))
        })?,
    };
    let sort = match query.sort.as_deref() {
        None => None,
        Some(raw) => Some(PriceSort::parse(raw).ok_or_else(|| {
            reject(MarketError::Validation(format!("unknown sort order '{raw}'")))
        })?),
    };

    let (order, quotations) = state
        .market
        .quotations_for_order(&OrderId(order_id))
        .await
        .map_err(reject)?;

    let mut ranked = ranking::rank(&order, &quotations);
    ranked = ranking::filter_by_coverage(ranked, coverage);
    if let Some(sort) = sort {
        ranking::sort_by_price(&mut ranked, sort);
    }

    let summary = ranked
        .iter()
        .map(|entry| QuotationSummary {
            quotation_id: entry.quotation.id.clone(),
            coverage: entry.result.coverage,
            total_price: entry.result.total_price,
            is_best_price: entry.result.is_best_price,
        })
        .collect();
    let quotations = ranked.into_iter().map(|entry| entry.quotation).collect();
    Ok(Json(QuotationsResponse { quotations, summary }))
}

async fn update_quotation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(quotation_id): Path<String>,
    Json(req): Json<QuotationRequest>,
) -> Result<Json<Quotation>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    require_role(&actor, ActorRole::Seller)?;
    let quotation = state
        .market
        .update_quotation(
            &QuotationId(quotation_id),
            &actor.seller_id(),
            req.items,
            req.discount,
        )
        .await
        .map_err(reject)?;
    save_snapshot(&state).await?;
    Ok(Json(quotation))
}

async fn withdraw_quotation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(quotation_id): Path<String>,
) -> Result<Json<OkResponse>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    require_role(&actor, ActorRole::Seller)?;
    state
        .market
        .withdraw_quotation(&QuotationId(quotation_id), &actor.seller_id())
        .await
        .map_err(reject)?;
    save_snapshot(&state).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn accept_quotation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    Json(req): Json<AcceptRequest>,
) -> Result<Json<Order>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    require_role(&actor, ActorRole::Buyer)?;
    let order = state
        .market
        .accept_quotation(&OrderId(order_id), &req.quotation_id, &actor.buyer_id())
        .await
        .map_err(reject)?;
    tracing::info!(
        order = %order.id.0,
        quotation = %req.quotation_id.0,
        "quotation accepted, siblings rejected"
    );
    save_snapshot(&state).await?;
    Ok(Json(order))
}

// ─── Chat handlers ───────────────────────────────────────────────────────────

async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(quotation_id): Path<String>,
) -> Result<Json<MessagesResponse>, Rejection> {
    let quotation_id = QuotationId(quotation_id);
    let messages = state
        .market
        .messages_for_quotation(&quotation_id)
        .await
        .map_err(reject)?;
    let open = state
        .market
        .chat_is_open(&quotation_id)
        .await
        .map_err(reject)?;
    Ok(Json(MessagesResponse { messages, open }))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    let sender_role = match actor.role {
        ActorRole::Buyer => SenderRole::Buyer,
        ActorRole::Seller => SenderRole::Seller,
        ActorRole::Admin => {
            return Err(reject(MarketError::Forbidden(
                "only the buyer and the seller may chat on a quotation".into(),
            )));
        }
    };
    let message = state
        .market
        .send_message(&req.quotation_id, actor.id, sender_role, req.message)
        .await
        .map_err(reject)?;
    save_snapshot(&state).await?;
    Ok(Json(message))
}

// ─── Health ──────────────────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Write the market snapshot if a data file is configured. I/O failures
/// surface as `storage_unavailable`, the one retryable error class.
async fn save_snapshot(state: &AppState) -> Result<(), Rejection> {
    let Some(path) = &state.data_file else {
        return Ok(());
    };
    let snapshot = state.market.snapshot().await;
    persist::save(path, &snapshot).map_err(reject)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/cancel", put(cancel_order))
        .route("/orders/{id}/complete", put(complete_order))
        .route("/orders/{id}/quotations", post(submit_quotation).get(list_quotations))
        .route("/orders/{id}/accept-quotation", post(accept_quotation))
        .route("/quotations/{id}", put(update_quotation).delete(withdraw_quotation))
        .route("/messages/quotation/{id}", get(get_messages))
        .route("/messages/send", post(send_message))
        .route("/health", get(health))
        .with_state(state)
}
