//! HTTP API for the pantry
//!
//! Authentication happens in front of this server: the identity provider sets
//! the `X-Pantry-Owner` header and every handler scopes its work to that owner.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::error::{FieldError, PantryError};
use crate::history_feed::HistorySnapshot;
use crate::listing::{ListQuery, ListedItem};
use crate::models::{Category, HistoryEntry, Item, ItemId, OwnerId, RawCandidate};
use crate::reconcile::Submission;
use crate::service::Pantry;

/// Header carrying the authenticated owner id
pub const OWNER_HEADER: &str = "x-pantry-owner";

const DEFAULT_POLL_SECS: u64 = 30;
const MAX_POLL_SECS: u64 = 120;

/// Shared application state
#[derive(Clone)]
struct AppState {
    pantry: Arc<Pantry>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fields: Vec::new(),
        }
    }
}

/// A failed request rendered as an HTTP response
enum ApiError {
    Pantry(PantryError),
    /// The blocking worker running the request panicked or was cancelled
    Worker(JoinError),
}

impl From<PantryError> for ApiError {
    fn from(err: PantryError) -> Self {
        ApiError::Pantry(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        let err = match self {
            ApiError::Pantry(err) => err,
            ApiError::Worker(_) => return StatusCode::INTERNAL_SERVER_ERROR,
        };
        match err {
            PantryError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PantryError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            PantryError::NotFound(_) => StatusCode::NOT_FOUND,
            PantryError::Conflict { .. } => StatusCode::CONFLICT,
            PantryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PantryError::Store(_) | PantryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Pantry(err) => err.to_string(),
            ApiError::Worker(err) => format!("request worker failed: {}", err),
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", message);
        } else {
            log::debug!("Request rejected: {}", message);
        }

        let fields = match &self {
            ApiError::Pantry(PantryError::Validation(v)) => v.fields.clone(),
            _ => Vec::new(),
        };
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            fields,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Owner id taken from the identity header
struct Owner(OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(OwnerId::new)
            .map(Owner)
            .ok_or(ApiError::Pantry(PantryError::NotAuthenticated))
    }
}

/// Run a pantry call on the blocking pool so database waits and retry
/// backoff never stall the async workers
async fn run_blocking<T, F>(pantry: &Arc<Pantry>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Pantry) -> crate::Result<T> + Send + 'static,
{
    let pantry = Arc::clone(pantry);
    tokio::task::spawn_blocking(move || op(&pantry))
        .await
        .map_err(ApiError::Worker)?
        .map_err(ApiError::from)
}

/// List query parameters
#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    sort: String,
}

/// Item body for submit and edit. Quantity may arrive as a JSON number or as
/// the raw text of a form field.
#[derive(Deserialize)]
struct ItemBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    quantity: serde_json::Value,
    #[serde(default, alias = "expiryDate")]
    expiry_date: String,
    #[serde(default)]
    category: String,
}

impl From<ItemBody> for RawCandidate {
    fn from(body: ItemBody) -> Self {
        let quantity = match body.quantity {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s,
            _ => String::new(),
        };
        RawCandidate {
            name: body.name,
            quantity,
            expiry_date: body.expiry_date,
            category: body.category,
        }
    }
}

#[derive(Deserialize)]
struct PollParams {
    timeout_secs: Option<u64>,
}

/// History long-poll result
#[derive(Serialize)]
struct HistoryUpdate {
    /// `false` when the poll timed out without a change
    changed: bool,
    entries: HistorySnapshot,
}

/// GET /api/categories
async fn categories_handler() -> Json<ApiResponse<Vec<&'static str>>> {
    Json(ApiResponse::ok(
        Category::ALL.iter().map(|c| c.as_str()).collect(),
    ))
}

/// GET /api/items?q={search}&category={category}&sort={name|quantity|expiryDate}
async fn list_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<ListedItem>> {
    let query = ListQuery::parse(&params.q, &params.category, &params.sort)
        .map_err(PantryError::from)?;
    let now = Local::now().naive_local();
    let items = run_blocking(&state.pantry, move |p| p.list(&owner, &query, now)).await?;
    Ok(Json(ApiResponse::ok(items)))
}

/// POST /api/items
async fn submit_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(body): Json<ItemBody>,
) -> Result<(StatusCode, Json<ApiResponse<Submission>>), ApiError> {
    let raw = RawCandidate::from(body);
    let submission = run_blocking(&state.pantry, move |p| p.submit(&owner, &raw)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(submission))))
}

/// PUT /api/items/{id}
async fn edit_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<i64>,
    Json(body): Json<ItemBody>,
) -> ApiResult<Item> {
    let raw = RawCandidate::from(body);
    let item = run_blocking(&state.pantry, move |p| p.edit(&owner, ItemId(id), &raw)).await?;
    Ok(Json(ApiResponse::ok(item)))
}

/// DELETE /api/items/{id}
async fn delete_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<i64>,
) -> ApiResult<ItemId> {
    run_blocking(&state.pantry, move |p| p.delete(&owner, ItemId(id))).await?;
    Ok(Json(ApiResponse::ok(ItemId(id))))
}

/// GET /api/history
async fn history_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Vec<HistoryEntry>> {
    let history = run_blocking(&state.pantry, move |p| p.history(&owner)).await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// GET /api/history/next?timeout_secs={secs}
/// Waits for the next history change and returns the full snapshot
async fn history_next_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(params): Query<PollParams>,
) -> ApiResult<HistoryUpdate> {
    let wait = Duration::from_secs(
        params
            .timeout_secs
            .unwrap_or(DEFAULT_POLL_SECS)
            .min(MAX_POLL_SECS),
    );
    let mut subscription =
        run_blocking(&state.pantry, move |p| p.subscribe_history(&owner)).await?;

    let update = match tokio::time::timeout(wait, subscription.changed()).await {
        Ok(Some(entries)) => HistoryUpdate {
            changed: true,
            entries,
        },
        Ok(None) | Err(_) => HistoryUpdate {
            changed: false,
            entries: subscription.snapshot(),
        },
    };
    subscription.unsubscribe();
    Ok(Json(ApiResponse::ok(update)))
}

/// Build the web server router
pub fn create_router(pantry: Arc<Pantry>) -> Router {
    let state = AppState { pantry };

    Router::new()
        .route("/api/categories", get(categories_handler))
        .route("/api/items", get(list_handler).post(submit_handler))
        .route(
            "/api/items/{id}",
            axum::routing::put(edit_handler).delete(delete_handler),
        )
        .route("/api/history", get(history_handler))
        .route("/api/history/next", get(history_next_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Start the web server (async)
///
/// Stops accepting connections on Ctrl-C and lets in-flight requests finish.
pub async fn serve(
    pantry: Arc<Pantry>,
    bind: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(pantry);
    let addr = format!("{}:{}", bind, port);

    log::info!("Pantry API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Pantry API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}
