//! Axum JSON surface: admin health check, item queries, CRUD mutations,
//! and the sync trigger.

use std::sync::Arc;

use armory_core::{FetchParams, ItemPatch, RawItem, StatType};
use armory_storage::{CacheStore, ItemStore, MemoryStore, StoreError};
use armory_sync::{
    ItemFilter, ItemMutations, Page, ProfessionFilter, QueryEngine, StatFilter, SyncConfig,
    SyncError, SyncService,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use uuid::Uuid;

pub const CRATE_NAME: &str = "armory-web";

#[derive(Clone)]
pub struct AppState {
    pub queries: QueryEngine,
    pub mutations: ItemMutations,
    pub sync: Arc<SyncService>,
}

impl AppState {
    pub fn new(
        config: SyncConfig,
        items: Arc<dyn ItemStore>,
        cache: Arc<dyn CacheStore>,
    ) -> anyhow::Result<Self> {
        let sync = Arc::new(SyncService::new(config, items.clone(), cache)?);
        Ok(Self {
            queries: QueryEngine::new(items.clone()),
            mutations: ItemMutations::new(items),
            sync,
        })
    }

    /// State backed by a fresh in-memory store, for local runs and tests.
    pub fn in_memory(config: SyncConfig) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            config,
            store.clone() as Arc<dyn ItemStore>,
            store as Arc<dyn CacheStore>,
        )
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/check_admin_key", get(check_admin_key_handler))
        .route("/items", get(items_handler))
        .route("/items", post(add_item_handler))
        .route("/items/by-stats", get(items_by_stats_handler))
        .route("/items/by-profession", get(items_by_profession_handler))
        .route("/items/{id}", patch(update_item_handler))
        .route("/items/{id}", delete(delete_item_handler))
        .route("/sync", post(sync_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("ARMORY_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let config = SyncConfig::from_env();
    let state = AppState::in_memory(config.clone())?;
    let _scheduler = match armory_sync::maybe_build_scheduler(state.sync.clone(), &config).await? {
        Some(scheduler) => {
            scheduler.start().await?;
            Some(scheduler)
        }
        None => None,
    };
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "armory web listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Admin health check. Key validation itself is the gatekeeper's job
/// upstream of this route; reaching the handler means the caller passed.
async fn check_admin_key_handler() -> Response {
    let mut resp = Json(serde_json::json!({ "success": true })).into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    resp
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemsQuery {
    category: Option<String>,
    item_type: Option<String>,
    learnable: Option<bool>,
    min_level: Option<u32>,
    sub_category: Option<String>,
    sub_type: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemsByStatsQuery {
    stat_name: Option<String>,
    stat_type: Option<StatType>,
    min_value: Option<f64>,
    category: Option<String>,
    item_type: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemsByProfessionQuery {
    profession: Option<String>,
    max_level: Option<u32>,
    category: Option<String>,
    item_type: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

fn page_of(offset: Option<usize>, limit: Option<usize>) -> Page {
    Page {
        offset: offset.unwrap_or(0),
        limit: limit.unwrap_or(0),
    }
}

async fn items_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ItemsQuery>,
) -> Response {
    let filter = ItemFilter {
        category: query.category,
        item_type: query.item_type,
        learnable: query.learnable,
        min_level: query.min_level,
        sub_category: query.sub_category,
        sub_type: query.sub_type,
    };
    let items = state
        .queries
        .items(&filter, page_of(query.offset, query.limit))
        .await;
    Json(items).into_response()
}

async fn items_by_stats_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ItemsByStatsQuery>,
) -> Response {
    let filter = StatFilter {
        stat_name: query.stat_name,
        stat_type: query.stat_type,
        min_value: query.min_value,
        category: query.category,
        item_type: query.item_type,
    };
    let items = state
        .queries
        .items_by_stats(&filter, page_of(query.offset, query.limit))
        .await;
    Json(items).into_response()
}

async fn items_by_profession_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ItemsByProfessionQuery>,
) -> Response {
    let filter = ProfessionFilter {
        profession: query.profession,
        max_level: query.max_level,
        category: query.category,
        item_type: query.item_type,
    };
    let items = state
        .queries
        .items_by_profession(&filter, page_of(query.offset, query.limit))
        .await;
    Json(items).into_response()
}

async fn add_item_handler(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawItem>,
) -> Response {
    match state.mutations.add_item(&raw).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_item_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<ItemPatch>,
) -> Response {
    match state.mutations.update_item(id, patch).await {
        Ok(item) => Json(item).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Response {
    match state.mutations.delete_item(id).await {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FetchParams>,
) -> Response {
    match state.sync.fetch_and_sync(&params).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: SyncError) -> Response {
    let status = match &err {
        SyncError::Validation(_) => StatusCode::BAD_REQUEST,
        SyncError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        SyncError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
