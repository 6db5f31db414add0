//! Storage collaborator interfaces, in-memory reference store, and the
//! upstream HTTP fetch client.

use std::time::Duration;

use anyhow::Context;
use armory_core::{Item, ItemDraft, ItemPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info_span;
use uuid::Uuid;

pub const CRATE_NAME: &str = "armory-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no item with id {0}")]
    NotFound(Uuid),
}

/// Cached upstream response, keyed by endpoint + canonical parameter string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub endpoint: String,
    pub params_key: String,
    pub payload: JsonValue,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Item collection contract. Implementations are expected to provide atomic
/// single-record insert/patch/delete and a scan whose order is stable across
/// calls (the reference store uses insertion order). `category`, `itemType`,
/// `minLevel`, `learnable` and `externalId` are the fields worth indexing;
/// correctness must not depend on it, and the query layer treats `scan` as
/// the linear fallback.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, draft: ItemDraft, now: DateTime<Utc>) -> Item;
    async fn get(&self, id: Uuid) -> Option<Item>;
    /// Overwrite every mutable field of an existing record, preserving its
    /// identity and creation timestamp.
    async fn replace(&self, id: Uuid, draft: ItemDraft, now: DateTime<Utc>)
        -> Result<Item, StoreError>;
    async fn patch(&self, id: Uuid, patch: ItemPatch) -> Result<Item, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn find_by_external_id(&self, external_id: &str) -> Option<Item>;
    async fn scan(&self) -> Vec<Item>;
    async fn count(&self) -> usize;
}

/// Upstream-response cache contract. At most one live entry per key pair;
/// `put` deletes prior entries for the same key before inserting, so there
/// is no partial-overwrite window. Stale entries are left in place until the
/// next `put` with the same key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn find(&self, endpoint: &str, params_key: &str) -> Option<CacheEntry>;
    async fn put(&self, entry: CacheEntry);
}

#[derive(Debug, Default)]
struct MemoryInner {
    items: Vec<Item>,
    cache: Vec<CacheEntry>,
}

/// Reference implementation backing both stores. Vec-backed so scans return
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn materialize(draft: ItemDraft, id: Uuid, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Item {
    Item {
        id,
        created_at,
        name: draft.name,
        description: draft.description,
        item_type: draft.item_type,
        category: draft.category,
        sub_category: draft.sub_category,
        sub_type: draft.sub_type,
        min_level: draft.min_level,
        learnable: draft.learnable,
        stats: draft.stats,
        professions: draft.professions,
        external_id: draft.external_id,
        last_synced_at: now,
    }
}

fn apply_patch(item: &mut Item, patch: ItemPatch) {
    if let Some(name) = patch.name {
        item.name = name;
    }
    if let Some(description) = patch.description {
        item.description = Some(description);
    }
    if let Some(item_type) = patch.item_type {
        item.item_type = item_type;
    }
    if let Some(category) = patch.category {
        item.category = Some(category);
    }
    if let Some(sub_category) = patch.sub_category {
        item.sub_category = Some(sub_category);
    }
    if let Some(sub_type) = patch.sub_type {
        item.sub_type = Some(sub_type);
    }
    if let Some(min_level) = patch.min_level {
        item.min_level = min_level;
    }
    if let Some(learnable) = patch.learnable {
        item.learnable = learnable;
    }
    if let Some(stats) = patch.stats {
        item.stats = stats;
    }
    if let Some(professions) = patch.professions {
        item.professions = professions;
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, draft: ItemDraft, now: DateTime<Utc>) -> Item {
        let item = materialize(draft, Uuid::new_v4(), now, now);
        let mut inner = self.inner.lock().await;
        inner.items.push(item.clone());
        item
    }

    async fn get(&self, id: Uuid) -> Option<Item> {
        let inner = self.inner.lock().await;
        inner.items.iter().find(|item| item.id == id).cloned()
    }

    async fn replace(
        &self,
        id: Uuid,
        draft: ItemDraft,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let replaced = materialize(draft, slot.id, slot.created_at, now);
        *slot = replaced.clone();
        Ok(replaced)
    }

    async fn patch(&self, id: Uuid, patch: ItemPatch) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::NotFound(id))?;
        apply_patch(slot, patch);
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.items.len();
        inner.items.retain(|item| item.id != id);
        if inner.items.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Option<Item> {
        let inner = self.inner.lock().await;
        inner
            .items
            .iter()
            .find(|item| item.external_id.as_deref() == Some(external_id))
            .cloned()
    }

    async fn scan(&self) -> Vec<Item> {
        let inner = self.inner.lock().await;
        inner.items.clone()
    }

    async fn count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.items.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn find(&self, endpoint: &str, params_key: &str) -> Option<CacheEntry> {
        let inner = self.inner.lock().await;
        inner
            .cache
            .iter()
            .find(|entry| entry.endpoint == endpoint && entry.params_key == params_key)
            .cloned()
    }

    async fn put(&self, entry: CacheEntry) {
        let mut inner = self.inner.lock().await;
        inner
            .cache
            .retain(|e| !(e.endpoint == entry.endpoint && e.params_key == entry.params_key));
        inner.cache.push(entry);
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned http status {status} for {url}")]
    Status { status: u16, url: String },
}

/// Thin GET-JSON client over reqwest. Timeout-bound, no internal retries;
/// a non-2xx status is a hard failure, never an empty success.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub async fn get_json(&self, url: &str) -> Result<JsonValue, FetchError> {
        self.get_json_with_query(url, &[]).await
    }

    /// GET with query pairs appended; reqwest handles the encoding.
    pub async fn get_json_with_query(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, FetchError> {
        let span = info_span!("http_fetch", url);
        let _guard = span.enter();

        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.json().await?)
    }
}
