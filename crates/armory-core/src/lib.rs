//! Core domain model for the Armory item sync layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const CRATE_NAME: &str = "armory-core";

/// Classification bucket for an item stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Core,
    Primary,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStat {
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub stat_type: StatType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProfession {
    pub name: String,
    pub level: u32,
}

/// Canonical persisted item record. Identity and `created_at` are minted by
/// the store; everything else is owned by the sync layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub description: Option<String>,
    pub item_type: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sub_type: Option<String>,
    pub min_level: u32,
    pub learnable: bool,
    pub stats: Vec<ItemStat>,
    pub professions: Vec<ItemProfession>,
    /// Unique key into the upstream API's identifier space, when known.
    pub external_id: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

/// Normalized pre-identity record handed from the normalizer into the
/// reconciler. The store stamps `id`, `created_at` and `last_synced_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    pub description: Option<String>,
    pub item_type: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sub_type: Option<String>,
    pub min_level: u32,
    pub learnable: bool,
    pub stats: Vec<ItemStat>,
    pub professions: Vec<ItemProfession>,
    pub external_id: Option<String>,
}

/// Partial update for a stored item. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub item_type: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sub_type: Option<String>,
    pub min_level: Option<u32>,
    pub learnable: Option<bool>,
    pub stats: Option<Vec<ItemStat>>,
    pub professions: Option<Vec<ItemProfession>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.item_type.is_none()
            && self.category.is_none()
            && self.sub_category.is_none()
            && self.sub_type.is_none()
            && self.min_level.is_none()
            && self.learnable.is_none()
            && self.stats.is_none()
            && self.professions.is_none()
    }
}

/// Upstream item payload as received, holding only the fields the normalizer
/// reads. Unrecognized fields land in `extra` for forward compatibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub min_level: Option<u32>,
    #[serde(default)]
    pub learnable: Option<bool>,
    #[serde(default)]
    pub stats: Vec<RawStat>,
    #[serde(default)]
    pub professions: Vec<RawProfession>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Raw stat entry. `value` stays a JSON value until coercion: upstream sends
/// both numbers and numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStat {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default, rename = "type")]
    pub stat_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProfession {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: JsonValue,
}

/// Query parameters accepted by the upstream items endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchParams {
    pub category: Option<String>,
    pub core_stats: Option<String>,
    pub item_type: Option<String>,
    pub learnable: Option<bool>,
    pub min_level: Option<u32>,
    pub page: Option<u32>,
    #[serde(rename = "per_page")]
    pub per_page: Option<u32>,
    pub primary_stats: Option<String>,
    pub profession: Option<String>,
    pub stats: Option<String>,
    pub sub_category: Option<String>,
    pub sub_type: Option<String>,
}

impl FetchParams {
    /// Populated (key, value) pairs in upstream wire naming. Absent and
    /// empty-string values are skipped, matching the upstream contract.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_str(&mut pairs, "category", &self.category);
        push_str(&mut pairs, "coreStats", &self.core_stats);
        push_str(&mut pairs, "itemType", &self.item_type);
        if let Some(learnable) = self.learnable {
            pairs.push(("learnable", learnable.to_string()));
        }
        if let Some(min_level) = self.min_level {
            pairs.push(("minLevel", min_level.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        push_str(&mut pairs, "primaryStats", &self.primary_stats);
        push_str(&mut pairs, "profession", &self.profession);
        push_str(&mut pairs, "stats", &self.stats);
        push_str(&mut pairs, "subCategory", &self.sub_category);
        push_str(&mut pairs, "subType", &self.sub_type);
        pairs
    }

    /// Canonical cache-key serialization. Pairs are routed through a
    /// `BTreeMap` so semantically equal parameter sets always serialize to
    /// the same string regardless of construction order.
    pub fn cache_key(&self) -> String {
        let sorted: BTreeMap<&'static str, String> = self.query_pairs().into_iter().collect();
        serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string())
    }
}

fn push_str(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        if !value.is_empty() {
            pairs.push((key, value.clone()));
        }
    }
}
