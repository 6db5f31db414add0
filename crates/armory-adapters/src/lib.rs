//! Upstream payload normalization: validation, extraction, stat
//! classification, numeric coercion.

use armory_core::{ItemDraft, ItemProfession, ItemStat, RawItem, RawProfession, RawStat, StatType};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

pub const CRATE_NAME: &str = "armory-adapters";

/// Stat names matched (case-insensitive substring) into the core bucket.
/// Checked before the primary vocabulary.
pub const CORE_STAT_VOCABULARY: [&str; 6] =
    ["attack", "defense", "health", "mana", "stamina", "durability"];

/// Stat names matched into the primary bucket when no core name matches.
pub const PRIMARY_STAT_VOCABULARY: [&str; 5] =
    ["strength", "agility", "intelligence", "wisdom", "charisma"];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("raw item is missing a usable name")]
    MissingName,
}

/// Batch validity predicate: an object whose `name` is a non-blank string.
pub fn is_valid_raw_item(value: &JsonValue) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("name"))
        .and_then(JsonValue::as_str)
        .map(|name| !name.trim().is_empty())
        .unwrap_or(false)
}

/// Pull raw items out of an upstream response, accepting either a bare array
/// or an `{ "items": [...] }` envelope. Entries failing the validity
/// predicate (or not matching the raw schema at all) are dropped with a
/// warning rather than surfaced as an error; this is the one place malformed
/// input is tolerated, so a partially broken upstream batch still syncs the
/// good entries.
pub fn extract_items(payload: &JsonValue) -> Vec<RawItem> {
    let entries = match payload {
        JsonValue::Array(entries) => entries.as_slice(),
        JsonValue::Object(obj) => match obj.get("items").and_then(JsonValue::as_array) {
            Some(entries) => entries.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        if !is_valid_raw_item(entry) {
            warn!("dropping batch entry without a usable name");
            continue;
        }
        match serde_json::from_value::<RawItem>(entry.clone()) {
            Ok(raw) => items.push(raw),
            Err(err) => warn!(error = %err, "dropping batch entry that does not fit the item schema"),
        }
    }
    items
}

/// Classify a stat. A non-blank explicit type string wins: `core`/`primary`
/// (any case) map directly, anything else is general. Without one, the stat
/// name is matched against the core vocabulary first, then the primary one.
pub fn classify_stat_type(explicit: Option<&str>, name: &str) -> StatType {
    if let Some(explicit) = explicit.filter(|t| !t.trim().is_empty()) {
        return match explicit.to_lowercase().as_str() {
            "core" => StatType::Core,
            "primary" => StatType::Primary,
            _ => StatType::General,
        };
    }

    let lower = name.to_lowercase();
    if CORE_STAT_VOCABULARY.iter().any(|s| lower.contains(s)) {
        return StatType::Core;
    }
    if PRIMARY_STAT_VOCABULARY.iter().any(|s| lower.contains(s)) {
        return StatType::Primary;
    }
    StatType::General
}

/// Coerce a raw stat value to a finite number. Numeric strings are parsed;
/// anything unusable becomes 0.
pub fn coerce_stat_value(value: &JsonValue) -> f64 {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Coerce a raw profession level to an integer >= 1.
pub fn coerce_profession_level(value: &JsonValue) -> u32 {
    let parsed = match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v as i64)),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|v| v as i64)),
        _ => None,
    };
    match parsed {
        Some(level) if level >= 1 => level.min(u32::MAX as i64) as u32,
        _ => 1,
    }
}

fn normalize_stat(raw: &RawStat) -> ItemStat {
    let name = raw.name.clone().unwrap_or_default();
    ItemStat {
        stat_type: classify_stat_type(raw.stat_type.as_deref(), &name),
        value: coerce_stat_value(&raw.value),
        name,
    }
}

fn normalize_profession(raw: &RawProfession) -> ItemProfession {
    ItemProfession {
        name: raw.name.clone().unwrap_or_default(),
        level: coerce_profession_level(&raw.level),
    }
}

/// Normalize a raw upstream item into a canonical draft. Pure transform;
/// the caller stamps `last_synced_at` on write. The only failure is a
/// missing or blank `name`.
pub fn normalize(raw: &RawItem) -> Result<ItemDraft, NormalizeError> {
    let name = raw
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or(NormalizeError::MissingName)?
        .to_string();

    Ok(ItemDraft {
        name,
        description: raw.description.clone(),
        item_type: raw
            .item_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        category: raw.category.clone(),
        sub_category: raw.sub_category.clone(),
        sub_type: raw.sub_type.clone(),
        min_level: raw.min_level.unwrap_or(1).max(1),
        learnable: raw.learnable.unwrap_or(false),
        stats: raw.stats.iter().map(normalize_stat).collect(),
        professions: raw.professions.iter().map(normalize_profession).collect(),
        external_id: raw.id.clone(),
    })
}

/// Canonical test fixture mirroring a representative upstream payload.
pub fn sample_raw_item() -> RawItem {
    serde_json::from_value(serde_json::json!({
        "id": "sword_power_001",
        "name": "Sword of Power",
        "description": "A mighty sword with magical properties",
        "itemType": "weapon",
        "category": "combat",
        "subCategory": "sword",
        "subType": "magical",
        "minLevel": 10,
        "learnable": false,
        "stats": [
            { "name": "attack_power", "value": 150, "type": "core" },
            { "name": "durability", "value": 100, "type": "core" },
            { "name": "magic_resistance", "value": 25, "type": "primary" },
            { "name": "critical_chance", "value": 15, "type": "general" }
        ],
        "professions": [
            { "name": "warrior", "level": 5 },
            { "name": "paladin", "level": 3 }
        ]
    }))
    .expect("sample raw item is valid")
}
