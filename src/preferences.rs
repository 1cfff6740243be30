//! Maps a user's stored preference list onto catalog display values.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{TagCatalog, TagCategory};
use crate::probe::{self, Path};

const STYLE_PREFERENCE_FIELDS: &[Path] = &[
    Path(&["styleTags"]),
    Path(&["style_tags"]),
    Path(&["styles"]),
    Path(&["preferredStyles"]),
    Path(&["preferences", "style"]),
];

const FOOD_PREFERENCE_FIELDS: &[Path] = &[
    Path(&["foodTags"]),
    Path(&["food_tags"]),
    Path(&["foods"]),
    Path(&["preferredFoods"]),
    Path(&["preferences", "food"]),
];

const VALUE_FIELDS: &[Path] = &[
    Path(&["value"]),
    Path(&["label"]),
    Path(&["name"]),
    Path(&["title"]),
    Path(&["text"]),
];

const KEY_FIELDS: &[Path] = &[Path(&["key"]), Path(&["code"]), Path(&["id"])];

/// Resolves `raw` into deduplicated display values, in first-seen order.
///
/// Entries the catalog does not know are kept verbatim rather than dropped.
/// Anything other than an array resolves to an empty list.
pub fn resolve_values(
    raw: Option<&Value>,
    key_to_value: &HashMap<String, String>,
    value_set: &HashSet<String>,
) -> Vec<String> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut resolved = Vec::with_capacity(items.len());

    for item in items {
        let value = match item {
            Value::String(s) => resolve_string(s.trim(), key_to_value, value_set),
            Value::Object(_) => resolve_object(item, key_to_value),
            _ => None,
        };

        if let Some(value) = value {
            if seen.insert(value.clone()) {
                resolved.push(value);
            }
        }
    }

    resolved
}

fn resolve_string(
    raw: &str,
    key_to_value: &HashMap<String, String>,
    value_set: &HashSet<String>,
) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    if value_set.contains(raw) {
        return Some(raw.to_owned());
    }
    Some(key_to_value.get(raw).cloned().unwrap_or_else(|| raw.to_owned()))
}

fn resolve_object(item: &Value, key_to_value: &HashMap<String, String>) -> Option<String> {
    if let Some(value) = probe::first_text(item, VALUE_FIELDS) {
        return Some(value);
    }
    let key = probe::first_text(item, KEY_FIELDS)?;
    Some(key_to_value.get(&key).cloned().unwrap_or(key))
}

impl TagCategory {
    pub fn resolve(&self, raw: Option<&Value>) -> Vec<String> {
        resolve_values(raw, self.key_to_value(), self.value_set())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPreferences {
    pub style: Vec<String>,
    pub food: Vec<String>,
}

/// Reads both preference lists off a raw profile and resolves them.
pub fn resolve_profile_preferences(profile: &Value, catalog: &TagCatalog) -> ResolvedPreferences {
    let root = probe::unwrap_envelope(profile);
    ResolvedPreferences {
        style: catalog.style.resolve(probe::first_present(root, STYLE_PREFERENCE_FIELDS)),
        food: catalog.food.resolve(probe::first_present(root, FOOD_PREFERENCE_FIELDS)),
    }
}
