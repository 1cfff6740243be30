//! Settings tag catalog: style and food options the user can pick from.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::probe::{self, Path};

pub const DEFAULT_CATALOG_CACHE_CAPACITY: usize = 4;

const STYLE_CONTAINERS: &[Path] = &[
    Path(&["styleTags"]),
    Path(&["style_tags"]),
    Path(&["StyleTags"]),
    Path(&["style-tags"]),
    Path(&["styles"]),
    Path(&["tags", "style"]),
];

const FOOD_CONTAINERS: &[Path] = &[
    Path(&["foodTags"]),
    Path(&["food_tags"]),
    Path(&["FoodTags"]),
    Path(&["food-tags"]),
    Path(&["foods"]),
    Path(&["tags", "food"]),
];

const OPTION_VALUE_FIELDS: &[Path] = &[
    Path(&["value"]),
    Path(&["label"]),
    Path(&["name"]),
    Path(&["title"]),
    Path(&["text"]),
];

const OPTION_KEY_FIELDS: &[Path] = &[Path(&["key"]), Path(&["code"]), Path(&["id"])];

const ENTRY_VALUE_FIELDS: &[Path] = &[Path(&["value"]), Path(&["label"])];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOption {
    pub key: String,
    pub value: String,
}

/// One category of the catalog (style or food).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCategory {
    options: Vec<TagOption>,
    key_to_value: HashMap<String, String>,
    value_set: HashSet<String>,
}

impl TagCategory {
    /// Builds a category from whatever container the server sent.
    /// Anything that is neither an array nor an object yields an empty category.
    pub fn from_container(container: Option<&Value>) -> Self {
        let mut builder = CategoryBuilder::default();

        match container {
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::String(_) => {
                            if let Some(tag) = probe::text(item) {
                                builder.push(tag.clone(), tag);
                            }
                        }
                        Value::Object(_) => {
                            let Some(value) = probe::first_text(item, OPTION_VALUE_FIELDS) else {
                                continue;
                            };
                            let key = probe::first_text(item, OPTION_KEY_FIELDS)
                                .unwrap_or_else(|| value.clone());
                            builder.push(key, value);
                        }
                        _ => {}
                    }
                }
            }
            Some(Value::Object(entries)) => {
                for (key, payload) in entries {
                    let value = match payload {
                        Value::String(_) => probe::text(payload),
                        _ => probe::first_text(payload, ENTRY_VALUE_FIELDS),
                    }
                    .unwrap_or_else(|| key.clone());
                    builder.push(key.clone(), value);
                }
            }
            _ => {}
        }

        builder.finish()
    }

    pub fn options(&self) -> &[TagOption] {
        &self.options
    }

    pub fn key_to_value(&self) -> &HashMap<String, String> {
        &self.key_to_value
    }

    pub fn value_set(&self) -> &HashSet<String> {
        &self.value_set
    }

    pub fn value_for_key(&self, key: &str) -> Option<&str> {
        self.key_to_value.get(key).map(String::as_str)
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.value_set.contains(value)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[derive(Default)]
struct CategoryBuilder {
    options: Vec<TagOption>,
    positions: HashMap<String, usize>,
}

impl CategoryBuilder {
    // Last-seen value wins, first-seen position is kept.
    fn push(&mut self, key: String, value: String) {
        match self.positions.get(&key) {
            Some(&index) => self.options[index].value = value,
            None => {
                self.positions.insert(key.clone(), self.options.len());
                self.options.push(TagOption { key, value });
            }
        }
    }

    fn finish(self) -> TagCategory {
        let key_to_value: HashMap<String, String> = self
            .options
            .iter()
            .map(|option| (option.key.clone(), option.value.clone()))
            .collect();
        let value_set = key_to_value.values().cloned().collect();

        TagCategory {
            options: self.options,
            key_to_value,
            value_set,
        }
    }
}

/// Canonical catalog built from a settings payload. Rebuilt on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCatalog {
    pub style: TagCategory,
    pub food: TagCategory,
}

impl TagCatalog {
    #[instrument(level = "debug", skip_all)]
    pub fn build(settings: &Value) -> Self {
        let root = probe::unwrap_envelope(settings);
        let catalog = Self {
            style: TagCategory::from_container(probe::first_present(root, STYLE_CONTAINERS)),
            food: TagCategory::from_container(probe::first_present(root, FOOD_CONTAINERS)),
        };

        debug!(
            style = catalog.style.len(),
            food = catalog.food.len(),
            "tag catalog built"
        );
        catalog
    }

    pub fn style_key_to_value(&self) -> &HashMap<String, String> {
        self.style.key_to_value()
    }

    pub fn food_key_to_value(&self) -> &HashMap<String, String> {
        self.food.key_to_value()
    }

    pub fn style_value_set(&self) -> &HashSet<String> {
        self.style.value_set()
    }

    pub fn food_value_set(&self) -> &HashSet<String> {
        self.food.value_set()
    }

    pub fn is_empty(&self) -> bool {
        self.style.is_empty() && self.food.is_empty()
    }
}

/// Identity of one settings fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogKey {
    ETag(String),
    Fingerprint(String),
}

impl CatalogKey {
    /// Prefers the server's `ETag`; falls back to a content hash of the payload.
    pub fn for_response(etag: Option<&str>, payload: &Value) -> Self {
        match etag.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => Self::ETag(tag.to_owned()),
            None => Self::fingerprint(payload),
        }
    }

    pub fn fingerprint(payload: &Value) -> Self {
        let hash = blake3::hash(payload.to_string().as_bytes());
        Self::Fingerprint(hash.to_hex()[..16].to_owned())
    }
}

/// Built catalogs keyed by fetch identity, bounded by an LRU capacity.
///
/// Only the identity of the most recent fetch is current, so an older build is
/// served again only when the server reports that identity again. Entries
/// leave on capacity pressure or on [`CatalogCache::invalidate`].
pub struct CatalogCache {
    entries: LruCache<CatalogKey, Arc<TagCatalog>>,
    current: Option<CatalogKey>,
}

impl CatalogCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            current: None,
        }
    }

    /// Returns the catalog for `key`, building it from `payload` on a miss.
    pub fn get_or_build(&mut self, key: CatalogKey, payload: &Value) -> Arc<TagCatalog> {
        if self.current.as_ref().is_some_and(|previous| previous != &key) {
            debug!(previous = ?self.current, ?key, "settings identity changed");
        }

        let catalog = match self.entries.get(&key) {
            Some(hit) => {
                debug!(?key, "tag catalog cache hit");
                Arc::clone(hit)
            }
            None => {
                let built = Arc::new(TagCatalog::build(payload));
                self.entries.put(key.clone(), Arc::clone(&built));
                built
            }
        };

        self.current = Some(key);
        catalog
    }

    pub fn current(&self) -> Option<Arc<TagCatalog>> {
        let key = self.current.as_ref()?;
        self.entries.peek(key).cloned()
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("len", &self.entries.len())
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_array_uses_value_as_key() {
        let catalog = TagCatalog::build(&json!({ "styleTags": ["비건", "노키즈존"] }));

        assert_eq!(catalog.style_key_to_value().get("비건").map(String::as_str), Some("비건"));
        assert_eq!(catalog.style_value_set().len(), 2);
        assert!(catalog.food.is_empty());
    }

    #[test]
    fn test_catalog_strings_are_trimmed_like_preferences() {
        let catalog = TagCatalog::build(&json!({
            "styleTags": [" 비건 ", "   "],
            "foodTags": { "K1": "  한식" }
        }));

        assert_eq!(catalog.style_value_set().len(), 1);
        assert!(catalog.style.contains_value("비건"));
        assert_eq!(catalog.food.value_for_key("K1"), Some("한식"));

        let profile = json!({ "styleTags": ["비건 "], "foodTags": ["K1"] });
        let resolved = crate::preferences::resolve_profile_preferences(&profile, &catalog);
        assert_eq!(resolved.style, vec!["비건"]);
        assert_eq!(resolved.food, vec!["한식"]);
    }

    #[test]
    fn test_object_array_reads_aliases() {
        let catalog = TagCatalog::build(&json!({
            "food_tags": [
                { "code": "KOREAN", "label": "한식" },
                { "id": 7, "name": "일식" },
                { "title": "양식" },
                { "key": "NOPE" },
                42
            ]
        }));

        let food = catalog.food_key_to_value();
        assert_eq!(food.get("KOREAN").map(String::as_str), Some("한식"));
        assert_eq!(food.get("7").map(String::as_str), Some("일식"));
        assert_eq!(food.get("양식").map(String::as_str), Some("양식"));
        assert!(!food.contains_key("NOPE"));
        assert_eq!(food.len(), 3);
    }

    #[test]
    fn test_object_map_container() {
        let catalog = TagCatalog::build(&json!({
            "StyleTags": {
                "QUIET": "조용한",
                "DATE": { "label": "데이트" },
                "ODD": { "unrelated": true }
            }
        }));

        let style = catalog.style_key_to_value();
        assert_eq!(style.get("QUIET").map(String::as_str), Some("조용한"));
        assert_eq!(style.get("DATE").map(String::as_str), Some("데이트"));
        assert_eq!(style.get("ODD").map(String::as_str), Some("ODD"));
    }

    #[test]
    fn test_first_alias_wins() {
        let catalog = TagCatalog::build(&json!({
            "styleTags": null,
            "style_tags": ["a"],
            "styles": ["b"]
        }));
        assert!(catalog.style_value_set().contains("a"));
        assert!(!catalog.style_value_set().contains("b"));
    }

    #[test]
    fn test_duplicate_keys_last_value_wins() {
        let catalog = TagCatalog::build(&json!({
            "styleTags": [
                { "key": "k", "value": "old" },
                { "key": "j", "value": "other" },
                { "key": "k", "value": "new" }
            ]
        }));

        assert_eq!(catalog.style.value_for_key("k"), Some("new"));
        assert!(!catalog.style.contains_value("old"));
        assert_eq!(catalog.style.options()[0].key, "k");
        assert_eq!(catalog.style.len(), 2);
    }

    #[test]
    fn test_malformed_payloads_yield_empty_catalog() {
        assert!(TagCatalog::build(&json!(null)).is_empty());
        assert!(TagCatalog::build(&json!([1, 2, 3])).is_empty());
        assert!(TagCatalog::build(&json!({ "styleTags": "vegan" })).is_empty());
    }

    #[test]
    fn test_data_envelope_is_unwrapped() {
        let catalog = TagCatalog::build(&json!({ "data": { "foodTags": ["분식"] } }));
        assert!(catalog.food_value_set().contains("분식"));
    }

    #[test]
    fn test_cache_reuses_catalog_for_same_identity() {
        let mut cache = CatalogCache::default();
        let payload = json!({ "styleTags": ["a"] });

        let first = cache.get_or_build(CatalogKey::ETag("v1".into()), &payload);
        let second = cache.get_or_build(CatalogKey::ETag("v1".into()), &json!({}));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_switches_current_on_new_identity() {
        let mut cache = CatalogCache::default();
        let old = cache.get_or_build(CatalogKey::ETag("v1".into()), &json!({ "styleTags": ["old"] }));
        let fresh = cache.get_or_build(CatalogKey::ETag("v2".into()), &json!({ "styleTags": ["new"] }));

        assert_eq!(cache.len(), 2);
        assert!(fresh.style_value_set().contains("new"));
        assert!(cache.current().is_some_and(|c| c.style_value_set().contains("new")));

        // Returning to a known identity reuses its build.
        let again = cache.get_or_build(CatalogKey::ETag("v1".into()), &json!({}));
        assert!(Arc::ptr_eq(&old, &again));
        assert!(cache.current().is_some_and(|c| c.style_value_set().contains("old")));
    }

    #[test]
    fn test_cache_capacity_bounds_identities() {
        let mut cache = CatalogCache::new(2);
        for tag in ["v1", "v2", "v3"] {
            cache.get_or_build(CatalogKey::ETag(tag.into()), &json!({ "styleTags": [tag] }));
        }
        assert_eq!(cache.len(), 2);

        let rebuilt = cache.get_or_build(CatalogKey::ETag("v1".into()), &json!({ "styleTags": ["v1b"] }));
        assert!(rebuilt.style_value_set().contains("v1b"));
    }

    #[test]
    fn test_cache_invalidate() {
        let mut cache = CatalogCache::new(0);
        cache.get_or_build(CatalogKey::fingerprint(&json!({})), &json!({}));
        cache.invalidate();
        assert!(cache.current().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint_depends_on_content() {
        let a = CatalogKey::for_response(None, &json!({ "styleTags": ["a"] }));
        let b = CatalogKey::for_response(Some("  "), &json!({ "styleTags": ["b"] }));
        assert_ne!(a, b);
        assert!(matches!(a, CatalogKey::Fingerprint(_)));
        assert_eq!(
            CatalogKey::for_response(Some("\"abc\""), &json!({})),
            CatalogKey::ETag("\"abc\"".into())
        );
    }
}
