use std::collections::{BTreeMap, HashSet};

use namu_shared::avatar::{AvatarResolutionState, AvatarResolver};
use namu_shared::catalog::TagCatalog;
use namu_shared::config::{OriginSet, DEFAULT_API_ORIGIN};
use namu_shared::highlights::{split_recap, top_tree, TopTree};
use namu_shared::preferences::{resolve_profile_preferences, resolve_values};
use proptest::prelude::*;
use serde_json::{json, Value};

fn tag_label() -> impl Strategy<Value = String> {
    "[a-z가-힣]{1,8}"
}

fn raw_entry() -> impl Strategy<Value = Value> {
    prop_oneof![
        tag_label().prop_map(Value::String),
        Just(Value::String(String::new())),
        any::<i64>().prop_map(|n| json!(n)),
        Just(Value::Null),
        tag_label().prop_map(|k| json!({ "key": k })),
        tag_label().prop_map(|v| json!({ "label": v })),
    ]
}

proptest! {
    #[test]
    fn string_array_catalog_maps_each_string_to_itself(tags in prop::collection::vec(tag_label(), 0..16)) {
        let catalog = TagCatalog::build(&json!({ "styleTags": tags }));

        let expected: HashSet<String> = tags.iter().cloned().collect();
        let keys: HashSet<String> = catalog.style_key_to_value().keys().cloned().collect();
        prop_assert_eq!(&keys, &expected);
        prop_assert_eq!(catalog.style_value_set(), &expected);
        for (key, value) in catalog.style_key_to_value() {
            prop_assert_eq!(key, value);
        }
    }

    #[test]
    fn object_map_catalog_keeps_the_object_key_set(
        entries in prop::collection::btree_map(tag_label(), tag_label(), 0..16)
    ) {
        let container: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.clone(), json!({ "label": v })))
            .collect();
        let catalog = TagCatalog::build(&json!({ "food_tags": container }));

        let keys: HashSet<&String> = catalog.food_key_to_value().keys().collect();
        let expected: HashSet<&String> = entries.keys().collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn resolve_never_returns_duplicates(entries in prop::collection::vec(raw_entry(), 0..24)) {
        let catalog = TagCatalog::build(&json!({
            "styleTags": [{ "key": "a", "value": "가" }, { "key": "b", "value": "가" }]
        }));
        let resolved = catalog.style.resolve(Some(&Value::Array(entries)));

        let unique: HashSet<&String> = resolved.iter().collect();
        prop_assert_eq!(unique.len(), resolved.len());
        prop_assert!(resolved.iter().all(|v| !v.is_empty()));
    }

    #[test]
    fn resolve_tolerates_any_non_array(raw in prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        tag_label().prop_map(Value::String),
        tag_label().prop_map(|s| json!({ "styleTags": s })),
    ]) {
        let catalog = TagCatalog::default();
        prop_assert!(resolve_values(Some(&raw), catalog.style_key_to_value(), catalog.style_value_set()).is_empty());
        prop_assert!(resolve_values(None, catalog.style_key_to_value(), catalog.style_value_set()).is_empty());
    }

    #[test]
    fn relative_avatar_paths_expand_to_absolute_candidates(path in "[a-z0-9]{1,8}(/[a-z0-9]{1,8}){0,3}\\.(png|jpg)") {
        let candidates = AvatarResolver::default().build_candidates(&path);

        prop_assert_eq!(candidates.len(), 4);
        prop_assert_eq!(&candidates[0], &format!("{DEFAULT_API_ORIGIN}/{path}"));
        prop_assert!(candidates.iter().all(|c| c.starts_with("https://")));

        let unique: HashSet<&String> = candidates.iter().collect();
        prop_assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn cursor_exhausts_after_n_failures_and_resets(n in 1usize..8) {
        let mut state = AvatarResolutionState::new((0..n).map(|i| format!("https://x/{i}.png")).collect());

        for _ in 0..n {
            prop_assert!(!state.is_exhausted());
            state.advance();
        }
        prop_assert!(state.is_exhausted());

        state.reset();
        prop_assert_eq!(state.cursor(), 0);
        prop_assert!(!state.is_exhausted());
    }

    #[test]
    fn top_tree_picks_first_maximum(counts in prop::collection::vec(0u64..20, 1..12)) {
        let trees: Vec<Value> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| json!({ "name": format!("t{i}"), "count": c }))
            .collect();

        let max = *counts.iter().max().unwrap();
        let first = counts.iter().position(|c| *c == max).unwrap();

        prop_assert_eq!(
            top_tree(&json!({ "trees": trees })),
            Some(TopTree { name: format!("t{first}"), count: max })
        );
    }
}

#[test]
fn absolute_avatar_url_is_the_only_candidate() {
    assert_eq!(
        AvatarResolver::default().build_candidates("https://x/y.jpg"),
        vec!["https://x/y.jpg"]
    );
}

#[test]
fn recap_split_examples() {
    let empty = split_recap("");
    assert_eq!((empty.emphasis.as_str(), empty.remainder.as_str()), ("", ""));

    let split = split_recap("10M 만큼 자랐어요");
    assert_eq!(split.emphasis, "10M");
    assert_eq!(split.remainder, "만큼 자랐어요");
}

#[test]
fn end_to_end_profile_reconciliation() {
    let catalog = TagCatalog::build(&json!({ "styleTags": { "k1": "비건" } }));
    let profile = json!({
        "profileImage": { "url": "/img/p.png" },
        "styleTags": ["k1"]
    });

    let prefs = resolve_profile_preferences(&profile, &catalog);
    assert_eq!(prefs.style, vec!["비건"]);

    let avatar = AvatarResolver::new(OriginSet::default()).resolve(&profile);
    assert_eq!(
        avatar.candidates().first().map(String::as_str),
        Some(format!("{DEFAULT_API_ORIGIN}/img/p.png").as_str())
    );
}

#[test]
fn object_map_keys_match_even_with_odd_payloads() {
    let mut entries = BTreeMap::new();
    entries.insert("A", json!("알파"));
    entries.insert("B", json!(null));
    entries.insert("C", json!([1, 2]));
    let catalog = TagCatalog::build(&json!({ "foods": entries }));

    let mut keys: Vec<&str> = catalog.food_key_to_value().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["A", "B", "C"]);
    assert_eq!(catalog.food.value_for_key("B"), Some("B"));
}
