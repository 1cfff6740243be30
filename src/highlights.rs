//! Display-only aggregates derived from a raw profile.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::probe::{self, Path};

/// Literal meaning "by this much"; the emphasized clause ends right before it.
pub const RECAP_MARKER: &str = "만큼";

const RECAP_EMPHASIS_TOKENS: usize = 2;

const EXPLICIT_TOP_TREE_FIELDS: &[Path] = &[
    Path(&["biggestTree"]),
    Path(&["biggest_tree"]),
    Path(&["topTree"]),
    Path(&["largestTree"]),
];

const TREE_LIST_FIELDS: &[Path] = &[
    Path(&["trees"]),
    Path(&["treeList"]),
    Path(&["plantedTrees"]),
    Path(&["myTrees"]),
];

const TREE_NAME_FIELDS: &[Path] = &[
    Path(&["name"]),
    Path(&["placeName"]),
    Path(&["restaurantName"]),
    Path(&["title"]),
];

const TREE_COUNT_FIELDS: &[Path] = &[
    Path(&["recommendCount"]),
    Path(&["recommendationCount"]),
    Path(&["recommend_count"]),
    Path(&["count"]),
    Path(&["likeCount"]),
];

const RECAP_FIELDS: &[Path] = &[
    Path(&["recap"]),
    Path(&["recapMessage"]),
    Path(&["summary"]),
    Path(&["message"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTree {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapSplit {
    pub emphasis: String,
    pub remainder: String,
}

impl RecapSplit {
    /// Both halves empty: the caller shows its static fallback copy.
    pub fn is_empty(&self) -> bool {
        self.emphasis.is_empty() && self.remainder.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedHighlights {
    pub top_tree: Option<TopTree>,
    pub recap_emphasis: String,
    pub recap_remainder: String,
}

fn tree_from_entry(entry: &Value) -> Option<TopTree> {
    let name = probe::first_text(entry, TREE_NAME_FIELDS)?;
    let count = probe::first_count(entry, TREE_COUNT_FIELDS).unwrap_or(0);
    Some(TopTree { name, count })
}

/// The profile's most recommended tree.
///
/// An explicit "biggest tree" field wins when it names something. Otherwise
/// the tree list is scanned; on equal counts the earliest entry is kept.
pub fn top_tree(profile: &Value) -> Option<TopTree> {
    let root = probe::unwrap_envelope(profile);

    let explicit = EXPLICIT_TOP_TREE_FIELDS
        .iter()
        .filter_map(|path| path.get(root))
        .find_map(|field| match field {
            Value::Object(_) => tree_from_entry(field),
            other => probe::text(other).map(|name| TopTree { name, count: 0 }),
        });
    if explicit.is_some() {
        return explicit;
    }

    let Some(Value::Array(trees)) = probe::first_present(root, TREE_LIST_FIELDS) else {
        return None;
    };

    trees
        .iter()
        .filter_map(tree_from_entry)
        .fold(None, |best: Option<TopTree>, candidate| match best {
            Some(current) if current.count >= candidate.count => Some(current),
            _ => Some(candidate),
        })
}

/// Splits a recap sentence into the clause to emphasize and the rest.
pub fn split_recap(message: &str) -> RecapSplit {
    if message.trim().is_empty() {
        return RecapSplit::default();
    }

    if let Some(index) = message.find(RECAP_MARKER) {
        return RecapSplit {
            emphasis: message[..index].trim_end().to_owned(),
            remainder: message[index..].to_owned(),
        };
    }

    let mut tokens = message.split_whitespace();
    let emphasis = tokens
        .by_ref()
        .take(RECAP_EMPHASIS_TOKENS)
        .collect::<Vec<_>>()
        .join(" ");
    let remainder = tokens.collect::<Vec<_>>().join(" ");

    RecapSplit {
        emphasis,
        remainder,
    }
}

pub fn derive_highlights(profile: &Value) -> DerivedHighlights {
    let root = probe::unwrap_envelope(profile);
    let recap = probe::first_text(root, RECAP_FIELDS).unwrap_or_default();
    let RecapSplit {
        emphasis,
        remainder,
    } = split_recap(&recap);

    DerivedHighlights {
        top_tree: top_tree(profile),
        recap_emphasis: emphasis,
        recap_remainder: remainder,
    }
}
