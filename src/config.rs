//! Client configuration: known origins and asset names.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::catalog::DEFAULT_CATALOG_CACHE_CAPACITY;

pub const DEFAULT_API_ORIGIN: &str = "https://api.namu.town";
pub const DEFAULT_WEB_ORIGIN: &str = "https://namu.town";
pub const DEFAULT_CDN_ORIGIN: &str = "https://cdn.namu.town";
pub const API_PATH_PREFIX: &str = "api";
pub const AVATAR_PLACEHOLDER_ASSET: &str = "avatar_placeholder";

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
}

/// An `http(s)` origin, stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin(String);

impl Origin {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidOrigin {
            origin: raw.to_owned(),
            reason,
        };

        let parsed = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".into()));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(invalid("origin cannot carry a query or fragment".into()));
        }

        Ok(Self(parsed.as_str().trim_end_matches('/').to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Same origin with one extra path segment.
    pub fn with_segment(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0, segment.trim_matches('/')))
    }

    /// `path` is taken relative to this origin, never as an absolute path.
    pub fn join(&self, path: &str) -> Option<String> {
        let joined = format!("{}/{}", self.0, path.trim_start_matches('/'));
        Url::parse(&joined).ok().map(String::from)
    }

    /// Appends each item as exactly one percent-encoded path segment.
    pub fn join_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Option<String> {
        let mut url = Url::parse(&self.0).ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
        Some(url.into())
    }
}

/// The origins a profile image may live under, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginSet {
    api: Origin,
    web: Origin,
    cdn: Origin,
}

impl OriginSet {
    pub fn new(api: &str, web: &str, cdn: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api: Origin::parse(api)?,
            web: Origin::parse(web)?,
            cdn: Origin::parse(cdn)?,
        })
    }

    pub fn api(&self) -> &Origin {
        &self.api
    }

    pub fn candidate_bases(&self) -> [Origin; 4] {
        [
            self.api.clone(),
            self.api.with_segment(API_PATH_PREFIX),
            self.web.clone(),
            self.cdn.clone(),
        ]
    }
}

impl Default for OriginSet {
    fn default() -> Self {
        Self {
            api: Origin(DEFAULT_API_ORIGIN.to_owned()),
            web: Origin(DEFAULT_WEB_ORIGIN.to_owned()),
            cdn: Origin(DEFAULT_CDN_ORIGIN.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub origins: OriginSet,
    pub catalog_cache_capacity: usize,
    pub avatar_placeholder: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origins: OriginSet::default(),
            catalog_cache_capacity: DEFAULT_CATALOG_CACHE_CAPACITY,
            avatar_placeholder: AVATAR_PLACEHOLDER_ASSET.to_owned(),
        }
    }
}
