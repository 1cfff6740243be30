//! Profile image resolution across the known origins, with per-load retry.

use std::collections::HashSet;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::capabilities::HttpHeaders;
use crate::config::OriginSet;
use crate::probe::{self, Path};

/// Direct string fields first, then objects holding `{url|imageUrl|path}`.
const AVATAR_FIELDS: &[Path] = &[
    Path(&["profileImage"]),
    Path(&["profileImageUrl"]),
    Path(&["profile_image"]),
    Path(&["profile_image_url"]),
    Path(&["profileImg"]),
    Path(&["avatar"]),
    Path(&["avatarUrl"]),
    Path(&["imageUrl"]),
    Path(&["image"]),
    Path(&["photoUrl"]),
    Path(&["user", "profileImage"]),
    Path(&["profileImage", "url"]),
    Path(&["profileImage", "imageUrl"]),
    Path(&["profileImage", "path"]),
    Path(&["profile_image", "url"]),
    Path(&["profile_image", "imageUrl"]),
    Path(&["profile_image", "path"]),
    Path(&["avatar", "url"]),
    Path(&["avatar", "imageUrl"]),
    Path(&["avatar", "path"]),
    Path(&["image", "url"]),
    Path(&["image", "imageUrl"]),
    Path(&["image", "path"]),
    Path(&["photo", "url"]),
    Path(&["photo", "imageUrl"]),
    Path(&["photo", "path"]),
    Path(&["user", "profileImage", "url"]),
    Path(&["user", "profileImage", "imageUrl"]),
    Path(&["user", "profileImage", "path"]),
];

/// Builds avatar candidate URLs from a raw profile.
#[derive(Debug, Clone, Default)]
pub struct AvatarResolver {
    origins: OriginSet,
}

impl AvatarResolver {
    pub fn new(origins: OriginSet) -> Self {
        Self { origins }
    }

    /// First non-empty image reference on the profile, if any.
    pub fn pick_raw(profile: &Value) -> Option<String> {
        let root = probe::unwrap_envelope(profile);
        probe::first_text(root, AVATAR_FIELDS).or_else(|| {
            // Some payloads keep the image beside the envelope instead of inside it.
            if std::ptr::eq(root, profile) {
                None
            } else {
                probe::first_text(profile, AVATAR_FIELDS)
            }
        })
    }

    /// Absolute URLs to try, in priority order, without duplicates.
    pub fn build_candidates(&self, raw: &str) -> Vec<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Vec::new();
        }
        if is_absolute(raw) {
            return vec![raw.to_owned()];
        }
        if let Some(rest) = raw.strip_prefix("//") {
            return vec![format!("https://{rest}")];
        }

        let path = raw.trim_start_matches('/');
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for base in self.origins.candidate_bases() {
            match base.join(path) {
                Some(url) => {
                    if seen.insert(url.clone()) {
                        candidates.push(url);
                    }
                }
                None => warn!(base = base.as_str(), "skipping unparsable avatar candidate"),
            }
        }
        candidates
    }

    #[instrument(level = "debug", skip_all)]
    pub fn resolve(&self, profile: &Value) -> AvatarResolutionState {
        let candidates = Self::pick_raw(profile)
            .map(|raw| self.build_candidates(&raw))
            .unwrap_or_default();
        debug!(candidates = candidates.len(), "avatar candidates resolved");
        AvatarResolutionState::new(candidates)
    }
}

fn is_absolute(raw: &str) -> bool {
    let lower = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Outcome of reporting a failed image load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarStep {
    Retry,
    Exhausted,
}

/// Retry cursor over one load's candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarResolutionState {
    candidates: Vec<String>,
    cursor: usize,
    exhausted: bool,
}

impl AvatarResolutionState {
    pub fn new(candidates: Vec<String>) -> Self {
        let exhausted = candidates.is_empty();
        Self {
            candidates,
            cursor: 0,
            exhausted,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The candidate to load now; `None` means show the placeholder.
    pub fn current(&self) -> Option<&str> {
        if self.exhausted {
            return None;
        }
        self.candidates.get(self.cursor).map(String::as_str)
    }

    /// Records a load failure of the current candidate.
    pub fn advance(&mut self) -> AvatarStep {
        if self.exhausted {
            return AvatarStep::Exhausted;
        }
        if self.cursor + 1 < self.candidates.len() {
            self.cursor += 1;
            AvatarStep::Retry
        } else {
            self.exhausted = true;
            AvatarStep::Exhausted
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.exhausted = self.candidates.is_empty();
    }

    pub fn current_request(&self, bearer: Option<&SecretString>) -> Option<ImageRequest> {
        self.current().map(|url| ImageRequest::new(url, bearer))
    }

    pub fn image_requests(&self, bearer: Option<&SecretString>) -> Vec<ImageRequest> {
        self.candidates
            .iter()
            .map(|url| ImageRequest::new(url, bearer))
            .collect()
    }
}

/// What the shell's image element should fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ImageRequest {
    pub fn new(url: &str, bearer: Option<&SecretString>) -> Self {
        Self {
            url: url.to_owned(),
            headers: HttpHeaders::for_session(bearer).into_vec(),
        }
    }
}
