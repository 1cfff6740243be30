use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use zeroize::Zeroize;

// --- Bearer token wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for BearerToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(LoadId);

impl LoadId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Raw JSON response handed back by the HTTP capability.
pub type JsonResponse = crux_http::Result<crux_http::Response<Value>>;
/// Response whose body is ignored.
pub type EmptyResponse = crux_http::Result<crux_http::Response<Vec<u8>>>;

#[derive(Serialize, Deserialize, Debug)]
pub enum Event {
    Noop,

    // --- Shell → core ---
    SessionChanged { token: Option<BearerToken> },
    OriginsConfigured { api: String, web: String, cdn: String },
    ProfileOpened { user_id: String },
    ProfileRefreshRequested,
    ProfileClosed,
    FollowToggled,
    AvatarLoadFailed { load_id: LoadId },
    CatalogInvalidated,

    // --- Capability callbacks ---
    #[serde(skip)]
    SettingsFetched(LoadId, JsonResponse),
    #[serde(skip)]
    ProfileFetched(LoadId, JsonResponse),
    #[serde(skip)]
    FollowStatusFetched(LoadId, JsonResponse),
    #[serde(skip)]
    FollowMutated(LoadId, EmptyResponse),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Noop => "noop",
            Event::SessionChanged { .. } => "session_changed",
            Event::OriginsConfigured { .. } => "origins_configured",
            Event::ProfileOpened { .. } => "profile_opened",
            Event::ProfileRefreshRequested => "profile_refresh_requested",
            Event::ProfileClosed => "profile_closed",
            Event::FollowToggled => "follow_toggled",
            Event::AvatarLoadFailed { .. } => "avatar_load_failed",
            Event::CatalogInvalidated => "catalog_invalidated",
            Event::SettingsFetched(..) => "settings_fetched",
            Event::ProfileFetched(..) => "profile_fetched",
            Event::FollowStatusFetched(..) => "follow_status_fetched",
            Event::FollowMutated(..) => "follow_mutated",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::ProfileOpened { .. }
                | Event::ProfileRefreshRequested
                | Event::ProfileClosed
                | Event::FollowToggled
        )
    }
}

impl Default for Event {
    fn default() -> Self {
        Event::Noop
    }
}
