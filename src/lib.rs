#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod avatar;
pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod event;
pub mod highlights;
pub mod model;
pub mod preferences;
pub mod probe;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::App as CruxApp;
pub use event::Event;
pub use model::Model;

use avatar::ImageRequest;
use capabilities::HttpError;
use config::ConfigError;
use event::LoadId;
use highlights::DerivedHighlights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Authentication,
    Authorization,
    NotFound,
    Validation,
    Deserialization,
    Configuration,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Deserialization | Self::Unknown)
    }

    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 | 410 => Self::NotFound,
            400 | 422 => Self::Validation,
            408 | 429 | 500..=599 => Self::Network,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => "Couldn't reach the server. Check your connection and try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => "You don't have access to this profile.".into(),
            ErrorKind::NotFound => "This profile no longer exists.".into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Deserialization | ErrorKind::Unknown => {
                "Something went wrong while loading the profile.".into()
            }
            ErrorKind::Configuration => "The app is misconfigured.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " ({internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let kind = match &e {
            HttpError::Status { status } => ErrorKind::from_http_status(*status),
            HttpError::EmptyBody => ErrorKind::Deserialization,
            HttpError::Transport { .. } => ErrorKind::Network,
            HttpError::InvalidUrl { .. }
            | HttpError::InvalidHeader { .. }
            | HttpError::TooManyHeaders { .. } => ErrorKind::Configuration,
        };
        AppError::new(kind, "request failed").with_internal(e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

// --- View model ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum AvatarView {
    Remote { load_id: LoadId, request: ImageRequest },
    Placeholder { asset: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProfileViewModel {
    pub user_id: String,
    pub nickname: Option<String>,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
    pub style_tags: Vec<String>,
    pub food_tags: Vec<String>,
    pub highlights: DerivedHighlights,
    pub show_recap_fallback: bool,
    pub avatar: AvatarView,
    pub is_following: Option<bool>,
    pub can_toggle_follow: bool,
    pub is_refreshing: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Profile(ProfileViewModel),
    Error { message: String, is_retryable: bool },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserFacingError {
    pub code: String,
    pub message: String,
    pub is_retryable: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            code: e.kind.code().to_string(),
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub error: Option<UserFacingError>,
    pub is_authenticated: bool,
}

pub mod app {
    use std::sync::Arc;

    use secrecy::SecretString;
    use serde_json::Value;
    use tracing::{debug, info, instrument, warn};

    use super::*;
    use crate::avatar::{AvatarResolver, AvatarStep};
    use crate::capabilities::{Endpoint, HttpHeaders, AUTHORIZATION_HEADER};
    use crate::catalog::{CatalogKey, TagCatalog};
    use crate::config::OriginSet;
    use crate::event::{EmptyResponse, JsonResponse, UserId};
    use crate::highlights::derive_highlights;
    use crate::model::{ProfileLoad, ProfileSnapshot, ScreenState, Slot};
    use crate::preferences::resolve_profile_preferences;
    use crate::probe::{self, Path};

    const NICKNAME_FIELDS: &[Path] = &[
        Path(&["nickname"]),
        Path(&["nickName"]),
        Path(&["userName"]),
        Path(&["username"]),
        Path(&["name"]),
    ];

    const FOLLOWER_COUNT_FIELDS: &[Path] = &[
        Path(&["followerCount"]),
        Path(&["followersCount"]),
        Path(&["follower_count"]),
        Path(&["followers"]),
    ];

    const FOLLOWING_COUNT_FIELDS: &[Path] = &[
        Path(&["followingCount"]),
        Path(&["followingsCount"]),
        Path(&["following_count"]),
        Path(&["followings"]),
    ];

    const FOLLOW_STATUS_FIELDS: &[Path] = &[
        Path(&["isFollowing"]),
        Path(&["is_following"]),
        Path(&["following"]),
        Path(&["followed"]),
        Path(&["status"]),
    ];

    #[derive(Default)]
    pub struct App;

    impl App {
        fn authorize(
            builder: crux_http::RequestBuilder<Event>,
            bearer: Option<&SecretString>,
        ) -> crux_http::RequestBuilder<Event> {
            match HttpHeaders::for_session(bearer).get(AUTHORIZATION_HEADER) {
                Some(value) => builder.header(AUTHORIZATION_HEADER, value.to_owned()),
                None => builder,
            }
        }

        /// Body and `ETag` of a successful JSON response.
        fn read_json(result: JsonResponse) -> Result<(Option<String>, Value), HttpError> {
            let mut response = result?;
            let status: u16 = response.status().into();
            if !(200..300).contains(&status) {
                return Err(HttpError::Status { status });
            }
            let etag = response
                .header("etag")
                .map(|values| values.last().as_str().to_owned());
            let body = response.take_body().ok_or(HttpError::EmptyBody)?;
            Ok((etag, body))
        }

        fn check_status(result: EmptyResponse) -> Result<(), HttpError> {
            let response = result?;
            let status: u16 = response.status().into();
            if (200..300).contains(&status) {
                Ok(())
            } else {
                Err(HttpError::Status { status })
            }
        }

        fn parse_follow_status(body: &Value) -> Option<bool> {
            let root = probe::unwrap_envelope(body);
            FOLLOW_STATUS_FIELDS
                .iter()
                .filter_map(|path| path.get(root))
                .find_map(|value| match value {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
                        "FOLLOWING" | "TRUE" | "Y" => Some(true),
                        "NOT_FOLLOWING" | "NONE" | "FALSE" | "N" => Some(false),
                        _ => None,
                    },
                    _ => None,
                })
                .or_else(|| body.as_bool())
        }

        #[instrument(level = "debug", skip(model, caps))]
        fn start_load(model: &mut Model, caps: &Capabilities, user_id: UserId) {
            let load = ProfileLoad::new(user_id);
            let origin = model.config.origins.api().clone();

            let urls = Endpoint::TagSettings.url(&origin).and_then(|settings| {
                let profile = Endpoint::Profile(load.user_id.clone()).url(&origin)?;
                let follow = Endpoint::FollowStatus(load.user_id.clone()).url(&origin)?;
                Ok((settings, profile, follow))
            });
            let (settings_url, profile_url, follow_url) = match urls {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(error = %e, "cannot build profile endpoints");
                    model.screen = ScreenState::Failed;
                    model.set_error(e.into());
                    caps.render.render();
                    return;
                }
            };

            let bearer = model.secrets.bearer.as_ref();

            let id = load.id.clone();
            Self::authorize(caps.http.get(settings_url), bearer)
                .expect_json::<Value>()
                .send(move |result| Event::SettingsFetched(id, result));

            let id = load.id.clone();
            Self::authorize(caps.http.get(profile_url), bearer)
                .expect_json::<Value>()
                .send(move |result| Event::ProfileFetched(id, result));

            let id = load.id.clone();
            Self::authorize(caps.http.get(follow_url), bearer)
                .expect_json::<Value>()
                .send(move |result| Event::FollowStatusFetched(id, result));

            info!(load_id = %load.id, "profile load started");
            if model.profile_user.as_ref() != Some(&load.user_id) {
                model.snapshot = None;
            }
            model.profile_user = Some(load.user_id.clone());
            model.load = Some(load);
            model.screen = ScreenState::Loading;
            caps.render.render();
        }

        fn is_current_load(model: &Model, id: &LoadId) -> bool {
            let current = model.load.as_ref().is_some_and(|load| &load.id == id);
            if !current {
                debug!(load_id = %id, "dropping response from superseded load");
            }
            current
        }

        /// Derives the screen once every concurrent fetch has settled.
        fn finish_load_if_settled(model: &mut Model, caps: &Capabilities) {
            if !model.load.as_ref().is_some_and(ProfileLoad::is_settled) {
                return;
            }
            let Some(load) = model.load.take() else {
                return;
            };

            let profile = match load.profile {
                Slot::Ready(profile) => profile,
                Slot::Failed(error) => {
                    warn!(load_id = %load.id, error = %error, "profile fetch failed");
                    model.screen = ScreenState::Failed;
                    model.set_error(error);
                    caps.render.render();
                    return;
                }
                Slot::Pending => return,
            };

            let catalog = match load.settings {
                Slot::Ready(catalog) => catalog,
                _ => model.catalog_cache.current().unwrap_or_else(|| {
                    warn!(load_id = %load.id, "no tag catalog available, showing raw preferences");
                    Arc::new(TagCatalog::default())
                }),
            };

            let is_following = match load.follow_status {
                Slot::Ready(status) => status,
                _ => None,
            };

            let snapshot = Self::derive_snapshot(
                &model.config.origins,
                load.id,
                load.user_id,
                &profile,
                &catalog,
                is_following,
            );

            model.snapshot = Some(snapshot);
            model.screen = ScreenState::Ready;
            model.clear_error();
            caps.render.render();
        }

        pub fn derive_snapshot(
            origins: &OriginSet,
            load_id: LoadId,
            user_id: UserId,
            profile: &Value,
            catalog: &TagCatalog,
            is_following: Option<bool>,
        ) -> ProfileSnapshot {
            let root = probe::unwrap_envelope(profile);
            let avatar = AvatarResolver::new(origins.clone()).resolve(profile);

            debug!(
                load_id = %load_id,
                avatar_candidates = avatar.candidates().len(),
                "profile snapshot derived"
            );

            ProfileSnapshot {
                load_id,
                user_id,
                nickname: probe::first_text(root, NICKNAME_FIELDS),
                follower_count: probe::first_count(root, FOLLOWER_COUNT_FIELDS),
                following_count: probe::first_count(root, FOLLOWING_COUNT_FIELDS),
                preferences: resolve_profile_preferences(profile, catalog),
                highlights: derive_highlights(profile),
                avatar,
                is_following,
            }
        }

        fn build_profile_view(model: &Model, snapshot: &ProfileSnapshot) -> ProfileViewModel {
            let bearer = model.secrets.bearer.as_ref();
            let avatar = match snapshot.avatar.current_request(bearer) {
                Some(request) => AvatarView::Remote {
                    load_id: snapshot.load_id.clone(),
                    request,
                },
                None => AvatarView::Placeholder {
                    asset: model.config.avatar_placeholder.clone(),
                },
            };

            let highlights = snapshot.highlights.clone();
            let show_recap_fallback =
                highlights.recap_emphasis.is_empty() && highlights.recap_remainder.is_empty();

            ProfileViewModel {
                user_id: snapshot.user_id.to_string(),
                nickname: snapshot.nickname.clone(),
                follower_count: snapshot.follower_count,
                following_count: snapshot.following_count,
                style_tags: snapshot.preferences.style.clone(),
                food_tags: snapshot.preferences.food.clone(),
                highlights,
                show_recap_fallback,
                avatar,
                is_following: snapshot.is_following,
                can_toggle_follow: snapshot.is_following.is_some()
                    && !model.follow_pending
                    && model.load.is_none(),
                is_refreshing: model.screen == ScreenState::Loading,
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            let event_name = event.name();
            debug!(event = event_name, "update");
            if event.is_user_initiated() {
                info!(event = event_name, "user action");
            }

            match event {
                Event::Noop => {}

                Event::SessionChanged { token } => {
                    model.secrets.bearer = token
                        .as_ref()
                        .map(|t| t.expose().trim())
                        .filter(|t| !t.is_empty())
                        .map(|t| SecretString::new(t.to_owned()));
                    info!(authenticated = model.is_authenticated(), "session changed");
                    caps.render.render();
                }

                Event::OriginsConfigured { api, web, cdn } => {
                    match OriginSet::new(&api, &web, &cdn) {
                        Ok(origins) => {
                            model.config.origins = origins;
                            // Catalog keys are only meaningful per backend.
                            model.catalog_cache.invalidate();
                            info!(api = %api, "origins configured");
                        }
                        Err(e) => {
                            warn!(error = %e, "rejected origin configuration");
                            model.set_error(e.into());
                        }
                    }
                    caps.render.render();
                }

                Event::ProfileOpened { user_id } => {
                    let user_id = user_id.trim();
                    if user_id.is_empty() {
                        model.set_error(AppError::new(ErrorKind::Validation, "No profile selected."));
                        caps.render.render();
                        return;
                    }
                    Self::start_load(model, caps, UserId::new(user_id));
                }

                Event::ProfileRefreshRequested => match model.current_user().cloned() {
                    Some(user_id) => Self::start_load(model, caps, user_id),
                    None => debug!("refresh requested with no profile open"),
                },

                Event::ProfileClosed => {
                    model.load = None;
                    model.snapshot = None;
                    model.profile_user = None;
                    model.screen = ScreenState::Idle;
                    model.clear_error();
                    caps.render.render();
                }

                Event::FollowToggled => {
                    if model.follow_pending || model.load.is_some() {
                        debug!("follow toggle ignored while a request is in flight");
                        return;
                    }
                    let Some(snapshot) = model.snapshot.as_ref() else {
                        return;
                    };
                    let Some(is_following) = snapshot.is_following else {
                        warn!("follow status unknown, cannot toggle");
                        return;
                    };
                    let load_id = snapshot.load_id.clone();
                    let endpoint = Endpoint::Follow(snapshot.user_id.clone());

                    let url = match endpoint.url(model.config.origins.api()) {
                        Ok(url) => url,
                        Err(e) => {
                            model.set_error(e.into());
                            caps.render.render();
                            return;
                        }
                    };

                    let builder = if is_following {
                        caps.http.delete(url)
                    } else {
                        caps.http.post(url)
                    };
                    Self::authorize(builder, model.secrets.bearer.as_ref())
                        .send(move |result| Event::FollowMutated(load_id, result));

                    model.follow_pending = true;
                    caps.render.render();
                }

                Event::FollowMutated(load_id, result) => {
                    // Only the mutation's own response may release the toggle.
                    model.follow_pending = false;
                    match Self::check_status(result) {
                        Ok(()) => {
                            info!(load_id = %load_id, "follow state changed, reloading profile");
                            // No optimistic merge: the server's view is refetched in full.
                            match model.current_user().cloned() {
                                Some(user_id) => Self::start_load(model, caps, user_id),
                                None => caps.render.render(),
                            }
                        }
                        Err(e) => {
                            warn!(load_id = %load_id, error = %e, "follow mutation failed");
                            model.set_error(e.into());
                            caps.render.render();
                        }
                    }
                }

                Event::AvatarLoadFailed { load_id } => {
                    let Some(snapshot) = model
                        .snapshot
                        .as_mut()
                        .filter(|snapshot| snapshot.load_id == load_id)
                    else {
                        debug!(load_id = %load_id, "avatar failure for a stale load");
                        return;
                    };

                    match snapshot.avatar.advance() {
                        AvatarStep::Retry => debug!(
                            cursor = snapshot.avatar.cursor(),
                            "avatar candidate failed, trying next"
                        ),
                        AvatarStep::Exhausted => {
                            info!("all avatar candidates failed, using placeholder");
                        }
                    }
                    caps.render.render();
                }

                Event::CatalogInvalidated => {
                    model.catalog_cache.invalidate();
                }

                Event::SettingsFetched(id, result) => {
                    if !Self::is_current_load(model, &id) {
                        return;
                    }
                    let slot = match Self::read_json(result) {
                        Ok((etag, body)) => {
                            let key = CatalogKey::for_response(etag.as_deref(), &body);
                            Slot::Ready(model.catalog_cache.get_or_build(key, &body))
                        }
                        Err(e) => {
                            warn!(error = %e, "settings fetch failed");
                            Slot::Failed(e.into())
                        }
                    };
                    if let Some(load) = model.load_mut(&id) {
                        load.settings = slot;
                    }
                    Self::finish_load_if_settled(model, caps);
                }

                Event::ProfileFetched(id, result) => {
                    if !Self::is_current_load(model, &id) {
                        return;
                    }
                    let slot = match Self::read_json(result) {
                        Ok((_, body)) => Slot::Ready(body),
                        Err(e) => Slot::Failed(e.into()),
                    };
                    if let Some(load) = model.load_mut(&id) {
                        load.profile = slot;
                    }
                    Self::finish_load_if_settled(model, caps);
                }

                Event::FollowStatusFetched(id, result) => {
                    if !Self::is_current_load(model, &id) {
                        return;
                    }
                    let slot = match Self::read_json(result) {
                        Ok((_, body)) => Slot::Ready(Self::parse_follow_status(&body)),
                        Err(e) => {
                            debug!(error = %e, "follow status unavailable");
                            Slot::Failed(e.into())
                        }
                    };
                    if let Some(load) = model.load_mut(&id) {
                        load.follow_status = slot;
                    }
                    Self::finish_load_if_settled(model, caps);
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let state = match (&model.screen, &model.snapshot) {
                (ScreenState::Idle, _) => ViewState::Idle,
                (ScreenState::Loading, Some(snapshot)) | (ScreenState::Ready, Some(snapshot)) => {
                    ViewState::Profile(Self::build_profile_view(model, snapshot))
                }
                (ScreenState::Loading, None) => ViewState::Loading,
                (ScreenState::Ready, None) => ViewState::Idle,
                (ScreenState::Failed, _) => ViewState::Error {
                    message: model
                        .active_error
                        .as_ref()
                        .map(AppError::user_facing_message)
                        .unwrap_or_else(|| "An unknown error occurred".into()),
                    is_retryable: model
                        .active_error
                        .as_ref()
                        .is_some_and(AppError::is_retryable),
                },
            };

            ViewModel {
                state,
                error: model.active_error.as_ref().map(UserFacingError::from),
                is_authenticated: model.is_authenticated(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_status_mapping() {
            assert_eq!(ErrorKind::from_http_status(401), ErrorKind::Authentication);
            assert_eq!(ErrorKind::from_http_status(403), ErrorKind::Authorization);
            assert_eq!(ErrorKind::from_http_status(404), ErrorKind::NotFound);
            assert_eq!(ErrorKind::from_http_status(503), ErrorKind::Network);
            assert_eq!(ErrorKind::from_http_status(418), ErrorKind::Unknown);
        }

        #[test]
        fn test_http_error_conversion() {
            let e: AppError = HttpError::Status { status: 404 }.into();
            assert_eq!(e.kind, ErrorKind::NotFound);
            assert!(!e.is_retryable());
            assert!(e.internal_message.unwrap().contains("404"));

            let e: AppError = HttpError::Transport {
                message: "reset".into(),
            }
            .into();
            assert!(e.is_retryable());

            let e: AppError = HttpError::EmptyBody.into();
            assert_eq!(e.kind, ErrorKind::Deserialization);
        }

        #[test]
        fn test_display_includes_code() {
            let e = AppError::new(ErrorKind::Network, "offline").with_internal("dns");
            assert_eq!(e.to_string(), "[NETWORK_ERROR] offline (dns)");
        }

        #[test]
        fn test_user_facing_error() {
            let e = AppError::new(ErrorKind::Validation, "No profile selected.");
            let facing = UserFacingError::from(&e);
            assert_eq!(facing.code, "VALIDATION_ERROR");
            assert_eq!(facing.message, "No profile selected.");
            assert!(!facing.is_retryable);
        }
    }

    mod snapshot_tests {
        use super::*;
        use crate::catalog::TagCatalog;
        use crate::config::{OriginSet, DEFAULT_API_ORIGIN};
        use crate::event::UserId;
        use serde_json::json;

        #[test]
        fn test_derive_snapshot_reads_counts_and_nickname() {
            let profile = json!({
                "data": {
                    "nickname": "  나무꾼 ",
                    "followerCount": "12",
                    "followings": 3,
                    "profileImage": { "url": "/img/p.png" }
                }
            });
            let snapshot = App::derive_snapshot(
                &OriginSet::default(),
                LoadId::new("l"),
                UserId::new("u"),
                &profile,
                &TagCatalog::default(),
                Some(true),
            );

            assert_eq!(snapshot.nickname.as_deref(), Some("나무꾼"));
            assert_eq!(snapshot.follower_count, Some(12));
            assert_eq!(snapshot.following_count, Some(3));
            assert_eq!(
                snapshot.avatar.current(),
                Some(format!("{DEFAULT_API_ORIGIN}/img/p.png").as_str())
            );
            assert_eq!(snapshot.is_following, Some(true));
        }
    }
}
