use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;

use crate::avatar::AvatarResolutionState;
use crate::catalog::{CatalogCache, TagCatalog};
use crate::config::AppConfig;
use crate::event::{LoadId, UserId};
use crate::highlights::DerivedHighlights;
use crate::preferences::ResolvedPreferences;
use crate::AppError;

/// One outstanding fetch of a profile screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Pending,
    Ready(T),
    Failed(AppError),
}

impl<T> Slot<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }
}

/// Join point for the concurrent fetches of one profile load.
///
/// Derivation only runs once every slot has settled, so preferences are never
/// resolved against a partial catalog.
#[derive(Debug, Clone)]
pub struct ProfileLoad {
    pub id: LoadId,
    pub user_id: UserId,
    pub settings: Slot<Arc<TagCatalog>>,
    pub profile: Slot<Value>,
    pub follow_status: Slot<Option<bool>>,
}

impl ProfileLoad {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: LoadId::generate(),
            user_id,
            settings: Slot::Pending,
            profile: Slot::Pending,
            follow_status: Slot::Pending,
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.settings.is_pending() && !self.profile.is_pending() && !self.follow_status.is_pending()
    }
}

/// Everything the profile screen shows, derived from one settled load.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    pub load_id: LoadId,
    pub user_id: UserId,
    pub nickname: Option<String>,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
    pub preferences: ResolvedPreferences,
    pub highlights: DerivedHighlights,
    pub avatar: AvatarResolutionState,
    pub is_following: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScreenState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Runtime-only secrets: do NOT Serialize/Deserialize.
#[derive(Default)]
pub struct RuntimeSecrets {
    pub bearer: Option<SecretString>,
}

impl std::fmt::Debug for RuntimeSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSecrets")
            .field("bearer_present", &self.bearer.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: AppConfig,
    pub secrets: RuntimeSecrets,
    pub catalog_cache: CatalogCache,

    pub screen: ScreenState,
    pub profile_user: Option<UserId>,
    pub load: Option<ProfileLoad>,
    pub snapshot: Option<ProfileSnapshot>,
    pub follow_pending: bool,

    pub active_error: Option<AppError>,
}

impl Model {
    pub fn new(config: AppConfig) -> Self {
        Self {
            catalog_cache: CatalogCache::new(config.catalog_cache_capacity),
            config,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.secrets.bearer.is_some()
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    /// Current load, if `id` still belongs to it.
    pub fn load_mut(&mut self, id: &LoadId) -> Option<&mut ProfileLoad> {
        self.load.as_mut().filter(|load| &load.id == id)
    }

    /// The profile the screen shows, even if its last load failed.
    pub fn current_user(&self) -> Option<&UserId> {
        self.profile_user.as_ref()
    }
}
