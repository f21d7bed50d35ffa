//! Per-user gesture overrides.
//!
//! A user can rebind a device's on/off gestures for themselves; overrides
//! take priority over the device's global rules during fusion.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::{self, StoreError};

/// One device override: either side may be unbound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GesturePair {
    pub on: Option<String>,
    pub off: Option<String>,
}

/// user → device id → override, persisted as nested JSON objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPrefs {
    users: BTreeMap<String, BTreeMap<String, GesturePair>>,
}

impl UserPrefs {
    pub fn load(path: &Path) -> Self {
        store::load_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        store::save_json(path, self)
    }

    pub fn set(&mut self, user: &str, device_id: &str, pair: GesturePair) {
        self.users
            .entry(user.to_string())
            .or_default()
            .insert(device_id.to_string(), pair);
    }

    /// All overrides for one user, if any exist.
    pub fn rules_for(&self, user: &str) -> Option<&BTreeMap<String, GesturePair>> {
        self.users.get(user)
    }

    /// Drop every override a user owns (when the user is deleted).
    pub fn remove_user(&mut self, user: &str) -> bool {
        self.users.remove(user).is_some()
    }
}
