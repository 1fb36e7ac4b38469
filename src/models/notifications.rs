use serde::{Deserialize, Serialize};

use crate::models::storage::{LocalStore, NOTIFICATIONS_KEY};

/// Alert permission, asked for once on the first interaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

impl Permission {
    pub fn load(store: &LocalStore) -> Self {
        store.load(NOTIFICATIONS_KEY).unwrap_or_default()
    }

    /// Resolves a pending request from the user's configured preference.
    /// An answered permission is never asked again.
    pub fn request(self, store: &LocalStore, enabled: bool) -> Self {
        if self != Permission::Default {
            return self;
        }

        let answer = if enabled { Permission::Granted } else { Permission::Denied };
        if let Err(e) = store.save(NOTIFICATIONS_KEY, &answer) {
            log::warn!("Failed to persist notification permission: {}", e);
        }
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_asked_once_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        let first = Permission::load(&store);
        assert_eq!(first, Permission::Default);
        assert_eq!(first.request(&store, true), Permission::Granted);

        let reloaded = Permission::load(&store);
        assert_eq!(reloaded, Permission::Granted);
        assert_eq!(reloaded.request(&store, false), Permission::Granted);
    }

    #[test]
    fn disabled_preference_denies() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(Permission::Default.request(&store, false), Permission::Denied);
    }
}
