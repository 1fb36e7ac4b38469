use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::backend::Backend;
use crate::models::storage::{LocalStore, LIKES_KEY};

/// Row of the `user_likes` table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserLikes {
    pub user_id: String,
    pub post_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Post ids the local viewer has liked. Ordered so the mirrored array is
/// stable between writes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct LikeSet(BTreeSet<String>);

impl LikeSet {
    pub fn contains(&self, post_id: &str) -> bool {
        self.0.contains(post_id)
    }

    pub fn insert(&mut self, post_id: &str) -> bool {
        self.0.insert(post_id.to_string())
    }

    pub fn remove(&mut self, post_id: &str) -> bool {
        self.0.remove(post_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for LikeSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        LikeSet(iter.into_iter().collect())
    }
}

/// Local store first; on a miss, the backend row for `user_id`, cached
/// locally. Backend trouble yields an empty set.
pub async fn get_user_likes(store: &LocalStore, backend: &dyn Backend, user_id: &str) -> LikeSet {
    if let Some(likes) = store.load::<LikeSet>(LIKES_KEY) {
        return likes;
    }

    match backend.find_user_likes(user_id).await {
        Ok(Some(row)) => {
            let likes: LikeSet = row.post_ids.into_iter().collect();
            if let Err(e) = store.save(LIKES_KEY, &likes) {
                log::warn!("Failed to cache likes locally: {}", e);
            }
            likes
        }
        Ok(None) => LikeSet::default(),
        Err(e) => {
            log::error!("Error fetching likes: {}", e);
            LikeSet::default()
        }
    }
}

/// Persists locally, then mirrors to the backend (update if a row exists,
/// insert otherwise). Last writer wins.
pub async fn sync_likes(
    store: &LocalStore,
    backend: &dyn Backend,
    user_id: &str,
    likes: &LikeSet,
) -> Result<()> {
    store.save(LIKES_KEY, likes)?;
    mirror_likes(backend, user_id, likes).await
}

async fn mirror_likes(backend: &dyn Backend, user_id: &str, likes: &LikeSet) -> Result<()> {
    let row = UserLikes {
        user_id: user_id.to_string(),
        post_ids: likes.to_vec(),
        updated_at: Utc::now(),
    };

    if backend.find_user_likes(user_id).await?.is_some() {
        backend.update_user_likes(&row).await
    } else {
        backend.insert_user_likes(&row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::{MemoryBackend, Operation};

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn likes(ids: &[&str]) -> LikeSet {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn synced_set_reloads_identically() {
        let (_dir, store) = store();
        let backend = MemoryBackend::new();
        let set = likes(&["p3", "p1", "p2"]);

        sync_likes(&store, &backend, "anon_1", &set).await.unwrap();
        assert_eq!(get_user_likes(&store, &backend, "anon_1").await, set);
        assert_eq!(
            backend.stored_likes("anon_1").unwrap().post_ids,
            vec!["p1", "p2", "p3"]
        );
    }

    #[tokio::test]
    async fn second_sync_updates_the_existing_row() {
        let (_dir, store) = store();
        let backend = MemoryBackend::new();
        sync_likes(&store, &backend, "anon_1", &likes(&["p1"])).await.unwrap();
        sync_likes(&store, &backend, "anon_1", &likes(&["p2"])).await.unwrap();
        assert_eq!(backend.stored_likes("anon_1").unwrap().post_ids, vec!["p2"]);
    }

    #[tokio::test]
    async fn local_miss_falls_back_to_backend_and_caches() {
        let (_dir, store) = store();
        let backend = MemoryBackend::new();
        mirror_likes(&backend, "anon_1", &likes(&["p9"])).await.unwrap();

        let loaded = get_user_likes(&store, &backend, "anon_1").await;
        assert_eq!(loaded, likes(&["p9"]));
        assert_eq!(store.load::<LikeSet>(LIKES_KEY), Some(likes(&["p9"])));
    }

    #[tokio::test]
    async fn backend_failure_still_writes_locally() {
        let (_dir, store) = store();
        let backend = MemoryBackend::new();
        backend.set_failing(Operation::UserLikes, true);

        assert!(sync_likes(&store, &backend, "anon_1", &likes(&["p1"])).await.is_err());
        assert_eq!(get_user_likes(&store, &backend, "anon_1").await, likes(&["p1"]));
    }

    #[tokio::test]
    async fn nothing_anywhere_is_an_empty_set() {
        let (_dir, store) = store();
        let backend = MemoryBackend::new();
        backend.set_failing(Operation::UserLikes, true);
        assert_eq!(get_user_likes(&store, &backend, "anon_1").await, LikeSet::default());
    }
}
