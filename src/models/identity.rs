use std::sync::Arc;

use crate::error::Result;
use crate::models::backend::Backend;
use crate::models::clock::Clock;
use crate::models::storage::{LocalStore, USER_KEY};
use crate::models::user::AnonymousUser;

/// The device's pseudonymous identity, created on first use.
///
/// A stored identity is returned at once and mirrored in the background;
/// a new one is persisted locally and mirrored before returning. Mirror
/// failures are logged and never reach the caller.
pub async fn get_anonymous_user(
    store: &LocalStore,
    backend: Arc<dyn Backend>,
    clock: &dyn Clock,
) -> AnonymousUser {
    if let Some(user) = store.load::<AnonymousUser>(USER_KEY) {
        let background_user = user.clone();
        tokio::spawn(async move {
            if let Err(e) = sync_user(backend.as_ref(), &background_user).await {
                log::error!("Error syncing user: {}", e);
            }
        });
        return user;
    }

    let user = AnonymousUser::generate(&mut rand::thread_rng(), clock.now());
    log::info!("Created anonymous identity {}", user.username);

    if let Err(e) = store.save(USER_KEY, &user) {
        log::error!("Failed to persist identity: {}", e);
    }
    if let Err(e) = sync_user(backend.as_ref(), &user).await {
        log::error!("Error syncing user: {}", e);
    }

    user
}

/// Create-if-absent mirror of the identity row.
pub async fn sync_user(backend: &dyn Backend, user: &AnonymousUser) -> Result<()> {
    if backend.find_user(&user.id).await?.is_none() {
        backend.insert_user(user).await?;
    }
    Ok(())
}
