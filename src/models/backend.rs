use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::{Brutal24Error, Result};
use crate::models::comment::{Comment, NewComment};
use crate::models::likes::UserLikes;
use crate::models::post::{NewPost, Post};
use crate::models::realtime::RealtimeEvent;
use crate::models::user::AnonymousUser;

/// The hosted store as this client uses it: four tables, no joins.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Posts with `expires_at > now`, newest first.
    async fn fetch_live_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>>;
    async fn insert_post(&self, post: &NewPost) -> Result<Post>;
    /// Absolute write of the denormalized counter.
    async fn update_likes_count(&self, post_id: &str, likes_count: u32) -> Result<()>;
    /// Deletes every post with `expires_at < now`.
    async fn delete_expired_posts(&self, now: DateTime<Utc>) -> Result<()>;

    /// Comments of one post, oldest first.
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>>;
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment>;

    async fn find_user(&self, user_id: &str) -> Result<Option<AnonymousUser>>;
    async fn insert_user(&self, user: &AnonymousUser) -> Result<()>;

    async fn find_user_likes(&self, user_id: &str) -> Result<Option<UserLikes>>;
    async fn update_user_likes(&self, likes: &UserLikes) -> Result<()>;
    async fn insert_user_likes(&self, likes: &UserLikes) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchPosts,
    InsertPost,
    UpdateLikes,
    DeleteExpired,
    FetchComments,
    InsertComment,
    Users,
    UserLikes,
}

#[derive(Default)]
struct Tables {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    users: HashMap<String, AnonymousUser>,
    user_likes: HashMap<String, UserLikes>,
    failing: HashSet<Operation>,
    delete_calls: usize,
}

/// Process-local backend used by `--offline` and by the tests. Row changes
/// are echoed on a broadcast channel the way the hosted realtime feed does.
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    events: broadcast::Sender<RealtimeEvent>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            tables: Mutex::new(Tables::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    /// Makes every call of `op` fail with a network error until cleared.
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut tables = self.lock();
        if failing {
            tables.failing.insert(op);
        } else {
            tables.failing.remove(&op);
        }
    }

    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.lock().posts.iter().find(|p| p.id == post_id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls
    }

    pub fn user(&self, user_id: &str) -> Option<AnonymousUser> {
        self.lock().users.get(user_id).cloned()
    }

    pub fn stored_likes(&self, user_id: &str) -> Option<UserLikes> {
        self.lock().user_likes.get(user_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(tables: &Tables, op: Operation) -> Result<()> {
        if tables.failing.contains(&op) {
            return Err(Brutal24Error::Network(format!("{:?} unavailable", op)));
        }
        Ok(())
    }

    fn publish(&self, event: RealtimeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_live_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let tables = self.lock();
        Self::check(&tables, Operation::FetchPosts)?;
        let mut posts: Vec<Post> = tables.posts.iter().filter(|p| p.is_live(now)).cloned().collect();
        posts.sort_by_key(|post| std::cmp::Reverse(post.created_at));
        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let created = {
            let mut tables = self.lock();
            Self::check(&tables, Operation::InsertPost)?;
            let created = post.clone().into_post(uuid::Uuid::new_v4().to_string());
            tables.posts.push(created.clone());
            created
        };
        self.publish(RealtimeEvent::PostInserted(created.clone()));
        Ok(created)
    }

    async fn update_likes_count(&self, post_id: &str, likes_count: u32) -> Result<()> {
        let updated = {
            let mut tables = self.lock();
            Self::check(&tables, Operation::UpdateLikes)?;
            let post = tables
                .posts
                .iter_mut()
                .find(|p| p.id == post_id)
                .ok_or_else(|| Brutal24Error::Backend {
                    status: 404,
                    message: format!("post {} not found", post_id),
                })?;
            post.likes_count = likes_count;
            post.clone()
        };
        self.publish(RealtimeEvent::PostUpdated(updated));
        Ok(())
    }

    async fn delete_expired_posts(&self, now: DateTime<Utc>) -> Result<()> {
        let removed: Vec<String> = {
            let mut tables = self.lock();
            Self::check(&tables, Operation::DeleteExpired)?;
            tables.delete_calls += 1;
            let (expired, live): (Vec<Post>, Vec<Post>) =
                tables.posts.drain(..).partition(|p| p.expires_at < now);
            tables.posts = live;
            expired.into_iter().map(|p| p.id).collect()
        };
        for id in removed {
            self.publish(RealtimeEvent::PostDeleted { id });
        }
        Ok(())
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let tables = self.lock();
        Self::check(&tables, Operation::FetchComments)?;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let (created, post) = {
            let mut tables = self.lock();
            Self::check(&tables, Operation::InsertComment)?;
            let created = comment
                .clone()
                .into_comment(uuid::Uuid::new_v4().to_string(), Utc::now());
            tables.comments.push(created.clone());
            // Mirrors the hosted counter trigger.
            let post = tables.posts.iter_mut().find(|p| p.id == comment.post_id).map(|p| {
                p.comments_count += 1;
                p.clone()
            });
            (created, post)
        };
        self.publish(RealtimeEvent::CommentInserted(created.clone()));
        if let Some(post) = post {
            self.publish(RealtimeEvent::PostUpdated(post));
        }
        Ok(created)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<AnonymousUser>> {
        let tables = self.lock();
        Self::check(&tables, Operation::Users)?;
        Ok(tables.users.get(user_id).cloned())
    }

    async fn insert_user(&self, user: &AnonymousUser) -> Result<()> {
        let mut tables = self.lock();
        Self::check(&tables, Operation::Users)?;
        if tables.users.contains_key(&user.id) {
            return Err(Brutal24Error::Backend {
                status: 409,
                message: format!("user {} already exists", user.id),
            });
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_likes(&self, user_id: &str) -> Result<Option<UserLikes>> {
        let tables = self.lock();
        Self::check(&tables, Operation::UserLikes)?;
        Ok(tables.user_likes.get(user_id).cloned())
    }

    async fn update_user_likes(&self, likes: &UserLikes) -> Result<()> {
        let mut tables = self.lock();
        Self::check(&tables, Operation::UserLikes)?;
        if let Some(row) = tables.user_likes.get_mut(&likes.user_id) {
            *row = likes.clone();
        }
        Ok(())
    }

    async fn insert_user_likes(&self, likes: &UserLikes) -> Result<()> {
        let mut tables = self.lock();
        Self::check(&tables, Operation::UserLikes)?;
        tables.user_likes.insert(likes.user_id.clone(), likes.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn live_posts_are_filtered_and_ordered() {
        let backend = MemoryBackend::new();
        let start = Utc::now();
        let old = NewPost::new("u", "RawFire1", "old", None, start - Duration::hours(30)).unwrap();
        let first = NewPost::new("u", "RawFire1", "first", None, start - Duration::hours(2)).unwrap();
        let second = NewPost::new("u", "RawFire1", "second", None, start - Duration::hours(1)).unwrap();
        for post in [&old, &first, &second] {
            backend.insert_post(post).await.unwrap();
        }

        let live = backend.fetch_live_posts(start).await.unwrap();
        let bodies: Vec<&str> = live.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(bodies, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn sweep_deletes_and_announces() {
        let backend = MemoryBackend::new();
        let mut events = backend.subscribe();
        let now = Utc::now();
        let stale = backend
            .insert_post(&NewPost::new("u", "n", "bye", None, now - Duration::hours(25)).unwrap())
            .await
            .unwrap();
        let _ = events.recv().await.unwrap();

        backend.delete_expired_posts(now).await.unwrap();
        assert_eq!(backend.post_count(), 0);
        assert_eq!(backend.delete_calls(), 1);
        assert_eq!(events.recv().await.unwrap(), RealtimeEvent::PostDeleted { id: stale.id });
    }

    #[tokio::test]
    async fn injected_failures_surface_as_network_errors() {
        let backend = MemoryBackend::new();
        backend.set_failing(Operation::FetchPosts, true);
        assert!(matches!(
            backend.fetch_live_posts(Utc::now()).await,
            Err(Brutal24Error::Network(_))
        ));
        backend.set_failing(Operation::FetchPosts, false);
        assert!(backend.fetch_live_posts(Utc::now()).await.is_ok());
    }
}
