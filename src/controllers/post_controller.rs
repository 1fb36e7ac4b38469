use std::env;
use std::fs;
use std::process::Command;
use anyhow::{Context, Result};

use crate::controllers::context::AppContext;
use crate::controllers::feed::{FeedController, ToastKind};
use crate::error::Brutal24Error;
use crate::models::clock::Clock;
use crate::models::identity;
use crate::models::post::time_left;
use crate::models::{Backend, Post};

/// Publishes one post outside the TUI.
pub async fn post_note(ctx: &AppContext, content: &str, image_url: Option<String>) -> Result<Post> {
    let user = identity::get_anonymous_user(&ctx.store, ctx.backend.clone(), ctx.clock.as_ref()).await;
    let mut feed = FeedController::new(ctx, user, Default::default());

    let Some(effect) = feed.create_post(content, image_url) else {
        let reason = feed
            .toasts()
            .last()
            .map(|t| t.description.clone())
            .unwrap_or_else(|| "Post rejected".to_string());
        return Err(Brutal24Error::Validation(reason).into());
    };
    feed.dispatch(ctx, effect).await;

    if let Some(failure) = feed.toasts().find(|t| t.kind == ToastKind::Error) {
        return Err(Brutal24Error::Validation(failure.description.clone()).into());
    }
    feed.posts()
        .into_iter()
        .find(|p| p.user_id == feed.user().id && p.content == content.trim())
        .cloned()
        .context("Post was created but is missing from the feed")
}

/// Live feed, newest first, with the viewer's like flags merged in.
pub async fn fetch_posts(ctx: &AppContext) -> Vec<Post> {
    let feed = FeedController::bootstrap(ctx).await;
    feed.posts().into_iter().cloned().collect()
}

/// One expiry sweep against the backend.
pub async fn sweep_expired(ctx: &AppContext) -> Result<()> {
    ctx.backend
        .delete_expired_posts(ctx.clock.now())
        .await
        .context("Failed to delete expired posts")
}

pub fn format_post(post: &Post, now: chrono::DateTime<chrono::Utc>) -> String {
    let heart = if post.user_has_liked { "♥" } else { "♡" };
    let mut out = format!(
        "@{} · {} · {}\n{}\n",
        post.username,
        post.created_at.with_timezone(&chrono::Local).format("%H:%M"),
        time_left(post.expires_at, now),
        post.content,
    );
    if let Some(url) = &post.image_url {
        out.push_str(&format!("[imagen] {}\n", url));
    }
    out.push_str(&format!("{} {}  💬 {}\n", heart, post.likes_count, post.comments_count));
    out
}

pub fn create_post_via_editor() -> Result<String> {
    let editor = env::var("EDITOR")
        .unwrap_or_else(|_| "vi".to_string());

    let mut temp_path = env::temp_dir();
    temp_path.push("brutal24_post");

    let status = Command::new(&editor)
        .arg(&temp_path)
        .status()
        .with_context(|| format!("Failed to launch editor {}", editor))?;

    if !status.success() {
        return Err(Brutal24Error::Io("Editor exited with non-zero status".to_string()).into());
    }

    let content = fs::read_to_string(&temp_path)
        .context("No post written")?;
    let _ = fs::remove_file(&temp_path);
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{Duration, TimeZone, Utc};
    use crate::models::backend::{MemoryBackend, Operation};
    use crate::models::clock::{Clock, ManualClock};
    use crate::models::{Config, LocalStore};

    fn context(dir: &tempfile::TempDir) -> (AppContext, Arc<MemoryBackend>, ManualClock) {
        let store = LocalStore::open(dir.path()).unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let ctx = AppContext::local(Config::default(), store, backend.clone(), Arc::new(clock.clone()));
        (ctx, backend, clock)
    }

    #[tokio::test]
    async fn posts_and_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, backend, clock) = context(&dir);

        let post = post_note(&ctx, "  desde la terminal ", None).await.unwrap();
        assert_eq!(post.content, "desde la terminal");
        assert_eq!(post.expires_at - post.created_at, Duration::hours(24));
        assert_eq!(backend.post_count(), 1);

        let posts = fetch_posts(&ctx).await;
        assert_eq!(posts.len(), 1);
        let printed = format_post(&posts[0], clock.now());
        assert!(printed.contains("24h 0m"));
        assert!(printed.contains("♡ 0  💬 0"));
    }

    #[tokio::test]
    async fn rejected_and_failed_posts_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, backend, _clock) = context(&dir);

        assert!(post_note(&ctx, "   ", None).await.is_err());
        backend.set_failing(Operation::InsertPost, true);
        assert!(post_note(&ctx, "hola", None).await.is_err());
        assert_eq!(backend.post_count(), 0);
    }

    #[tokio::test]
    async fn sweep_deletes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, backend, clock) = context(&dir);
        post_note(&ctx, "viejo", None).await.unwrap();
        clock.advance(Duration::hours(25));
        post_note(&ctx, "nuevo", None).await.unwrap();

        sweep_expired(&ctx).await.unwrap();
        assert_eq!(backend.post_count(), 1);
        assert_eq!(backend.delete_calls(), 1);
    }
}
