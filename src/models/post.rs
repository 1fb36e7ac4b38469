use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Brutal24Error, Result};

/// Posts live for exactly this long after creation.
pub const POST_TTL_HOURS: i64 = 24;
pub const MAX_POST_LEN: usize = 500;
/// Bodies longer than this are clamped in the feed until expanded.
pub const READ_MORE_THRESHOLD: usize = 150;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub comments_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    // Client-only, derived from the local like set on every merge.
    #[serde(default, skip_serializing)]
    pub user_has_liked: bool,
}

impl Post {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.content.to_lowercase().contains(&query)
            || self.username.to_lowercase().contains(&query)
    }

    pub fn needs_read_more(&self) -> bool {
        self.content.chars().count() > READ_MORE_THRESHOLD
    }

    /// Body as shown in the feed, clamped unless the reader expanded it.
    pub fn excerpt(&self, expanded: bool) -> String {
        if expanded || !self.needs_read_more() {
            return self.content.clone();
        }
        let mut clamped: String = self.content.chars().take(READ_MORE_THRESHOLD).collect();
        clamped.push('…');
        clamped
    }
}

/// Insert payload for the `posts` table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewPost {
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub likes_count: u32,
    pub comments_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewPost {
    pub fn new(
        user_id: &str,
        username: &str,
        content: &str,
        image_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Brutal24Error::Validation("La publicación está vacía".to_string()));
        }
        if content.chars().count() > MAX_POST_LEN {
            return Err(Brutal24Error::Validation(format!(
                "La publicación supera los {} caracteres",
                MAX_POST_LEN
            )));
        }

        Ok(Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            content: content.to_string(),
            image_url,
            likes_count: 0,
            comments_count: 0,
            created_at: now,
            expires_at: now + Duration::hours(POST_TTL_HOURS),
        })
    }

    pub fn into_post(self, id: String) -> Post {
        Post {
            id,
            user_id: self.user_id,
            username: self.username,
            content: self.content,
            image_url: self.image_url,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            created_at: self.created_at,
            expires_at: self.expires_at,
            user_has_liked: false,
        }
    }
}

/// Remaining lifetime as `"{h}h {m}m"`, or `"Expirado"`.
pub fn time_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = expires_at - now;
    if diff <= Duration::zero() {
        return "Expirado".to_string();
    }
    format!("{}h {}m", diff.num_hours(), diff.num_minutes() % 60)
}
