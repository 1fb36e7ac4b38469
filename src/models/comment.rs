use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Brutal24Error, Result};

pub const MAX_COMMENT_LEN: usize = 280;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewComment {
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl NewComment {
    pub fn new(
        post_id: &str,
        user_id: &str,
        username: &str,
        content: &str,
        parent_id: Option<String>,
    ) -> Result<Self> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Brutal24Error::Validation("El comentario está vacío".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(Brutal24Error::Validation(format!(
                "El comentario supera los {} caracteres",
                MAX_COMMENT_LEN
            )));
        }

        Ok(Self {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            content: content.to_string(),
            parent_id,
        })
    }

    pub fn into_comment(self, id: String, created_at: DateTime<Utc>) -> Comment {
        Comment {
            id,
            post_id: self.post_id,
            user_id: self.user_id,
            username: self.username,
            content: self.content,
            created_at,
            parent_id: self.parent_id,
        }
    }
}

/// Target of a reply being composed in the thread overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyTarget {
    pub comment_id: String,
    pub username: String,
}

/// One row of a rendered thread.
#[derive(Clone, Debug, PartialEq)]
pub struct ThreadEntry<'a> {
    pub comment: &'a Comment,
    /// Handle of the parent comment's author when this is a reply.
    pub replying_to: Option<&'a str>,
}

impl ThreadEntry<'_> {
    pub fn is_reply(&self) -> bool {
        self.comment.parent_id.is_some()
    }

    pub fn label(&self) -> Option<String> {
        self.replying_to.map(|name| format!("Respondiendo a @{}", name))
    }
}

/// Lays comments out one level deep: each top-level comment in creation
/// order followed by every reply in its subtree. Replies whose chain does
/// not reach a loaded top-level comment are appended at the end.
pub fn thread<'a>(comments: &'a [Comment]) -> Vec<ThreadEntry<'a>> {
    let mut ordered: Vec<&'a Comment> = comments.iter().collect();
    ordered.sort_by_key(|c| c.created_at);

    let find = |id: &str| ordered.iter().find(|c| c.id == id).copied();
    let root_of = |comment: &Comment| -> Option<String> {
        let mut current = find(comment.id.as_str())?;
        // Bounded walk so a cyclic parent chain cannot spin forever.
        for _ in 0..ordered.len() {
            match current.parent_id.as_deref() {
                None => return Some(current.id.clone()),
                Some(parent) => current = find(parent)?,
            }
        }
        None
    };
    let entry = |comment: &'a Comment| ThreadEntry {
        comment,
        replying_to: comment
            .parent_id
            .as_deref()
            .and_then(find)
            .map(|p| p.username.as_str()),
    };

    let roots: Vec<Option<String>> = ordered.iter().map(|c| root_of(*c)).collect();
    let mut entries = Vec::with_capacity(ordered.len());

    for top in ordered.iter().filter(|c| c.parent_id.is_none()) {
        entries.push(entry(*top));
        for (reply, root) in ordered.iter().zip(&roots) {
            if reply.parent_id.is_some() && root.as_deref() == Some(top.id.as_str()) {
                entries.push(entry(*reply));
            }
        }
    }

    for (orphan, root) in ordered.iter().zip(&roots) {
        if orphan.parent_id.is_some() && root.is_none() {
            entries.push(entry(*orphan));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(id: &str, user: &str, minute: u32, parent: Option<&str>) -> Comment {
        Comment {
            id: id.to_string(),
            post_id: "p1".to_string(),
            user_id: format!("anon_{}", user),
            username: user.to_string(),
            content: format!("comment {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            parent_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn replies_follow_their_parent() {
        let comments = vec![
            comment("c3", "WildHawk3", 3, Some("c1")),
            comment("c2", "DarkStorm9", 2, None),
            comment("c1", "RawFire12", 1, None),
        ];
        let entries = thread(&comments);
        let ids: Vec<&str> = entries.iter().map(|e| e.comment.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c2"]);
        assert_eq!(entries[1].label().as_deref(), Some("Respondiendo a @RawFire12"));
        assert!(entries[0].label().is_none());
    }

    #[test]
    fn nested_replies_stay_in_the_root_group() {
        let comments = vec![
            comment("c1", "RawFire12", 1, None),
            comment("c2", "DarkStorm9", 2, None),
            comment("c3", "WildHawk3", 3, Some("c1")),
            comment("c4", "BoldViper8", 4, Some("c3")),
        ];
        let entries = thread(&comments);
        let ids: Vec<&str> = entries.iter().map(|e| e.comment.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c4", "c2"]);
        assert_eq!(entries[2].label().as_deref(), Some("Respondiendo a @WildHawk3"));
    }

    #[test]
    fn orphaned_replies_are_kept() {
        let comments = vec![comment("c9", "LoudBeast1", 5, Some("gone"))];
        let entries = thread(&comments);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_reply());
        assert!(entries[0].label().is_none());
    }

    #[test]
    fn comment_bounds_are_enforced() {
        assert!(NewComment::new("p", "u", "n", "", None).is_err());
        assert!(NewComment::new("p", "u", "n", &"y".repeat(MAX_COMMENT_LEN + 1), None).is_err());
        let reply = NewComment::new("p", "u", "n", " ok ", Some("c1".into())).unwrap();
        assert_eq!(reply.content, "ok");
        assert_eq!(reply.parent_id.as_deref(), Some("c1"));
    }
}
