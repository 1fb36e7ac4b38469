use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::error::{Brutal24Error, Result};
use crate::models::backend::Backend;
use crate::models::comment::{Comment, NewComment};
use crate::models::likes::UserLikes;
use crate::models::post::{NewPost, Post};
use crate::models::user::AnonymousUser;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgREST client for the hosted project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    rest_url: Url,
    api_key: String,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SupabaseClient {
    pub fn new(supabase_url: &str, api_key: &str) -> Result<Self> {
        let rest_url = Url::parse(supabase_url)?.join("rest/v1/")?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Brutal24Error::Network(e.to_string()))?;

        Ok(Self {
            http,
            rest_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn table_url(&self, table: &str) -> Result<Url> {
        Ok(self.rest_url.join(table)?)
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.table_url(table)?)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key))
    }

    async fn execute(builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(Brutal24Error::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        Ok(Self::execute(builder).await?.json::<T>().await?)
    }

    /// Inserts one row and returns it as stored.
    async fn insert_returning<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &(impl serde::Serialize + Sync),
    ) -> Result<T> {
        let rows: Vec<T> = Self::fetch(
            self.request(Method::POST, table)?
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await?;

        rows.into_iter().next().ok_or_else(|| Brutal24Error::Backend {
            status: 200,
            message: format!("insert into {} returned no row", table),
        })
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn fetch_live_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        Self::fetch(self.request(Method::GET, "posts")?.query(&[
            ("select", "*".to_string()),
            ("expires_at", format!("gt.{}", timestamp(now))),
            ("order", "created_at.desc".to_string()),
        ]))
        .await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        self.insert_returning("posts", post).await
    }

    async fn update_likes_count(&self, post_id: &str, likes_count: u32) -> Result<()> {
        Self::execute(
            self.request(Method::PATCH, "posts")?
                .query(&[("id", format!("eq.{}", post_id))])
                .json(&json!({ "likes_count": likes_count })),
        )
        .await?;
        Ok(())
    }

    async fn delete_expired_posts(&self, now: DateTime<Utc>) -> Result<()> {
        Self::execute(
            self.request(Method::DELETE, "posts")?
                .query(&[("expires_at", format!("lt.{}", timestamp(now)))]),
        )
        .await?;
        Ok(())
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        Self::fetch(self.request(Method::GET, "comments")?.query(&[
            ("select", "*".to_string()),
            ("post_id", format!("eq.{}", post_id)),
            ("order", "created_at.asc".to_string()),
        ]))
        .await
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.insert_returning("comments", comment).await
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<AnonymousUser>> {
        let rows: Vec<AnonymousUser> = Self::fetch(self.request(Method::GET, "anonymous_users")?.query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{}", user_id)),
        ]))
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_user(&self, user: &AnonymousUser) -> Result<()> {
        Self::execute(self.request(Method::POST, "anonymous_users")?.json(user)).await?;
        Ok(())
    }

    async fn find_user_likes(&self, user_id: &str) -> Result<Option<UserLikes>> {
        let rows: Vec<UserLikes> = Self::fetch(self.request(Method::GET, "user_likes")?.query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", user_id)),
        ]))
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_user_likes(&self, likes: &UserLikes) -> Result<()> {
        Self::execute(
            self.request(Method::PATCH, "user_likes")?
                .query(&[("user_id", format!("eq.{}", likes.user_id))])
                .json(&json!({
                    "post_ids": likes.post_ids,
                    "updated_at": timestamp(likes.updated_at),
                })),
        )
        .await?;
        Ok(())
    }

    async fn insert_user_likes(&self, likes: &UserLikes) -> Result<()> {
        Self::execute(self.request(Method::POST, "user_likes")?.json(likes)).await?;
        Ok(())
    }
}
