//! Comment listing and submission.
//!
//! Listing follows the content client's policy and never fails. Creating a
//! comment is a mutation, so failures are returned to the caller.

use std::collections::HashMap;

use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::{
    error::{Error, Result},
    transform::{format_date, strip_html},
    types::Rendered,
};

/// A comment as returned by `GET /comments`.
#[derive(Debug, Clone, Deserialize)]
struct ExternalComment {
    id: u64,
    post: u64,
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    content: Rendered,
    #[serde(default)]
    author_avatar_urls: HashMap<String, String>,
}

/// WordPress REST error body.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    post: u64,
    content: &'a str,
}

/// A comment as presented to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub post: u64,
    pub author: String,
    /// Comment text with markup removed.
    pub content: String,
    pub date: String,
    pub avatar: Option<String>,
}

impl From<ExternalComment> for Comment {
    fn from(value: ExternalComment) -> Self {
        // Keys are pixel sizes; pick the largest.
        let avatar = value
            .author_avatar_urls
            .into_iter()
            .filter_map(|(size, url)| size.parse::<u32>().ok().map(|size| (size, url)))
            .max_by_key(|(size, _)| *size)
            .map(|(_, url)| url);

        Self {
            id: value.id,
            post: value.post,
            author: value.author_name,
            content: strip_html(&value.content.rendered),
            date: format_date(&value.date),
            avatar,
        }
    }
}

/// Client for the site's comment endpoints.
#[derive(Debug, Clone)]
pub struct CommentClient {
    http: Client,
    base_url: String,
}

impl CommentClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: Client::builder().default_headers(headers).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Lists the comments of a post. Any failure yields an empty list.
    #[instrument(skip(self))]
    pub async fn list_comments(&self, post_id: u64) -> Vec<Comment> {
        match self.fetch_comments(post_id).await {
            Ok(comments) => comments,
            Err(e) => {
                error!(error = %e, "Error fetching comments");
                Vec::new()
            }
        }
    }

    /// Publishes a comment on behalf of the holder of `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `content` is blank
    /// - The token is rejected (`AccessDenied`)
    /// - The post does not exist (`NotFound`)
    /// - The request fails or the response cannot be parsed
    #[instrument(skip(self, access_token, content))]
    pub async fn create_comment(
        &self,
        access_token: &str,
        post_id: u64,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("comment must not be empty".to_string()));
        }

        let response = self
            .http
            .post(format!("{}/comments", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .json(&CreateCommentRequest {
                post: post_id,
                content,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(Error::from_status(status, message));
        }

        let created: ExternalComment = serde_json::from_slice(&body)?;
        info!(comment_id = created.id, "Comment published");
        Ok(created.into())
    }

    async fn fetch_comments(&self, post_id: u64) -> Result<Vec<Comment>> {
        let response = self
            .http
            .get(format!("{}/comments", self.base_url))
            .query(&[("post", post_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, body));
        }

        let bytes = response.bytes().await?;
        let comments: Vec<ExternalComment> = serde_json::from_slice(&bytes)?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }
}
