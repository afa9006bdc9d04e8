//! WordPress REST API content client.
//!
//! Listing operations never fail: when the API is unreachable or refuses
//! access they return placeholder content so pages can always render. A 401
//! or 403 from any endpoint additionally latches the client into
//! [`Availability::Degraded`] for the rest of its lifetime.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use reqwest::{
    Client, Response,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, error, instrument, warn};

use crate::{
    cache::AuthorCache,
    config::ContentConfig,
    error::{Error, Result},
    fallback::{placeholder_categories, placeholder_page},
    transform::to_post,
    types::{
        Category, ExternalAuthor, ExternalCategory, ExternalPost, Order, OrderBy, Page, Post,
        PostQuery,
    },
};

/// Author name used when the author lookup fails.
pub const FALLBACK_AUTHOR: &str = "Admin";

/// Author name used when the user record carries no name at all.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

const TOTAL_HEADER: &str = "X-WP-Total";
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Whether the content API is still considered reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// A 401/403 was observed. Never reverts.
    Degraded,
}

/// Client for the site's content API.
///
/// Owns the sticky availability flag and a shared [`AuthorCache`].
#[derive(Debug)]
pub struct ContentClient {
    http: Client,
    base_url: String,
    authors: Arc<AuthorCache>,
    degraded: AtomicBool,
}

impl ContentClient {
    /// Creates a client for the API rooted at `base_url`, with a fresh author
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::build(base_url.into(), None)
    }

    /// Creates a client from the `[content]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ContentConfig) -> Result<Self> {
        Self::build(config.base_url.clone(), config.timeout())
    }

    fn build(base_url: String, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            authors: Arc::new(AuthorCache::new()),
            degraded: AtomicBool::new(false),
        })
    }

    /// Replaces the author cache, typically with one shared by other clients.
    #[must_use]
    pub fn with_author_cache(mut self, authors: Arc<AuthorCache>) -> Self {
        self.authors = authors;
        self
    }

    /// Author cache used to resolve post bylines.
    pub fn author_cache(&self) -> &Arc<AuthorCache> {
        &self.authors
    }

    /// API base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current availability flag. Latches to `Degraded` on the first 401/403.
    pub fn availability(&self) -> Availability {
        if self.degraded.load(Ordering::Acquire) {
            Availability::Degraded
        } else {
            Availability::Available
        }
    }

    /// `false` once any request has been refused with 401/403.
    pub fn is_available(&self) -> bool {
        self.availability() == Availability::Available
    }

    // -------------------------------------------------------------------------
    // Posts
    // -------------------------------------------------------------------------

    /// Lists posts matching `query`, or placeholder posts if the API fails.
    #[instrument(skip(self))]
    pub async fn list_posts(&self, query: &PostQuery) -> Page {
        match self.fetch_posts(query).await {
            Ok(page) => page,
            Err(e) if e.is_access_denied() => {
                warn!(error = %e, "API access denied, serving placeholder posts");
                placeholder_page(query.per_page)
            }
            Err(e) => {
                error!(error = %e, "Error fetching posts, serving placeholder posts");
                placeholder_page(query.per_page)
            }
        }
    }

    /// Searches posts, newest first.
    pub async fn search_posts(&self, search: &str, page: u32, per_page: u32) -> Page {
        let query = PostQuery {
            search: Some(search.to_string()),
            page: Some(page),
            per_page: Some(per_page),
            orderby: Some(OrderBy::Date),
            order: Some(Order::Desc),
            ..PostQuery::default()
        };
        self.list_posts(&query).await
    }

    /// Fetches one post by id. `None` when it does not exist, access is
    /// denied, or the request fails.
    #[instrument(skip(self))]
    pub async fn get_post_by_id(&self, id: u64) -> Option<Post> {
        match self.fetch_post_by_id(id).await {
            Ok(post) => Some(post),
            Err(Error::NotFound) => None,
            Err(e) if e.is_access_denied() => {
                warn!(error = %e, "API access denied for single post");
                None
            }
            Err(e) => {
                error!(error = %e, "Error fetching post by id");
                None
            }
        }
    }

    /// Fetches one post by slug. `None` when no post matches, access is
    /// denied, or the request fails.
    #[instrument(skip(self))]
    pub async fn get_post_by_slug(&self, slug: &str) -> Option<Post> {
        match self.fetch_post_by_slug(slug).await {
            Ok(post) => post,
            Err(e) if e.is_access_denied() => {
                warn!(error = %e, "API access denied for post by slug");
                None
            }
            Err(e) => {
                error!(error = %e, "Error fetching post by slug");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    /// Lists categories, or the fixed placeholder list if the API fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Vec<Category> {
        match self.fetch_categories().await {
            Ok(categories) => categories,
            Err(e) if e.is_access_denied() => {
                warn!(error = %e, "API access denied for categories");
                placeholder_categories()
            }
            Err(e) => {
                error!(error = %e, "Error fetching categories");
                placeholder_categories()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Fallible internals
    // -------------------------------------------------------------------------

    async fn fetch_posts(&self, query: &PostQuery) -> Result<Page> {
        let response = self.get("posts", &query.to_query_pairs()).await?;

        let total = header_count(&response, TOTAL_HEADER);
        let total_pages = header_count(&response, TOTAL_PAGES_HEADER);
        let records: Vec<JsonValue> = decode(response).await?;

        let mut posts = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<ExternalPost>(record) {
                Ok(external) => posts.push(self.transform(external).await),
                Err(e) => warn!(error = %e, "Skipping post that failed to decode"),
            }
        }

        Ok(Page {
            total: total.unwrap_or(posts.len() as u64),
            total_pages: total_pages.unwrap_or(1),
            posts,
        })
    }

    async fn fetch_post_by_id(&self, id: u64) -> Result<Post> {
        let response = self.get(&format!("posts/{id}"), &[]).await?;
        let external: ExternalPost = decode(response).await?;
        Ok(self.transform(external).await)
    }

    async fn fetch_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let response = self.get("posts", &[("slug", slug.to_string())]).await?;
        let records: Vec<JsonValue> = decode(response).await?;

        let Some(first) = records.into_iter().next() else {
            return Ok(None);
        };
        let external: ExternalPost = serde_json::from_value(first)?;
        Ok(Some(self.transform(external).await))
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>> {
        let response = self.get("categories", &[]).await?;
        let categories: Vec<ExternalCategory> = decode(response).await?;
        Ok(categories.into_iter().map(Category::from).collect())
    }

    async fn transform(&self, external: ExternalPost) -> Post {
        let author = self.author_name(external.author).await;
        to_post(external, author)
    }

    /// Resolves an author's display name through the cache. Failed lookups
    /// cache [`FALLBACK_AUTHOR`].
    async fn author_name(&self, author_id: u64) -> String {
        if let Some(name) = self.authors.get(author_id) {
            return name;
        }

        let name = match self.fetch_author(author_id).await {
            Ok(name) => name,
            Err(e) => {
                debug!(author_id, error = %e, "Author lookup failed, using fallback name");
                FALLBACK_AUTHOR.to_string()
            }
        };
        self.authors.insert(author_id, name.clone());
        name
    }

    async fn fetch_author(&self, author_id: u64) -> Result<String> {
        let response = self.get(&format!("users/{author_id}"), &[]).await?;
        let author: ExternalAuthor = decode(response).await?;

        Ok(author
            .name
            .filter(|n| !n.is_empty())
            .or(author.display_name.filter(|n| !n.is_empty()))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()))
    }

    /// Sends a GET and maps non-success statuses to errors, latching the
    /// availability flag on 401/403.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}/{path}", self.base_url);
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        let err = Error::from_status(status, body);
        if err.is_access_denied() {
            self.degraded.store(true, Ordering::Release);
        }
        Err(err)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn header_count(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
