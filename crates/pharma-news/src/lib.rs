//! Content layer of the Pharma News blog.
//!
//! Posts are sourced from a hosted WordPress.com site through its public REST
//! API and normalized into UI-ready view models. Visitors can log in with a
//! WordPress.com account to leave comments.
//!
//! # Key Components
//!
//! - **Content**: [`ContentClient`] lists, searches and fetches posts and
//!   categories, resolving author names through a shared [`AuthorCache`]. It
//!   never fails a listing: when the API is down or refuses access it serves
//!   placeholder content instead.
//! - **Post queries**: [`PostFeed`] keeps loading, error and pagination state
//!   over any [`PostSource`], de-duplicating identical requests and dropping
//!   stale responses.
//! - **Sessions**: [`AuthSession`] drives the OAuth login and persists tokens
//!   through a [`TokenStore`].
//! - **Comments**: [`CommentClient`] lists and publishes comments.
//! - **Token exchange**: [`TokenExchange`] is the server half of login,
//!   holding the client secret.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pharma_news::{ContentClient, PostFeed, PostQuery, QueryOptions};
//!
//! # async fn example() -> pharma_news::Result<()> {
//! let client = Arc::new(ContentClient::new(pharma_news::config::DEFAULT_CONTENT_BASE_URL)?);
//! let feed = PostFeed::new(client, QueryOptions::with_params(PostQuery {
//!     per_page: Some(6),
//!     ..PostQuery::default()
//! }));
//!
//! feed.mount().await;
//! for post in feed.state().posts {
//!     println!("{} ({})", post.title, post.read_time);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
mod fallback;
mod types;

pub mod auth;
pub mod client;
pub mod comments;
pub mod config;
pub mod query;
pub mod token;
pub mod transform;

pub use auth::{AuthSession, FileTokenStore, InMemoryTokenStore, TokenStore, UserInfo};
pub use cache::AuthorCache;
pub use client::{Availability, ContentClient};
pub use comments::{Comment, CommentClient};
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use fallback::{placeholder_categories, placeholder_page, placeholder_posts};
pub use query::{PostFeed, PostSource, QueryOptions, QueryPhase, QueryState};
pub use token::{Credentials, TokenError, TokenExchange, TokenResponse};
pub use types::{Category, ExternalPost, Order, OrderBy, Page, Post, PostQuery, Rendered};
