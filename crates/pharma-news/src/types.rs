//! Wire schemas for the WordPress REST API and the view-models derived from
//! them.

use serde::{Deserialize, Serialize};

// =============================================================================
// Wire schemas
// =============================================================================

/// A `{ "rendered": "..." }` field as returned by the WordPress REST API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

/// A post record exactly as the content API returns it.
///
/// Only the fields the view-model needs are decoded; everything else is
/// ignored. `id`, `slug`, `author` and `date` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalPost {
    pub id: u64,
    pub date: String,
    pub slug: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub content: Rendered,
    pub author: u64,
    #[serde(default)]
    pub jetpack_featured_media_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
}

/// A user record from `GET /users/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExternalAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A category record from `GET /categories`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExternalCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

// =============================================================================
// View-models
// =============================================================================

/// A post as presented to the UI.
///
/// Serialized with camelCase keys so front ends written against the JSON
/// shape keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: u64,
    /// Rendered HTML title, kept verbatim.
    pub title: String,
    /// Plain-text excerpt cut to 150 characters plus `...`.
    pub subtitle: String,
    /// Rendered HTML excerpt, kept verbatim.
    pub excerpt: String,
    /// Rendered HTML body, kept verbatim.
    pub content: String,
    pub image: String,
    pub author: String,
    pub date: String,
    pub read_time: String,
    pub views: u32,
    pub likes: u32,
    pub is_liked: bool,
    pub slug: String,
    pub link: String,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
}

/// One page of posts plus pagination counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub posts: Vec<Post>,
    pub total: u64,
    pub total_pages: u64,
}

/// A post category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

impl From<ExternalCategory> for Category {
    fn from(value: ExternalCategory) -> Self {
        Self {
            id: value.id,
            name: value.name,
            slug: value.slug,
        }
    }
}

// =============================================================================
// Query parameters
// =============================================================================

/// Field used to order a post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    Date,
    Modified,
    Title,
    Author,
}

impl OrderBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Modified => "modified",
            Self::Title => "title",
            Self::Author => "author",
        }
    }
}

/// Sort direction of a post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Parameters of a post listing. Every field is optional; absent fields are
/// not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

impl PostQuery {
    /// Overlays `self` on top of `base`: fields set here win, the rest fall
    /// back to `base`.
    #[must_use]
    pub fn merged_over(&self, base: &PostQuery) -> PostQuery {
        PostQuery {
            page: self.page.or(base.page),
            per_page: self.per_page.or(base.per_page),
            search: self.search.clone().or_else(|| base.search.clone()),
            categories: self.categories.clone().or_else(|| base.categories.clone()),
            tags: self.tags.clone().or_else(|| base.tags.clone()),
            author: self.author.or(base.author),
            orderby: self.orderby.or(base.orderby),
            order: self.order.or(base.order),
        }
    }

    /// Builds the outgoing query string pairs.
    ///
    /// Zero numerics, empty strings and empty lists count as absent.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page.filter(|p| *p > 0) {
            pairs.push(("per_page", per_page.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(categories) = self.categories.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("categories", join_ids(categories)));
        }
        if let Some(tags) = self.tags.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("tags", join_ids(tags)));
        }
        if let Some(author) = self.author.filter(|a| *a > 0) {
            pairs.push(("author", author.to_string()));
        }
        if let Some(orderby) = self.orderby {
            pairs.push(("orderby", orderby.as_str().to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.as_str().to_string()));
        }
        pairs
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
