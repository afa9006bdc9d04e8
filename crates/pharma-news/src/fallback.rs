//! Placeholder content served while the content API is unreachable.

use chrono::Local;

use crate::{
    transform::{format_date, roll_likes, roll_views},
    types::{Category, Page, Post},
};

/// Largest number of synthetic posts in a placeholder page.
pub const MAX_PLACEHOLDER_POSTS: u32 = 6;

pub const PLACEHOLDER_POST_IMAGE_URL: &str =
    "https://png.pngtree.com/thumb_back/fh260/background/20240403/pngtree-assorted-pharmaceutical-medicine-pills-tablets-and-capsules-over-blue-background-image_15647957.jpg";

const PLACEHOLDER_SUBTITLE: &str =
    "This is a sample blog post subtitle that demonstrates the layout and structure.";

/// Synthetic posts for a listing that asked for `per_page` results.
///
/// A missing or zero `per_page` counts as the maximum of six.
pub fn placeholder_posts(per_page: Option<u32>) -> Vec<Post> {
    let count = per_page
        .filter(|n| *n > 0)
        .unwrap_or(MAX_PLACEHOLDER_POSTS)
        .min(MAX_PLACEHOLDER_POSTS);
    let today = format_date(&Local::now().to_rfc3339());

    (1..=u64::from(count))
        .map(|n| Post {
            id: n,
            title: format!("Sample Blog Post {n}"),
            subtitle: PLACEHOLDER_SUBTITLE.to_string(),
            excerpt: PLACEHOLDER_SUBTITLE.to_string(),
            content: "<p>This is sample content for the blog post.</p>".to_string(),
            image: PLACEHOLDER_POST_IMAGE_URL.to_string(),
            author: "Admin".to_string(),
            date: today.clone(),
            read_time: "3 min read".to_string(),
            views: roll_views(1100),
            likes: roll_likes(),
            is_liked: false,
            slug: format!("sample-post-{n}"),
            link: "#".to_string(),
            categories: Vec::new(),
            tags: Vec::new(),
        })
        .collect()
}

/// A single-page envelope around [`placeholder_posts`].
pub fn placeholder_page(per_page: Option<u32>) -> Page {
    let posts = placeholder_posts(per_page);
    Page {
        total: posts.len() as u64,
        total_pages: 1,
        posts,
    }
}

/// The fixed category list served when categories cannot be fetched.
pub fn placeholder_categories() -> Vec<Category> {
    [
        (1, "Technology", "technology"),
        (2, "Health", "health"),
        (3, "Science", "science"),
        (4, "News", "news"),
    ]
    .into_iter()
    .map(|(id, name, slug)| Category {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
    })
    .collect()
}
