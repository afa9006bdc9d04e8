//! Derivation of the [`Post`] view-model from an [`ExternalPost`].
//!
//! Every derived field is a pure function of the source record except
//! `views` and `likes`, which are rolled at random on each call.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rand::Rng;
use regex::Regex;

use crate::types::{ExternalPost, Post};

/// Image used when a post has no featured media.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1549298916-b41d501d3772?w=800&h=600&fit=crop";

/// Title used when the rendered title is empty.
pub const UNTITLED: &str = "Untitled Post";

/// Date text used when the publish timestamp cannot be parsed.
pub const UNKNOWN_DATE: &str = "Unknown Date";

const SUBTITLE_CHARS: usize = 150;
const ELLIPSIS: &str = "...";
const WORDS_PER_MINUTE: usize = 200;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("invalid HTML tag pattern"));

/// Removes every `<...>` tag and trims surrounding whitespace.
///
/// Entities are left untouched.
pub fn strip_html(html: &str) -> String {
    HTML_TAG.replace_all(html, "").trim().to_string()
}

/// Plain-text subtitle: the first 150 characters of the stripped excerpt
/// followed by `...`. The cut ignores word boundaries.
pub fn subtitle(excerpt_html: &str) -> String {
    let mut text: String = strip_html(excerpt_html)
        .chars()
        .take(SUBTITLE_CHARS)
        .collect();
    text.push_str(ELLIPSIS);
    text
}

/// Estimated reading time at 200 words per minute, rounded up.
///
/// An empty body still counts as one word.
pub fn read_time(content_html: &str) -> String {
    let words = strip_html(content_html).split_whitespace().count().max(1);
    format!("{} min read", words.div_ceil(WORDS_PER_MINUTE))
}

/// Formats a publish timestamp as `Jan 5, 2024`.
///
/// Accepts RFC 3339 timestamps, the offset-less `YYYY-MM-DDTHH:MM:SS` form
/// WordPress uses for `date`, and bare dates.
pub fn format_date(raw: &str) -> String {
    const FORMAT: &str = "%b %-d, %Y";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(FORMAT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format(FORMAT).to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format(FORMAT).to_string();
    }
    UNKNOWN_DATE.to_string()
}

/// Random view count in `[100, max_exclusive)`.
pub(crate) fn roll_views(max_exclusive: u32) -> u32 {
    rand::thread_rng().gen_range(100..max_exclusive)
}

/// Random like count in `[1, 51)`.
pub(crate) fn roll_likes() -> u32 {
    rand::thread_rng().gen_range(1..51)
}

/// Builds the view-model for `post`, using `author` as the resolved display
/// name.
pub fn to_post(post: ExternalPost, author: String) -> Post {
    let title = if post.title.rendered.is_empty() {
        UNTITLED.to_string()
    } else {
        post.title.rendered
    };
    let image = post
        .jetpack_featured_media_url
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());

    Post {
        id: post.id,
        title,
        subtitle: subtitle(&post.excerpt.rendered),
        read_time: read_time(&post.content.rendered),
        date: format_date(&post.date),
        excerpt: post.excerpt.rendered,
        content: post.content.rendered,
        image,
        author,
        views: roll_views(2100),
        likes: roll_likes(),
        is_liked: false,
        slug: post.slug,
        link: post.link,
        categories: post.categories,
        tags: post.tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rendered;

    fn external(id: u64, slug: &str) -> ExternalPost {
        ExternalPost {
            id,
            date: "2024-01-05T09:15:00".to_string(),
            slug: slug.to_string(),
            link: format!("https://example.com/{slug}"),
            title: Rendered {
                rendered: "<em>Aspirin</em> &amp; you".to_string(),
            },
            excerpt: Rendered {
                rendered: "<p>Short excerpt</p>".to_string(),
            },
            content: Rendered {
                rendered: "<p>one two three</p>".to_string(),
            },
            author: 3,
            jetpack_featured_media_url: None,
            categories: vec![1, 2],
            tags: vec![],
        }
    }

    #[test]
    fn test_to_post_propagates_identity_fields() {
        for (id, slug) in [(1, "a"), (42, "drug-trials-2024"), (u64::MAX, "x-y-z")] {
            let post = to_post(external(id, slug), "Jane".to_string());
            assert_eq!(post.id, id);
            assert_eq!(post.slug, slug);
        }
    }

    #[test]
    fn test_to_post_keeps_title_and_content_html_verbatim() {
        let post = to_post(external(1, "a"), "Jane".to_string());

        assert_eq!(post.title, "<em>Aspirin</em> &amp; you");
        assert_eq!(post.content, "<p>one two three</p>");
        assert_eq!(post.excerpt, "<p>Short excerpt</p>");
        assert_eq!(post.subtitle, "Short excerpt...");
        assert_eq!(post.author, "Jane");
        assert_eq!(post.date, "Jan 5, 2024");
        assert_eq!(post.read_time, "1 min read");
        assert_eq!(post.categories, vec![1, 2]);
        assert!(!post.is_liked);
    }

    #[test]
    fn test_to_post_falls_back_for_missing_title_and_image() {
        let mut source = external(1, "a");
        source.title.rendered = String::new();
        source.jetpack_featured_media_url = Some(String::new());

        let post = to_post(source, "Admin".to_string());
        assert_eq!(post.title, UNTITLED);
        assert_eq!(post.image, PLACEHOLDER_IMAGE_URL);
    }

    #[test]
    fn test_to_post_uses_featured_media_when_present() {
        let mut source = external(1, "a");
        source.jetpack_featured_media_url = Some("https://cdn.example.com/a.jpg".to_string());

        let post = to_post(source, "Admin".to_string());
        assert_eq!(post.image, "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn test_views_and_likes_stay_in_range() {
        for _ in 0..200 {
            let post = to_post(external(1, "a"), "Admin".to_string());
            assert!((100..2100).contains(&post.views));
            assert!((1..51).contains(&post.likes));
        }
    }

    #[test]
    fn test_strip_html_is_idempotent() {
        for input in [
            "<p>Hello <b>world</b></p>",
            "  plain text  ",
            "a < b and c > d",
            "",
        ] {
            let once = strip_html(input);
            assert_eq!(strip_html(&once), once);
        }
    }

    #[test]
    fn test_subtitle_cuts_mid_word_at_150_chars() {
        let excerpt = format!("<p>{}</p>", "abcdefghij".repeat(20));
        let result = subtitle(&excerpt);

        assert_eq!(result.chars().count(), 153);
        assert!(result.len() <= 154);
        assert!(result.ends_with("abcdefghij..."));
    }

    #[test]
    fn test_subtitle_counts_characters_not_bytes() {
        let excerpt = "é".repeat(200);
        let result = subtitle(&excerpt);

        assert_eq!(result.chars().count(), 153);
        assert!(result.starts_with("éé"));
    }

    #[test]
    fn test_read_time_rounds_up() {
        let two_hundred_one = ["word"; 201].join(" ");
        assert_eq!(read_time(&two_hundred_one), "2 min read");
        assert_eq!(read_time(&["word"; 200].join(" ")), "1 min read");
        assert_eq!(read_time(""), "1 min read");
        assert_eq!(read_time("<p></p>"), "1 min read");
    }

    #[test]
    fn test_format_date_accepts_wordpress_and_rfc3339_forms() {
        assert_eq!(format_date("2023-11-30T23:59:59"), "Nov 30, 2023");
        assert_eq!(format_date("2023-11-30T10:00:00+07:00"), "Nov 30, 2023");
        assert_eq!(format_date("2023-07-04"), "Jul 4, 2023");
    }

    #[test]
    fn test_format_date_falls_back_on_garbage() {
        assert_eq!(format_date("not a date"), UNKNOWN_DATE);
        assert_eq!(format_date(""), UNKNOWN_DATE);
    }
}
