//! Post, search and category listings.

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use console::style;
use pharma_news::{
    Category, Config, ContentClient, Order, OrderBy, Post, PostFeed, PostQuery, QueryOptions,
    QueryPhase, QueryState, transform::strip_html,
};

/// Field to sort posts by.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortField {
    Date,
    Modified,
    Title,
    Author,
}

impl From<SortField> for OrderBy {
    fn from(value: SortField) -> Self {
        match value {
            SortField::Date => Self::Date,
            SortField::Modified => Self::Modified,
            SortField::Title => Self::Title,
            SortField::Author => Self::Author,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl From<SortOrder> for Order {
    fn from(value: SortOrder) -> Self {
        match value {
            SortOrder::Asc => Self::Asc,
            SortOrder::Desc => Self::Desc,
        }
    }
}

#[derive(Debug, Args)]
pub struct PostsArgs {
    /// Page to start from (1-based).
    #[arg(long)]
    pub page: Option<u32>,

    /// Posts per page.
    #[arg(long)]
    pub per_page: Option<u32>,

    /// Number of pages to load, each appended after the previous one.
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    /// Only posts in this category id. Repeatable.
    #[arg(long = "category")]
    pub categories: Vec<u64>,

    /// Only posts with this tag id. Repeatable.
    #[arg(long = "tag")]
    pub tags: Vec<u64>,

    /// Only posts by this author id.
    #[arg(long)]
    pub author: Option<u64>,

    #[arg(long, value_enum)]
    pub orderby: Option<SortField>,

    #[arg(long, value_enum)]
    pub order: Option<SortOrder>,

    /// Output format: "table" or "json".
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl PostsArgs {
    pub fn to_query(&self) -> PostQuery {
        PostQuery {
            page: self.page,
            per_page: self.per_page,
            search: None,
            categories: (!self.categories.is_empty()).then(|| self.categories.clone()),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            author: self.author,
            orderby: self.orderby.map(OrderBy::from),
            order: self.order.map(Order::from),
        }
    }
}

#[derive(Debug, Args)]
pub struct PostArgs {
    /// Slug of the post.
    #[arg(required_unless_present = "id")]
    pub slug: Option<String>,

    /// Numeric id of the post.
    #[arg(long, conflicts_with = "slug")]
    pub id: Option<u64>,

    /// Output format: "text" or "json".
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search terms.
    pub terms: String,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 10)]
    pub per_page: u32,

    /// Output format: "table" or "json".
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

#[derive(Debug, Args)]
pub struct CategoriesArgs {
    /// Output format: "table" or "json".
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

fn content_client(config: &Config) -> Result<Arc<ContentClient>> {
    Ok(Arc::new(ContentClient::from_config(&config.content)?))
}

/// Warns when the listing came from placeholder data after an access denial.
fn report_availability(client: &ContentClient) {
    if !client.is_available() {
        eprintln!(
            "{} The content API refused access; showing sample content",
            style("!").yellow().bold()
        );
    }
}

/// Lists posts through a [`PostFeed`], loading `--pages` pages.
pub async fn list(args: &PostsArgs, config: &Config) -> Result<()> {
    let client = content_client(config)?;
    let query = args.to_query();
    let first_page = query.page.unwrap_or(1);
    let feed = PostFeed::new(Arc::clone(&client), QueryOptions::with_params(query));

    feed.mount().await;
    for next in 1..args.pages {
        if feed.state().phase == QueryPhase::Failed {
            break;
        }
        let more = PostQuery {
            page: Some(first_page + next),
            ..PostQuery::default()
        };
        feed.fetch(more, true).await;
    }
    feed.unmount();

    let state = feed.state();
    report_availability(&client);
    print_state(&state, &args.format)
}

pub async fn search(args: &SearchArgs, config: &Config) -> Result<()> {
    let client = content_client(config)?;
    let feed = PostFeed::new(Arc::clone(&client), QueryOptions::default().manual());

    feed.search(&args.terms, args.page, args.per_page).await;
    feed.unmount();

    let state = feed.state();
    report_availability(&client);
    print_state(&state, &args.format)
}

pub async fn show(args: &PostArgs, config: &Config) -> Result<()> {
    let client = content_client(config)?;

    let post = match (&args.slug, args.id) {
        (_, Some(id)) => client.get_post_by_id(id).await,
        (Some(slug), None) => client.get_post_by_slug(slug).await,
        (None, None) => bail!("a slug or --id is required"),
    };
    report_availability(&client);

    let Some(post) = post else {
        bail!("post not found");
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        print_post(&post);
    }
    Ok(())
}

pub async fn categories(args: &CategoriesArgs, config: &Config) -> Result<()> {
    let client = content_client(config)?;
    let categories = client.list_categories().await;
    report_availability(&client);

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        print_categories(&categories);
    }
    Ok(())
}

fn print_state(state: &QueryState, format: &str) -> Result<()> {
    if let Some(error) = &state.error {
        bail!("failed to load posts: {error}");
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    if state.posts.is_empty() {
        println!("{} No posts found", style("✗").yellow());
        return Ok(());
    }

    println!(
        "{:<8} {:<44} {:<18} {:<14} {}",
        style("ID").bold(),
        style("TITLE").bold(),
        style("AUTHOR").bold(),
        style("DATE").bold(),
        style("READ").bold()
    );
    for post in &state.posts {
        println!(
            "{:<8} {:<44} {:<18} {:<14} {}",
            post.id,
            truncate(&strip_html(&post.title), 44),
            truncate(&post.author, 18),
            post.date,
            post.read_time
        );
    }
    println!(
        "\n{} {} of {} post(s), {} page(s)",
        style("✓").green().bold(),
        state.posts.len(),
        state.total,
        state.total_pages
    );
    Ok(())
}

fn print_post(post: &Post) {
    println!("{}", style(strip_html(&post.title)).bold());
    println!(
        "{} · {} · {}",
        style(&post.author).cyan(),
        post.date,
        post.read_time
    );
    println!("{}\n", style(&post.link).dim());
    println!("{}", strip_html(&post.content));
}

fn print_categories(categories: &[Category]) {
    println!(
        "{:<8} {:<30} {}",
        style("ID").bold(),
        style("NAME").bold(),
        style("SLUG").bold()
    );
    for category in categories {
        println!(
            "{:<8} {:<30} {}",
            category.id,
            truncate(&category.name, 30),
            category.slug
        );
    }
}

/// Cuts `text` to `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
    const ELLIPSIS: &str = "...";

    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_none() {
        return head;
    }
    let prefix: String = head.chars().take(max.saturating_sub(ELLIPSIS.len())).collect();
    format!("{prefix}{ELLIPSIS}")
}
