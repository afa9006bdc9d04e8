//! Command-line front end for Pharma News.
//!
//! Usage:
//! ```bash
//! pharma-news posts --per-page 6         # List the latest posts
//! pharma-news post my-slug               # Show one post
//! pharma-news search aspirin             # Search posts
//! pharma-news categories                 # List categories
//! pharma-news comments 42                # List comments on a post
//! pharma-news comment 42 "Great read"    # Publish a comment
//! pharma-news login                      # Print the WordPress.com login URL
//! pharma-news callback <url-or-code>     # Finish login
//! pharma-news whoami                     # Show the logged-in user
//! pharma-news logout                     # Forget stored tokens
//! pharma-news proxy                      # Serve the token exchange endpoints
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pharma_news::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "pharma-news", author, version, about)]
struct Cli {
    /// Path to a `pharma-news.toml` config file. Searched for when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List posts
    Posts(commands::posts::PostsArgs),

    /// Show a single post by slug or id
    Post(commands::posts::PostArgs),

    /// Search posts, newest first
    Search(commands::posts::SearchArgs),

    /// List categories
    Categories(commands::posts::CategoriesArgs),

    /// List the comments on a post
    Comments(commands::comments::CommentsArgs),

    /// Publish a comment as the logged-in user
    Comment(commands::comments::CommentArgs),

    /// Print the URL that starts a WordPress.com login
    Login,

    /// Finish a login with the redirect URL or authorization code
    Callback(commands::session::CallbackArgs),

    /// Show the logged-in user
    Whoami,

    /// Forget the stored tokens
    Logout,

    /// Serve the token exchange endpoints
    Proxy(commands::proxy::ProxyArgs),
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("info".parse().context("failed to parse log directive")?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = path {
        Config::load(path).with_context(|| format!("failed to load {}", path.display()))?
    } else {
        let (config, found) = Config::resolve().context("failed to resolve config")?;
        match found {
            Some(path) => debug!(path = %path.display(), "Loaded config"),
            None => debug!("No config file found, using defaults"),
        }
        config
    };
    Ok(config.with_env())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Posts(args) => commands::posts::list(args, &config).await,
        Command::Post(args) => commands::posts::show(args, &config).await,
        Command::Search(args) => commands::posts::search(args, &config).await,
        Command::Categories(args) => commands::posts::categories(args, &config).await,
        Command::Comments(args) => commands::comments::list(args, &config).await,
        Command::Comment(args) => commands::comments::create(args, &config).await,
        Command::Login => commands::session::login(&config),
        Command::Callback(args) => commands::session::callback(args, &config).await,
        Command::Whoami => commands::session::whoami(&config).await,
        Command::Logout => commands::session::logout(&config),
        Command::Proxy(args) => commands::proxy::run(args, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(argv: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(argv.iter().copied())
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let err = parse(&["pharma-news"]).expect_err("expected clap parse error");
        assert!(
            matches!(
                err.kind(),
                ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand | ErrorKind::MissingSubcommand
            ),
            "unexpected error kind: {:?}",
            err.kind()
        );
    }

    #[test]
    fn test_cli_rejects_unknown_subcommand() {
        let err = parse(&["pharma-news", "publish"]).expect_err("expected clap parse error");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() -> Result<(), clap::Error> {
        let cli = parse(&["pharma-news", "whoami", "--config", "site.toml", "--log-json"])?;

        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(cli.log_json);
        assert!(matches!(cli.command, Command::Whoami));
        Ok(())
    }

    #[test]
    fn test_cli_posts_parses_filters() -> Result<(), clap::Error> {
        let cli = parse(&[
            "pharma-news",
            "posts",
            "--page",
            "2",
            "--per-page",
            "6",
            "--category",
            "3",
            "--category",
            "5",
            "--orderby",
            "title",
            "--order",
            "asc",
        ])?;

        let Command::Posts(args) = cli.command else {
            panic!("expected Command::Posts");
        };
        let query = args.to_query();

        assert_eq!(query.page, Some(2));
        assert_eq!(query.per_page, Some(6));
        assert_eq!(query.categories, Some(vec![3, 5]));
        assert_eq!(query.orderby, Some(pharma_news::OrderBy::Title));
        assert_eq!(query.order, Some(pharma_news::Order::Asc));
        assert_eq!(query.tags, None);
        Ok(())
    }

    #[test]
    fn test_cli_post_requires_slug_or_id() {
        let err = parse(&["pharma-news", "post"]).expect_err("expected clap parse error");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = parse(&["pharma-news", "post", "a-slug", "--id", "4"])
            .expect_err("expected clap parse error");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_comment_requires_content() {
        let err = parse(&["pharma-news", "comment", "42"]).expect_err("expected clap parse error");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_proxy_listen_is_optional() -> Result<(), clap::Error> {
        let cli = parse(&["pharma-news", "proxy"])?;

        let Command::Proxy(args) = cli.command else {
            panic!("expected Command::Proxy");
        };
        assert!(args.listen.is_none());
        Ok(())
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("site.toml");
        std::fs::write(&path, "[content]\nbase_url = \"http://localhost:9000\"\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.content.base_url, "http://localhost:9000");
    }
}
