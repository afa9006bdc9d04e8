//! Comment listing and publishing.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use pharma_news::{Comment, CommentClient, Config};
use tracing::info;

use super::session::open_session;

#[derive(Debug, Args)]
pub struct CommentsArgs {
    /// Id of the post.
    pub post_id: u64,

    /// Output format: "table" or "json".
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

#[derive(Debug, Args)]
pub struct CommentArgs {
    /// Id of the post to comment on.
    pub post_id: u64,

    /// Comment text.
    pub content: String,
}

pub async fn list(args: &CommentsArgs, config: &Config) -> Result<()> {
    let client = CommentClient::new(&config.content.base_url)?;
    let comments = client.list_comments(args.post_id).await;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&comments)?);
        return Ok(());
    }

    if comments.is_empty() {
        println!("{} No comments yet", style("✗").yellow());
        return Ok(());
    }
    for comment in &comments {
        print_comment(comment);
    }
    Ok(())
}

/// Publishes a comment, refreshing the access token once if it was
/// rejected.
pub async fn create(args: &CommentArgs, config: &Config) -> Result<()> {
    let session = open_session(config)?;
    let client = CommentClient::new(&config.content.base_url)?;

    let token = session
        .access_token()?
        .context("not logged in, run `pharma-news login` first")?;

    let comment = match client.create_comment(&token, args.post_id, &args.content).await {
        Err(e) if e.is_access_denied() => {
            info!("Access token rejected, refreshing");
            session.refresh().await.context("failed to refresh login")?;
            let token = session
                .access_token()?
                .context("refresh did not store a token")?;
            client
                .create_comment(&token, args.post_id, &args.content)
                .await?
        }
        other => other?,
    };

    println!("{} Comment published", style("✓").green().bold());
    print_comment(&comment);
    Ok(())
}

fn print_comment(comment: &Comment) {
    println!(
        "{} {}",
        style(&comment.author).cyan().bold(),
        style(&comment.date).dim()
    );
    println!("  {}\n", comment.content);
}
