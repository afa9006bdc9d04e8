//! WordPress.com login, logout and profile commands.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;
use pharma_news::{AuthSession, Config, FileTokenStore};
use reqwest::Url;

#[derive(Debug, Args)]
pub struct CallbackArgs {
    /// The full redirect URL the browser landed on, or just the `code`.
    pub redirect: String,
}

/// Opens the session backed by the configured token file.
pub fn open_session(config: &Config) -> Result<AuthSession> {
    let store = FileTokenStore::new(config.auth.token_store_path());
    AuthSession::new(config.auth.clone(), Arc::new(store)).context("failed to create session")
}

pub fn login(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    let url = session.login_url()?;

    println!("{} Open this URL to log in with WordPress.com:\n", style("→").cyan());
    println!("  {url}\n");
    println!(
        "Then run {} with the URL you are redirected to.",
        style("pharma-news callback <url>").bold()
    );
    Ok(())
}

pub async fn callback(args: &CallbackArgs, config: &Config) -> Result<()> {
    let code = authorization_code(&args.redirect)?;
    let session = open_session(config)?;

    let user = session.complete_login(&code).await?;
    println!(
        "{} Logged in as {} ({})",
        style("✓").green().bold(),
        style(&user.display_name).bold(),
        user.username
    );
    Ok(())
}

pub async fn whoami(config: &Config) -> Result<()> {
    let session = open_session(config)?;

    if !session.restore().await? {
        println!("{} Not logged in", style("✗").yellow());
        return Ok(());
    }
    let Some(user) = session.user_info() else {
        bail!("session restored without a profile");
    };

    println!("{}", style(&user.display_name).bold());
    println!("  username: {}", user.username);
    if let Some(email) = &user.email {
        println!("  email:    {email}");
    }
    if !user.avatar_url.is_empty() {
        println!("  avatar:   {}", user.avatar_url);
    }
    Ok(())
}

pub fn logout(config: &Config) -> Result<()> {
    open_session(config)?.logout()?;
    println!("{} Logged out", style("✓").green().bold());
    Ok(())
}

/// Pulls the authorization code out of a redirect URL, reporting the
/// provider's error when the redirect carries one. Anything that is not a
/// URL is taken to be the code itself.
fn authorization_code(redirect: &str) -> Result<String> {
    let redirect = redirect.trim();
    let Ok(url) = Url::parse(redirect) else {
        if redirect.is_empty() {
            bail!("No authorization code");
        }
        return Ok(redirect.to_string());
    };

    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if error.is_some() || description.is_some() {
        let reason = description
            .or(error)
            .unwrap_or_else(|| "Unknown error".to_string());
        bail!("Login error: {reason}");
    }
    code.filter(|c| !c.is_empty())
        .context("No authorization code in redirect URL")
}
