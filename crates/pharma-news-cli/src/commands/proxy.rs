//! Token exchange proxy server.
//!
//! Serves `POST /api/get-token` and `POST /api/refresh-token`, forwarding to
//! the identity provider with the client secret from config or environment.
//! Any other method on those paths gets a JSON 405.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use clap::Args;
use console::style;
use pharma_news::{Config, TokenExchange, TokenResponse};
use tokio::signal;
use tracing::info;

#[derive(Debug, Args)]
pub struct ProxyArgs {
    /// Address to bind to (defaults to `[proxy].listen`, `127.0.0.1:3000`).
    #[arg(short, long)]
    pub listen: Option<String>,
}

pub async fn run(args: &ProxyArgs, config: &Config) -> Result<()> {
    let exchange = TokenExchange::from_config(&config.proxy)
        .context("failed to configure token exchange")?;

    let listen = args.listen.as_deref().unwrap_or(&config.proxy.listen);
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address: {listen}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind token proxy on {addr}"))?;

    info!(address = %addr, token_url = exchange.token_url(), "Starting token proxy");
    println!(
        "{} Token proxy running on http://{}",
        style("✓").green().bold(),
        addr
    );
    println!("Press Ctrl+C to stop\n");

    let shutdown = async {
        let _ = signal::ctrl_c().await;
        info!("Received shutdown signal");
    };
    axum::serve(listener, router(Arc::new(exchange)))
        .with_graceful_shutdown(shutdown)
        .await
        .context("token proxy error")?;

    info!("Token proxy stopped");
    Ok(())
}

pub fn router(exchange: Arc<TokenExchange>) -> Router {
    Router::new()
        .route(
            "/api/get-token",
            post(get_token).fallback(method_not_allowed),
        )
        .route(
            "/api/refresh-token",
            post(refresh_token).fallback(method_not_allowed),
        )
        .with_state(exchange)
}

async fn get_token(State(exchange): State<Arc<TokenExchange>>, body: Bytes) -> Response {
    into_response(exchange.exchange_code(&body).await)
}

async fn refresh_token(State(exchange): State<Arc<TokenExchange>>, body: Bytes) -> Response {
    into_response(exchange.exchange_refresh_token(&body).await)
}

async fn method_not_allowed() -> Response {
    into_response(TokenResponse::method_not_allowed())
}

fn into_response(response: TokenResponse) -> Response {
    (response.status, Json(response.body)).into_response()
}
