use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use admin_gateway::{build_router, AppState, GatewayConfig};
use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use chrono::Utc;
use common_auth::JwtSignatureVerifier;
use common_security::{InMemoryRateStore, RateLimitStore, RedisRateStore};
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    info!(?config, "admin-gateway configuration loaded");
    if config.environment.is_development() && config.internal_token.is_some() {
        warn!("development bypass token is enabled; never run this in production");
    }
    if config.unlock_secret.is_none() {
        warn!("UNLOCK_SECRET is not set; /api/unlock will answer 503");
    }

    let verifier = build_verifier(&config).await?;
    spawn_jwks_refresh(verifier.clone(), config.jwks_refresh_secs);
    let store = build_rate_store(&config).await?;

    let cors = cors_layer(&config.allowed_origins);
    let addr = bind_addr(&config)?;
    let state = AppState::new(config, verifier, store)?;
    let app = build_router(state).layer(cors);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "starting admin-gateway");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn bind_addr(config: &GatewayConfig) -> anyhow::Result<SocketAddr> {
    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("HOST is not an IP address: {}", config.host))?;
    Ok(SocketAddr::from((ip, config.port)))
}

async fn build_verifier(config: &GatewayConfig) -> anyhow::Result<Arc<JwtSignatureVerifier>> {
    let mut builder = JwtSignatureVerifier::builder();
    if let Some(secret) = &config.hs256_secret {
        builder = builder.with_hs256_secret(secret.as_bytes());
    }
    if let Some(url) = &config.jwks_url {
        info!(jwks_url = %url, "configuring JWKS fetcher");
        builder = builder.with_jwks_url(url.clone());
    }
    let verifier = builder
        .build()
        .await
        .context("failed to initialise signature verifier")?;
    info!("signature verifier initialised");
    Ok(Arc::new(verifier))
}

fn spawn_jwks_refresh(verifier: Arc<JwtSignatureVerifier>, refresh_secs: u64) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };
    let url = fetcher.url().to_owned();

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(refresh_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately and build() already fetched once
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match verifier.refresh_jwks().await {
                Ok(count) => debug!(count, jwks_url = %url, "refreshed JWKS keys"),
                Err(err) => warn!(error = %err, jwks_url = %url, "failed to refresh JWKS keys"),
            }
        }
    });
}

async fn build_rate_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn RateLimitStore>> {
    if let Some(url) = &config.redis_url {
        let store = RedisRateStore::connect(url, config.rate_limit_prefix.clone())
            .await
            .context("failed to connect to REDIS_URL")?;
        info!(prefix = %config.rate_limit_prefix, "using redis rate limit store");
        return Ok(Arc::new(store));
    }

    info!("using in-process rate limit store");
    let store = InMemoryRateStore::new();
    let sweeper = store.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = sweeper.purge_expired(Utc::now()).await;
            if purged > 0 {
                debug!(purged, "purged expired rate limit records");
            }
        }
    });
    Ok(Arc::new(store))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
        ])
}
