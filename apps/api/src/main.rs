mod apply;
mod config;
mod db;
mod errors;
mod models;
mod notify;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::{AllowHeaders, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::apply::repository::PgApplicationStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::notify::email::{parse_mailbox, SmtpMailer};
use crate::notify::messaging::TwilioMessenger;
use crate::notify::{NotificationDispatcher, Recipients};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; any missing required variable aborts startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting intake API v{}", env!("CARGO_PKG_VERSION"));

    // Validate addresses and origin before touching the network
    parse_mailbox(&config.email_user).context("EMAIL_USER is not a valid email address")?;
    parse_mailbox(&config.notify_email_to)
        .context("NOTIFY_EMAIL_TO is not a valid email address")?;
    let origin: HeaderValue = config
        .frontend_url
        .parse()
        .context("FRONTEND_URL is not a valid CORS origin")?;

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize notification transports
    let mailer = SmtpMailer::new(
        &config.smtp_host,
        config.email_user.clone(),
        config.email_pass.clone(),
    )
    .context("Failed to configure SMTP transport")?;
    info!("SMTP transport configured (relay: {})", config.smtp_host);

    let messenger = TwilioMessenger::new(
        &config.twilio_api_base,
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.messaging_timeout,
    )
    .context("Failed to configure messaging client")?;
    info!("Messaging client initialized");

    let notifier = NotificationDispatcher::new(
        Arc::new(mailer),
        Arc::new(messenger),
        Recipients {
            email_from: config.email_user.clone(),
            email_to: config.notify_email_to.clone(),
            message_from: config.messaging_from.clone(),
            message_to: config.messaging_to.clone(),
        },
    );

    // Build app state
    let state = AppState {
        store: Arc::new(PgApplicationStore::new(db)),
        notifier,
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request());

    // Build router
    let app = build_router(state, config.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr} (CORS origin: {})", config.frontend_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
