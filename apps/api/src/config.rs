use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 5002;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
const DEFAULT_MESSAGING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Every required value is checked at startup; the process refuses to serve
/// traffic with an incomplete configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Sole origin allowed by the CORS layer.
    pub frontend_url: String,
    pub database_url: String,
    pub smtp_host: String,
    pub email_user: String,
    pub email_pass: String,
    /// Staff inbox receiving application emails. Defaults to `email_user`.
    pub notify_email_to: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_api_base: String,
    /// Messaging sender identity, e.g. `whatsapp:+14155238886`.
    pub messaging_from: String,
    /// Messaging recipient identity.
    pub messaging_to: String,
    pub messaging_timeout: Duration,
    pub max_upload_bytes: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let email_user = require(&lookup, "EMAIL_USER")?;

        Ok(Config {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            frontend_url: optional(&lookup, "FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            database_url: require(&lookup, "DATABASE_URL")?,
            smtp_host: optional(&lookup, "SMTP_HOST")
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            email_pass: require(&lookup, "EMAIL_PASS")?,
            notify_email_to: optional(&lookup, "NOTIFY_EMAIL_TO")
                .unwrap_or_else(|| email_user.clone()),
            email_user,
            twilio_account_sid: require(&lookup, "TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: require(&lookup, "TWILIO_AUTH_TOKEN")?,
            twilio_api_base: optional(&lookup, "TWILIO_API_BASE")
                .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            messaging_from: require(&lookup, "TWILIO_WHATSAPP_NUMBER")?,
            messaging_to: require(&lookup, "YOUR_WHATSAPP_NUMBER")?,
            messaging_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MESSAGING_TIMEOUT_SECS",
                DEFAULT_MESSAGING_TIMEOUT_SECS,
            )?),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            rust_log: optional(&lookup, "RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Blank values are treated the same as unset ones.
fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
