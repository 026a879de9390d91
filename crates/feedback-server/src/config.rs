use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use feedback_crypto::HashCost;
use tracing::info;

/// Placeholder session secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret123!",
];

/// Upper bound on session lifetime: one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub hash_cost: HashCost,
}

impl Config {
    pub fn load() -> Result<Self> {
        let session_secret = env::var("FEEDBACK_SESSION_SECRET").unwrap_or_default();
        check_secret(&session_secret)?;

        let defaults = HashCost::default();
        let ttl_hours = try_load("FEEDBACK_SESSION_TTL_HOURS", "168")?; // 7 days
        Ok(Self {
            host: try_load("FEEDBACK_HOST", "0.0.0.0")?,
            port: try_load("FEEDBACK_PORT", "3000")?,
            db_path: try_load("FEEDBACK_DB_PATH", "feedback.db")?,
            session_secret,
            session_ttl: session_ttl(ttl_hours)?,
            hash_cost: HashCost {
                memory_kib: try_load(
                    "FEEDBACK_ARGON2_MEMORY_KIB",
                    &defaults.memory_kib.to_string(),
                )?,
                iterations: try_load(
                    "FEEDBACK_ARGON2_ITERATIONS",
                    &defaults.iterations.to_string(),
                )?,
                parallelism: try_load(
                    "FEEDBACK_ARGON2_PARALLELISM",
                    &defaults.parallelism.to_string(),
                )?,
            },
        })
    }
}

fn check_secret(secret: &str) -> Result<()> {
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
        bail!("FEEDBACK_SESSION_SECRET is unset or still a placeholder; set it in your .env file");
    }
    Ok(())
}

fn session_ttl(hours: i64) -> Result<Duration> {
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        bail!(
            "FEEDBACK_SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}, got {hours}"
        );
    }
    Duration::try_hours(hours).context("FEEDBACK_SESSION_TTL_HOURS is out of range")
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e: T::Err| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}
