// Runtime configuration, read once per cold start.
//
// Env:
//   TABLE_NAME             : DynamoDB table holding link records (required)
//   PUBLIC_BASE_URL        : origin used when building share links
//   ADMIN_SECRET           : shared secret for the admin console; empty locks it
//   CACHE_MAX_AGE          : seconds article pages may be cached by the edge
//   GATE_COUNTDOWN_START   : countdown start value (seconds)
//   GATE_SCROLL_TOLERANCE  : px slack when deciding "scrolled to bottom"

use thiserror::Error;

use crate::gate::GateConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub table: String,
    pub public_base: String,
    pub admin_secret: String,
    pub cache_max_age: u64,
    pub gate: GateConfig,
}

fn env_parse<T: std::str::FromStr>(k: &str) -> Option<T> {
    std::env::var(k).ok().and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_or = |k: &str, d: &str| std::env::var(k).unwrap_or_else(|_| d.to_string());

        let table = std::env::var("TABLE_NAME")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("TABLE_NAME"))?;
        let admin_secret = env_or("ADMIN_SECRET", "");
        if admin_secret.is_empty() {
            tracing::warn!("ADMIN_SECRET not set; admin console is locked");
        }
        let defaults = GateConfig::default();

        Ok(Self {
            table,
            public_base: env_or("PUBLIC_BASE_URL", "https://articlehub.example"),
            admin_secret,
            cache_max_age: env_parse("CACHE_MAX_AGE").unwrap_or(300),
            gate: GateConfig {
                countdown_start: env_parse("GATE_COUNTDOWN_START")
                    .unwrap_or(defaults.countdown_start),
                scroll_tolerance: env_parse::<f64>("GATE_SCROLL_TOLERANCE")
                    .filter(|t| t.is_finite() && *t >= 0.0)
                    .unwrap_or(defaults.scroll_tolerance),
            },
        })
    }

    /// Config for tests and local runs that never touch the environment.
    pub fn local(admin_secret: &str) -> Self {
        Self {
            table: "articlehub-local".to_string(),
            public_base: "https://articlehub.test".to_string(),
            admin_secret: admin_secret.to_string(),
            cache_max_age: 0,
            gate: GateConfig::default(),
        }
    }
}
