use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_CLEARING_DAYS: i64 = 14;
const DEFAULT_CLEARING_INTERVAL_SECS: u64 = 3600;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub http_addr: String,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        default_http_addr: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = lookup("REDIS_URL").context("REDIS_URL is required")?;
        let http_addr = lookup("HTTP_ADDR").unwrap_or_else(|| default_http_addr.to_string());

        Ok(Self {
            database_url,
            redis_url,
            http_addr,
        })
    }
}

/// Settings for the worker that accrues and clears earnings.
#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub database_url: String,
    pub redis_url: String,
    pub clearing_window: chrono::Duration,
    pub clearing_interval: Duration,
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let service = ServiceConfig::from_lookup("", &lookup)?;

        let clearing_days = match lookup("EARNINGS_CLEARING_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| *days >= 0)
                .with_context(|| {
                    format!("EARNINGS_CLEARING_DAYS must be a non-negative integer, got {raw:?}")
                })?,
            None => DEFAULT_CLEARING_DAYS,
        };
        let interval_secs = match lookup("CLEARING_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| {
                    format!("CLEARING_INTERVAL_SECS must be a positive integer, got {raw:?}")
                })?,
            None => DEFAULT_CLEARING_INTERVAL_SECS,
        };

        Ok(Self {
            database_url: service.database_url,
            redis_url: service.redis_url,
            clearing_window: chrono::Duration::days(clearing_days),
            clearing_interval: Duration::from_secs(interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn service_config_requires_database_url() {
        let err = ServiceConfig::from_lookup("0.0.0.0:8080", env(&[("REDIS_URL", "redis://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn service_config_defaults_http_addr() {
        let config = ServiceConfig::from_lookup(
            "0.0.0.0:8080",
            env(&[("DATABASE_URL", "postgres://db"), ("REDIS_URL", "redis://x")]),
        )
        .unwrap();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn settlement_config_uses_defaults() {
        let config = SettlementConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://db"),
            ("REDIS_URL", "redis://x"),
        ]))
        .unwrap();
        assert_eq!(config.clearing_window, chrono::Duration::days(14));
        assert_eq!(config.clearing_interval, Duration::from_secs(3600));
    }

    #[test]
    fn settlement_config_rejects_garbage_numbers() {
        let err = SettlementConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://db"),
            ("REDIS_URL", "redis://x"),
            ("EARNINGS_CLEARING_DAYS", "two weeks"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("EARNINGS_CLEARING_DAYS"));
    }
}
