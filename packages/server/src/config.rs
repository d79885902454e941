use anyhow::{Context, Result};
use dotenvy::dotenv;
use engagement::{CascadeConfig, LedgerConfig, RetryPolicy};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub port: u16,
    pub ledger: LedgerConfig,
    pub cascade: CascadeConfig,
    pub admin_user_ids: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut retry = RetryPolicy::new();
        if let Some(attempts) = lookup("ENGAGEMENT_MAX_ATTEMPTS") {
            let attempts: u32 = attempts
                .parse()
                .context("ENGAGEMENT_MAX_ATTEMPTS must be a valid number")?;
            retry = retry.with_max_attempts(attempts);
        }
        if let Some(timeout_ms) = lookup("ENGAGEMENT_ATTEMPT_TIMEOUT_MS") {
            let timeout_ms: u64 = timeout_ms
                .parse()
                .context("ENGAGEMENT_ATTEMPT_TIMEOUT_MS must be a valid number")?;
            retry = retry.with_attempt_timeout(Duration::from_millis(timeout_ms));
        }

        let mut cascade = CascadeConfig::new().with_retry(retry.clone());
        if let Some(page_size) = lookup("CASCADE_PAGE_SIZE") {
            let page_size: usize = page_size
                .parse()
                .context("CASCADE_PAGE_SIZE must be a valid number")?;
            cascade = cascade.with_page_size(page_size);
        }
        if let Some(collections) = lookup("CASCADE_COLLECTIONS") {
            let collections = split_list(&collections);
            if collections.is_empty() {
                anyhow::bail!("CASCADE_COLLECTIONS must name at least one collection");
            }
            cascade = cascade.with_collections(collections);
        }

        let ledger = LedgerConfig::new().with_retry(retry);
        if !cascade.collections.contains(&ledger.engagement_collection) {
            anyhow::bail!(
                "CASCADE_COLLECTIONS must include the engagement collection \"{}\"",
                ledger.engagement_collection
            );
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            ledger,
            cascade,
            admin_user_ids: lookup("ADMIN_USER_IDS")
                .map(|ids| split_list(&ids))
                .unwrap_or_default(),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.ledger.retry.max_attempts, 5);
        assert_eq!(config.cascade.page_size, 100);
        assert_eq!(config.cascade.collections.len(), 3);
        assert!(config.admin_user_ids.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/engagement"),
            ("PORT", "9000"),
            ("ENGAGEMENT_MAX_ATTEMPTS", "12"),
            ("ENGAGEMENT_ATTEMPT_TIMEOUT_MS", "250"),
            ("CASCADE_PAGE_SIZE", "25"),
            ("CASCADE_COLLECTIONS", "likes, members ,"),
            ("ADMIN_USER_IDS", "root,ops"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/engagement"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.ledger.retry.max_attempts, 12);
        assert_eq!(config.cascade.retry.max_attempts, 12);
        assert_eq!(config.ledger.retry.attempt_timeout, Duration::from_millis(250));
        assert_eq!(config.cascade.page_size, 25);
        assert_eq!(config.cascade.collections, vec!["likes", "members"]);
        assert_eq!(config.admin_user_ids, vec!["root", "ops"]);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("CASCADE_PAGE_SIZE", "-1")]).is_err());
        assert!(config_from(&[("CASCADE_COLLECTIONS", " , ")]).is_err());
    }

    #[test]
    fn test_cascade_collections_must_include_likes() {
        let err = config_from(&[("CASCADE_COLLECTIONS", "comments,feedback")]).unwrap_err();
        assert!(err.to_string().contains("likes"));
    }
}
