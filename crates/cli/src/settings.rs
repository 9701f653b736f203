//! Layered configuration: defaults, then `tutorq.toml`, then `TUTORQ_*` env vars

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.tutorq/queue.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub reconcile_interval_secs: u64,
    pub feed_capacity: usize,
    pub log_format: String,
    #[serde(default)]
    pub tutor_email: Option<String>,
    #[serde(default)]
    pub tutor_password: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::build(Environment::with_prefix("TUTORQ"))
    }

    fn build(env: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("database_url", DEFAULT_DB_PATH)?
            .set_default("reconcile_interval_secs", 10_i64)?
            .set_default("feed_capacity", 256_i64)?
            .set_default("log_format", "pretty")?
            .add_source(File::with_name("tutorq").required(false))
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if settings.reconcile_interval_secs == 0 {
            bail!("reconcile_interval_secs must be greater than zero");
        }
        if settings.feed_capacity == 0 {
            bail!("feed_capacity must be greater than zero");
        }
        Ok(settings)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Connection url for sqlx; plain paths are tilde-expanded
    pub fn database_url(&self) -> String {
        if self.database_url.starts_with("sqlite:") {
            return self.database_url.clone();
        }
        format!("sqlite://{}", shellexpand::tilde(&self.database_url))
    }

    /// Directory that must exist before a file database can be created
    pub fn database_dir(&self) -> Option<std::path::PathBuf> {
        if self.database_url.starts_with("sqlite:") {
            return None;
        }
        let path = shellexpand::tilde(&self.database_url).into_owned();
        std::path::Path::new(&path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("TUTORQ").source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::build(env(&[])).unwrap();
        assert_eq!(settings.reconcile_interval(), Duration::from_secs(10));
        assert_eq!(settings.feed_capacity, 256);
        assert_eq!(settings.log_format, "pretty");
        assert!(settings.tutor_email.is_none());
        assert!(settings.database_url().starts_with("sqlite://"));
        assert!(settings.database_url().ends_with(".tutorq/queue.db"));
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::build(env(&[
            ("TUTORQ_DATABASE_URL", "sqlite::memory:"),
            ("TUTORQ_RECONCILE_INTERVAL_SECS", "3"),
            ("TUTORQ_TUTOR_EMAIL", "tutor@example.com"),
        ]))
        .unwrap();

        assert_eq!(settings.database_url(), "sqlite::memory:");
        assert!(settings.database_dir().is_none());
        assert_eq!(settings.reconcile_interval(), Duration::from_secs(3));
        assert_eq!(settings.tutor_email.as_deref(), Some("tutor@example.com"));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = Settings::build(env(&[("TUTORQ_RECONCILE_INTERVAL_SECS", "0")]));
        assert!(result.is_err());
    }
}
