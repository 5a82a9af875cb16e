//! Process configuration, read from the environment (and `.env` when present).

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{ensure, Context};

/// Upper bound for `IDLE_TIMEOUT_SECS`: one year.
const MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx connection string for the chat database
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// How often the idle sweep runs
    pub sweep_interval: Duration,
    /// Participants silent for at least this long are evicted
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://papo.db".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            sweep_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let defaults = Config::default();

        let config = Config {
            database_url: dotenv::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parse_or("BIND_ADDR", dotenv::var("BIND_ADDR").ok(), defaults.bind_addr)?,
            sweep_interval: Duration::from_secs(parse_or(
                "SWEEP_INTERVAL_SECS",
                dotenv::var("SWEEP_INTERVAL_SECS").ok(),
                defaults.sweep_interval.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(parse_or(
                "IDLE_TIMEOUT_SECS",
                dotenv::var("IDLE_TIMEOUT_SECS").ok(),
                defaults.idle_timeout.as_secs(),
            )?),
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.sweep_interval.is_zero(), "SWEEP_INTERVAL_SECS must be positive");
        ensure!(
            self.idle_timeout <= MAX_IDLE_TIMEOUT,
            "IDLE_TIMEOUT_SECS must be at most {}",
            MAX_IDLE_TIMEOUT.as_secs()
        );
        Ok(())
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
