use std::time::Duration;

use axum::http::HeaderValue;
use centinela_core::policy::{NotificationPolicy, DEFAULT_MESSAGE};
use centinela_notify::{DispatcherConfig, GatewayConfig};

/// A required setting is missing or unparseable. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// How outbound notifications are delivered.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// Through the provider gateway with the configured session.
    Gateway(GatewayConfig),
    /// Logged and recorded in-process; nothing leaves the host.
    DryRun,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `90`). Must exceed the
    /// dispatch wait; a trigger that outlives it still completes its cycle.
    pub request_timeout_secs: u64,
    pub database_url: String,
    /// Apply `db/migrations` at startup (default: `false`; the store is
    /// normally owned by the control surface).
    pub run_migrations: bool,
    pub provider: ProviderConfig,
    /// Period of the background scan (default: 10 s).
    pub scan_interval: Duration,
    /// Bounded wait for a dispatch report on the manual-trigger path
    /// (default: 60 s).
    pub dispatch_wait: Duration,
    pub dispatcher: DispatcherConfig,
    pub policy: NotificationPolicy,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                   |
    /// |---------------------------|---------------------------|
    /// | `DATABASE_URL`            | required                  |
    /// | `API_ID`                  | required (integer)        |
    /// | `API_HASH`                | required                  |
    /// | `SESSION_STRING`          | required                  |
    /// | `PROVIDER_URL`            | required unless dry run   |
    /// | `PROVIDER_DRY_RUN`        | `false`                   |
    /// | `HOST`                    | `0.0.0.0`                 |
    /// | `PORT`                    | `8000`                    |
    /// | `CORS_ORIGINS`            | any origin                |
    /// | `REQUEST_TIMEOUT_SECS`    | `90` (> dispatch wait)    |
    /// | `RUN_MIGRATIONS`          | `false`                   |
    /// | `SCAN_INTERVAL_SECS`      | `10`                      |
    /// | `DISPATCH_WAIT_SECS`      | `60`                      |
    /// | `CALL_PAUSE_MS`           | `3000`                    |
    /// | `DISPATCH_QUEUE_CAPACITY` | `64`                      |
    /// | `MAX_COOLDOWN_SECS`       | `120`                     |
    /// | `CALL_SCOPE`              | `all` (`all`/`primary`)   |
    /// | `MESSAGE_SOURCE`          | `fixed` (`fixed`/`alert`) |
    /// | `DEFAULT_MESSAGE`         | built-in literal          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env.required("DATABASE_URL")?;
        let api_id: i32 = env.required_parsed("API_ID")?;
        let api_hash = env.required("API_HASH")?;
        let session = env.required("SESSION_STRING")?;

        let provider = if env.flag("PROVIDER_DRY_RUN")? {
            ProviderConfig::DryRun
        } else {
            ProviderConfig::Gateway(GatewayConfig {
                base_url: env.required("PROVIDER_URL")?,
                api_id,
                api_hash,
                session,
            })
        };

        let cors_origins: Vec<String> = env
            .get("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| o.parse::<HeaderValue>().is_err())
        {
            return Err(ConfigError::Invalid {
                key: "CORS_ORIGINS",
                reason: format!("'{bad}' is not a valid origin"),
            });
        }

        let dispatcher = DispatcherConfig {
            queue_capacity: env.parsed_or("DISPATCH_QUEUE_CAPACITY", 64)?,
            call_pause: Duration::from_millis(env.parsed_or("CALL_PAUSE_MS", 3_000)?),
            max_cooldown: Duration::from_secs(env.parsed_or("MAX_COOLDOWN_SECS", 120)?),
            ..DispatcherConfig::default()
        };

        let policy = NotificationPolicy {
            call_scope: env.parsed_or("CALL_SCOPE", Default::default())?,
            message_source: env.parsed_or("MESSAGE_SOURCE", Default::default())?,
            default_message: env
                .get("DEFAULT_MESSAGE")
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
        };

        let scan_interval_secs: u64 = env.parsed_or("SCAN_INTERVAL_SECS", 10)?;
        if scan_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SCAN_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let request_timeout_secs: u64 = env.parsed_or("REQUEST_TIMEOUT_SECS", 90)?;
        let dispatch_wait_secs: u64 = env.parsed_or("DISPATCH_WAIT_SECS", 60)?;
        if request_timeout_secs <= dispatch_wait_secs {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                reason: format!(
                    "must exceed DISPATCH_WAIT_SECS ({dispatch_wait_secs}), got {request_timeout_secs}"
                ),
            });
        }

        Ok(Self {
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: env.parsed_or("PORT", 8000)?,
            cors_origins,
            request_timeout_secs,
            database_url,
            run_migrations: env.flag("RUN_MIGRATIONS")?,
            provider,
            scan_interval: Duration::from_secs(scan_interval_secs),
            dispatch_wait: Duration::from_secs(dispatch_wait_secs),
            dispatcher,
            policy,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value of `key`, treating blank strings as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn required_parsed<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        parse(key, &self.required(key)?)
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => parse(key, &raw),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no") => Ok(false),
            Some(v) => Err(ConfigError::Invalid {
                key,
                reason: format!("expected a boolean, got '{v}'"),
            }),
        }
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
