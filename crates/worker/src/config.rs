use std::time::Duration;

use flooddash_core::rules::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Time between evaluation ticks.
    pub eval_interval: Duration,
    pub engine: EngineConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default  |
    /// |-------------------------|----------|
    /// | `DATABASE_URL`          | required |
    /// | `EVAL_INTERVAL_SECS`    | `60`     |
    /// | `RATE_LIMIT_MM_PER_SEC` | `0.5`    |
    /// | `LOW_BATTERY_MV`        | `3300`   |
    /// | `EVAL_LOOKBACK_MINS`    | `60`     |
    /// | `FETCH_TIMEOUT_MS`      | `5000`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let eval_interval_secs: u64 = parse_or(&lookup, "EVAL_INTERVAL_SECS", 60)?;
        let rate_limit_mm_per_sec: f64 = parse_or(&lookup, "RATE_LIMIT_MM_PER_SEC", 0.5)?;
        let low_battery_mv: i32 = parse_or(&lookup, "LOW_BATTERY_MV", 3300)?;
        let lookback_mins: u64 = parse_or(&lookup, "EVAL_LOOKBACK_MINS", 60)?;
        let fetch_timeout_ms: u64 = parse_or(&lookup, "FETCH_TIMEOUT_MS", 5000)?;

        if eval_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "EVAL_INTERVAL_SECS",
                value: "0".into(),
            });
        }
        if !rate_limit_mm_per_sec.is_finite() || rate_limit_mm_per_sec <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_MM_PER_SEC",
                value: rate_limit_mm_per_sec.to_string(),
            });
        }

        Ok(Self {
            database_url,
            eval_interval: Duration::from_secs(eval_interval_secs),
            engine: EngineConfig {
                rate_limit_mm_per_sec,
                low_battery_mv,
                lookback: Duration::from_secs(lookback_mins * 60),
                fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_engine_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/flood")]).unwrap();
        assert_eq!(config.eval_interval, Duration::from_secs(60));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/flood"),
            ("EVAL_INTERVAL_SECS", "15"),
            ("RATE_LIMIT_MM_PER_SEC", "2.5"),
            ("LOW_BATTERY_MV", "3400"),
            ("EVAL_LOOKBACK_MINS", "10"),
            ("FETCH_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.eval_interval, Duration::from_secs(15));
        assert_eq!(config.engine.rate_limit_mm_per_sec, 2.5);
        assert_eq!(config.engine.low_battery_mv, 3400);
        assert_eq!(config.engine.lookback, Duration::from_secs(600));
        assert_eq!(config.engine.fetch_timeout, Duration::from_millis(250));
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn garbage_values_are_rejected() {
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("LOW_BATTERY_MV", "lots")]),
            Err(ConfigError::Invalid { key: "LOW_BATTERY_MV", .. })
        );
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("EVAL_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { key: "EVAL_INTERVAL_SECS", .. })
        );
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("RATE_LIMIT_MM_PER_SEC", "-1")]),
            Err(ConfigError::Invalid { key: "RATE_LIMIT_MM_PER_SEC", .. })
        );
    }
}
