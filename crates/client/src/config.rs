use std::time::Duration;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a service running locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL the `/upload` and `/status/{job_id}` paths hang off
    /// (default: `http://localhost:8000/api`).
    pub api_url: String,
    /// Delay between status polls (default: 1 second).
    pub poll_interval: Duration,
    /// Per-request HTTP timeout (default: 30 seconds).
    pub request_timeout: Duration,
}

/// A configuration variable held a value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                     |
    /// |--------------------------------|-----------------------------|
    /// | `SCANJOB_API_URL`              | `http://localhost:8000/api` |
    /// | `SCANJOB_POLL_INTERVAL_MS`     | `1000`                      |
    /// | `SCANJOB_REQUEST_TIMEOUT_SECS` | `30`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = match lookup("SCANJOB_API_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: "SCANJOB_API_URL",
                })
            }
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => DEFAULT_API_URL.to_string(),
        };

        let poll_interval_ms = parse_positive(
            "SCANJOB_POLL_INTERVAL_MS",
            lookup("SCANJOB_POLL_INTERVAL_MS"),
            DEFAULT_POLL_INTERVAL_MS,
        )?;

        let request_timeout_secs = parse_positive(
            "SCANJOB_REQUEST_TIMEOUT_SECS",
            lookup("SCANJOB_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

fn parse_positive(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn overrides_and_trims_trailing_slash() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("SCANJOB_API_URL", "http://scanner:9000/api/"),
            ("SCANJOB_POLL_INTERVAL_MS", "250"),
            ("SCANJOB_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://scanner:9000/api");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert_matches!(
            ClientConfig::from_lookup(lookup_from(&[("SCANJOB_POLL_INTERVAL_MS", "0")])),
            Err(ConfigError::InvalidNumber { var: "SCANJOB_POLL_INTERVAL_MS", .. })
        );
        assert_matches!(
            ClientConfig::from_lookup(lookup_from(&[("SCANJOB_REQUEST_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidNumber { .. })
        );
        assert_matches!(
            ClientConfig::from_lookup(lookup_from(&[("SCANJOB_API_URL", "  ")])),
            Err(ConfigError::Empty { .. })
        );
    }
}
