use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

/// A configuration variable that is set but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development against a
/// Docker daemon listening on TCP.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: IpAddr,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Docker daemon address (default: `http://127.0.0.1:2375`).
    pub docker_host: String,
    /// Docker API version prefix, e.g. `1.43` (default: unversioned).
    pub docker_api_version: Option<String>,
    /// Maximum number of jobs running at once (default: `4`).
    pub job_concurrency: usize,
    /// Jobs that may wait for a free slot before submissions are rejected
    /// (default: `64`).
    pub job_queue_capacity: usize,
    /// Age after which finished jobs are purged, in seconds (default: `3600`).
    pub job_max_age_secs: u64,
    /// How often the purge runs, in seconds (default: `60`).
    pub job_purge_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            request_timeout_secs: 30,
            docker_host: "http://127.0.0.1:2375".to_string(),
            docker_api_version: None,
            job_concurrency: 4,
            job_queue_capacity: 64,
            job_max_age_secs: 3600,
            job_purge_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `HOST`                    | `127.0.0.1`              |
    /// | `PORT`                    | `8080`                   |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                     |
    /// | `DOCKER_HOST`             | `http://127.0.0.1:2375`  |
    /// | `DOCKER_API_VERSION`      | unset                    |
    /// | `JOB_CONCURRENCY`         | `4`                      |
    /// | `JOB_QUEUE_CAPACITY`      | `64`                     |
    /// | `JOB_MAX_AGE_SECS`        | `3600`                   |
    /// | `JOB_PURGE_INTERVAL_SECS` | `60`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let docker_host = lookup("DOCKER_HOST")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.docker_host);
        if !(docker_host.starts_with("http://") || docker_host.starts_with("tcp://")) {
            return Err(ConfigError::Invalid {
                var: "DOCKER_HOST",
                value: docker_host,
                reason: "expected a tcp:// or http:// address".to_string(),
            });
        }

        let docker_api_version = lookup("DOCKER_API_VERSION")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            host: parse_var(&lookup, "HOST", defaults.host)?,
            port: parse_var(&lookup, "PORT", defaults.port)?,
            request_timeout_secs: parse_var(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            docker_host,
            docker_api_version,
            job_concurrency: non_zero(
                parse_var(&lookup, "JOB_CONCURRENCY", defaults.job_concurrency)?,
                "JOB_CONCURRENCY",
            )?,
            job_queue_capacity: non_zero(
                parse_var(&lookup, "JOB_QUEUE_CAPACITY", defaults.job_queue_capacity)?,
                "JOB_QUEUE_CAPACITY",
            )?,
            job_max_age_secs: parse_var(&lookup, "JOB_MAX_AGE_SECS", defaults.job_max_age_secs)?,
            job_purge_interval_secs: non_zero(
                parse_var(&lookup, "JOB_PURGE_INTERVAL_SECS", defaults.job_purge_interval_secs)?,
                "JOB_PURGE_INTERVAL_SECS",
            )?,
        })
    }

    pub fn job_max_age(&self) -> Duration {
        Duration::from_secs(self.job_max_age_secs)
    }

    pub fn job_purge_interval(&self) -> Duration {
        Duration::from_secs(self.job_purge_interval_secs)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn non_zero<T>(value: T, var: &'static str) -> Result<T, ConfigError>
where
    T: Default + PartialEq + Display,
{
    if value == T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 8080);
        assert_eq!(config.docker_host, "http://127.0.0.1:2375");
        assert_eq!(config.docker_api_version, None);
        assert_eq!(config.job_concurrency, 4);
        assert_eq!(config.job_queue_capacity, 64);
        assert_eq!(config.job_max_age(), Duration::from_secs(3600));
        assert_eq!(config.job_purge_interval(), Duration::from_secs(60));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("DOCKER_HOST", "tcp://10.0.0.2:2375"),
            ("DOCKER_API_VERSION", "1.43"),
            ("JOB_CONCURRENCY", "8"),
        ])
        .unwrap();
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.docker_host, "tcp://10.0.0.2:2375");
        assert_eq!(config.docker_api_version.as_deref(), Some("1.43"));
        assert_eq!(config.job_concurrency, 8);
    }

    #[test]
    fn unparseable_port_is_rejected() {
        assert_matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert_matches!(
            load(&[("JOB_CONCURRENCY", "0")]),
            Err(ConfigError::Invalid { var: "JOB_CONCURRENCY", .. })
        );
    }

    #[test]
    fn zero_purge_interval_is_rejected() {
        assert_matches!(
            load(&[("JOB_PURGE_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "JOB_PURGE_INTERVAL_SECS", .. })
        );
    }

    #[test]
    fn unix_socket_host_is_rejected() {
        assert_matches!(
            load(&[("DOCKER_HOST", "unix:///var/run/docker.sock")]),
            Err(ConfigError::Invalid { var: "DOCKER_HOST", .. })
        );
    }
}
