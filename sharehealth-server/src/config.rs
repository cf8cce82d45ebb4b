//! Configuration for the sharehealth server.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `SH__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `SH__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `SH__HTTP_ADDR=0.0.0.0:8888` sets the HTTP server address
//! - `SH__METRICS_INTERVAL=1m` sets the interval between scheduled runs
//! - `SH__STRESS__ENABLED=true` enables the stress generator
//!
//! # YAML Configuration File
//!
//! Shares are usually configured in a YAML file:
//!
//! ```yaml
//! http_addr: 0.0.0.0:5000
//! metrics_interval: 5m
//!
//! shares:
//!   - share_name: projects
//!     share_path: /mnt/projects
//!     health_directory: /mnt/projects/.health
//!     test_file_size_mb: 100
//!     small_files_count: 500
//!
//! stress:
//!   enabled: true
//!   duration: 60s
//!   parallel_workers: 4
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use sharehealth_types::{ShareConfig, StressConfig};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "SH__";

/// Newtype around `String` that may protect against accidental
/// logging of secrets in our configuration struct. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the server runtime.
    ///
    /// # Default
    ///
    /// Number of CPU cores on the host machine.
    ///
    /// # Environment Variable
    ///
    /// `SH__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// [Sentry](https://sentry.io/) error tracking configuration.
///
/// Sentry is disabled unless a DSN is configured. Warnings and errors are forwarded as events,
/// informational messages as logs.
///
/// Used in: [`Config::sentry`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN (Data Source Name).
    ///
    /// # Environment Variable
    ///
    /// `SH__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name for this deployment, such as `production` or `staging`.
    pub environment: Option<Cow<'static, str>>,

    /// Server name reported to Sentry. Defaults to the hostname.
    pub server_name: Option<Cow<'static, str>>,

    /// Error event sample rate between `0.0` and `1.0`.
    pub sample_rate: f32,

    /// Performance trace sample rate between `0.0` and `1.0`.
    pub traces_sample_rate: f32,

    /// Enables Sentry SDK debug logging.
    pub debug: bool,

    /// Additional tags attached to all events.
    pub tags: BTreeMap<String, String>,
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
            debug: false,
            tags: BTreeMap::new(),
        }
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN, ERROR, OFF. The `RUST_LOG`
    /// environment variable takes precedence and provides more granular control per module.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `SH__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

/// A configuration that cannot be used to run checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No shares are configured.
    #[error("no shares configured")]
    NoShares,
    /// Two shares use the same name, which would make their metrics collide.
    #[error("duplicate share name `{0}`")]
    DuplicateShare(String),
    /// The scheduler interval is zero.
    #[error("metrics_interval must be greater than zero")]
    ZeroInterval,
    /// Stress is enabled without any workers.
    #[error("stress.parallel_workers must be at least 1 when stress is enabled")]
    NoStressWorkers,
}

/// Main configuration struct for the sharehealth server.
///
/// See the [module-level documentation](self) for details on the sources.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server bind address.
    ///
    /// # Default
    ///
    /// `0.0.0.0:5000`
    ///
    /// # Environment Variable
    ///
    /// `SH__HTTP_ADDR`
    pub http_addr: SocketAddr,

    /// Interval between two scheduled runs over all shares.
    ///
    /// # Default
    ///
    /// `5m`
    ///
    /// # Environment Variable
    ///
    /// `SH__METRICS_INTERVAL`
    #[serde(with = "humantime_serde")]
    pub metrics_interval: Duration,

    /// Shares to check, in the order they are checked.
    pub shares: Vec<ShareConfig>,

    /// Synthetic load run before checks when requested.
    pub stress: StressConfig,

    /// Tokio runtime configuration.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,

    /// Sentry error tracking configuration.
    pub sentry: Sentry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            metrics_interval: Duration::from_secs(300),
            shares: Vec::new(),
            stress: StressConfig::default(),
            runtime: Runtime::default(),
            logging: Logging::default(),
            sentry: Sentry::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided in `args`)
    /// 3. Environment variables (prefixed with `SH__`)
    ///
    /// Loading does not validate the share list, see [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Checks that the configuration can be used to run checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shares.is_empty() {
            return Err(ConfigError::NoShares);
        }

        let mut names = HashSet::new();
        for share in &self.shares {
            if !names.insert(share.share_name.as_str()) {
                return Err(ConfigError::DuplicateShare(share.share_name.clone()));
            }
        }

        if self.metrics_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.stress.enabled && self.stress.parallel_workers == 0 {
            return Err(ConfigError::NoStressWorkers);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;

    use super::*;

    fn share(name: &str) -> ShareConfig {
        ShareConfig::new(name, "/mnt/share", "/mnt/share/.health")
    }

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.http_addr, SocketAddr::from(([0, 0, 0, 0], 5000)));
            assert_eq!(config.metrics_interval, Duration::from_secs(300));
            assert!(config.shares.is_empty());
            assert!(!config.stress.enabled);
            assert!(!config.sentry.is_enabled());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SH__HTTP_ADDR", "127.0.0.1:9100");
            jail.set_env("SH__METRICS_INTERVAL", "1m");
            jail.set_env("SH__STRESS__ENABLED", "true");
            jail.set_env("SH__STRESS__PARALLEL_WORKERS", "8");
            jail.set_env("SH__LOGGING__LEVEL", "debug");
            jail.set_env("SH__SENTRY__DSN", "abcde");
            jail.set_env("SH__SENTRY__ENVIRONMENT", "production");
            jail.set_env("SH__SENTRY__SAMPLE_RATE", "0.5");

            let config = Config::load(None).unwrap();

            assert_eq!(config.http_addr, SocketAddr::from(([127, 0, 0, 1], 9100)));
            assert_eq!(config.metrics_interval, Duration::from_secs(60));
            assert!(config.stress.enabled);
            assert_eq!(config.stress.parallel_workers, 8);
            assert_eq!(config.stress.duration, Duration::from_secs(60));
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.sentry.dsn.unwrap().expose_secret().as_str(), "abcde");
            assert_eq!(config.sentry.environment.as_deref(), Some("production"));
            assert_eq!(config.sentry.sample_rate, 0.5);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            metrics_interval: 30s
            shares:
              - share_name: projects
                share_path: /mnt/projects
                health_directory: /mnt/projects/.health
                test_file_size_mb: 10
              - share_name: archive
                share_path: /mnt/archive
                health_directory: /tmp/archive-health
            stress:
              enabled: true
              duration: 2m
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.metrics_interval, Duration::from_secs(30));
            assert_eq!(config.shares.len(), 2);

            let projects = &config.shares[0];
            assert_eq!(projects.share_name, "projects");
            assert_eq!(projects.share_path, PathBuf::from("/mnt/projects"));
            assert_eq!(projects.test_file_size_mb, 10);
            assert_eq!(projects.small_files_count, 500);

            let archive = &config.shares[1];
            assert_eq!(archive.health_directory, PathBuf::from("/tmp/archive-health"));
            assert_eq!(archive.test_file_size_mb, 100);

            assert!(config.stress.enabled);
            assert_eq!(config.stress.duration, Duration::from_secs(120));
            assert_eq!(config.stress.parallel_workers, 4);
            assert!(config.validate().is_ok());

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            http_addr: 0.0.0.0:8080
            stress:
              enabled: true
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("SH__HTTP_ADDR", "0.0.0.0:9090");
            jail.set_env("SH__STRESS__ENABLED", "false");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            assert_eq!(config.http_addr.port(), 9090);
            assert!(!config.stress.enabled);

            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_yaml_values() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(b"metrics_interval: often\n")
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            assert!(Config::load(Some(tempfile.path())).is_err());
            Ok(())
        });
    }

    #[test]
    fn validate_requires_shares() {
        let config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::NoShares));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let config = Config {
            shares: vec![share("a"), share("b"), share("a")],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateShare("a".into()))
        );
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let config = Config {
            shares: vec![share("a")],
            metrics_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn validate_rejects_stress_without_workers() {
        let config = Config {
            shares: vec![share("a")],
            stress: StressConfig {
                enabled: true,
                parallel_workers: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoStressWorkers));
    }
}
