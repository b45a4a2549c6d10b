//! Runner configuration
//!
//! Phase timeouts, watch retry cadence, log drain grace period and the
//! cascade policy used during teardown.

use kubepipe_core::CascadePolicy;
use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How long each prepare workload may take to reach Running
    pub prepare_timeout: Duration,

    /// How long each stage workload may take to finish
    pub stage_timeout: Duration,

    /// Delay between attempts to open a workload watch
    pub watch_retry_interval: Duration,

    /// How long log streams may keep draining after the last stage
    pub log_grace_period: Duration,

    /// Propagation policy for teardown deletions
    pub cascade: CascadePolicy,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            prepare_timeout: Duration::from_secs(60 * 60),
            stage_timeout: Duration::from_secs(30 * 60),
            watch_retry_interval: Duration::from_secs(3),
            log_grace_period: Duration::from_secs(5),
            cascade: CascadePolicy::Foreground,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables, all optional:
    /// - KUBEPIPE_PREPARE_TIMEOUT (seconds, default: 3600)
    /// - KUBEPIPE_STAGE_TIMEOUT (seconds, default: 1800)
    /// - KUBEPIPE_WATCH_RETRY_INTERVAL (seconds, default: 3)
    /// - KUBEPIPE_LOG_GRACE_PERIOD (seconds, default: 5)
    /// - KUBEPIPE_DELETE_CASCADE (foreground, background or orphan)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::new();

        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| {
                        anyhow::anyhow!("{} must be a number of seconds, got '{}'", key, raw)
                    }),
                None => Ok(default),
            }
        };

        let cascade = match lookup("KUBEPIPE_DELETE_CASCADE") {
            Some(raw) => raw
                .parse::<CascadePolicy>()
                .map_err(|e| anyhow::anyhow!("KUBEPIPE_DELETE_CASCADE: {}", e))?,
            None => defaults.cascade,
        };

        Ok(Self {
            prepare_timeout: seconds("KUBEPIPE_PREPARE_TIMEOUT", defaults.prepare_timeout)?,
            stage_timeout: seconds("KUBEPIPE_STAGE_TIMEOUT", defaults.stage_timeout)?,
            watch_retry_interval: seconds(
                "KUBEPIPE_WATCH_RETRY_INTERVAL",
                defaults.watch_retry_interval,
            )?,
            log_grace_period: seconds("KUBEPIPE_LOG_GRACE_PERIOD", defaults.log_grace_period)?,
            cascade,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.prepare_timeout.is_zero() {
            anyhow::bail!("prepare_timeout must be greater than 0");
        }

        if self.stage_timeout.is_zero() {
            anyhow::bail!("stage_timeout must be greater than 0");
        }

        if self.watch_retry_interval.is_zero() {
            anyhow::bail!("watch_retry_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.prepare_timeout, Duration::from_secs(3600));
        assert_eq!(config.stage_timeout, Duration::from_secs(1800));
        assert_eq!(config.watch_retry_interval, Duration::from_secs(3));
        assert_eq!(config.log_grace_period, Duration::from_secs(5));
        assert_eq!(config.cascade, CascadePolicy::Foreground);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("KUBEPIPE_STAGE_TIMEOUT", "90"),
            ("KUBEPIPE_LOG_GRACE_PERIOD", "0"),
            ("KUBEPIPE_DELETE_CASCADE", "Background"),
        ]))
        .unwrap();

        assert_eq!(config.stage_timeout, Duration::from_secs(90));
        assert_eq!(config.log_grace_period, Duration::ZERO);
        assert_eq!(config.prepare_timeout, Duration::from_secs(3600));
        assert_eq!(config.cascade, CascadePolicy::Background);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(RunnerConfig::from_lookup(lookup(&[("KUBEPIPE_STAGE_TIMEOUT", "soon")])).is_err());
        assert!(
            RunnerConfig::from_lookup(lookup(&[("KUBEPIPE_DELETE_CASCADE", "eventually")]))
                .is_err()
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::default();
        assert!(config.validate().is_ok());

        config.watch_retry_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.watch_retry_interval = Duration::from_secs(1);
        config.stage_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
