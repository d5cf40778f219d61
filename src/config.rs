//! Simulation configuration.
//!
//! A [`SimulationConfig`] is built once (from defaults, a YAML file and/or
//! command-line overrides), validated, and then handed to the
//! [`Coordinator`](crate::coordinator::Coordinator), which shares it read-only
//! with every agent for the duration of the run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of agents seated around the ring
pub const DEFAULT_AGENTS: usize = 5;

/// Immutable parameters of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of agents (and resources) in the ring
    pub agents: usize,
    /// Total wall-clock duration of the run
    #[serde(with = "humantime_serde")]
    pub run_time: Duration,
    /// Upper bound added on top of the 50ms base think sleep
    #[serde(with = "humantime_serde")]
    pub max_think: Duration,
    /// Upper bound added on top of the 50ms base eat sleep
    #[serde(with = "humantime_serde")]
    pub max_eat: Duration,
    /// Budget for acquiring both resources in one attempt
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// Time since the last meal after which an agent is flagged as starving
    #[serde(with = "humantime_serde")]
    pub starvation_limit: Duration,
    /// How long shutdown waits for agent threads before abandoning them
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agents: DEFAULT_AGENTS,
            run_time: Duration::from_secs(10),
            max_think: Duration::from_millis(1500),
            max_eat: Duration::from_secs(1),
            acquire_timeout: Duration::from_secs(1),
            starvation_limit: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl SimulationConfig {
    /// Validate the configuration
    ///
    /// Every duration must be strictly positive and the ring needs at least
    /// two agents so that each one has two distinct neighbours.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents < 2 {
            return Err(ConfigError::TooFewAgents(self.agents));
        }

        let durations = [
            ("run-time", self.run_time),
            ("max-think", self.max_think),
            ("max-eat", self.max_eat),
            ("timeout", self.acquire_timeout),
            ("starvation-limit", self.starvation_limit),
            ("shutdown-grace", self.shutdown_grace),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::NonPositiveDuration { field });
            }
        }

        Ok(())
    }
}

/// Convert a user-supplied number of seconds into a [`Duration`].
///
/// Rejects zero, negative, NaN and infinite values.
///
/// # Examples
/// ```
/// use dinesim::config::seconds_to_duration;
/// use std::time::Duration;
///
/// assert_eq!(seconds_to_duration("timeout", 1.5), Ok(Duration::from_millis(1500)));
/// assert!(seconds_to_duration("timeout", 0.0).is_err());
/// assert!(seconds_to_duration("run-time", -1.0).is_err());
/// ```
pub fn seconds_to_duration(field: &'static str, seconds: f64) -> Result<Duration, ConfigError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::InvalidSeconds { field, value: seconds });
    }
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| ConfigError::InvalidSeconds { field, value: seconds })?;
    if duration.is_zero() {
        return Err(ConfigError::NonPositiveDuration { field });
    }
    Ok(duration)
}

/// Configuration errors, raised before any resource or agent exists
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NonPositiveDuration { field: &'static str },
    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },
    #[error("at least 2 agents are required to form a ring, got {0}")]
    TooFewAgents(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agents, 5);
        assert_eq!(config.run_time, Duration::from_secs(10));
        assert_eq!(config.max_think, Duration::from_millis(1500));
        assert_eq!(config.max_eat, Duration::from_secs(1));
        assert_eq!(config.acquire_timeout, Duration::from_secs(1));
        assert_eq!(config.starvation_limit, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let config = SimulationConfig {
            acquire_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositiveDuration { field: "timeout" })
        );
    }

    #[test]
    fn test_single_agent_rejected() {
        let config = SimulationConfig {
            agents: 1,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TooFewAgents(1)));
    }

    #[test]
    fn test_seconds_conversion() {
        assert_eq!(
            seconds_to_duration("max-eat", 0.25),
            Ok(Duration::from_millis(250))
        );
        assert!(matches!(
            seconds_to_duration("run-time", -1.0),
            Err(ConfigError::InvalidSeconds { field: "run-time", .. })
        ));
        assert!(seconds_to_duration("run-time", f64::NAN).is_err());
        assert!(seconds_to_duration("run-time", f64::INFINITY).is_err());
        // Below nanosecond resolution rounds to zero
        assert!(seconds_to_duration("run-time", 1e-12).is_err());
    }

    #[test]
    fn test_parse_yaml_with_human_durations() {
        let yaml = r#"
agents: 7
run_time: 3s
max_think: 100ms
acquire_timeout: 250ms
"#;
        let config: SimulationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.agents, 7);
        assert_eq!(config.run_time, Duration::from_secs(3));
        assert_eq!(config.max_think, Duration::from_millis(100));
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
        // Unspecified keys keep their defaults
        assert_eq!(config.max_eat, Duration::from_secs(1));
        assert_eq!(config.starvation_limit, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_yaml_key_rejected() {
        let yaml = "agents: 5\nphilosophers: 3\n";
        assert!(serde_yaml::from_str::<SimulationConfig>(yaml).is_err());
    }
}
