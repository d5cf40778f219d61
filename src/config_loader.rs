use crate::config::{seconds_to_duration, ConfigError, SimulationConfig};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<SimulationConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file '{}'", config_path.display()))?;

    let config: SimulationConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// CLI arguments that override file or default settings, in seconds
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub agents: Option<usize>,
    pub run_time: Option<f64>,
    pub max_think: Option<f64>,
    pub max_eat: Option<f64>,
    pub timeout: Option<f64>,
    pub starvation_limit: Option<f64>,
}

/// Apply CLI overrides to a configuration and re-validate it
pub fn apply_cli_overrides(
    config: &mut SimulationConfig,
    overrides: &CliOverrides,
) -> Result<(), ConfigError> {
    if let Some(agents) = overrides.agents {
        config.agents = agents;
    }

    let seconds = [
        ("run-time", overrides.run_time, &mut config.run_time),
        ("max-think", overrides.max_think, &mut config.max_think),
        ("max-eat", overrides.max_eat, &mut config.max_eat),
        ("timeout", overrides.timeout, &mut config.acquire_timeout),
        ("starvation-limit", overrides.starvation_limit, &mut config.starvation_limit),
    ];
    for (field, value, target) in seconds {
        if let Some(value) = value {
            *target = seconds_to_duration(field, value)?;
        }
    }

    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "agents: 3\nrun_time: 2s\nstarvation_limit: 500ms").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.agents, 3);
        assert_eq!(config.run_time, Duration::from_secs(2));
        assert_eq!(config.starvation_limit, Duration::from_millis(500));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "agents: 1").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/dinesim.yaml")).is_err());
    }

    #[test]
    fn test_overrides_replace_values() {
        let mut config = SimulationConfig::default();
        let overrides = CliOverrides {
            run_time: Some(3.0),
            timeout: Some(0.5),
            ..Default::default()
        };

        apply_cli_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.run_time, Duration::from_secs(3));
        assert_eq!(config.acquire_timeout, Duration::from_millis(500));
        assert_eq!(config.max_eat, Duration::from_secs(1));
    }

    #[test]
    fn test_negative_override_rejected() {
        let mut config = SimulationConfig::default();
        let overrides = CliOverrides {
            run_time: Some(-1.0),
            ..Default::default()
        };

        assert!(matches!(
            apply_cli_overrides(&mut config, &overrides),
            Err(ConfigError::InvalidSeconds { field: "run-time", .. })
        ));
    }
}
