//! TOML configuration for the controlled integrator
//!
//! Every field defaults to the reference scenario, so an empty file (or no
//! file at all) reproduces it. Lookup order:
//! 1. explicit path (CLI)
//! 2. `NEF_INTEGRATOR_CONFIG` environment variable
//! 3. built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use nef_core::{NeuronKind, PiecewiseSignal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const CONFIG_ENV: &str = "NEF_INTEGRATOR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct IntegratorConfig {
    pub simulation: SimulationConfig,
    pub ensemble: EnsembleConfig,
    pub synapses: SynapseConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Step size (s)
    pub dt: f64,
    /// Run length (s)
    pub duration: f64,
    /// RNG seed for neuron parameters; random when absent
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { dt: 0.001, duration: 1.4, seed: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnsembleConfig {
    pub n_neurons: usize,
    pub radius: f64,
    pub neuron: NeuronKind,
    pub tau_rc: f64,
    pub tau_ref: f64,
    pub max_rates: (f64, f64),
    pub intercepts: (f64, f64),
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            n_neurons: 225,
            radius: 1.5,
            neuron: NeuronKind::Lif,
            tau_rc: 0.02,
            tau_ref: 0.002,
            max_rates: (200.0, 400.0),
            intercepts: (-1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynapseConfig {
    /// Recurrent and input synapse; also scales the input transform
    pub integration_tau: f64,
    pub control_tau: f64,
    pub probe_tau: f64,
}

impl Default for SynapseConfig {
    fn default() -> Self {
        Self { integration_tau: 0.1, control_tau: 0.005, probe_tau: 0.01 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// `[time, value]` breakpoints of the integrated input
    pub input: Vec<(f64, f64)>,
    /// `[time, value]` breakpoints of the control signal
    pub control: Vec<(f64, f64)>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            input: vec![(0.2, 5.0), (0.3, 0.0), (0.44, -10.0), (0.54, 0.0), (0.8, 5.0), (0.9, 0.0)],
            control: vec![(0.0, 0.0), (0.6, -0.5)],
        }
    }
}

impl ScheduleConfig {
    pub fn input_signal(&self) -> ConfigResult<PiecewiseSignal> {
        PiecewiseSignal::scalar(&self.input)
            .map_err(|e| ConfigError::Validation(format!("schedule.input: {}", e)))
    }

    pub fn control_signal(&self) -> ConfigResult<PiecewiseSignal> {
        PiecewiseSignal::scalar(&self.control)
            .map_err(|e| ConfigError::Validation(format!("schedule.control: {}", e)))
    }
}

impl IntegratorConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Validation(format!("{} must be > 0, got {}", name, v)))
            }
        };

        positive("simulation.dt", self.simulation.dt)?;
        if !(self.simulation.duration.is_finite() && self.simulation.duration >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "simulation.duration must be >= 0, got {}",
                self.simulation.duration
            )));
        }
        if self.simulation.dt > self.simulation.duration && self.simulation.duration > 0.0 {
            return Err(ConfigError::Validation("simulation.dt exceeds simulation.duration".into()));
        }

        if self.ensemble.n_neurons == 0 {
            return Err(ConfigError::Validation("ensemble.n_neurons must be > 0".into()));
        }
        positive("ensemble.radius", self.ensemble.radius)?;
        positive("ensemble.tau_rc", self.ensemble.tau_rc)?;

        positive("synapses.integration_tau", self.synapses.integration_tau)?;
        positive("synapses.control_tau", self.synapses.control_tau)?;
        positive("synapses.probe_tau", self.synapses.probe_tau)?;

        self.schedule.input_signal()?;
        self.schedule.control_signal()?;
        Ok(())
    }
}

/// Load configuration from `path`, the environment, or defaults.
pub fn load_config(path: Option<&Path>) -> ConfigResult<IntegratorConfig> {
    resolve(path, std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

fn resolve(explicit: Option<&Path>, from_env: Option<PathBuf>) -> ConfigResult<IntegratorConfig> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "loading config");
        return IntegratorConfig::from_file(path);
    }
    if let Some(path) = from_env {
        info!(path = %path.display(), "loading config from {}", CONFIG_ENV);
        return IntegratorConfig::from_file(&path);
    }
    info!("no config file given, using built-in scenario");
    Ok(IntegratorConfig::default())
}
