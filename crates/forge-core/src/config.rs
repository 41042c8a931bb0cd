//! Solver configuration.
//!
//! [`SolverSettings`] holds every tunable and loads from YAML or JSON.
//! [`SolverConfig`] pairs the settings with the backend handle.
//!
//! ```yaml
//! optimizer_name: COBYLA
//! maxiter: 200
//! shots: 4096
//! seed: 7
//! max_concurrent_jobs: 4
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use forge_hal::Backend;
use forge_ops::MapperKind;

use crate::error::{ForgeError, ForgeResult};
use crate::optimizer::OptimizerKind;

/// Tunables of a forged solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// `SPSA`, `COBYLA` or `NELDER-MEAD` (case-insensitive).
    #[serde(default = "default_optimizer_name")]
    pub optimizer_name: String,

    /// Maximum optimizer update steps. Zero evaluates the initial point only.
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,

    /// Starting parameters; zeros when absent.
    #[serde(default)]
    pub initial_params: Option<Vec<f64>>,

    /// Convergence tolerance (energy change or simplex/trust radius).
    #[serde(default = "default_optimizer_tol")]
    pub optimizer_tol: f64,

    /// SPSA learning-rate numerator.
    #[serde(default = "default_spsa_c0")]
    pub spsa_c0: f64,

    /// SPSA perturbation numerator.
    #[serde(default = "default_spsa_c1")]
    pub spsa_c1: f64,

    /// Average the last N SPSA iterates into the final parameters.
    #[serde(default = "default_spsa_last_average")]
    pub spsa_last_average: usize,

    /// Offset of the SPSA iteration counter, for resumed runs.
    #[serde(default)]
    pub initial_spsa_iteration_idx: usize,

    /// Initial COBYLA trust radius.
    #[serde(default = "default_rhobeg")]
    pub rhobeg: f64,

    /// Shots per Pauli term; exact expectation values when absent.
    #[serde(default)]
    pub shots: Option<u32>,

    /// Base seed for sampling and SPSA perturbations.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fermion-to-qubit mapper name.
    #[serde(default = "default_mapper")]
    pub mapper: String,

    /// Backend jobs in flight per energy evaluation.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Per-job timeout in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// Retries for transient backend errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds, doubled per attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Wall-clock budget for the whole solve in seconds.
    #[serde(default)]
    pub time_budget_secs: Option<f64>,

    /// Report particle numbers and an energy breakdown.
    #[serde(default)]
    pub compute_aux_operators: bool,
}

fn default_optimizer_name() -> String {
    "SPSA".to_string()
}

fn default_maxiter() -> usize {
    100
}

fn default_optimizer_tol() -> f64 {
    1e-6
}

fn default_spsa_c0() -> f64 {
    2.0 * PI
}

fn default_spsa_c1() -> f64 {
    0.1
}

fn default_spsa_last_average() -> usize {
    1
}

fn default_rhobeg() -> f64 {
    0.5
}

fn default_seed() -> u64 {
    42
}

fn default_mapper() -> String {
    "jordan_wigner".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    8
}

fn default_job_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    100
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            optimizer_name: default_optimizer_name(),
            maxiter: default_maxiter(),
            initial_params: None,
            optimizer_tol: default_optimizer_tol(),
            spsa_c0: default_spsa_c0(),
            spsa_c1: default_spsa_c1(),
            spsa_last_average: default_spsa_last_average(),
            initial_spsa_iteration_idx: 0,
            rhobeg: default_rhobeg(),
            shots: None,
            seed: default_seed(),
            mapper: default_mapper(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: default_job_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            time_budget_secs: None,
            compute_aux_operators: false,
        }
    }
}

impl SolverSettings {
    /// Load from a `.yaml`/`.yml` or `.json` file and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))?;

        let settings: SolverSettings = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))?,
            Some("yaml" | "yml") => serde_yaml_ng::from_str(&contents)
                .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))?,
            _ => {
                return Err(ForgeError::Config(format!(
                    "{}: expected a .yaml, .yml or .json file",
                    path.display()
                )));
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check names and limits.
    pub fn validate(&self) -> ForgeResult<()> {
        self.optimizer_kind()?;
        self.mapper_kind()?;

        if self.max_concurrent_jobs == 0 {
            return Err(ForgeError::Config(
                "max_concurrent_jobs must be greater than 0".to_string(),
            ));
        }
        if self.shots == Some(0) {
            return Err(ForgeError::Config("shots must be greater than 0".to_string()));
        }
        if self.optimizer_tol.is_nan() || self.optimizer_tol <= 0.0 {
            return Err(ForgeError::Config("optimizer_tol must be positive".to_string()));
        }
        if self.rhobeg.is_nan() || self.rhobeg <= 0.0 {
            return Err(ForgeError::Config("rhobeg must be positive".to_string()));
        }
        if self.job_timeout_secs == 0 {
            return Err(ForgeError::Config("job_timeout_secs must be greater than 0".to_string()));
        }
        if let Some(budget) = self.time_budget_secs {
            if Duration::try_from_secs_f64(budget).is_err() {
                return Err(ForgeError::Config(format!(
                    "time_budget_secs must be a non-negative number, got {budget}"
                )));
            }
        }
        if let Some(params) = &self.initial_params {
            if params.iter().any(|p| !p.is_finite()) {
                return Err(ForgeError::Config(
                    "initial_params must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parsed optimizer name.
    pub fn optimizer_kind(&self) -> ForgeResult<OptimizerKind> {
        self.optimizer_name.parse()
    }

    /// Parsed mapper name.
    pub fn mapper_kind(&self) -> ForgeResult<MapperKind> {
        self.mapper
            .parse::<MapperKind>()
            .map_err(|e| ForgeError::Config(e.to_string()))
    }

    /// Per-job timeout.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Base retry backoff.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Wall-clock budget, if any.
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs_f64)
    }
}

/// Settings plus the backend that executes the circuits.
#[derive(Clone)]
pub struct SolverConfig {
    /// Estimator backend.
    pub backend: Arc<dyn Backend>,
    /// Tunables.
    pub settings: SolverSettings,
}

impl SolverConfig {
    /// Default settings on `backend`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            settings: SolverSettings::default(),
        }
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for SolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverConfig")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SolverSettings::default();
        assert_eq!(settings.optimizer_kind().unwrap(), OptimizerKind::Spsa);
        assert_eq!(settings.mapper_kind().unwrap(), MapperKind::JordanWigner);
        assert_eq!(settings.max_concurrent_jobs, 8);
        assert_eq!(settings.job_timeout(), Duration::from_secs(60));
        assert!(settings.time_budget().is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: SolverSettings =
            serde_yaml_ng::from_str("optimizer_name: nm\nmaxiter: 0\nshots: 128\n").unwrap();
        assert_eq!(settings.optimizer_kind().unwrap(), OptimizerKind::NelderMead);
        assert_eq!(settings.maxiter, 0);
        assert_eq!(settings.shots, Some(128));
        assert_eq!(settings.seed, 42);
        assert!((settings.spsa_c0 - 2.0 * PI).abs() < 1e-15);
    }

    #[test]
    fn test_validate_rejects() {
        let bad = [
            SolverSettings {
                optimizer_name: "adam".into(),
                ..Default::default()
            },
            SolverSettings {
                mapper: "bravyi_kitaev".into(),
                ..Default::default()
            },
            SolverSettings {
                max_concurrent_jobs: 0,
                ..Default::default()
            },
            SolverSettings {
                shots: Some(0),
                ..Default::default()
            },
            SolverSettings {
                time_budget_secs: Some(-1.0),
                ..Default::default()
            },
            SolverSettings {
                time_budget_secs: Some(1e300),
                ..Default::default()
            },
            SolverSettings {
                job_timeout_secs: 0,
                ..Default::default()
            },
        ];
        for settings in bad {
            assert!(matches!(settings.validate(), Err(ForgeError::Config(_))), "{settings:?}");
        }
    }
}
