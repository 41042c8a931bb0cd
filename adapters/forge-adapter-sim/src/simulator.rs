//! Simulator backend implementation.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

use forge_hal::{
    Backend, BackendAvailability, BackendConfig, BackendFactory, Capabilities, EstimatorRequest,
    EstimatorResult, HalError, HalResult, Job, JobId, JobStatus, ValidationResult,
};
use forge_ops::Observable;

use crate::statevector::Statevector;

const DEFAULT_MAX_QUBITS: u32 = 20;

/// Job data for the simulator.
struct SimJob {
    job: Job,
    result: EstimatorResult,
}

/// Local statevector estimator.
///
/// Exact requests return `⟨ψ|O|ψ⟩` directly. Sampled requests draw
/// `shots` ±1 outcomes per non-identity Pauli term from the exact
/// distribution, seeded by the request seed.
///
/// Jobs run inside `submit`. A job is kept until its result is fetched;
/// `run` never stores one.
pub struct SimulatorBackend {
    config: BackendConfig,
    capabilities: Capabilities,
    jobs: Arc<Mutex<FxHashMap<String, SimJob>>>,
}

impl SimulatorBackend {
    /// Create a new simulator backend with default settings.
    pub fn new() -> Self {
        Self::with_max_qubits(DEFAULT_MAX_QUBITS)
    }

    /// Create a simulator with custom max qubits.
    pub fn with_max_qubits(max_qubits: u32) -> Self {
        Self::build(BackendConfig::new("simulator"), max_qubits)
    }

    fn build(config: BackendConfig, max_qubits: u32) -> Self {
        let mut capabilities = Capabilities::simulator(max_qubits);
        capabilities.name.clone_from(&config.name);
        Self {
            config,
            capabilities,
            jobs: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Run the estimation synchronously.
    #[instrument(skip(self, request), fields(qubits = request.circuit.num_qubits()))]
    fn estimate(&self, request: &EstimatorRequest) -> HalResult<EstimatorResult> {
        let start = Instant::now();

        let mut sv = Statevector::new(request.circuit.num_qubits());
        for inst in request.circuit.instructions() {
            sv.apply(inst)?;
        }

        let result = match request.shots {
            None => EstimatorResult::exact(
                request
                    .observables
                    .iter()
                    .map(|o| sv.observable_expectation(o))
                    .collect(),
            ),
            Some(shots) => {
                let mut rng = match request.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let (values, variances) = request
                    .observables
                    .iter()
                    .map(|o| sample_observable(&sv, o, shots, &mut rng))
                    .unzip();
                EstimatorResult {
                    values,
                    variances,
                    shots: Some(shots),
                    execution_time_ms: None,
                }
            }
        };

        let elapsed = start.elapsed();
        debug!(
            observables = request.observables.len(),
            "Estimation completed in {:?}", elapsed
        );
        Ok(result.with_execution_time(elapsed.as_millis() as u64))
    }

    /// Number of jobs whose results have not been fetched yet.
    pub fn pending_jobs(&self) -> usize {
        self.lock_jobs().len()
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, SimJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Estimate `⟨O⟩` and its variance from `shots` samples per Pauli term.
fn sample_observable(
    sv: &Statevector,
    observable: &Observable,
    shots: u32,
    rng: &mut StdRng,
) -> (f64, f64) {
    let mut value = 0.0;
    let mut variance = 0.0;
    for (pauli, coeff) in observable.terms() {
        if pauli.is_identity() {
            value += coeff;
            continue;
        }
        let exact = sv.expectation(pauli);
        let p_plus = ((1.0 + exact) / 2.0).clamp(0.0, 1.0);
        let plus = (0..shots).filter(|_| rng.gen_bool(p_plus)).count() as f64;
        let mean = (2.0 * plus - f64::from(shots)) / f64::from(shots);
        value += coeff * mean;
        variance += coeff * coeff * (1.0 - mean * mean) / f64::from(shots);
    }
    (value, variance)
}

impl Default for SimulatorBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for SimulatorBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn availability(&self) -> HalResult<BackendAvailability> {
        Ok(BackendAvailability::always_available())
    }

    #[instrument(skip(self, request))]
    async fn submit(&self, request: &EstimatorRequest) -> HalResult<JobId> {
        if let ValidationResult::Invalid { reasons } = self.validate(request).await? {
            return Err(HalError::CircuitTooLarge(reasons.join("; ")));
        }

        let job_id = JobId::new(Uuid::new_v4().to_string());
        let mut job = Job::new(job_id.clone(), request.observables.len(), request.shots)
            .with_backend(self.name());
        debug!("Submitted job: {}", job_id);

        let result = self.estimate(request)?;
        job.transition(JobStatus::Completed);
        self.lock_jobs().insert(
            job_id.0.clone(),
            SimJob {
                job,
                result,
            },
        );
        Ok(job_id)
    }

    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        self.lock_jobs()
            .get(&job_id.0)
            .map(|j| j.job.status.clone())
            .ok_or_else(|| HalError::JobNotFound(job_id.0.clone()))
    }

    async fn result(&self, job_id: &JobId) -> HalResult<EstimatorResult> {
        self.lock_jobs()
            .remove(&job_id.0)
            .map(|j| j.result)
            .ok_or_else(|| HalError::JobNotFound(job_id.0.clone()))
    }

    async fn cancel(&self, job_id: &JobId) -> HalResult<()> {
        // Jobs finish inside submit; cancelling only discards the result.
        match self.lock_jobs().remove(&job_id.0) {
            Some(_) => Ok(()),
            None => Err(HalError::JobNotFound(job_id.0.clone())),
        }
    }

    async fn run(&self, request: &EstimatorRequest) -> HalResult<EstimatorResult> {
        if let ValidationResult::Invalid { reasons } = self.validate(request).await? {
            return Err(HalError::CircuitTooLarge(reasons.join("; ")));
        }
        self.estimate(request)
    }
}

impl BackendFactory for SimulatorBackend {
    fn from_config(config: BackendConfig) -> HalResult<Self> {
        let max_qubits = match config.extra.get("max_qubits") {
            None => DEFAULT_MAX_QUBITS,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|&n| n <= 30)
                .ok_or_else(|| {
                    HalError::Configuration(format!("max_qubits must be an integer <= 30, got {v}"))
                })?,
        };
        Ok(Self::build(config, max_qubits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_ir::{Circuit, QubitId};
    use forge_ops::{PauliOp, PauliString};

    fn bell() -> Circuit {
        let mut c = Circuit::new("bell", 2);
        c.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        c
    }

    fn zz() -> Observable {
        Observable::from_terms([(
            PauliString::from_ops([(0, PauliOp::Z), (1, PauliOp::Z)]),
            1.0,
        )])
    }

    fn z0() -> Observable {
        Observable::from_terms([(PauliString::single(0, PauliOp::Z), 1.0)])
    }

    #[tokio::test]
    async fn test_simulator_capabilities() {
        let backend = SimulatorBackend::new();
        let caps = backend.capabilities();

        assert!(caps.is_simulator);
        assert!(caps.supports_exact);
        assert_eq!(caps.num_qubits, 20);
    }

    #[tokio::test]
    async fn test_exact_bell_correlations() {
        let backend = SimulatorBackend::new();
        let request = EstimatorRequest::new(bell(), vec![zz(), z0()]);

        let job_id = backend.submit(&request).await.unwrap();
        assert!(backend.status(&job_id).await.unwrap().is_success());

        let result = backend.result(&job_id).await.unwrap();
        approx::assert_abs_diff_eq!(result.values[0], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(result.values[1], 0.0, epsilon = 1e-12);
        assert_eq!(result.variances, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_sampled_is_seeded() {
        let backend = SimulatorBackend::new();
        let request = EstimatorRequest::new(bell(), vec![z0()])
            .with_shots(Some(2000))
            .with_seed(7);

        let a = backend.run(&request).await.unwrap();
        let b = backend.run(&request).await.unwrap();
        assert_eq!(a.values, b.values);
        assert_eq!(a.shots, Some(2000));
        // ⟨Z0⟩ = 0 on a Bell pair; 2000 shots keep the estimate well inside 0.2
        assert!(a.values[0].abs() < 0.2);
        assert!(a.variances[0] > 0.0);
    }

    #[tokio::test]
    async fn test_sampled_deterministic_term() {
        let backend = SimulatorBackend::new();
        let request = EstimatorRequest::new(bell(), vec![zz()])
            .with_shots(Some(100))
            .with_seed(1);
        let result = backend.run(&request).await.unwrap();
        assert_eq!(result.values, vec![1.0]);
    }

    #[tokio::test]
    async fn test_simulator_too_many_qubits() {
        let backend = SimulatorBackend::with_max_qubits(5);
        let request = EstimatorRequest::new(Circuit::new("test", 10), vec![]);

        let result = backend.submit(&request).await;
        assert!(matches!(result, Err(HalError::CircuitTooLarge(_))));
        assert!(matches!(
            backend.run(&request).await,
            Err(HalError::CircuitTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_jobs_released_after_result() {
        let backend = SimulatorBackend::new();
        let request = EstimatorRequest::new(bell(), vec![zz()]);

        for _ in 0..100 {
            backend.run(&request).await.unwrap();
        }
        assert_eq!(backend.pending_jobs(), 0);

        let job_id = backend.submit(&request).await.unwrap();
        assert_eq!(backend.pending_jobs(), 1);
        let result = backend.wait(&job_id).await.unwrap();
        assert_eq!(result.values, vec![1.0]);
        assert_eq!(backend.pending_jobs(), 0);
        assert!(matches!(
            backend.result(&job_id).await,
            Err(HalError::JobNotFound(_))
        ));

        let job_id = backend.submit(&request).await.unwrap();
        backend.cancel(&job_id).await.unwrap();
        assert_eq!(backend.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn test_failed_estimate_is_not_stored() {
        let backend = SimulatorBackend::new();
        let mut circuit = Circuit::new("unbound", 1);
        circuit.ry("theta", QubitId(0)).unwrap();
        let request = EstimatorRequest::new(circuit, vec![z0()]);

        assert!(backend.submit(&request).await.is_err());
        assert!(backend.run(&request).await.is_err());
        assert_eq!(backend.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let backend = SimulatorBackend::new();
        let missing = JobId::new("missing");
        assert!(matches!(
            backend.status(&missing).await,
            Err(HalError::JobNotFound(_))
        ));
        assert!(backend.cancel(&missing).await.is_err());
    }

    #[test]
    fn test_from_config() {
        let config = BackendConfig::new("local").with_extra("max_qubits", serde_json::json!(12));
        let backend = SimulatorBackend::from_config(config).unwrap();
        assert_eq!(backend.capabilities().num_qubits, 12);
        assert_eq!(backend.name(), "local");

        let bad = BackendConfig::new("local").with_extra("max_qubits", serde_json::json!("many"));
        assert!(matches!(
            SimulatorBackend::from_config(bad),
            Err(HalError::Configuration(_))
        ));
    }
}
