//! Backend trait and configuration.
//!
//! The [`Backend`] trait defines the lifecycle of an estimator job:
//!
//! ```text
//!   capabilities() ──→ validate() ──→ submit() ──→ status() ──→ result()
//!    (sync, &ref)       (async)       (async)      (async)      (async)
//! ```
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `capabilities()` | sync | yes | `&Capabilities` |
//! | `availability()` | async | yes | `HalResult<BackendAvailability>` |
//! | `validate()` | async | provided | `HalResult<ValidationResult>` |
//! | `submit()` | async | yes | `HalResult<JobId>` |
//! | `status()` | async | yes | `HalResult<JobStatus>` |
//! | `result()` | async | yes | `HalResult<EstimatorResult>` |
//! | `cancel()` | async | yes | `HalResult<()>` |
//! | `wait()` | async | provided | `HalResult<EstimatorResult>` |
//! | `run()` | async | provided | `HalResult<EstimatorResult>` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::Capabilities;
use crate::error::{HalError, HalResult};
use crate::estimator::{EstimatorRequest, EstimatorResult};
use crate::job::{JobId, JobStatus};

/// Default interval between status polls in [`Backend::wait`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default upper bound on [`Backend::wait`].
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for a backend instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name of the backend.
    pub name: String,
    /// Backend-specific settings.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Add extra configuration.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Trait for estimator backends.
///
/// # Contract
///
/// - `capabilities()` is synchronous and infallible; implementations cache
///   it at construction time.
/// - `submit()` returns a `JobId` whose initial status is `Queued` (or a
///   later state if the backend runs the job immediately).
/// - `result()` is only called once status is `Completed`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the capabilities of this backend.
    fn capabilities(&self) -> &Capabilities;

    /// Check backend availability with queue depth information.
    async fn availability(&self) -> HalResult<BackendAvailability>;

    /// Validate a request against backend constraints.
    ///
    /// The default checks the request structure, the qubit count, shot
    /// limits and whether exact evaluation is supported.
    async fn validate(&self, request: &EstimatorRequest) -> HalResult<ValidationResult> {
        request.check()?;
        let caps = self.capabilities();
        let mut reasons = vec![];
        if request.circuit.num_qubits() > caps.num_qubits as usize {
            reasons.push(format!(
                "circuit has {} qubits, backend supports {}",
                request.circuit.num_qubits(),
                caps.num_qubits
            ));
        }
        match request.shots {
            Some(shots) if shots > caps.max_shots => {
                reasons.push(format!("{shots} shots exceed the limit of {}", caps.max_shots));
            }
            None if !caps.supports_exact => {
                reasons.push("exact evaluation is not supported".into());
            }
            _ => {}
        }
        if reasons.is_empty() {
            Ok(ValidationResult::Valid)
        } else {
            Ok(ValidationResult::Invalid { reasons })
        }
    }

    /// Submit a request for execution.
    async fn submit(&self, request: &EstimatorRequest) -> HalResult<JobId>;

    /// Get the status of a job.
    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus>;

    /// Get the result of a completed job.
    async fn result(&self, job_id: &JobId) -> HalResult<EstimatorResult>;

    /// Cancel a running job.
    async fn cancel(&self, job_id: &JobId) -> HalResult<()>;

    /// Wait for a job with the default poll interval and timeout.
    async fn wait(&self, job_id: &JobId) -> HalResult<EstimatorResult> {
        self.wait_with(job_id, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT)
            .await
    }

    /// Poll `status()` every `poll` until the job is terminal or `timeout`
    /// has elapsed.
    async fn wait_with(
        &self,
        job_id: &JobId,
        poll: Duration,
        timeout: Duration,
    ) -> HalResult<EstimatorResult> {
        // None: the deadline lies beyond what Instant can represent
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        loop {
            match self.status(job_id).await? {
                JobStatus::Completed => return self.result(job_id).await,
                JobStatus::Failed(msg) => return Err(HalError::JobFailed(msg)),
                JobStatus::Cancelled => return Err(HalError::JobCancelled),
                JobStatus::Queued | JobStatus::Running => {
                    if deadline.is_some_and(|d| tokio::time::Instant::now() + poll > d) {
                        return Err(HalError::Timeout(job_id.0.clone()));
                    }
                    debug!(job_id = %job_id, "job pending, polling again");
                    tokio::time::sleep(poll).await;
                }
            }
        }
    }

    /// Validate, submit and wait in one call.
    async fn run(&self, request: &EstimatorRequest) -> HalResult<EstimatorResult> {
        if let ValidationResult::Invalid { reasons } = self.validate(request).await? {
            return Err(HalError::InvalidCircuit(reasons.join("; ")));
        }
        let job_id = self.submit(request).await?;
        self.wait(&job_id).await
    }
}

/// Backend availability information.
#[derive(Debug, Clone)]
pub struct BackendAvailability {
    /// Whether the backend is currently accepting jobs.
    pub is_available: bool,
    /// Number of jobs currently in queue (if known).
    pub queue_depth: Option<u32>,
    /// Human-readable status message.
    pub status_message: Option<String>,
}

impl BackendAvailability {
    /// Create availability for a backend that is always available.
    pub fn always_available() -> Self {
        Self {
            is_available: true,
            queue_depth: Some(0),
            status_message: None,
        }
    }

    /// Create availability for an offline backend.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            is_available: false,
            queue_depth: None,
            status_message: Some(reason.into()),
        }
    }
}

/// Result of request validation against backend constraints.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Request can be submitted as-is.
    Valid,
    /// Request cannot run on this backend.
    Invalid {
        /// Reasons the request is invalid.
        reasons: Vec<String>,
    },
}

impl ValidationResult {
    /// Check if the request is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Trait for creating backends from configuration.
pub trait BackendFactory: Backend + Sized {
    /// Create a backend from configuration.
    fn from_config(config: BackendConfig) -> HalResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_ir::Circuit;
    use std::sync::Mutex;

    /// Reports `Running` a fixed number of times, then a terminal status.
    struct ScriptedBackend {
        caps: Capabilities,
        pending_polls: Mutex<u32>,
        terminal: JobStatus,
    }

    impl ScriptedBackend {
        fn new(pending_polls: u32, terminal: JobStatus) -> Self {
            Self {
                caps: Capabilities::simulator(4),
                pending_polls: Mutex::new(pending_polls),
                terminal,
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn capabilities(&self) -> &Capabilities {
            &self.caps
        }

        async fn availability(&self) -> HalResult<BackendAvailability> {
            Ok(BackendAvailability::always_available())
        }

        async fn submit(&self, _request: &EstimatorRequest) -> HalResult<JobId> {
            Ok(JobId::new("scripted-1"))
        }

        async fn status(&self, _job_id: &JobId) -> HalResult<JobStatus> {
            let mut left = self.pending_polls.lock().unwrap();
            if *left == 0 {
                Ok(self.terminal.clone())
            } else {
                *left -= 1;
                Ok(JobStatus::Running)
            }
        }

        async fn result(&self, _job_id: &JobId) -> HalResult<EstimatorResult> {
            Ok(EstimatorResult::exact(vec![1.0]))
        }

        async fn cancel(&self, _job_id: &JobId) -> HalResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_backend_config() {
        let config = BackendConfig::new("test").with_extra("max_qubits", serde_json::json!(8));
        assert_eq!(config.name, "test");
        assert!(config.extra.contains_key("max_qubits"));
    }

    #[test]
    fn test_backend_availability() {
        assert!(BackendAvailability::always_available().is_available);
        let down = BackendAvailability::unavailable("maintenance");
        assert!(!down.is_available);
        assert_eq!(down.status_message, Some("maintenance".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_polls_until_complete() {
        let backend = ScriptedBackend::new(3, JobStatus::Completed);
        let result = backend.wait(&JobId::new("scripted-1")).await.unwrap();
        assert_eq!(result.values, vec![1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_surfaces_failure() {
        let backend = ScriptedBackend::new(1, JobStatus::Failed("calibration".into()));
        let err = backend.wait(&JobId::new("scripted-1")).await.unwrap_err();
        assert!(matches!(err, HalError::JobFailed(msg) if msg == "calibration"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let backend = ScriptedBackend::new(u32::MAX, JobStatus::Completed);
        let err = backend
            .wait_with(
                &JobId::new("scripted-1"),
                Duration::from_millis(100),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_validate_rejects_wide_circuit() {
        let backend = ScriptedBackend::new(0, JobStatus::Completed);
        let request = EstimatorRequest::new(Circuit::new("wide", 6), vec![]);
        let validation = backend.validate(&request).await.unwrap();
        assert!(!validation.is_valid());
        assert!(backend.run(&request).await.is_err());
    }
}
