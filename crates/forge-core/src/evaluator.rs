//! Schmidt pair evaluation.
//!
//! For one bound ansatz the evaluator measures every transition element
//! `A[x, y] = ⟨x|U† A U|y⟩` the energy needs, for every forging operator
//! `A` and every pair of bitstrings that meet in the Schmidt matrix.
//!
//! ```text
//!   BitstringSet ──→ PairArena ──→ states ──→ EstimatorRequest (one per state)
//!                                                    │ buffer_unordered
//!                                                    ▼
//!   MatrixElements ◀── ExpectationCache ◀── submit + wait (timeout, cancel, retry)
//! ```
//!
//! Diagonal elements come from basis states. Off-diagonal elements come
//! from the superpositions `(|x⟩ + i^k |y⟩)/√2`, measured at `k = 0, 2`
//! and, unless the ansatz is real, also at `k = 1, 3`.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use ndarray::Array3;
use num_complex::Complex64;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::{debug, instrument, warn};

use forge_hal::{
    Backend, DEFAULT_POLL_INTERVAL, EstimatorRequest, EstimatorResult, HalError, HalResult,
    ValidationResult,
};
use forge_ir::{Circuit, QubitId};
use forge_ops::QubitMapper;

use crate::bitstrings::{Bitstring, BitstringSet};
use crate::config::SolverSettings;
use crate::error::{ForgeError, ForgeResult};
use crate::operators::{ForgingOperators, OperatorLabel};

/// Unique bitstrings and unique `(u, v)` pairs of a [`BitstringSet`].
///
/// Bitstrings are stored sorted, so indices depend only on the set of
/// distinct bitstrings and not on the input order.
#[derive(Debug, Clone)]
pub struct PairArena {
    bitstrings: Vec<Bitstring>,
    pairs: Vec<(usize, usize)>,
    multiplicities: Vec<usize>,
    transitions: BTreeSet<(usize, usize)>,
}

impl PairArena {
    /// Deduplicate `set` into the arena.
    pub fn new(set: &BitstringSet) -> Self {
        let unique: BTreeSet<&Bitstring> = set.u().iter().chain(set.v()).collect();
        let bitstrings: Vec<Bitstring> = unique.into_iter().cloned().collect();
        let index: FxHashMap<&Bitstring, usize> =
            bitstrings.iter().enumerate().map(|(i, b)| (b, i)).collect();

        let mut pairs = Vec::new();
        let mut multiplicities = Vec::new();
        let mut seen: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        for (u, v) in set.pairs() {
            let key = (index[u], index[v]);
            match seen.get(&key) {
                Some(&slot) => multiplicities[slot] += 1,
                None => {
                    seen.insert(key, pairs.len());
                    pairs.push(key);
                    multiplicities.push(1);
                }
            }
        }

        let mut transitions = BTreeSet::new();
        for (a, &(ua, va)) in pairs.iter().enumerate() {
            for &(ub, vb) in &pairs[a + 1..] {
                for (x, y) in [(ua, ub), (va, vb)] {
                    if x != y {
                        transitions.insert((x.min(y), x.max(y)));
                    }
                }
            }
        }

        Self {
            bitstrings,
            pairs,
            multiplicities,
            transitions,
        }
    }

    /// Distinct bitstrings, sorted.
    pub fn bitstrings(&self) -> &[Bitstring] {
        &self.bitstrings
    }

    /// Distinct `(u, v)` pairs as indices into [`PairArena::bitstrings`],
    /// in order of first appearance.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Occurrences of each pair in the input.
    pub fn multiplicities(&self) -> &[usize] {
        &self.multiplicities
    }

    /// Bitstring pairs `x < y` whose transition elements are needed.
    pub fn transitions(&self) -> &BTreeSet<(usize, usize)> {
        &self.transitions
    }

    /// Bitstrings that occur on the `U` side of some pair.
    pub fn u_bitstrings(&self) -> Vec<&Bitstring> {
        self.pairs.iter().map(|&(u, _)| &self.bitstrings[u]).collect()
    }

    /// Bitstrings that occur on the `V` side of some pair.
    pub fn v_bitstrings(&self) -> Vec<&Bitstring> {
        self.pairs.iter().map(|&(_, v)| &self.bitstrings[v]).collect()
    }

    /// Every state to measure, basis states first.
    pub fn states(&self, real: bool) -> Vec<StateKey> {
        let phases: &[u8] = if real { &[0, 2] } else { &[0, 1, 2, 3] };
        let mut used = BTreeSet::new();
        for &(u, v) in &self.pairs {
            used.insert(u);
            used.insert(v);
        }
        used.into_iter()
            .map(StateKey::Basis)
            .chain(self.transitions.iter().flat_map(|&(x, y)| {
                phases
                    .iter()
                    .map(move |&phase| StateKey::Superposition { x, y, phase })
            }))
            .collect()
    }
}

/// A prepared state, by arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    /// `|x⟩`.
    Basis(usize),
    /// `(|x⟩ + i^phase |y⟩)/√2`.
    Superposition {
        /// First bitstring.
        x: usize,
        /// Second bitstring.
        y: usize,
        /// Power of `i`, `0..4`.
        phase: u8,
    },
}

/// Write-once store of measured expectation values.
#[derive(Debug, Default)]
pub struct ExpectationCache {
    values: FxHashMap<(StateKey, OperatorLabel), f64>,
}

impl ExpectationCache {
    /// Store `value` unless the key is already present. Returns whether it
    /// was stored.
    pub fn insert(&mut self, state: StateKey, label: OperatorLabel, value: f64) -> bool {
        let mut stored = false;
        self.values.entry((state, label)).or_insert_with(|| {
            stored = true;
            value
        });
        stored
    }

    /// Look up a value.
    pub fn get(&self, state: StateKey, label: OperatorLabel) -> Option<f64> {
        self.values.get(&(state, label)).copied()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, state: StateKey, label: OperatorLabel) -> ForgeResult<f64> {
        self.get(state, label).ok_or_else(|| {
            ForgeError::from(HalError::Backend(format!(
                "no expectation value for {label} on {state:?}"
            )))
        })
    }
}

/// Transition elements `[operator, x, y]` over the arena bitstrings.
///
/// Entries for bitstring pairs that never meet in the Schmidt matrix are
/// zero.
#[derive(Debug, Clone)]
pub struct MatrixElements {
    elements: Array3<Complex64>,
}

impl MatrixElements {
    /// Element of operator `op` between bitstrings `x` and `y`.
    pub fn get(&self, op: usize, x: usize, y: usize) -> Complex64 {
        self.elements[[op, x, y]]
    }

    /// The raw tensor.
    pub fn as_array(&self) -> &Array3<Complex64> {
        &self.elements
    }
}

/// Measures [`MatrixElements`] on a backend.
pub struct SchmidtPairEvaluator {
    backend: Arc<dyn Backend>,
    mapper: Arc<dyn QubitMapper>,
    operators: Arc<ForgingOperators>,
    arena: PairArena,
    shots: Option<u32>,
    seed: u64,
    max_concurrent_jobs: usize,
    job_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SchmidtPairEvaluator {
    /// Set up for one solve.
    pub fn new(
        backend: Arc<dyn Backend>,
        mapper: Arc<dyn QubitMapper>,
        operators: Arc<ForgingOperators>,
        arena: PairArena,
        settings: &SolverSettings,
    ) -> Self {
        Self {
            backend,
            mapper,
            operators,
            arena,
            shots: settings.shots,
            seed: settings.seed,
            max_concurrent_jobs: settings.max_concurrent_jobs.max(1),
            job_timeout: settings.job_timeout(),
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff(),
        }
    }

    /// The pair arena.
    pub fn arena(&self) -> &PairArena {
        &self.arena
    }

    /// Measure all required elements for the bound ansatz `ansatz`.
    ///
    /// `evaluation` enters the sampling seeds, so repeated evaluations of
    /// the same parameters see independent shot noise.
    #[instrument(skip(self, ansatz), fields(backend = %self.backend.name()))]
    pub async fn evaluate(&self, ansatz: &Circuit, evaluation: u64) -> ForgeResult<MatrixElements> {
        let states = self.arena.states(ansatz.is_real());
        let requests = states
            .iter()
            .map(|&state| Ok((state, self.request(state, ansatz, evaluation)?)))
            .collect::<ForgeResult<Vec<_>>>()?;
        debug!(
            states = states.len(),
            observables = self.operators.len(),
            "Dispatching estimator jobs"
        );

        let results: Vec<(StateKey, EstimatorResult)> = stream::iter(requests)
            .map(|(state, request)| async move {
                self.run_with_retry(&request)
                    .await
                    .map(|result| (state, result))
            })
            .buffer_unordered(self.max_concurrent_jobs)
            .try_collect()
            .await?;

        let labels = self.operators.labels();
        let mut cache = ExpectationCache::default();
        for (state, result) in results {
            if result.values.len() != labels.len() {
                return Err(HalError::Backend(format!(
                    "expected {} expectation values, got {}",
                    labels.len(),
                    result.values.len()
                ))
                .into());
            }
            for (label, &value) in labels.iter().zip(&result.values) {
                cache.insert(state, *label, value);
            }
        }
        self.elements(&cache, ansatz.is_real())
    }

    fn elements(&self, cache: &ExpectationCache, real: bool) -> ForgeResult<MatrixElements> {
        let n = self.arena.bitstrings.len();
        let labels = self.operators.labels();
        let mut elements = Array3::<Complex64>::zeros((labels.len(), n, n));
        let used: BTreeSet<usize> = self.arena.pairs.iter().flat_map(|&(u, v)| [u, v]).collect();

        for (op, &label) in labels.iter().enumerate() {
            for &x in &used {
                let value = cache.require(StateKey::Basis(x), label)?;
                elements[[op, x, x]] = Complex64::new(value, 0.0);
            }
            for &(x, y) in &self.arena.transitions {
                let e = |phase| cache.require(StateKey::Superposition { x, y, phase }, label);
                let re = 0.5 * (e(0)? - e(2)?);
                let im = if real { 0.0 } else { 0.5 * (e(3)? - e(1)?) };
                let value = Complex64::new(re, im);
                elements[[op, x, y]] = value;
                elements[[op, y, x]] = value.conj();
            }
        }
        Ok(MatrixElements { elements })
    }

    fn request(&self, state: StateKey, ansatz: &Circuit, evaluation: u64) -> ForgeResult<EstimatorRequest> {
        let mut circuit = self.prepare(state, ansatz.num_qubits() as u32)?;
        circuit.compose(ansatz)?;
        let request = EstimatorRequest::new(circuit, self.operators.observables().to_vec())
            .with_shots(self.shots);
        Ok(match self.shots {
            Some(_) => request.with_seed(self.state_seed(state, evaluation)),
            None => request,
        })
    }

    fn state_seed(&self, state: StateKey, evaluation: u64) -> u64 {
        let mut hasher = FxHasher::default();
        self.seed.hash(&mut hasher);
        evaluation.hash(&mut hasher);
        match state {
            StateKey::Basis(x) => self.arena.bitstrings[x].hash(&mut hasher),
            StateKey::Superposition { x, y, phase } => {
                self.arena.bitstrings[x].hash(&mut hasher);
                self.arena.bitstrings[y].hash(&mut hasher);
                phase.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Circuit preparing `state` from `|0…0⟩`.
    pub fn prepare(&self, state: StateKey, num_qubits: u32) -> ForgeResult<Circuit> {
        let encode = |i: usize| self.mapper.encode_occupation(self.arena.bitstrings[i].bits());
        let mut circuit = Circuit::new("state_prep", num_qubits);
        match state {
            StateKey::Basis(x) => {
                for (q, _) in encode(x).iter().enumerate().filter(|(_, b)| **b) {
                    circuit.x(QubitId(q as u32))?;
                }
            }
            StateKey::Superposition { x, y, phase } => {
                let (mut bx, mut by, mut phase) = (encode(x), encode(y), phase % 4);
                let Some(j) = bx.iter().zip(&by).position(|(a, b)| a != b) else {
                    return Err(ForgeError::InvalidBitstring(format!(
                        "{} and {} encode to the same state",
                        self.arena.bitstrings[x], self.arena.bitstrings[y]
                    )));
                };
                // |x⟩ + i^k |y⟩ ∝ |y⟩ + i^-k |x⟩
                if bx[j] {
                    std::mem::swap(&mut bx, &mut by);
                    phase = (4 - phase) % 4;
                }
                let pivot = QubitId(j as u32);
                circuit.h(pivot)?;
                match phase {
                    1 => {
                        circuit.s(pivot)?;
                    }
                    2 => {
                        circuit.z(pivot)?;
                    }
                    3 => {
                        circuit.sdg(pivot)?;
                    }
                    _ => {}
                }
                for (t, (&a, &b)) in bx.iter().zip(&by).enumerate() {
                    let target = QubitId(t as u32);
                    match (a, b) {
                        _ if t == j => {}
                        (true, true) => {
                            circuit.x(target)?;
                        }
                        (false, true) => {
                            circuit.cx(pivot, target)?;
                        }
                        (true, false) => {
                            circuit.x(target)?.cx(pivot, target)?;
                        }
                        (false, false) => {}
                    }
                }
            }
        }
        Ok(circuit)
    }

    async fn run_with_retry(&self, request: &EstimatorRequest) -> HalResult<EstimatorResult> {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let backoff = backoff(self.retry_backoff, attempt);
                warn!(
                    backend = %self.backend.name(),
                    attempt = attempt + 1,
                    "Retrying after transient failure (backoff {:?})",
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }

            match self.run_once(request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    warn!(error = %e, "Transient backend failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| HalError::Backend("no attempts made".into())))
    }

    /// Submit once and wait up to the job timeout. A job that does not
    /// finish in time is cancelled on the backend.
    async fn run_once(&self, request: &EstimatorRequest) -> HalResult<EstimatorResult> {
        let timed_out = || HalError::Timeout(format!("no result within {:?}", self.job_timeout));

        if let ValidationResult::Invalid { reasons } = self.backend.validate(request).await? {
            return Err(HalError::InvalidCircuit(reasons.join("; ")));
        }
        let job_id = tokio::time::timeout(self.job_timeout, self.backend.submit(request))
            .await
            .map_err(|_| timed_out())??;

        let poll = (self.job_timeout / 10).clamp(Duration::from_millis(1), DEFAULT_POLL_INTERVAL);
        let waited = tokio::time::timeout(
            self.job_timeout,
            self.backend.wait_with(&job_id, poll, self.job_timeout),
        )
        .await;
        match waited {
            Ok(Err(HalError::Timeout(_))) | Err(_) => {
                if let Err(e) = self.backend.cancel(&job_id).await {
                    debug!(job_id = %job_id, error = %e, "Cancelling timed-out job failed");
                }
                Err(timed_out())
            }
            Ok(outcome) => outcome,
        }
    }
}

/// `base · 2^attempt`, saturating instead of overflowing.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_adapter_sim::Statevector;
    use forge_ops::{JordanWignerMapper, ParityMapper};

    fn bs(s: &str) -> Bitstring {
        s.parse().unwrap()
    }

    fn set(u: &[&str], v: &[&str]) -> BitstringSet {
        BitstringSet::new(u.iter().map(|s| bs(s)).collect(), v.iter().map(|s| bs(s)).collect())
            .unwrap()
    }

    #[test]
    fn test_arena_dedupes_pairs() {
        let arena = PairArena::new(&set(&["10", "01", "10"], &["10", "01", "10"]));
        assert_eq!(arena.bitstrings(), [bs("01"), bs("10")]);
        assert_eq!(arena.pairs(), [(1, 1), (0, 0)]);
        assert_eq!(arena.multiplicities(), [2, 1]);
        assert_eq!(arena.transitions().iter().copied().collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn test_arena_is_order_independent() {
        let a = PairArena::new(&set(&["110", "101", "011"], &["110", "011", "101"]));
        let b = PairArena::new(&set(&["011", "110", "101"], &["101", "110", "011"]));
        assert_eq!(a.bitstrings(), b.bitstrings());
        assert_eq!(a.transitions(), b.transitions());
        assert_eq!(a.states(true), b.states(true));
    }

    #[test]
    fn test_states_skip_imaginary_phases_for_real_ansatz() {
        let arena = PairArena::new(&BitstringSet::symmetric(vec![bs("10"), bs("01")]).unwrap());
        assert_eq!(arena.states(true).len(), 2 + 2);
        assert_eq!(arena.states(false).len(), 2 + 4);
    }

    #[test]
    fn test_cache_is_write_once() {
        let mut cache = ExpectationCache::default();
        let label = OperatorLabel::SameSpin;
        assert!(cache.insert(StateKey::Basis(0), label, 1.0));
        assert!(!cache.insert(StateKey::Basis(0), label, 2.0));
        assert_eq!(cache.get(StateKey::Basis(0), label), Some(1.0));
        assert_eq!(cache.len(), 1);
    }

    fn evaluator(bitstrings: &[&str], mapper: Arc<dyn QubitMapper>) -> SchmidtPairEvaluator {
        let n = bitstrings[0].len();
        let h = ndarray::Array2::zeros((n, n));
        let g = ndarray::Array4::zeros((n, n, n, n));
        let ints = crate::integrals::IntegralTensors::new(h, g, 0.0).unwrap();
        let ops = ForgingOperators::build(&ints, mapper.as_ref()).unwrap();
        let list = bitstrings.iter().map(|s| bs(s)).collect();
        let arena = PairArena::new(&BitstringSet::symmetric(list).unwrap());
        SchmidtPairEvaluator::new(
            Arc::new(forge_adapter_sim::SimulatorBackend::new()),
            mapper,
            Arc::new(ops),
            arena,
            &SolverSettings::default(),
        )
    }

    fn prepared(ev: &SchmidtPairEvaluator, state: StateKey) -> Vec<Complex64> {
        let circuit = ev.prepare(state, 3).unwrap();
        let mut sv = Statevector::new(3);
        for inst in circuit.instructions() {
            sv.apply(inst).unwrap();
        }
        sv.amplitudes().to_vec()
    }

    #[test]
    fn test_prepare_superposition_all_phases() {
        // arena sorts to ["011", "110"]; qubit q is bit 1 << q
        let ev = evaluator(&["110", "011"], Arc::new(JordanWignerMapper));
        let (ix, iy) = (0b110, 0b011);
        let r = std::f64::consts::FRAC_1_SQRT_2;
        let i_pow = [
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 1.0),
            Complex64::new(-1.0, 0.0),
            Complex64::new(0.0, -1.0),
        ];
        for phase in 0..4u8 {
            let amps = prepared(&ev, StateKey::Superposition { x: 0, y: 1, phase });
            // equal up to a global phase: compare the ratio
            let ratio = amps[iy] / amps[ix];
            assert!((amps[ix].norm() - r).abs() < 1e-12);
            assert!((ratio - i_pow[phase as usize]).norm() < 1e-12, "phase {phase}");
        }
    }

    #[test]
    fn test_prepare_basis_uses_mapper_encoding() {
        let ev = evaluator(&["110", "011"], Arc::new(ParityMapper));
        // "011" has parity prefix 0,1,0 -> qubit 1 only
        let amps = prepared(&ev, StateKey::Basis(0));
        assert!((amps[0b010].re - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(backoff(Duration::from_millis(100), 1), Duration::from_millis(200));
        assert_eq!(backoff(Duration::from_millis(100), 40), Duration::from_millis(100 << 16));
        assert_eq!(backoff(Duration::MAX, 16), Duration::MAX);
    }

    /// Accepts jobs that never finish and counts cancellations.
    struct StuckBackend {
        caps: forge_hal::Capabilities,
        cancelled: std::sync::Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl Backend for StuckBackend {
        fn name(&self) -> &str {
            "stuck"
        }

        fn capabilities(&self) -> &forge_hal::Capabilities {
            &self.caps
        }

        async fn availability(&self) -> HalResult<forge_hal::BackendAvailability> {
            Ok(forge_hal::BackendAvailability::always_available())
        }

        async fn submit(&self, _request: &EstimatorRequest) -> HalResult<forge_hal::JobId> {
            Ok(forge_hal::JobId::new("stuck-1"))
        }

        async fn status(&self, _job_id: &forge_hal::JobId) -> HalResult<forge_hal::JobStatus> {
            Ok(forge_hal::JobStatus::Running)
        }

        async fn result(&self, job_id: &forge_hal::JobId) -> HalResult<EstimatorResult> {
            Err(HalError::JobNotFound(job_id.to_string()))
        }

        async fn cancel(&self, _job_id: &forge_hal::JobId) -> HalResult<()> {
            *self.cancelled.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_job_is_cancelled() {
        let backend = Arc::new(StuckBackend {
            caps: forge_hal::Capabilities::simulator(2),
            cancelled: std::sync::Mutex::new(0),
        });
        let settings = SolverSettings {
            job_timeout_secs: 1,
            max_retries: 0,
            ..SolverSettings::default()
        };
        let mapper: Arc<dyn QubitMapper> = Arc::new(JordanWignerMapper);
        let ints = crate::integrals::IntegralTensors::new(
            ndarray::Array2::zeros((2, 2)),
            ndarray::Array4::zeros((2, 2, 2, 2)),
            0.0,
        )
        .unwrap();
        let ops = ForgingOperators::build(&ints, mapper.as_ref()).unwrap();
        let arena = PairArena::new(&set(&["10"], &["10"]));
        let ev = SchmidtPairEvaluator::new(backend.clone(), mapper, Arc::new(ops), arena, &settings);

        let request = EstimatorRequest::new(Circuit::new("idle", 2), vec![]);
        let err = ev.run_with_retry(&request).await.unwrap_err();
        assert!(matches!(err, HalError::Timeout(_)));
        assert_eq!(*backend.cancelled.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_identity_ansatz_elements() {
        // With U = I, F_00 has ⟨10|F_00|10⟩ = 1 and ⟨10|F_01|01⟩ = 1/2
        let ev = evaluator(&["10", "01"], Arc::new(JordanWignerMapper));
        let ansatz = Circuit::new("id", 2);
        let m = ev.evaluate(&ansatz, 0).await.unwrap();
        // arena order: "01" = 0, "10" = 1; operators F0,0 F0,1 F1,1 S
        assert!((m.get(0, 1, 1).re - 1.0).abs() < 1e-12);
        assert!(m.get(0, 0, 0).norm() < 1e-12);
        assert!((m.get(1, 0, 1).re - 0.5).abs() < 1e-12);
        assert!((m.get(1, 1, 0).re - 0.5).abs() < 1e-12);
        assert!(m.get(3, 0, 1).norm() < 1e-12);
    }
}
