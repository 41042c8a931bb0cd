//! The entanglement-forged ground-state solver.
//!
//! Wires the pieces together for one solve:
//!
//! ```text
//! problem ──reduce──→ ForgingOperators ─┐
//! bitstrings ─reduce─→ PairArena ───────┼─→ SchmidtPairEvaluator ─→ EnergyAssembler
//! ansatz ──bind(params)─────────────────┘                                  │ energy
//!                      Optimizer::step ◀───────────────────────────────────┘
//! ```
//!
//! The loop is sequential; the fan-out happens inside each evaluation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::active_space::ActiveSpaceSelection;
use crate::ansatz::Ansatz;
use crate::assembler::{Assembly, EnergyAssembler};
use crate::bitstrings::{BitstringSet, Bitstrings};
use crate::config::SolverConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::evaluator::{PairArena, SchmidtPairEvaluator};
use crate::integrals::ElectronicStructureProblem;
use crate::operators::ForgingOperators;
use crate::optimizer::Optimizer;
use crate::result::{EnergyResult, OptimizerState};

/// Cooperative cancellation flag, checked between optimizer iterations.
///
/// A cancelled handle stays cancelled; later solves on the same solver stop
/// right after their first evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ground-state solver built on entanglement forging.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo(problem: forge_core::ElectronicStructureProblem) -> forge_core::ForgeResult<()> {
/// use std::sync::Arc;
/// use forge_core::{Ansatz, Bitstring, EntanglementForgedGroundStateSolver, SolverConfig};
/// # let backend: Arc<dyn forge_hal::Backend> = unimplemented!();
///
/// let solver = EntanglementForgedGroundStateSolver::new(SolverConfig::new(backend));
/// let bitstrings: Vec<Bitstring> = vec!["10".parse()?, "01".parse()?];
/// let result = solver
///     .solve(&problem, &Ansatz::h2_minimal()?, bitstrings, None)
///     .await?;
/// println!("E = {}", result.energy);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EntanglementForgedGroundStateSolver {
    config: SolverConfig,
    cancel: CancelHandle,
}

impl EntanglementForgedGroundStateSolver {
    /// Create a solver for `config`.
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::default(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Handle to cancel a running solve from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Minimize the forged energy of `problem`.
    ///
    /// With a non-empty `selection` the problem is reduced to its active
    /// space first. Bitstrings may then be given at full length (they are
    /// reduced too) or already at active-space length.
    #[instrument(skip_all, fields(optimizer = %self.config.settings.optimizer_name))]
    pub async fn solve(
        &self,
        problem: &ElectronicStructureProblem,
        ansatz: &Ansatz,
        bitstrings: impl Into<Bitstrings>,
        selection: Option<&ActiveSpaceSelection>,
    ) -> ForgeResult<EnergyResult> {
        let started = Instant::now();
        let settings = &self.config.settings;
        settings.validate()?;

        let set = bitstrings.into().into_set()?;
        let (problem, set) = Self::prepare(problem, set, selection)?;

        if ansatz.num_qubits() != set.num_orbitals() {
            return Err(ForgeError::InvalidBitstring(format!(
                "ansatz acts on {} qubits but bitstrings have length {}",
                ansatz.num_qubits(),
                set.num_orbitals()
            )));
        }

        let num_params = ansatz.num_parameters();
        let initial = match &settings.initial_params {
            Some(p) if p.len() != num_params => {
                return Err(ForgeError::Config(format!(
                    "initial_params has {} entries, ansatz has {num_params} parameters",
                    p.len()
                )));
            }
            Some(p) => p.clone(),
            None => vec![0.0; num_params],
        };

        let mapper = settings.mapper_kind()?.build();
        let operators = Arc::new(ForgingOperators::build(problem.integrals(), mapper.as_ref())?);
        let arena = PairArena::new(&set);
        info!(
            orbitals = problem.num_orbitals(),
            pairs = arena.pairs().len(),
            states = arena.states(ansatz.is_real()).len(),
            operators = operators.len(),
            parameters = num_params,
            mapper = mapper.name(),
            "Starting forged solve"
        );

        let evaluator = SchmidtPairEvaluator::new(
            Arc::clone(&self.config.backend),
            mapper,
            Arc::clone(&operators),
            arena,
            settings,
        );
        let assembler = EnergyAssembler::new(operators, problem.energy_offset());
        let mut run = Run {
            evaluator,
            assembler,
            ansatz,
            aux: settings.compute_aux_operators,
            history: Vec::new(),
            best: None,
            last_finite: initial.clone(),
        };

        let kind = settings.optimizer_kind()?;
        let mut optimizer = kind.build(num_params, settings);
        let outcome = self.drive(&mut run, optimizer.as_mut(), initial, started).await;
        let iterations = optimizer.iterations();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(state) => {
                let result = run
                    .result(kind.as_str(), iterations, state, elapsed_ms)
                    .ok_or_else(|| ForgeError::OptimizerDivergence {
                        last_params: run.last_finite.clone(),
                        partial: None,
                    })?;
                info!(
                    energy = result.energy,
                    iterations,
                    evaluations = result.evaluations,
                    state = ?state,
                    "Forged solve finished"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, iterations, "Forged solve stopped early");
                match run.result(kind.as_str(), iterations, OptimizerState::Failed, elapsed_ms) {
                    Some(partial) => Err(err.with_partial(partial)),
                    None => Err(err),
                }
            }
        }
    }

    /// Reduce the problem and bring the bitstrings to its width.
    fn prepare(
        problem: &ElectronicStructureProblem,
        set: BitstringSet,
        selection: Option<&ActiveSpaceSelection>,
    ) -> ForgeResult<(ElectronicStructureProblem, BitstringSet)> {
        let full = problem.num_orbitals();
        let Some(selection) = selection.filter(|s| !s.is_empty()) else {
            if set.num_orbitals() != full {
                return Err(ForgeError::InvalidBitstring(format!(
                    "bitstrings have length {}, problem has {full} orbitals",
                    set.num_orbitals()
                )));
            }
            return Ok((problem.clone(), set));
        };

        let reduced = problem.reduce(selection)?;
        let active = reduced.num_orbitals();
        let set = if set.num_orbitals() == full {
            set.reduce(selection, problem.core_limit())?
        } else if set.num_orbitals() == active {
            set
        } else {
            return Err(ForgeError::InvalidBitstring(format!(
                "bitstrings have length {}, expected {full} (full) or {active} (active space)",
                set.num_orbitals()
            )));
        };
        debug!(
            full,
            active,
            offset = reduced.energy_offset(),
            "Using reduced problem"
        );
        Ok((reduced, set))
    }

    /// Run the optimizer loop until a terminal state.
    async fn drive(
        &self,
        run: &mut Run<'_>,
        optimizer: &mut dyn Optimizer,
        initial: Vec<f64>,
        started: Instant,
    ) -> ForgeResult<OptimizerState> {
        let settings = &self.config.settings;
        let deadline = settings.time_budget().and_then(|budget| started.checked_add(budget));
        let max_evaluations = settings
            .maxiter
            .saturating_add(1)
            .saturating_mul(2 * initial.len() + 4);

        let mut params = initial;
        let mut energy = run.energy(&params).await?;
        info!(iteration = 0, energy, "Initial energy");
        if settings.maxiter == 0 {
            return Ok(OptimizerState::MaxItersReached);
        }

        let state = loop {
            if self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                info!(evaluations = run.history.len(), "Solve cancelled");
                return Err(ForgeError::Cancelled { partial: None });
            }

            let next = optimizer.step(&params, energy);
            if optimizer.converged() {
                break OptimizerState::Converged;
            }
            if optimizer.iterations() >= settings.maxiter {
                break OptimizerState::MaxItersReached;
            }
            if run.history.len() >= max_evaluations {
                warn!(
                    evaluations = run.history.len(),
                    iterations = optimizer.iterations(),
                    "Evaluation budget exhausted before maxiter"
                );
                break OptimizerState::MaxItersReached;
            }

            energy = run.energy(&next).await?;
            params = next;
            info!(
                iteration = optimizer.iterations(),
                evaluation = run.history.len(),
                energy,
                "Energy evaluated"
            );
        };

        if let Some(candidate) = optimizer.final_candidate() {
            let energy = run.energy(&candidate).await?;
            debug!(energy, "Evaluated averaged parameters");
        }
        Ok(state)
    }
}

/// Per-solve evaluation state.
struct Run<'a> {
    evaluator: SchmidtPairEvaluator,
    assembler: EnergyAssembler,
    ansatz: &'a Ansatz,
    aux: bool,
    history: Vec<f64>,
    best: Option<(Vec<f64>, Assembly)>,
    last_finite: Vec<f64>,
}

impl Run<'_> {
    /// Evaluate the energy at `params`. A non-finite energy is a divergence.
    async fn energy(&mut self, params: &[f64]) -> ForgeResult<f64> {
        let circuit = self.ansatz.bind(params)?;
        let elements = self
            .evaluator
            .evaluate(&circuit, self.history.len() as u64)
            .await?;
        let assembly = self
            .assembler
            .assemble(self.evaluator.arena(), &elements, self.aux);
        let energy = assembly.energy;
        self.history.push(energy);

        if !energy.is_finite() {
            return Err(ForgeError::OptimizerDivergence {
                last_params: self.last_finite.clone(),
                partial: None,
            });
        }
        self.last_finite = params.to_vec();
        if self.best.as_ref().is_none_or(|(_, b)| energy < b.energy) {
            self.best = Some((params.to_vec(), assembly));
        }
        Ok(energy)
    }

    /// Result for the best evaluation so far.
    fn result(
        &self,
        optimizer: &str,
        iterations: usize,
        state: OptimizerState,
        elapsed_ms: u64,
    ) -> Option<EnergyResult> {
        let (params, assembly) = self.best.as_ref()?;
        let arena = self.evaluator.arena();
        let bitstrings = arena.bitstrings();
        Some(EnergyResult {
            energy: assembly.energy,
            optimal_params: params.clone(),
            iterations,
            evaluations: self.history.len(),
            converged: state == OptimizerState::Converged,
            state,
            optimizer: optimizer.to_string(),
            schmidt_coefficients: assembly.schmidt_coefficients(),
            bitstrings_u: arena.pairs().iter().map(|&(u, _)| bitstrings[u].clone()).collect(),
            bitstrings_v: arena.pairs().iter().map(|&(_, v)| bitstrings[v].clone()).collect(),
            multiplicities: arena.multiplicities().to_vec(),
            energy_offset: self.assembler.offset(),
            history: self.history.clone(),
            aux: assembly.aux.clone(),
            elapsed_ms,
        })
    }
}

/// Build a solver for `config` and run one solve.
pub async fn solve(
    problem: &ElectronicStructureProblem,
    ansatz: &Ansatz,
    bitstrings: impl Into<Bitstrings>,
    config: SolverConfig,
    selection: Option<&ActiveSpaceSelection>,
) -> ForgeResult<EnergyResult> {
    EntanglementForgedGroundStateSolver::new(config)
        .solve(problem, ansatz, bitstrings, selection)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstrings::Bitstring;
    use crate::config::SolverSettings;
    use approx::assert_abs_diff_eq;
    use forge_adapter_sim::SimulatorBackend;
    use ndarray::{Array4, array};

    /// Non-interacting two-orbital problem: E(HF "10") = 2·h00 + offset.
    fn diagonal_problem() -> ElectronicStructureProblem {
        let h = array![[-1.0, 0.0], [0.0, 0.5]];
        ElectronicStructureProblem::new(h, Array4::zeros((2, 2, 2, 2)), 1, 1, 0.3).unwrap()
    }

    fn solver(settings: SolverSettings) -> EntanglementForgedGroundStateSolver {
        let config = SolverConfig::new(Arc::new(SimulatorBackend::new())).with_settings(settings);
        EntanglementForgedGroundStateSolver::new(config)
    }

    fn hf() -> Vec<Bitstring> {
        vec!["10".parse().unwrap()]
    }

    #[tokio::test]
    async fn test_single_determinant_energy() {
        let settings = SolverSettings {
            maxiter: 0,
            ..Default::default()
        };
        let result = solver(settings)
            .solve(&diagonal_problem(), &Ansatz::h2_minimal().unwrap(), hf(), None)
            .await
            .unwrap();
        assert_abs_diff_eq!(result.energy, -1.7, epsilon = 1e-10);
        assert_abs_diff_eq!(result.electronic_energy(), -2.0, epsilon = 1e-10);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.evaluations, 1);
        assert_eq!(result.state, OptimizerState::MaxItersReached);
        assert_eq!(result.schmidt_coefficients.len(), 1);
        assert_abs_diff_eq!(result.schmidt_coefficients[0], 1.0, epsilon = 1e-10);
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial() {
        let solver = solver(SolverSettings::default());
        solver.cancel_handle().cancel();
        let err = solver
            .solve(&diagonal_problem(), &Ansatz::h2_minimal().unwrap(), hf(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Cancelled { .. }));
        let partial = err.partial().unwrap();
        assert_eq!(partial.state, OptimizerState::Failed);
        assert_eq!(partial.evaluations, 1);
    }

    #[tokio::test]
    async fn test_rejects_mismatched_inputs() {
        let problem = diagonal_problem();
        let ansatz = Ansatz::h2_minimal().unwrap();

        let wide: Vec<Bitstring> = vec!["100".parse().unwrap()];
        let err = solver(SolverSettings::default())
            .solve(&problem, &ansatz, wide, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidBitstring(_)));

        let settings = SolverSettings {
            initial_params: Some(vec![0.0]),
            ..Default::default()
        };
        let err = solver(settings)
            .solve(&problem, &ansatz, hf(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_ansatz_width_must_match_active_space() {
        let selection = ActiveSpaceSelection::new([0]).unwrap();
        let err = solver(SolverSettings::default())
            .solve(
                &diagonal_problem(),
                &Ansatz::h2_minimal().unwrap(),
                hf(),
                Some(&selection),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidBitstring(_)));
    }
}
