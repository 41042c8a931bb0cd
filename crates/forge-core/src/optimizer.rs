//! Gradient-free optimizers driving the variational loop.
//!
//! Optimizers are step machines: the solver evaluates the point returned by
//! the previous [`Optimizer::step`] and feeds the energy back in. This keeps
//! the energy evaluation (which is async and fallible) outside the
//! optimizer.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SolverSettings;
use crate::error::ForgeError;

/// Step interface shared by all strategies.
pub trait Optimizer: Send {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Record `energy` at `params` (the point returned by the previous call,
    /// or the initial point) and return the next point to evaluate.
    fn step(&mut self, params: &[f64], energy: f64) -> Vec<f64>;

    /// Whether the stopping criterion is met.
    fn converged(&self) -> bool;

    /// Best point and energy seen so far.
    fn best(&self) -> Option<(&[f64], f64)>;

    /// Number of incumbent updates.
    fn iterations(&self) -> usize;

    /// A point to evaluate once after the loop ends, if the strategy
    /// returns something other than its best evaluated point.
    fn final_candidate(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    /// Simultaneous perturbation stochastic approximation.
    Spsa,
    /// Linear trust-region approximation.
    Cobyla,
    /// Nelder-Mead simplex.
    NelderMead,
}

impl OptimizerKind {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Spsa => "SPSA",
            OptimizerKind::Cobyla => "COBYLA",
            OptimizerKind::NelderMead => "NELDER-MEAD",
        }
    }

    /// Instantiate for `num_params` parameters.
    pub fn build(self, num_params: usize, settings: &SolverSettings) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Spsa => Box::new(Spsa::new(num_params, settings)),
            OptimizerKind::Cobyla => Box::new(Cobyla::new(
                num_params,
                settings.rhobeg,
                settings.optimizer_tol,
            )),
            OptimizerKind::NelderMead => {
                Box::new(NelderMead::new(num_params, settings.optimizer_tol))
            }
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SPSA" => Ok(OptimizerKind::Spsa),
            "COBYLA" => Ok(OptimizerKind::Cobyla),
            "NELDER-MEAD" | "NELDER_MEAD" | "NELDERMEAD" | "NM" => Ok(OptimizerKind::NelderMead),
            _ => Err(ForgeError::Config(format!("unknown optimizer '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Best {
    params: Vec<f64>,
    energy: Option<f64>,
}

impl Best {
    fn observe(&mut self, params: &[f64], energy: f64) {
        if self.energy.is_none_or(|e| energy < e) {
            self.energy = Some(energy);
            self.params = params.to_vec();
        }
    }

    fn get(&self) -> Option<(&[f64], f64)> {
        self.energy.map(|e| (self.params.as_slice(), e))
    }
}

// =============================================================================
// SPSA
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum SpsaPhase {
    Start,
    Plus,
    Minus,
}

/// Simultaneous perturbation stochastic approximation.
///
/// Every iteration evaluates `x ± c_k Δ` with a Rademacher vector `Δ` and
/// moves `x` against the two-point gradient estimate, with gains
/// `a_k = c0 / (k + 1 + A)^0.602` and `c_k = c1 / (k + 1)^0.101`.
#[derive(Debug)]
pub struct Spsa {
    num_params: usize,
    c0: f64,
    c1: f64,
    stability: f64,
    index_offset: usize,
    tolerance: f64,
    last_average: usize,
    rng: StdRng,
    phase: SpsaPhase,
    current: Vec<f64>,
    delta: Vec<f64>,
    energy_plus: f64,
    previous_average: Option<f64>,
    recent: VecDeque<Vec<f64>>,
    iterations: usize,
    converged: bool,
    best: Best,
}

impl Spsa {
    /// Configure from solver settings.
    pub fn new(num_params: usize, settings: &SolverSettings) -> Self {
        Self {
            num_params,
            c0: settings.spsa_c0,
            c1: settings.spsa_c1,
            stability: 0.1 * settings.maxiter as f64,
            index_offset: settings.initial_spsa_iteration_idx,
            tolerance: settings.optimizer_tol,
            last_average: settings.spsa_last_average.max(1),
            rng: StdRng::seed_from_u64(settings.seed),
            phase: SpsaPhase::Start,
            current: Vec::new(),
            delta: Vec::new(),
            energy_plus: 0.0,
            previous_average: None,
            recent: VecDeque::new(),
            iterations: 0,
            converged: false,
            best: Best::default(),
        }
    }

    fn gains(&self) -> (f64, f64) {
        let k = (self.iterations + self.index_offset) as f64;
        let a = self.c0 / (k + 1.0 + self.stability).powf(0.602);
        let c = self.c1 / (k + 1.0).powf(0.101);
        (a, c)
    }

    fn perturb(&mut self) -> Vec<f64> {
        self.delta = (0..self.num_params)
            .map(|_| if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        let (_, c) = self.gains();
        self.phase = SpsaPhase::Plus;
        self.shifted(c)
    }

    fn shifted(&self, scale: f64) -> Vec<f64> {
        self.current
            .iter()
            .zip(&self.delta)
            .map(|(x, d)| x + scale * d)
            .collect()
    }
}

impl Optimizer for Spsa {
    fn name(&self) -> &'static str {
        "SPSA"
    }

    fn step(&mut self, params: &[f64], energy: f64) -> Vec<f64> {
        self.best.observe(params, energy);
        if self.num_params == 0 {
            self.converged = true;
            return params.to_vec();
        }
        match self.phase {
            SpsaPhase::Start => {
                self.current = params.to_vec();
                self.perturb()
            }
            SpsaPhase::Plus => {
                self.energy_plus = energy;
                self.phase = SpsaPhase::Minus;
                let (_, c) = self.gains();
                self.shifted(-c)
            }
            SpsaPhase::Minus => {
                let (a, c) = self.gains();
                let slope = (self.energy_plus - energy) / (2.0 * c);
                for (x, d) in self.current.iter_mut().zip(&self.delta) {
                    // 1/Δ_i = Δ_i for Rademacher entries
                    *x -= a * slope * d;
                }
                self.iterations += 1;
                self.recent.push_back(self.current.clone());
                if self.recent.len() > self.last_average {
                    self.recent.pop_front();
                }

                let average = 0.5 * (self.energy_plus + energy);
                if let Some(prev) = self.previous_average {
                    self.converged = (average - prev).abs() < self.tolerance;
                }
                self.previous_average = Some(average);
                self.perturb()
            }
        }
    }

    fn converged(&self) -> bool {
        self.converged
    }

    fn best(&self) -> Option<(&[f64], f64)> {
        self.best.get()
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn final_candidate(&self) -> Option<Vec<f64>> {
        if self.recent.is_empty() {
            return None;
        }
        let n = self.recent.len() as f64;
        let mut mean = vec![0.0; self.num_params];
        for point in &self.recent {
            for (m, x) in mean.iter_mut().zip(point) {
                *m += x / n;
            }
        }
        Some(mean)
    }
}

// =============================================================================
// COBYLA
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum CobylaPhase {
    Start,
    Probe(usize),
    Trial,
}

/// Linear-approximation trust-region method in the spirit of COBYLA.
///
/// Each iteration samples the `n` coordinate vertices at distance `rho`
/// from the center, fits a linear model and tries a step of length `rho`
/// down its slope. A failed step halves `rho`; the search stops once `rho`
/// drops below `rhoend`.
#[derive(Debug)]
pub struct Cobyla {
    num_params: usize,
    rho: f64,
    rho_end: f64,
    phase: CobylaPhase,
    center: Vec<f64>,
    center_energy: f64,
    probes: Vec<(Vec<f64>, f64)>,
    trial: Vec<f64>,
    iterations: usize,
    converged: bool,
    best: Best,
}

impl Cobyla {
    /// Start with trust radius `rhobeg`, stop below `rhoend`.
    pub fn new(num_params: usize, rhobeg: f64, rhoend: f64) -> Self {
        Self {
            num_params,
            rho: rhobeg,
            rho_end: rhoend,
            phase: CobylaPhase::Start,
            center: Vec::new(),
            center_energy: f64::INFINITY,
            probes: Vec::with_capacity(num_params),
            trial: Vec::new(),
            iterations: 0,
            converged: false,
            best: Best::default(),
        }
    }

    /// Current trust radius.
    pub fn rho(&self) -> f64 {
        self.rho
    }

    fn vertex(&self, i: usize) -> Vec<f64> {
        let mut v = self.center.clone();
        v[i] += self.rho;
        v
    }

    fn begin_probes(&mut self) -> Vec<f64> {
        self.probes.clear();
        self.phase = CobylaPhase::Probe(0);
        self.vertex(0)
    }

    fn finish_iteration(&mut self, improved: bool) -> Vec<f64> {
        if !improved {
            self.rho *= 0.5;
        }
        self.iterations += 1;
        if self.rho < self.rho_end {
            self.converged = true;
            return self.center.clone();
        }
        self.begin_probes()
    }
}

impl Optimizer for Cobyla {
    fn name(&self) -> &'static str {
        "COBYLA"
    }

    fn step(&mut self, params: &[f64], energy: f64) -> Vec<f64> {
        self.best.observe(params, energy);
        if self.num_params == 0 {
            self.converged = true;
            return params.to_vec();
        }
        match self.phase {
            CobylaPhase::Start => {
                self.center = params.to_vec();
                self.center_energy = energy;
                self.begin_probes()
            }
            CobylaPhase::Probe(i) => {
                self.probes.push((params.to_vec(), energy));
                if i + 1 < self.num_params {
                    self.phase = CobylaPhase::Probe(i + 1);
                    return self.vertex(i + 1);
                }
                let gradient: Vec<f64> = self
                    .probes
                    .iter()
                    .map(|(_, e)| (e - self.center_energy) / self.rho)
                    .collect();
                let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
                if norm == 0.0 || !norm.is_finite() {
                    return self.finish_iteration(false);
                }
                self.trial = self
                    .center
                    .iter()
                    .zip(&gradient)
                    .map(|(x, g)| x - self.rho * g / norm)
                    .collect();
                self.phase = CobylaPhase::Trial;
                self.trial.clone()
            }
            CobylaPhase::Trial => {
                let mut moved = false;
                if energy < self.center_energy {
                    self.center = self.trial.clone();
                    self.center_energy = energy;
                    moved = true;
                }
                if let Some((point, e)) = self
                    .probes
                    .iter()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .cloned()
                {
                    if e < self.center_energy {
                        self.center = point;
                        self.center_energy = e;
                        moved = true;
                    }
                }
                self.finish_iteration(moved)
            }
        }
    }

    fn converged(&self) -> bool {
        self.converged
    }

    fn best(&self) -> Option<(&[f64], f64)> {
        self.best.get()
    }

    fn iterations(&self) -> usize {
        self.iterations
    }
}

// =============================================================================
// Nelder-Mead
// =============================================================================

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;
const INITIAL_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
enum NelderMeadPhase {
    Start,
    InitialEval,
    Reflection,
    Expansion,
    Contraction,
    Shrink,
}

/// Nelder-Mead simplex search.
///
/// Uses a simplex of n+1 points in n dimensions. One iteration is one
/// accepted transformation of the simplex.
#[derive(Debug)]
pub struct NelderMead {
    num_params: usize,
    tolerance: f64,
    simplex: Vec<Vec<f64>>,
    costs: Vec<f64>,
    eval_index: usize,
    phase: NelderMeadPhase,
    trial_point: Vec<f64>,
    trial_cost: f64,
    iterations: usize,
    converged: bool,
    best: Best,
}

impl NelderMead {
    /// Create with convergence tolerance `tolerance`.
    pub fn new(num_params: usize, tolerance: f64) -> Self {
        Self {
            num_params,
            tolerance,
            simplex: Vec::new(),
            costs: Vec::new(),
            eval_index: 0,
            phase: NelderMeadPhase::Start,
            trial_point: Vec::new(),
            trial_cost: f64::INFINITY,
            iterations: 0,
            converged: false,
            best: Best::default(),
        }
    }

    fn init_simplex(&mut self, center: &[f64], cost: f64) {
        self.simplex = vec![center.to_vec()];
        self.costs = vec![cost];
        for i in 0..self.num_params {
            let mut vertex = center.to_vec();
            vertex[i] += if center[i].abs() < 1e-10 {
                INITIAL_STEP
            } else {
                INITIAL_STEP * center[i].abs()
            };
            self.simplex.push(vertex);
            self.costs.push(f64::INFINITY);
        }
        self.eval_index = 1;
        self.phase = NelderMeadPhase::InitialEval;
    }

    fn sort_simplex(&mut self) {
        let mut order: Vec<usize> = (0..self.simplex.len()).collect();
        order.sort_by(|&a, &b| self.costs[a].total_cmp(&self.costs[b]));
        self.simplex = order.iter().map(|&i| self.simplex[i].clone()).collect();
        self.costs = order.iter().map(|&i| self.costs[i]).collect();
    }

    fn centroid(&self) -> Vec<f64> {
        let n = self.num_params as f64;
        let mut center = vec![0.0; self.num_params];
        for vertex in &self.simplex[..self.num_params] {
            for (c, v) in center.iter_mut().zip(vertex) {
                *c += v / n;
            }
        }
        center
    }

    /// `centroid + coeff * (towards - centroid)`
    fn along(&self, towards: &[f64], coeff: f64) -> Vec<f64> {
        self.centroid()
            .iter()
            .zip(towards)
            .map(|(c, p)| c + coeff * (p - c))
            .collect()
    }

    fn check_convergence(&self) -> bool {
        let max = self.costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.costs.iter().copied().fold(f64::INFINITY, f64::min);
        if max - min < self.tolerance {
            return true;
        }
        let size = self.simplex[1..]
            .iter()
            .map(|v| {
                v.iter()
                    .zip(&self.simplex[0])
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max);
        size < self.tolerance
    }

    fn replace_worst(&mut self, point: Vec<f64>, cost: f64) {
        let worst = self.num_params;
        self.simplex[worst] = point;
        self.costs[worst] = cost;
    }

    /// Sort, test convergence and propose the next reflection.
    fn next_reflection(&mut self) -> Vec<f64> {
        self.sort_simplex();
        if self.check_convergence() {
            self.converged = true;
            return self.simplex[0].clone();
        }
        let worst = self.simplex[self.num_params].clone();
        self.trial_point = self.along(&worst, -REFLECTION);
        self.phase = NelderMeadPhase::Reflection;
        self.trial_point.clone()
    }
}

impl Optimizer for NelderMead {
    fn name(&self) -> &'static str {
        "NELDER-MEAD"
    }

    fn step(&mut self, params: &[f64], cost: f64) -> Vec<f64> {
        self.best.observe(params, cost);
        if self.num_params == 0 {
            self.converged = true;
            return params.to_vec();
        }

        match self.phase {
            NelderMeadPhase::Start => {
                self.init_simplex(params, cost);
                self.simplex[1].clone()
            }

            NelderMeadPhase::InitialEval | NelderMeadPhase::Shrink => {
                let was_shrink = self.phase == NelderMeadPhase::Shrink;
                self.costs[self.eval_index] = cost;
                self.eval_index += 1;
                if self.eval_index < self.simplex.len() {
                    return self.simplex[self.eval_index].clone();
                }
                if was_shrink {
                    self.iterations += 1;
                }
                self.next_reflection()
            }

            NelderMeadPhase::Reflection => {
                self.trial_cost = cost;
                let f_best = self.costs[0];
                let f_second_worst = self.costs[self.num_params - 1];
                let f_worst = self.costs[self.num_params];

                if cost < f_best {
                    let reflected = self.trial_point.clone();
                    self.trial_point = self.along(&reflected, EXPANSION);
                    self.phase = NelderMeadPhase::Expansion;
                    self.trial_point.clone()
                } else if cost < f_second_worst {
                    let reflected = self.trial_point.clone();
                    self.replace_worst(reflected, cost);
                    self.iterations += 1;
                    self.next_reflection()
                } else {
                    // Outside contraction if the reflection beats the worst
                    let target = if cost < f_worst {
                        self.trial_point.clone()
                    } else {
                        self.simplex[self.num_params].clone()
                    };
                    self.trial_point = self.along(&target, CONTRACTION);
                    self.phase = NelderMeadPhase::Contraction;
                    self.trial_point.clone()
                }
            }

            NelderMeadPhase::Expansion => {
                if cost < self.trial_cost {
                    self.replace_worst(params.to_vec(), cost);
                } else {
                    let worst = self.simplex[self.num_params].clone();
                    let reflected = self.along(&worst, -REFLECTION);
                    let reflected_cost = self.trial_cost;
                    self.replace_worst(reflected, reflected_cost);
                }
                self.iterations += 1;
                self.next_reflection()
            }

            NelderMeadPhase::Contraction => {
                if cost < self.costs[self.num_params] {
                    self.replace_worst(params.to_vec(), cost);
                    self.iterations += 1;
                    return self.next_reflection();
                }
                let best = self.simplex[0].clone();
                for vertex in &mut self.simplex[1..] {
                    for (v, b) in vertex.iter_mut().zip(&best) {
                        *v = b + SHRINK * (*v - b);
                    }
                }
                self.phase = NelderMeadPhase::Shrink;
                self.eval_index = 1;
                self.simplex[1].clone()
            }
        }
    }

    fn converged(&self) -> bool {
        self.converged
    }

    fn best(&self) -> Option<(&[f64], f64)> {
        self.best.get()
    }

    fn iterations(&self) -> usize {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(x: &[f64]) -> f64 {
        x.iter().enumerate().map(|(i, v)| (v - 0.1 * i as f64).powi(2)).sum()
    }

    fn run(opt: &mut dyn Optimizer, start: Vec<f64>, max_iters: usize) -> f64 {
        let mut params = start;
        let mut energy = quadratic(&params);
        for _ in 0..10_000 {
            params = opt.step(&params, energy);
            if opt.converged() || opt.iterations() >= max_iters {
                break;
            }
            energy = quadratic(&params);
        }
        opt.best().map(|(_, e)| e).unwrap()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("spsa".parse::<OptimizerKind>().unwrap(), OptimizerKind::Spsa);
        assert_eq!("Cobyla".parse::<OptimizerKind>().unwrap(), OptimizerKind::Cobyla);
        for alias in ["nelder-mead", "NELDER_MEAD", "nm"] {
            assert_eq!(alias.parse::<OptimizerKind>().unwrap(), OptimizerKind::NelderMead);
        }
        assert!("adam".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn test_nelder_mead_quadratic() {
        let mut opt = NelderMead::new(2, 1e-8);
        let best = run(&mut opt, vec![2.0, -1.0], 500);
        assert!(best < 1e-4, "best = {best}");
        assert!(opt.iterations() > 0);
    }

    #[test]
    fn test_cobyla_shrinks_to_rhoend() {
        let mut opt = Cobyla::new(2, 0.5, 1e-4);
        let best = run(&mut opt, vec![1.0, 1.0], 1_000);
        assert!(opt.converged());
        assert!(opt.rho() < 1e-4);
        assert!(best < 1e-3, "best = {best}");
    }

    #[test]
    fn test_spsa_improves_and_is_seeded() {
        let settings = SolverSettings {
            spsa_c0: 0.5,
            maxiter: 200,
            ..SolverSettings::default()
        };
        let trace = |settings: &SolverSettings| {
            let mut opt = Spsa::new(1, settings);
            let mut params = vec![2.0];
            let mut out = Vec::new();
            for _ in 0..60 {
                params = opt.step(&params, quadratic(&params));
                out.push(params[0]);
            }
            (out, opt.best().map(|(_, e)| e).unwrap())
        };
        let (a, best) = trace(&settings);
        let (b, _) = trace(&settings);
        assert_eq!(a, b);
        assert!(best < 4.0);
    }

    #[test]
    fn test_spsa_last_average() {
        let settings = SolverSettings {
            spsa_last_average: 3,
            ..SolverSettings::default()
        };
        let mut opt = Spsa::new(1, &settings);
        assert!(opt.final_candidate().is_none());
        let mut params = vec![1.0];
        let mut iterates = Vec::new();
        while opt.iterations() < 5 {
            let before = opt.iterations();
            params = opt.step(&params, quadratic(&params));
            if opt.iterations() > before {
                iterates.push(opt.current[0]);
            }
        }
        let expected = iterates[2..].iter().sum::<f64>() / 3.0;
        let got = opt.final_candidate().unwrap()[0];
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_parameters_converge_immediately() {
        let settings = SolverSettings::default();
        let mut optimizers: Vec<Box<dyn Optimizer>> = vec![
            OptimizerKind::Spsa.build(0, &settings),
            OptimizerKind::Cobyla.build(0, &settings),
            OptimizerKind::NelderMead.build(0, &settings),
        ];
        for opt in &mut optimizers {
            assert!(opt.step(&[], -1.0).is_empty());
            assert!(opt.converged(), "{}", opt.name());
            assert_eq!(opt.iterations(), 0);
        }
    }
}
