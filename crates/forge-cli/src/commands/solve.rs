//! Solve command implementation.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use forge_adapter_sim::SimulatorBackend;
use forge_core::{EnergyResult, EntanglementForgedGroundStateSolver, SolverConfig, SolverSettings};

use super::common::ProblemFile;

/// Command-line settings that take precedence over the settings file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub maxiter: Option<usize>,
    pub optimizer: Option<String>,
    pub shots: Option<u32>,
    pub seed: Option<u64>,
}

impl Overrides {
    fn apply(self, settings: &mut SolverSettings) {
        if let Some(maxiter) = self.maxiter {
            settings.maxiter = maxiter;
        }
        if let Some(optimizer) = self.optimizer {
            settings.optimizer_name = optimizer;
        }
        if self.shots.is_some() {
            settings.shots = self.shots;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
    }
}

/// Execute the solve command.
pub async fn execute(
    path: &Path,
    config: Option<&Path>,
    overrides: Overrides,
    output: Option<&Path>,
    format: &str,
) -> Result<()> {
    let file = ProblemFile::load(path)?;
    let problem = file.problem()?;
    let bitstrings = file.bitstrings()?;
    let selection = file.selection();
    let width = problem
        .num_orbitals()
        .saturating_sub(selection.map_or(0, |s| s.len()));
    let ansatz = file.ansatz(width)?;

    let mut settings = match config {
        Some(config) => SolverSettings::from_file(config)
            .with_context(|| format!("Failed to load settings: {}", config.display()))?,
        None => SolverSettings::default(),
    };
    overrides.apply(&mut settings);
    settings.validate()?;
    debug!(?settings, "Solver settings");

    if format == "text" {
        println!(
            "{} Solving {} ({} orbitals, {} qubits per register, {} parameters)",
            style("→").cyan().bold(),
            style(path.display()).green(),
            problem.num_orbitals(),
            width,
            ansatz.num_parameters()
        );
        println!(
            "  Optimizer: {}, maxiter {}, {}",
            style(&settings.optimizer_name).yellow(),
            settings.maxiter,
            settings
                .shots
                .map_or("exact expectation values".to_string(), |s| format!("{s} shots"))
        );
    }

    let config = SolverConfig::new(Arc::new(SimulatorBackend::new())).with_settings(settings);
    let solver = EntanglementForgedGroundStateSolver::new(config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Optimizing...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = solver.solve(&problem, &ansatz, bitstrings, selection).await;
    spinner.finish_and_clear();
    let result = outcome?;

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&result)?,
        _ => render_text(&result),
    };

    match output {
        Some(out) => {
            fs::write(out, &rendered)
                .with_context(|| format!("Failed to write output: {}", out.display()))?;
            if format == "text" {
                println!(
                    "{} Result written to {}",
                    style("✓").green().bold(),
                    style(out.display()).green()
                );
            }
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// Human-readable summary of a result.
fn render_text(result: &EnergyResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{} Energy: {:.12} Ha",
        style("✓").green().bold(),
        result.energy
    );
    let _ = writeln!(out, "  Electronic:   {:.12}", result.electronic_energy());
    let _ = writeln!(out, "  Offset:       {:.12}", result.energy_offset);
    let _ = writeln!(
        out,
        "  Optimizer:    {} ({:?}, {} iterations, {} evaluations)",
        result.optimizer, result.state, result.iterations, result.evaluations
    );
    let params: Vec<String> = result
        .optimal_params
        .iter()
        .map(|p| format!("{p:.6}"))
        .collect();
    let _ = writeln!(out, "  Parameters:   [{}]", params.join(", "));

    let _ = writeln!(out, "\n  Schmidt coefficients:");
    for (((u, v), c), m) in result
        .bitstrings_u
        .iter()
        .zip(&result.bitstrings_v)
        .zip(&result.schmidt_coefficients)
        .zip(&result.multiplicities)
    {
        let suffix = if *m > 1 {
            format!("  (×{m})")
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "    |{}⟩|{}⟩  {:>+.6}{}",
            style(u).cyan(),
            style(v).cyan(),
            c,
            suffix
        );
    }

    if let Some(aux) = &result.aux {
        let _ = writeln!(out, "\n  ⟨N_α⟩ = {:.6}, ⟨N_β⟩ = {:.6}", aux.num_alpha, aux.num_beta);
        let _ = writeln!(
            out,
            "  One-body {:.8}, same-spin {:.8}, cross-spin {:.8}",
            aux.one_body_energy, aux.same_spin_energy, aux.cross_spin_energy
        );
    }
    let _ = write!(out, "\n  Elapsed: {} ms", result.elapsed_ms);
    out
}
