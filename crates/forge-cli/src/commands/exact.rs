//! Exact command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use forge_core::fci_energy;

use super::common::ProblemFile;

/// Execute the exact command.
pub fn execute(path: &Path) -> Result<()> {
    let file = ProblemFile::load(path)?;
    let problem = file.problem()?;

    println!(
        "{} Full CI for {} ({} orbitals, {}α + {}β electrons)",
        style("→").cyan().bold(),
        style(path.display()).green(),
        problem.num_orbitals(),
        problem.num_alpha(),
        problem.num_beta()
    );

    let energy = fci_energy(&problem)?;
    println!(
        "\n{} FCI energy: {:.12} Ha",
        style("✓").green().bold(),
        energy
    );

    if let Some(selection) = file.selection() {
        let reduced = problem.reduce(selection)?;
        let active = fci_energy(&reduced)?;
        println!(
            "  Active space ({} orbitals): {:.12} Ha",
            reduced.num_orbitals(),
            active
        );
    }
    Ok(())
}
