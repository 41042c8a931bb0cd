//! Reduce command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use super::common::{ProblemFile, format_bitstrings};

/// Execute the reduce command.
pub fn execute(path: &Path) -> Result<()> {
    let file = ProblemFile::load(path)?;
    let problem = file.problem()?;
    let set = file.bitstrings()?.into_set()?;

    println!(
        "{} Reducing {} ({} orbitals, {}α + {}β electrons)",
        style("→").cyan().bold(),
        style(path.display()).green(),
        problem.num_orbitals(),
        problem.num_alpha(),
        problem.num_beta()
    );

    let Some(selection) = file.selection() else {
        println!("  No orbitals to reduce");
        return Ok(());
    };

    let reduced = problem.reduce(selection)?;
    let core_limit = problem.core_limit();
    let frozen = selection.frozen(core_limit);
    let reduced_set = set.reduce(selection, core_limit)?;

    println!("  Frozen core:      {:?}", frozen);
    println!(
        "  Discarded:        {:?}",
        selection
            .removed()
            .iter()
            .filter(|&&i| !frozen.contains(&i))
            .collect::<Vec<_>>()
    );
    println!(
        "  Active orbitals:  {:?}",
        selection.active(problem.num_orbitals())
    );
    println!(
        "  Electrons:        {}α + {}β",
        reduced.num_alpha(),
        reduced.num_beta()
    );
    println!("  Bitstrings U:     {}", format_bitstrings(reduced_set.u()));
    if !reduced_set.is_symmetric() {
        println!("  Bitstrings V:     {}", format_bitstrings(reduced_set.v()));
    }
    println!(
        "  Core energy:      {:.12}",
        reduced.energy_offset() - problem.energy_offset()
    );
    println!(
        "\n{} Energy offset: {:.12} Ha",
        style("✓").green().bold(),
        reduced.energy_offset()
    );
    Ok(())
}
