//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use forge_core::{
    ActiveSpaceSelection, Ansatz, AnsatzConfig, Bitstring, Bitstrings, ChemistryDriver,
    ElectronicStructureProblem, IntegralDriver, IntegralTensors,
};

/// A problem as stored on disk.
///
/// Integrals are in the MO basis unless `mo_coeff` is given, in which case
/// they are AO integrals transformed with it.
#[derive(Debug, Deserialize)]
pub struct ProblemFile {
    pub one_body: Vec<Vec<f64>>,
    pub two_body: Vec<Vec<Vec<Vec<f64>>>>,
    pub num_alpha: usize,
    pub num_beta: usize,
    #[serde(default)]
    pub nuclear_repulsion: f64,
    #[serde(default)]
    pub mo_coeff: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub bitstrings: Option<Vec<Bitstring>>,
    #[serde(default)]
    pub bitstrings_u: Option<Vec<Bitstring>>,
    #[serde(default)]
    pub bitstrings_v: Option<Vec<Bitstring>>,
    #[serde(default)]
    pub orbitals_to_reduce: ActiveSpaceSelection,
    #[serde(default)]
    pub ansatz: Option<AnsatzConfig>,
}

impl ProblemFile {
    /// Load from a YAML or JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        load_file(path)
    }

    /// The electronic structure problem, before any reduction.
    pub fn problem(&self) -> Result<ElectronicStructureProblem> {
        let tensors = IntegralTensors::from_nested(&self.one_body, &self.two_body, 0.0)?;
        let driver = match &self.mo_coeff {
            None => IntegralDriver::molecular(
                tensors.one_body().clone(),
                tensors.two_body().clone(),
                self.num_alpha,
                self.num_beta,
                self.nuclear_repulsion,
            ),
            Some(rows) => IntegralDriver::atomic(
                tensors.one_body().clone(),
                tensors.two_body().clone(),
                matrix(rows).context("Invalid mo_coeff")?,
                self.num_alpha,
                self.num_beta,
                self.nuclear_repulsion,
            ),
        };
        Ok(driver.problem()?)
    }

    /// The bitstrings, either one list or an explicit U/V pair.
    pub fn bitstrings(&self) -> Result<Bitstrings> {
        match (&self.bitstrings, &self.bitstrings_u, &self.bitstrings_v) {
            (Some(list), None, None) => Ok(Bitstrings::Symmetric(list.clone())),
            (None, Some(u), Some(v)) => Ok(Bitstrings::Pair {
                u: u.clone(),
                v: v.clone(),
            }),
            (None, None, None) => anyhow::bail!("Problem file has no bitstrings"),
            _ => anyhow::bail!("Give either 'bitstrings' or both 'bitstrings_u' and 'bitstrings_v'"),
        }
    }

    /// The active-space selection, if it removes anything.
    pub fn selection(&self) -> Option<&ActiveSpaceSelection> {
        (!self.orbitals_to_reduce.is_empty()).then_some(&self.orbitals_to_reduce)
    }

    /// The ansatz for a register of `num_qubits`.
    pub fn ansatz(&self, num_qubits: usize) -> Result<Ansatz> {
        let config = self
            .ansatz
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Problem file has no ansatz"))?;
        Ok(config.build(num_qubits)?)
    }
}

/// Deserialize a YAML or JSON file, chosen by extension.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&source)
            .with_context(|| format!("Failed to parse JSON: {}", path.display())),
        _ => serde_yaml_ng::from_str(&source)
            .with_context(|| format!("Failed to parse YAML: {}", path.display())),
    }
}

fn matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != cols) {
        anyhow::bail!("ragged matrix");
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((rows.len(), cols), flat)?)
}

/// Format bitstrings as `[10, 01]`.
pub fn format_bitstrings(list: &[Bitstring]) -> String {
    let items: Vec<String> = list.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}
