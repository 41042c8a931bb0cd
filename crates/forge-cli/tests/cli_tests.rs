//! End-to-end tests of the `forge` binary.
//!
//! Each test writes problem and settings files into a temporary directory
//! and runs the compiled binary on them.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const H2_FORGED: f64 = -1.1219365445030705;

/// H2 in the minimal basis, MO integrals.
const H2_MO: &str = r#"
one_body: [[-1.2563390605830187, 0.0], [0.0, -0.4718960047457763]]
two_body:
  - - [[0.6757101363156085, 0.0], [0.0, 0.66458172363915]]
    - [[0.0, 0.18093118965651345], [0.18093118965651345, 0.0]]
  - - [[0.0, 0.18093118965651345], [0.18093118965651345, 0.0]]
    - [[0.66458172363915, 0.0], [0.0, 0.6985737716678484]]
num_alpha: 1
num_beta: 1
nuclear_repulsion: 0.7199689944489797
bitstrings: [[1, 0], [0, 1]]
ansatz:
  kind: two_local
  entanglement_blocks: [cry]
  entanglement:
    pairs: [[0, 1], [1, 0]]
  skip_final_rotation_layer: true
"#;

/// The same molecule from AO integrals plus MO coefficients.
const H2_AO: &str = r#"{
  "one_body": [[-1.12421758, -0.9652574], [-0.9652574, -1.12421758]],
  "two_body": [
    [[[0.77460594, 0.44744572], [0.44744572, 0.57187698]],
     [[0.44744572, 0.3009177], [0.3009177, 0.44744572]]],
    [[[0.44744572, 0.3009177], [0.3009177, 0.44744572]],
     [[0.57187698, 0.44744572], [0.44744572, 0.77460594]]]
  ],
  "mo_coeff": [[0.54830202, 1.21832731], [0.54830202, -1.21832731]],
  "num_alpha": 1,
  "num_beta": 1,
  "nuclear_repulsion": 0.7199689944489797,
  "bitstrings_u": [[1, 0], [0, 1]],
  "bitstrings_v": [[1, 0], [0, 1]],
  "ansatz": {
    "kind": "two_local",
    "entanglement_blocks": ["cry"],
    "entanglement": {"pairs": [[0, 1], [1, 0]]},
    "skip_final_rotation_layer": true
  }
}"#;

const SETTINGS: &str = "maxiter: 0\ninitial_params: [0.0, 1.5707963267948966]\n";

fn forge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_forge"))
        .args(args)
        .output()
        .expect("failed to run forge")
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn energy_from_json(json: &str) -> f64 {
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    value["energy"].as_f64().unwrap()
}

struct Fixture {
    _dir: TempDir,
    problem: PathBuf,
    settings: PathBuf,
    root: PathBuf,
}

fn fixture(name: &str, problem: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    Fixture {
        problem: write(&root, name, problem),
        settings: write(&root, "solver.yaml", SETTINGS),
        root,
        _dir: dir,
    }
}

// ----------------------------------------------------------------------------
// solve
// ----------------------------------------------------------------------------

#[test]
fn test_solve_json_to_stdout() {
    let f = fixture("h2.yaml", H2_MO);
    let out = forge(&[
        "solve",
        "--problem",
        f.problem.to_str().unwrap(),
        "--config",
        f.settings.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let energy = energy_from_json(&stdout(&out));
    assert!((energy - H2_FORGED).abs() < 1e-7, "energy {energy}");
}

#[test]
fn test_solve_from_ao_integrals() {
    let f = fixture("h2.json", H2_AO);
    let out = forge(&[
        "solve",
        "-p",
        f.problem.to_str().unwrap(),
        "-c",
        f.settings.to_str().unwrap(),
        "-f",
        "json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let energy = energy_from_json(&stdout(&out));
    assert!((energy - H2_FORGED).abs() < 1e-7, "energy {energy}");
}

#[test]
fn test_solve_writes_output_file() {
    let f = fixture("h2.yaml", H2_MO);
    let result = f.root.join("result.json");
    let out = forge(&[
        "solve",
        "--problem",
        f.problem.to_str().unwrap(),
        "--config",
        f.settings.to_str().unwrap(),
        "--format",
        "json",
        "--output",
        result.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let json = std::fs::read_to_string(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["iterations"], 0);
    assert_eq!(value["state"], "max_iters_reached");
    assert_eq!(value["bitstrings_u"], serde_json::json!([[1, 0], [0, 1]]));
}

#[test]
fn test_solve_text_with_overrides() {
    let f = fixture("h2.yaml", H2_MO);
    let out = forge(&[
        "solve",
        "--problem",
        f.problem.to_str().unwrap(),
        "--maxiter",
        "3",
        "--optimizer",
        "cobyla",
        "--seed",
        "5",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("Energy:"));
    assert!(text.contains("COBYLA"));
    assert!(text.contains("Schmidt coefficients"));
}

#[test]
fn test_solve_rejects_unknown_optimizer() {
    let f = fixture("h2.yaml", H2_MO);
    let out = forge(&[
        "solve",
        "--problem",
        f.problem.to_str().unwrap(),
        "--optimizer",
        "adam",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error:"));
}

#[test]
fn test_solve_rejects_unknown_format() {
    let f = fixture("h2.yaml", H2_MO);
    let out = forge(&[
        "solve",
        "--problem",
        f.problem.to_str().unwrap(),
        "--format",
        "xml",
    ]);
    assert!(!out.status.success());
}

#[test]
fn test_missing_problem_file() {
    let out = forge(&["solve", "--problem", "/nonexistent/h2.yaml"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("File not found"), "{stderr}");
}

// ----------------------------------------------------------------------------
// reduce / exact
// ----------------------------------------------------------------------------

#[test]
fn test_reduce_freezes_core() {
    let problem = format!("{H2_MO}orbitals_to_reduce: [0]\n").replace(
        "bitstrings: [[1, 0], [0, 1]]",
        "bitstrings: [[1, 0]]",
    );
    let f = fixture("h2.yaml", &problem);
    let out = forge(&["reduce", "--problem", f.problem.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("Frozen core:      [0]"), "{text}");
    assert!(text.contains("Active orbitals:  [1]"), "{text}");
    assert!(text.contains("-1.116998990"), "{text}");
}

#[test]
fn test_reduce_without_selection() {
    let f = fixture("h2.yaml", H2_MO);
    let out = forge(&["reduce", "--problem", f.problem.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("No orbitals to reduce"));
}

#[test]
fn test_exact_energy() {
    let f = fixture("h2.yaml", H2_MO);
    let out = forge(&["exact", "--problem", f.problem.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("-1.137306026"), "{}", stdout(&out));
}
