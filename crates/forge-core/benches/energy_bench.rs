//! Benchmarks for forged energy evaluation
//!
//! Run with: cargo bench -p forge-core

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ndarray::{Array4, array};

use forge_adapter_sim::SimulatorBackend;
use forge_core::{
    Ansatz, Bitstring, ChemistryDriver, ElectronicStructureProblem, IntegralDriver, SolverConfig,
    SolverSettings, fci_energy, solve,
};

fn h2() -> ElectronicStructureProblem {
    let hcore = array![[-1.12421758, -0.9652574], [-0.9652574, -1.12421758]];
    let mo_coeff = array![[0.54830202, 1.21832731], [0.54830202, -1.21832731]];
    let block = |m: usize, n: usize| -> [[f64; 2]; 2] {
        match (m, n) {
            (0, 0) => [[0.77460594, 0.44744572], [0.44744572, 0.57187698]],
            (1, 1) => [[0.57187698, 0.44744572], [0.44744572, 0.77460594]],
            _ => [[0.44744572, 0.3009177], [0.3009177, 0.44744572]],
        }
    };
    let eri = Array4::from_shape_fn((2, 2, 2, 2), |(m, n, l, s)| block(m, n)[l][s]);
    IntegralDriver::atomic(hcore, eri, mo_coeff, 1, 1, 0.7199689944489797)
        .problem()
        .unwrap()
}

/// One energy evaluation (maxiter = 0), exact and sampled.
fn bench_energy_evaluation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let problem = h2();
    let ansatz = Ansatz::h2_minimal().unwrap();
    let bitstrings: Vec<Bitstring> = vec!["10".parse().unwrap(), "01".parse().unwrap()];

    let mut group = c.benchmark_group("energy_evaluation");
    for shots in [None, Some(1024u32)] {
        let label = shots.map_or("exact".to_string(), |s| format!("{s}_shots"));
        let settings = SolverSettings {
            maxiter: 0,
            shots,
            initial_params: Some(vec![0.0, FRAC_PI_2]),
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("h2", label), &settings, |b, settings| {
            b.iter(|| {
                let config = SolverConfig::new(Arc::new(SimulatorBackend::new()))
                    .with_settings(settings.clone());
                rt.block_on(solve(
                    black_box(&problem),
                    &ansatz,
                    bitstrings.clone(),
                    config,
                    None,
                ))
                .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_fci(c: &mut Criterion) {
    let problem = h2();
    c.bench_function("fci_h2", |b| b.iter(|| fci_energy(black_box(&problem)).unwrap()));
}

criterion_group!(benches, bench_energy_evaluation, bench_fci);
criterion_main!(benches);
