//! Statevector simulation engine.
//!
//! Qubit `q` is bit `1 << q` of an amplitude index. Every gate is applied
//! in place by pairing the amplitudes that differ only in the target bit.

use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

use forge_hal::{HalError, HalResult};
use forge_ir::{Instruction, ParameterExpression, StandardGate};
use forge_ops::{Observable, PauliString};

type Matrix2 = [[Complex64; 2]; 2];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const IM: Complex64 = Complex64::new(0.0, 1.0);

/// A pure state of `num_qubits` qubits.
pub struct Statevector {
    amplitudes: Vec<Complex64>,
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let mut amplitudes = vec![ZERO; 1 << num_qubits];
        amplitudes[0] = ONE;
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Amplitudes in basis-index order.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Apply one bound instruction.
    pub fn apply(&mut self, instruction: &Instruction) -> HalResult<()> {
        let q: Vec<usize> = instruction.qubits.iter().map(|q| q.index()).collect();
        match &instruction.gate {
            StandardGate::I => {}
            StandardGate::X => self.apply_x(q[0]),
            StandardGate::Y => self.apply_1q(q[0], [[ZERO, -IM], [IM, ZERO]]),
            StandardGate::Z => self.apply_diagonal(q[0], ONE, -ONE),
            StandardGate::H => {
                let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
                self.apply_1q(q[0], [[h, h], [h, -h]]);
            }
            StandardGate::S => self.apply_diagonal(q[0], ONE, IM),
            StandardGate::Sdg => self.apply_diagonal(q[0], ONE, -IM),
            StandardGate::Rx(t) => self.apply_1q(q[0], rx(angle(t)?)),
            StandardGate::Ry(t) => self.apply_1q(q[0], ry(angle(t)?)),
            StandardGate::Rz(t) => {
                let t = angle(t)?;
                self.apply_diagonal(
                    q[0],
                    Complex64::from_polar(1.0, -t / 2.0),
                    Complex64::from_polar(1.0, t / 2.0),
                );
            }
            StandardGate::P(t) => {
                let phase = Complex64::from_polar(1.0, angle(t)?);
                self.apply_diagonal(q[0], ONE, phase);
            }
            StandardGate::CX => self.apply_cx(q[0], q[1]),
            StandardGate::CZ => self.apply_cz(q[0], q[1]),
            StandardGate::Swap => self.apply_swap(q[0], q[1]),
            StandardGate::CRx(t) => self.apply_controlled(q[0], q[1], rx(angle(t)?)),
            StandardGate::CRy(t) => self.apply_controlled(q[0], q[1], ry(angle(t)?)),
            StandardGate::CRz(t) => {
                let t = angle(t)?;
                let m = [
                    [Complex64::from_polar(1.0, -t / 2.0), ZERO],
                    [ZERO, Complex64::from_polar(1.0, t / 2.0)],
                ];
                self.apply_controlled(q[0], q[1], m);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Gate kernels
    // =========================================================================

    fn apply_1q(&mut self, qubit: usize, m: Matrix2) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = m[0][0] * a + m[0][1] * b;
                self.amplitudes[j] = m[1][0] * a + m[1][1] * b;
            }
        }
    }

    fn apply_controlled(&mut self, control: usize, target: usize, m: Matrix2) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = m[0][0] * a + m[0][1] * b;
                self.amplitudes[j] = m[1][0] * a + m[1][1] * b;
            }
        }
    }

    fn apply_diagonal(&mut self, qubit: usize, d0: Complex64, d1: Complex64) {
        let mask = 1 << qubit;
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            *amp *= if i & mask == 0 { d0 } else { d1 };
        }
    }

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                self.amplitudes.swap(i, i | mask);
            }
        }
    }

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                self.amplitudes.swap(i, i | tgt_mask);
            }
        }
    }

    fn apply_cz(&mut self, q1: usize, q2: usize) {
        let mask = (1 << q1) | (1 << q2);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & mask == mask {
                *amp = -*amp;
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..(1 << self.num_qubits) {
            if (i & mask1 != 0) && (i & mask2 == 0) {
                let j = (i & !mask1) | mask2;
                self.amplitudes.swap(i, j);
            }
        }
    }

    // =========================================================================
    // Expectation values
    // =========================================================================

    /// `⟨ψ|P|ψ⟩` for a single Pauli string.
    pub fn expectation(&self, pauli: &PauliString) -> f64 {
        let (x, z) = pauli.masks();
        let (x, z) = (x as usize, z as usize);
        let y_phase = IM.powu(pauli.num_y());
        let mut acc = ZERO;
        for (b, amp) in self.amplitudes.iter().enumerate() {
            if amp.norm_sqr() == 0.0 {
                continue;
            }
            let sign = if (b & z).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            acc += self.amplitudes[b ^ x].conj() * amp * sign;
        }
        (acc * y_phase).re
    }

    /// `⟨ψ|O|ψ⟩` for a real-weighted Pauli sum.
    pub fn observable_expectation(&self, observable: &Observable) -> f64 {
        observable
            .terms()
            .iter()
            .map(|(p, c)| c * self.expectation(p))
            .sum()
    }
}

fn angle(expr: &ParameterExpression) -> HalResult<f64> {
    expr.as_f64()
        .ok_or_else(|| HalError::InvalidCircuit(format!("unbound angle {expr}")))
}

fn rx(theta: f64) -> Matrix2 {
    let c = Complex64::new((theta / 2.0).cos(), 0.0);
    let s = Complex64::new(0.0, -(theta / 2.0).sin());
    [[c, s], [s, c]]
}

fn ry(theta: f64) -> Matrix2 {
    let c = Complex64::new((theta / 2.0).cos(), 0.0);
    let s = Complex64::new((theta / 2.0).sin(), 0.0);
    [[c, -s], [s, c]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_ir::{Circuit, QubitId};
    use forge_ops::PauliOp;

    fn run(circuit: &Circuit) -> Statevector {
        let mut sv = Statevector::new(circuit.num_qubits());
        for inst in circuit.instructions() {
            sv.apply(inst).unwrap();
        }
        sv
    }

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn test_bell_state() {
        let mut c = Circuit::new("bell", 2);
        c.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        let sv = run(&c);

        let r = Complex64::new(FRAC_1_SQRT_2, 0.0);
        assert!(approx_eq(sv.amplitudes()[0], r));
        assert!(approx_eq(sv.amplitudes()[1], ZERO));
        assert!(approx_eq(sv.amplitudes()[2], ZERO));
        assert!(approx_eq(sv.amplitudes()[3], r));

        let zz = PauliString::from_ops([(0, PauliOp::Z), (1, PauliOp::Z)]);
        let xx = PauliString::from_ops([(0, PauliOp::X), (1, PauliOp::X)]);
        let yy = PauliString::from_ops([(0, PauliOp::Y), (1, PauliOp::Y)]);
        assert!((sv.expectation(&zz) - 1.0).abs() < 1e-12);
        assert!((sv.expectation(&xx) - 1.0).abs() < 1e-12);
        assert!((sv.expectation(&yy) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_qubit_zero_is_low_bit() {
        let mut c = Circuit::new("flip", 3);
        c.x(QubitId(1)).unwrap();
        let sv = run(&c);
        assert!(approx_eq(sv.amplitudes()[0b010], ONE));
        assert!((sv.expectation(&PauliString::single(1, PauliOp::Z)) + 1.0).abs() < 1e-12);
        assert!((sv.expectation(&PauliString::single(0, PauliOp::Z)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_y_expectation_after_s() {
        // S H |0⟩ = |+i⟩
        let mut c = Circuit::new("plus_i", 1);
        c.h(QubitId(0)).unwrap().s(QubitId(0)).unwrap();
        let sv = run(&c);
        assert!((sv.expectation(&PauliString::single(0, PauliOp::Y)) - 1.0).abs() < 1e-12);
        assert!(sv.expectation(&PauliString::single(0, PauliOp::X)).abs() < 1e-12);
    }

    #[test]
    fn test_ry_rotation() {
        let theta: f64 = 0.7;
        let mut c = Circuit::new("ry", 1);
        c.ry(theta, QubitId(0)).unwrap();
        let sv = run(&c);
        let z = sv.expectation(&PauliString::single(0, PauliOp::Z));
        let x = sv.expectation(&PauliString::single(0, PauliOp::X));
        assert!((z - theta.cos()).abs() < 1e-12);
        assert!((x - theta.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_controlled_rotation_needs_control() {
        let mut c = Circuit::new("cry", 2);
        c.cry(std::f64::consts::PI, QubitId(0), QubitId(1)).unwrap();
        let sv = run(&c);
        assert!(approx_eq(sv.amplitudes()[0], ONE));

        let mut c = Circuit::new("cry", 2);
        c.x(QubitId(0))
            .unwrap()
            .cry(std::f64::consts::PI, QubitId(0), QubitId(1))
            .unwrap();
        let sv = run(&c);
        assert!(approx_eq(sv.amplitudes()[0b11], ONE));
    }

    #[test]
    fn test_swap() {
        let mut c = Circuit::new("swap", 2);
        c.x(QubitId(0)).unwrap().swap(QubitId(0), QubitId(1)).unwrap();
        let sv = run(&c);
        assert!(approx_eq(sv.amplitudes()[0b10], ONE));
    }

    #[test]
    fn test_unbound_angle_rejected() {
        let mut c = Circuit::new("free", 1);
        c.rx("theta", QubitId(0)).unwrap();
        let mut sv = Statevector::new(1);
        assert!(sv.apply(&c.instructions()[0]).is_err());
    }

    #[test]
    fn test_observable_expectation() {
        let obs = Observable::from_terms([
            (PauliString::identity(), 0.5),
            (PauliString::single(0, PauliOp::Z), -0.5),
        ]);
        let mut c = Circuit::new("n0", 1);
        c.x(QubitId(0)).unwrap();
        // (I - Z)/2 is the occupation of qubit 0
        assert!((run(&c).observable_expectation(&obs) - 1.0).abs() < 1e-12);
        assert!(Statevector::new(1).observable_expectation(&obs).abs() < 1e-12);
    }
}
