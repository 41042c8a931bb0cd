//! Parameterized circuit templates.
//!
//! Every variant exposes the same contract: a qubit count, an ordered list
//! of parameter names and [`Ansatz::bind`], which turns a numeric vector into
//! a fully bound [`Circuit`]. Parameter `i` of the vector binds
//! `parameter_names()[i]`.

use serde::{Deserialize, Serialize};

use forge_ir::{Bindings, Circuit, Instruction, ParameterExpression, QubitId, StandardGate};

use crate::error::{ForgeError, ForgeResult};

/// Qubit pairs for the entanglement layers of [`TwoLocal`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entanglement {
    /// `(i, i + 1)` for consecutive qubits.
    #[default]
    Linear,
    /// Every `(i, j)` with `i < j`.
    Full,
    /// Linear plus `(n - 1, 0)` in front.
    Circular,
    /// Explicit `(control, target)` pairs.
    Pairs(Vec<[u32; 2]>),
}

impl Entanglement {
    fn pairs(&self, n: u32) -> Vec<[u32; 2]> {
        let linear = || (0..n.saturating_sub(1)).map(|i| [i, i + 1]);
        match self {
            Entanglement::Linear => linear().collect(),
            Entanglement::Full => (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| [i, j]))
                .collect(),
            Entanglement::Circular if n > 2 => std::iter::once([n - 1, 0]).chain(linear()).collect(),
            Entanglement::Circular => linear().collect(),
            Entanglement::Pairs(pairs) => pairs.clone(),
        }
    }
}

/// Alternating rotation and entanglement layers.
///
/// Each repetition applies every rotation block to every qubit and then
/// every entanglement block to every entangling pair. A final rotation
/// layer follows unless skipped. Parameters are named `θ[0]`, `θ[1]`, ...
/// in circuit order.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoLocal {
    template: Circuit,
    parameter_names: Vec<String>,
}

impl TwoLocal {
    /// Build the template.
    pub fn new(
        num_qubits: u32,
        rotation_blocks: &[&str],
        entanglement_blocks: &[&str],
        entanglement: Entanglement,
        reps: usize,
        skip_final_rotation_layer: bool,
    ) -> ForgeResult<Self> {
        let mut builder = LayerBuilder::new(num_qubits);
        let pairs = entanglement.pairs(num_qubits);
        for _ in 0..reps {
            builder.rotation_layer(rotation_blocks)?;
            builder.entanglement_layer(entanglement_blocks, &pairs)?;
        }
        if !skip_final_rotation_layer {
            builder.rotation_layer(rotation_blocks)?;
        }
        Ok(Self {
            template: builder.circuit,
            parameter_names: builder.names,
        })
    }
}

struct LayerBuilder {
    circuit: Circuit,
    names: Vec<String>,
}

impl LayerBuilder {
    fn new(num_qubits: u32) -> Self {
        Self {
            circuit: Circuit::new("two_local", num_qubits),
            names: Vec::new(),
        }
    }

    fn gate(&mut self, name: &str, arity: u32) -> ForgeResult<StandardGate> {
        let param = format!("θ[{}]", self.names.len());
        let gate = StandardGate::from_name(name, ParameterExpression::symbol(param.clone()))
            .ok_or_else(|| ForgeError::Config(format!("unknown gate '{name}'")))?;
        if gate.num_qubits() != arity {
            return Err(ForgeError::Config(format!(
                "gate '{name}' acts on {} qubits, expected {arity}",
                gate.num_qubits()
            )));
        }
        if gate.is_parameterized() {
            self.names.push(param);
        }
        Ok(gate)
    }

    fn rotation_layer(&mut self, blocks: &[&str]) -> ForgeResult<()> {
        for block in blocks {
            for q in 0..self.circuit.num_qubits() as u32 {
                let gate = self.gate(block, 1)?;
                self.circuit
                    .append(Instruction::single_qubit_gate(gate, QubitId(q)))?;
            }
        }
        Ok(())
    }

    fn entanglement_layer(&mut self, blocks: &[&str], pairs: &[[u32; 2]]) -> ForgeResult<()> {
        for block in blocks {
            for &[c, t] in pairs {
                let gate = self.gate(block, 2)?;
                self.circuit
                    .append(Instruction::two_qubit_gate(gate, QubitId(c), QubitId(t)))?;
            }
        }
        Ok(())
    }
}

/// One hop of a [`HopGates`] template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hop {
    /// Hop between two qubits with its own free parameter.
    Free([u32; 2]),
    /// Hop with an angle fixed at construction.
    Fixed {
        /// The two qubits.
        qubits: [u32; 2],
        /// Rotation angle.
        angle: f64,
    },
}

impl Hop {
    fn qubits(&self) -> (QubitId, QubitId) {
        let [i, j] = match self {
            Hop::Free(q) | Hop::Fixed { qubits: q, .. } => *q,
        };
        (QubitId(i), QubitId(j))
    }
}

/// Particle-conserving "hop gate" template.
///
/// Each hop `(i, j)` adds the sequence
/// `H(i) CX(j,i) CX(i,j) RY(-θ,i) RY(-θ,j) CX(i,j) H(i)`, which rotates
/// an excitation between the two qubits. Free hops take the next
/// parameter; fixed hops use their constant angle.
#[derive(Debug, Clone, PartialEq)]
pub struct HopGates {
    template: Circuit,
    parameter_names: Vec<String>,
}

impl HopGates {
    /// Build one free hop per `(i, j)` entry, in order.
    pub fn new(num_qubits: u32, hops: &[(u32, u32)]) -> ForgeResult<Self> {
        let hops: Vec<Hop> = hops.iter().map(|&(i, j)| Hop::Free([i, j])).collect();
        Self::from_hops(num_qubits, &hops)
    }

    /// Build from a mix of free and fixed hops, in order.
    pub fn from_hops(num_qubits: u32, hops: &[Hop]) -> ForgeResult<Self> {
        let mut circuit = Circuit::new("hop_gates", num_qubits);
        let mut parameter_names = Vec::new();
        for hop in hops {
            let theta = match hop {
                Hop::Free(_) => {
                    let name = format!("θ[{}]", parameter_names.len());
                    parameter_names.push(name.clone());
                    -ParameterExpression::symbol(name)
                }
                Hop::Fixed { angle, .. } => ParameterExpression::constant(-angle),
            };
            let (qi, qj) = hop.qubits();
            circuit
                .h(qi)?
                .cx(qj, qi)?
                .cx(qi, qj)?
                .ry(theta.clone(), qi)?
                .ry(theta, qj)?
                .cx(qi, qj)?
                .h(qi)?;
        }
        Ok(Self {
            template: circuit,
            parameter_names,
        })
    }
}

/// A caller-supplied parameterized circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAnsatz {
    template: Circuit,
    parameter_names: Vec<String>,
}

impl CustomAnsatz {
    /// Wrap `circuit`. Without explicit `order`, parameters bind in sorted
    /// name order; with it, `order` must list each parameter exactly once.
    pub fn new(circuit: Circuit, order: Option<Vec<String>>) -> ForgeResult<Self> {
        let found = circuit.parameters();
        let parameter_names = match order {
            None => found.into_iter().collect(),
            Some(order) => {
                let listed: std::collections::BTreeSet<String> = order.iter().cloned().collect();
                if listed.len() != order.len() || listed != found {
                    return Err(ForgeError::Config(format!(
                        "parameter order {order:?} does not match circuit parameters {found:?}"
                    )));
                }
                order
            }
        };
        Ok(Self {
            template: circuit,
            parameter_names,
        })
    }
}

/// A parameterized circuit template for one subsystem register.
#[derive(Debug, Clone, PartialEq)]
pub enum Ansatz {
    /// Hardware-efficient layered template.
    TwoLocal(TwoLocal),
    /// Particle-conserving hop gates.
    HopGates(HopGates),
    /// Arbitrary user circuit.
    Custom(CustomAnsatz),
}

impl Ansatz {
    /// The two-qubit template used for H2 in the minimal basis:
    /// `CRY(θ[0]; 0→1)` followed by `CRY(θ[1]; 1→0)`.
    pub fn h2_minimal() -> ForgeResult<Self> {
        TwoLocal::new(
            2,
            &[],
            &["cry"],
            Entanglement::Pairs(vec![[0, 1], [1, 0]]),
            1,
            true,
        )
        .map(Ansatz::TwoLocal)
    }

    fn parts(&self) -> (&Circuit, &[String]) {
        match self {
            Ansatz::TwoLocal(a) => (&a.template, &a.parameter_names),
            Ansatz::HopGates(a) => (&a.template, &a.parameter_names),
            Ansatz::Custom(a) => (&a.template, &a.parameter_names),
        }
    }

    /// Register width.
    pub fn num_qubits(&self) -> usize {
        self.template().num_qubits()
    }

    /// Number of free parameters.
    pub fn num_parameters(&self) -> usize {
        self.parameter_names().len()
    }

    /// Parameter names in binding order.
    pub fn parameter_names(&self) -> &[String] {
        self.parts().1
    }

    /// The unbound circuit.
    pub fn template(&self) -> &Circuit {
        self.parts().0
    }

    /// Whether every gate of the template has a real matrix.
    pub fn is_real(&self) -> bool {
        self.template().is_real()
    }

    /// Bind `params` positionally.
    pub fn bind(&self, params: &[f64]) -> ForgeResult<Circuit> {
        let (template, names) = self.parts();
        if params.len() != names.len() {
            return Err(ForgeError::Config(format!(
                "ansatz takes {} parameters, got {}",
                names.len(),
                params.len()
            )));
        }
        let bindings: Bindings = names.iter().cloned().zip(params.iter().copied()).collect();
        Ok(template.assign(&bindings)?)
    }
}

fn default_reps() -> usize {
    1
}

/// Serializable ansatz description, as used in problem files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnsatzConfig {
    /// See [`TwoLocal`].
    TwoLocal {
        /// Single-qubit gate names.
        #[serde(default)]
        rotation_blocks: Vec<String>,
        /// Two-qubit gate names.
        #[serde(default)]
        entanglement_blocks: Vec<String>,
        /// Entangling pairs.
        #[serde(default)]
        entanglement: Entanglement,
        /// Number of repetitions.
        #[serde(default = "default_reps")]
        reps: usize,
        /// Omit the trailing rotation layer.
        #[serde(default)]
        skip_final_rotation_layer: bool,
    },
    /// See [`HopGates`].
    HopGates {
        /// One hop each: a qubit pair, or `{qubits, angle}` for a fixed hop.
        hops: Vec<Hop>,
    },
}

impl AnsatzConfig {
    /// Instantiate for a register of `num_qubits`.
    pub fn build(&self, num_qubits: usize) -> ForgeResult<Ansatz> {
        let n = num_qubits as u32;
        match self {
            AnsatzConfig::TwoLocal {
                rotation_blocks,
                entanglement_blocks,
                entanglement,
                reps,
                skip_final_rotation_layer,
            } => {
                let rot: Vec<&str> = rotation_blocks.iter().map(String::as_str).collect();
                let ent: Vec<&str> = entanglement_blocks.iter().map(String::as_str).collect();
                TwoLocal::new(n, &rot, &ent, entanglement.clone(), *reps, *skip_final_rotation_layer)
                    .map(Ansatz::TwoLocal)
            }
            AnsatzConfig::HopGates { hops } => HopGates::from_hops(n, hops).map(Ansatz::HopGates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h2_template() {
        let ansatz = Ansatz::h2_minimal().unwrap();
        assert_eq!(ansatz.num_qubits(), 2);
        assert_eq!(ansatz.parameter_names(), ["θ[0]", "θ[1]"]);
        assert!(ansatz.is_real());

        let insts = ansatz.template().instructions();
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].name(), "cry");
        assert_eq!(insts[0].qubits, vec![QubitId(0), QubitId(1)]);
        assert_eq!(insts[1].qubits, vec![QubitId(1), QubitId(0)]);
    }

    #[test]
    fn test_two_local_layer_order() {
        let ansatz = TwoLocal::new(3, &["ry"], &["cx"], Entanglement::Linear, 2, false).unwrap();
        // 3 rotation layers of 3 params, 2 entanglement layers of 2 CX
        assert_eq!(ansatz.parameter_names.len(), 9);
        assert_eq!(ansatz.template.len(), 13);
        assert_eq!(ansatz.parameter_names[8], "θ[8]");
    }

    #[test]
    fn test_entanglement_pairs() {
        assert_eq!(Entanglement::Full.pairs(3), vec![[0, 1], [0, 2], [1, 2]]);
        assert_eq!(Entanglement::Circular.pairs(3), vec![[2, 0], [0, 1], [1, 2]]);
        assert_eq!(Entanglement::Circular.pairs(2), vec![[0, 1]]);
    }

    #[test]
    fn test_unknown_or_misplaced_gate() {
        assert!(TwoLocal::new(2, &["foo"], &[], Entanglement::Linear, 1, false).is_err());
        assert!(TwoLocal::new(2, &["cx"], &[], Entanglement::Linear, 1, false).is_err());
    }

    #[test]
    fn test_bind_checks_length() {
        let ansatz = Ansatz::h2_minimal().unwrap();
        assert!(matches!(ansatz.bind(&[0.1]), Err(ForgeError::Config(_))));
        let bound = ansatz.bind(&[0.1, 0.2]).unwrap();
        assert!(!bound.is_parameterized());
    }

    #[test]
    fn test_hop_gates_shape() {
        let ansatz = Ansatz::HopGates(HopGates::new(3, &[(0, 1), (1, 2)]).unwrap());
        assert_eq!(ansatz.num_parameters(), 2);
        assert_eq!(ansatz.template().len(), 14);
        assert!(ansatz.is_real());
    }

    #[test]
    fn test_fixed_hop_takes_no_parameter() {
        let yaml = "kind: hop_gates\nhops:\n  - [0, 1]\n  - {qubits: [1, 3], angle: 0.0}\n  - [2, 3]\n";
        let config: AnsatzConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let ansatz = config.build(4).unwrap();
        assert_eq!(ansatz.parameter_names(), ["θ[0]", "θ[1]"]);
        assert_eq!(ansatz.template().len(), 21);

        // The fixed hop stays bound while the free ones take the vector.
        let bound = ansatz.bind(&[0.3, -0.4]).unwrap();
        assert!(!bound.is_parameterized());
        assert!(ansatz.bind(&[0.3, -0.4, 0.5]).is_err());
    }

    #[test]
    fn test_custom_order() {
        let mut circuit = Circuit::new("c", 1);
        circuit.ry("b", QubitId(0)).unwrap().ry("a", QubitId(0)).unwrap();

        let sorted = CustomAnsatz::new(circuit.clone(), None).unwrap();
        assert_eq!(Ansatz::Custom(sorted).parameter_names(), ["a", "b"]);

        let ordered = CustomAnsatz::new(circuit.clone(), Some(vec!["b".into(), "a".into()])).unwrap();
        assert_eq!(Ansatz::Custom(ordered).parameter_names(), ["b", "a"]);

        assert!(CustomAnsatz::new(circuit, Some(vec!["a".into()])).is_err());
    }

    #[test]
    fn test_config_yaml() {
        let yaml = "kind: two_local\nentanglement_blocks: [cry]\nentanglement:\n  pairs: [[0, 1], [1, 0]]\nskip_final_rotation_layer: true\n";
        let config: AnsatzConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.build(2).unwrap(), Ansatz::h2_minimal().unwrap());
    }
}
