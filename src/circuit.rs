//! Circuit model: gate DAG, R1CS view, and statement circuits
//!
//! Two layers live here:
//!
//! 1. [`LogicCircuit`] — an arithmetic-circuit builder for propositional
//!    formulas. Gates follow the standard field encodings (booleans as
//!    `{0, 1}` in Fr):
//!
//!    ```text
//!    AND(a,b)     = a*b
//!    OR(a,b)      = a + b − a*b
//!    NOT(a)       = 1 − a
//!    IMPLIES(a,b) = (1−a) + b − (1−a)*b
//!    XOR(a,b)     = a + b − 2*a*b
//!    ```
//!
//!    `to_r1cs` flattens the DAG into a simplified rank-1 constraint listing
//!    for downstream compilers; the external Groth16 binary owns the real
//!    R1CS compilation.
//!
//! 2. Statement circuits — [`MvpCircuit`] (version 1: "prover knows an axiom
//!    set matching the public commitment") and [`TdfolV1DerivationCircuit`]
//!    (version >= 2: additionally, the witness carries a valid non-empty
//!    forward-chaining trace ending in the theorem atom).

use std::collections::BTreeMap;

use ark_ff::One;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::statement::{expected_commitment_hex, Statement, Witness};
use crate::{canonical, semantics, ZkpError, F};

/// Gate kinds supported by [`LogicCircuit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateKind {
    And,
    Or,
    Not,
    Implies,
    Xor,
}

impl GateKind {
    fn as_str(&self) -> &'static str {
        match self {
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Not => "NOT",
            GateKind::Implies => "IMPLIES",
            GateKind::Xor => "XOR",
        }
    }
}

/// A single gate: kind, input wire indices, output wire index.
#[derive(Clone, Debug)]
pub struct CircuitGate {
    pub kind: GateKind,
    pub inputs: Vec<usize>,
    pub output: usize,
}

/// One entry of the simplified R1CS listing produced by
/// [`LogicCircuit::to_r1cs`].
#[derive(Clone, Debug)]
pub struct R1csConstraint {
    /// Gate the constraint was lowered from.
    pub kind: GateKind,
    /// Input wire indices.
    pub inputs: Vec<usize>,
    /// Output wire index.
    pub output: usize,
}

/// Simplified rank-1 constraint system view of a [`LogicCircuit`].
#[derive(Clone, Debug)]
pub struct R1csSystem {
    pub num_constraints: usize,
    pub num_variables: usize,
    pub constraints: Vec<R1csConstraint>,
    /// Wires designated as public outputs.
    pub public_outputs: Vec<usize>,
}

/// Arithmetic-circuit builder for propositional formulas over Fr.
#[derive(Clone, Debug, Default)]
pub struct LogicCircuit {
    gates: Vec<CircuitGate>,
    inputs: BTreeMap<String, usize>,
    outputs: Vec<usize>,
    next_wire: usize,
}

impl LogicCircuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named input wire and return its index.
    pub fn add_input(&mut self, name: &str) -> usize {
        let wire = self.next_wire;
        self.next_wire += 1;
        self.inputs.insert(name.to_string(), wire);
        wire
    }

    fn push_gate(&mut self, kind: GateKind, inputs: Vec<usize>) -> usize {
        let output = self.next_wire;
        self.next_wire += 1;
        self.gates.push(CircuitGate { kind, inputs, output });
        output
    }

    /// `AND(a,b) = a*b`
    pub fn add_and_gate(&mut self, a: usize, b: usize) -> usize {
        self.push_gate(GateKind::And, vec![a, b])
    }

    /// `OR(a,b) = a + b − a*b`
    pub fn add_or_gate(&mut self, a: usize, b: usize) -> usize {
        self.push_gate(GateKind::Or, vec![a, b])
    }

    /// `NOT(a) = 1 − a`
    pub fn add_not_gate(&mut self, a: usize) -> usize {
        self.push_gate(GateKind::Not, vec![a])
    }

    /// `IMPLIES(a,b) = (1−a) + b − (1−a)*b`
    pub fn add_implies_gate(&mut self, a: usize, b: usize) -> usize {
        self.push_gate(GateKind::Implies, vec![a, b])
    }

    /// `XOR(a,b) = a + b − 2*a*b`
    pub fn add_xor_gate(&mut self, a: usize, b: usize) -> usize {
        self.push_gate(GateKind::Xor, vec![a, b])
    }

    /// Mark a wire as a circuit output.
    pub fn set_output(&mut self, wire: usize) {
        self.outputs.push(wire);
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_wires(&self) -> usize {
        self.next_wire
    }

    /// Stable hash of the circuit structure (canonical JSON, SHA-256, hex).
    pub fn circuit_hash(&self) -> String {
        let gates: Vec<_> = self
            .gates
            .iter()
            .map(|g| {
                json!({
                    "type": g.kind.as_str(),
                    "inputs": g.inputs,
                    "output": g.output,
                })
            })
            .collect();
        let preimage = canonical::canonical_json(&json!({
            "num_gates": self.gates.len(),
            "num_inputs": self.inputs.len(),
            "num_wires": self.next_wire,
            "gates": gates,
        }));
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }

    /// Evaluate the circuit over Fr given boolean input assignments.
    ///
    /// Returns the values of the output wires in `set_output` order. Fails
    /// with `InvalidInput` if an input name is missing or a gate reads a wire
    /// that has no value yet (gates evaluate in insertion order).
    pub fn evaluate(&self, assignments: &BTreeMap<String, bool>) -> Result<Vec<F>, ZkpError> {
        let mut wires: Vec<Option<F>> = vec![None; self.next_wire];
        for (name, wire) in &self.inputs {
            let value = assignments.get(name).ok_or_else(|| {
                ZkpError::InvalidInput(format!("missing assignment for input '{name}'"))
            })?;
            wires[*wire] = Some(if *value { F::one() } else { F::from(0u64) });
        }

        let read = |wires: &[Option<F>], idx: usize| -> Result<F, ZkpError> {
            wires
                .get(idx)
                .copied()
                .flatten()
                .ok_or_else(|| ZkpError::InvalidInput(format!("wire {idx} has no value")))
        };

        for gate in &self.gates {
            let value = match gate.kind {
                GateKind::And => {
                    let (a, b) = (read(&wires, gate.inputs[0])?, read(&wires, gate.inputs[1])?);
                    a * b
                }
                GateKind::Or => {
                    let (a, b) = (read(&wires, gate.inputs[0])?, read(&wires, gate.inputs[1])?);
                    a + b - a * b
                }
                GateKind::Not => {
                    let a = read(&wires, gate.inputs[0])?;
                    F::one() - a
                }
                GateKind::Implies => {
                    let (a, b) = (read(&wires, gate.inputs[0])?, read(&wires, gate.inputs[1])?);
                    let na = F::one() - a;
                    na + b - na * b
                }
                GateKind::Xor => {
                    let (a, b) = (read(&wires, gate.inputs[0])?, read(&wires, gate.inputs[1])?);
                    a + b - (a * b + a * b)
                }
            };
            wires[gate.output] = Some(value);
        }

        self.outputs.iter().map(|w| read(&wires, *w)).collect()
    }

    /// Flatten the gate DAG into a simplified R1CS listing.
    pub fn to_r1cs(&self) -> R1csSystem {
        let constraints: Vec<R1csConstraint> = self
            .gates
            .iter()
            .map(|g| R1csConstraint { kind: g.kind, inputs: g.inputs.clone(), output: g.output })
            .collect();
        R1csSystem {
            num_constraints: constraints.len(),
            num_variables: self.next_wire,
            constraints,
            public_outputs: self.outputs.clone(),
        }
    }
}

/// Build the two-gate circuit for `(P AND Q) IMPLIES R`.
pub fn create_implication_circuit() -> LogicCircuit {
    let mut circuit = LogicCircuit::new();
    let p = circuit.add_input("P");
    let q = circuit.add_input("Q");
    let r = circuit.add_input("R");
    let pq = circuit.add_and_gate(p, q);
    let out = circuit.add_implies_gate(pq, r);
    circuit.set_output(out);
    circuit
}

/// Version-1 statement circuit: "the prover knows an axiom set whose
/// commitment equals `statement.axioms_commitment`".
#[derive(Clone, Copy, Debug)]
pub struct MvpCircuit {
    pub circuit_version: u64,
}

impl MvpCircuit {
    pub fn new(circuit_version: u64) -> Self {
        Self { circuit_version }
    }

    /// Whether `(witness, statement)` satisfies the MVP constraints:
    /// recomputed commitment, circuit version, and ruleset all match.
    pub fn verify_constraints(&self, witness: &Witness, statement: &Statement) -> bool {
        if witness.circuit_version != statement.circuit_version
            || statement.circuit_version != self.circuit_version
        {
            return false;
        }
        if witness.ruleset_id != statement.ruleset_id {
            return false;
        }
        let expected = expected_commitment_hex(
            &witness.axioms,
            statement.circuit_version,
            &statement.ruleset_id,
        );
        witness.axioms_commitment_hex == expected && statement.axioms_commitment == expected
    }
}

/// Version >= 2 statement circuit for the `TDFOL_v1` ruleset: the MVP
/// constraints plus a valid, non-empty derivation trace.
#[derive(Clone, Copy, Debug)]
pub struct TdfolV1DerivationCircuit {
    pub circuit_version: u64,
}

impl TdfolV1DerivationCircuit {
    pub fn new(circuit_version: u64) -> Self {
        Self { circuit_version }
    }

    /// Whether `(witness, statement)` satisfies the derivation constraints.
    ///
    /// Each trace step must be either a base-fact consequent or the
    /// consequent of an implication whose antecedent was already derivable,
    /// and the final step must be the theorem atom.
    pub fn verify_constraints(&self, witness: &Witness, statement: &Statement) -> bool {
        if self.circuit_version < 2 || statement.ruleset_id != "TDFOL_v1" {
            return false;
        }
        if !MvpCircuit::new(self.circuit_version).verify_constraints(witness, statement) {
            return false;
        }
        if witness.intermediate_steps.is_empty() {
            return false;
        }
        if canonical::theorem_hash_hex(&witness.theorem) != statement.theorem_hash {
            return false;
        }
        semantics::verify_tdfol_v1_trace(
            &witness.axioms,
            &witness.theorem,
            &witness.intermediate_steps,
        )
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;

    fn assignments(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn implication_circuit_shape() {
        let circuit = create_implication_circuit();
        assert_eq!(circuit.num_inputs(), 3);
        assert_eq!(circuit.num_gates(), 2);
        assert_eq!(circuit.num_wires(), 5);
    }

    #[test]
    fn evaluate_all_binary_gates() {
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let mut c = LogicCircuit::new();
            let wa = c.add_input("a");
            let wb = c.add_input("b");
            let and = c.add_and_gate(wa, wb);
            let or = c.add_or_gate(wa, wb);
            let implies = c.add_implies_gate(wa, wb);
            let xor = c.add_xor_gate(wa, wb);
            let not = c.add_not_gate(wa);
            for w in [and, or, implies, xor, not] {
                c.set_output(w);
            }
            let out = c.evaluate(&assignments(&[("a", a), ("b", b)])).unwrap();
            let expect = |v: bool| if v { F::one() } else { F::zero() };
            assert_eq!(out[0], expect(a && b));
            assert_eq!(out[1], expect(a || b));
            assert_eq!(out[2], expect(!a || b));
            assert_eq!(out[3], expect(a ^ b));
            assert_eq!(out[4], expect(!a));
        }
    }

    #[test]
    fn evaluate_rejects_missing_input() {
        let mut c = LogicCircuit::new();
        let a = c.add_input("a");
        c.set_output(a);
        assert!(c.evaluate(&assignments(&[("b", true)])).is_err());
    }

    #[test]
    fn circuit_hash_is_structure_sensitive() {
        let c1 = create_implication_circuit();
        let mut c2 = create_implication_circuit();
        let extra = c2.add_not_gate(0);
        c2.set_output(extra);
        assert_ne!(c1.circuit_hash(), c2.circuit_hash());
        assert_eq!(c1.circuit_hash(), create_implication_circuit().circuit_hash());
    }

    #[test]
    fn r1cs_listing_covers_all_gates() {
        let r1cs = create_implication_circuit().to_r1cs();
        assert_eq!(r1cs.num_constraints, 2);
        assert_eq!(r1cs.num_variables, 5);
        assert_eq!(r1cs.public_outputs, vec![4]);
    }

    fn witness_for(axioms: &[&str], theorem: &str, version: u64) -> (Witness, Statement) {
        let axioms: Vec<String> = axioms.iter().map(|s| s.to_string()).collect();
        let canonical_axioms = canonical::canonicalize_axioms(&axioms);
        let commitment = expected_commitment_hex(&canonical_axioms, version, "TDFOL_v1");
        let steps = if version >= 2 {
            semantics::derive_tdfol_v1_trace(&canonical_axioms, theorem)
                .unwrap()
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let witness = Witness {
            axioms: canonical_axioms,
            theorem: theorem.to_string(),
            intermediate_steps: steps,
            axioms_commitment_hex: commitment.clone(),
            circuit_version: version,
            ruleset_id: "TDFOL_v1".to_string(),
        };
        let statement = Statement {
            theorem_hash: canonical::theorem_hash_hex(theorem),
            axioms_commitment: commitment,
            circuit_version: version,
            ruleset_id: "TDFOL_v1".to_string(),
        };
        (witness, statement)
    }

    #[test]
    fn mvp_circuit_accepts_consistent_pair() {
        let (witness, statement) = witness_for(&["P", "P -> Q"], "Q", 1);
        assert!(MvpCircuit::new(1).verify_constraints(&witness, &statement));
    }

    #[test]
    fn mvp_circuit_rejects_commitment_mismatch() {
        let (mut witness, statement) = witness_for(&["P", "P -> Q"], "Q", 1);
        witness.axioms.push("R".to_string());
        assert!(!MvpCircuit::new(1).verify_constraints(&witness, &statement));
    }

    #[test]
    fn mvp_circuit_rejects_version_mismatch() {
        let (witness, mut statement) = witness_for(&["P", "P -> Q"], "Q", 1);
        statement.circuit_version = 2;
        assert!(!MvpCircuit::new(1).verify_constraints(&witness, &statement));
    }

    #[test]
    fn derivation_circuit_accepts_valid_trace() {
        let (witness, statement) = witness_for(&["P", "P -> Q"], "Q", 2);
        assert_eq!(witness.intermediate_steps, vec!["Q".to_string()]);
        assert!(TdfolV1DerivationCircuit::new(2).verify_constraints(&witness, &statement));
    }

    #[test]
    fn derivation_circuit_rejects_empty_trace() {
        let (mut witness, statement) = witness_for(&["P", "P -> Q"], "Q", 2);
        witness.intermediate_steps.clear();
        assert!(!TdfolV1DerivationCircuit::new(2).verify_constraints(&witness, &statement));
    }

    #[test]
    fn derivation_circuit_rejects_wrong_version() {
        let (witness, statement) = witness_for(&["P", "P -> Q"], "Q", 1);
        assert!(!TdfolV1DerivationCircuit::new(2).verify_constraints(&witness, &statement));
    }

    #[test]
    fn derivation_circuit_rejects_forged_trace() {
        let (mut witness, statement) = witness_for(&["P", "P -> Q", "Q -> R"], "R", 2);
        witness.intermediate_steps = vec!["R".to_string()];
        assert!(!TdfolV1DerivationCircuit::new(2).verify_constraints(&witness, &statement));
    }
}
