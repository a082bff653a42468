//! Public statements, private witnesses, and the circuit-ref policy
//!
//! A proof binds a private [`Witness`] to a public [`Statement`]. The
//! statement is the only thing a verifier ever sees: the canonical theorem
//! hash, the axiom-set commitment, the circuit version, and the ruleset id.
//! The witness carries the axioms themselves (and, for derivation circuits,
//! the intermediate steps) and must never cross the verifier boundary.
//!
//! Circuits are addressed by a **circuit reference** string
//! `<circuit_id>@v<u64>`. The strict parser accepts only that form; a lenient
//! variant also accepts a bare `<circuit_id>` and maps it to a legacy default
//! version. Reordering or loosening this policy invalidates every registry
//! entry keyed by `(circuit_id, version)`, so both parsers are deliberately
//! picky.

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::{canonical, ZkpError, F};

/// Check the `[A-Za-z][A-Za-z0-9_]*` circuit-id shape.
fn is_circuit_id(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_circuit_id(circuit_id: &str) -> Result<(), ZkpError> {
    if circuit_id.is_empty() {
        return Err(ZkpError::InvalidInput("circuit_id cannot be empty".into()));
    }
    if circuit_id.contains('@') {
        return Err(ZkpError::InvalidInput("circuit_id must not contain '@'".into()));
    }
    if !is_circuit_id(circuit_id) {
        return Err(ZkpError::InvalidInput(
            "circuit_id must match [A-Za-z][A-Za-z0-9_]*".into(),
        ));
    }
    Ok(())
}

/// Parse a strict circuit reference of the form `circuit_id@v<u64>`.
pub fn parse_circuit_ref(circuit_ref: &str) -> Result<(String, u64), ZkpError> {
    if circuit_ref.is_empty() {
        return Err(ZkpError::InvalidInput("circuit_ref cannot be empty".into()));
    }

    let (circuit_id, version_part) = circuit_ref.split_once("@v").ok_or_else(|| {
        ZkpError::InvalidInput("circuit_ref must be of the form circuit_id@v<u64>".into())
    })?;

    validate_circuit_id(circuit_id)?;

    if version_part.is_empty() {
        return Err(ZkpError::InvalidInput("circuit_ref version is missing".into()));
    }
    if !version_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ZkpError::InvalidInput(
            "circuit_ref version must be an unsigned base-10 integer".into(),
        ));
    }
    let version: u64 = version_part
        .parse()
        .map_err(|_| ZkpError::InvalidInput("circuit_ref version must fit u64".into()))?;

    Ok((circuit_id.to_string(), version))
}

/// Parse a circuit reference, accepting legacy unversioned identifiers.
///
/// `circuit_id@v<u64>` parses strictly; a bare `circuit_id` is interpreted as
/// `circuit_id@v<legacy_default_version>`.
pub fn parse_circuit_ref_lenient(
    circuit_ref: &str,
    legacy_default_version: u64,
) -> Result<(String, u64), ZkpError> {
    if circuit_ref.is_empty() {
        return Err(ZkpError::InvalidInput("circuit_ref cannot be empty".into()));
    }
    if circuit_ref.contains("@v") {
        return parse_circuit_ref(circuit_ref);
    }
    validate_circuit_id(circuit_ref)?;
    Ok((circuit_ref.to_string(), legacy_default_version))
}

/// Format a circuit reference string; inverse of [`parse_circuit_ref`].
pub fn format_circuit_ref(circuit_id: &str, version: u64) -> Result<String, ZkpError> {
    validate_circuit_id(circuit_id)?;
    Ok(format!("{circuit_id}@v{version}"))
}

/// Public statement being proven.
///
/// These values are visible to the verifier; they constrain which witnesses
/// are valid. A statement is replayable from any proof's public inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Hex SHA-256 of the canonical theorem text.
    pub theorem_hash: String,
    /// Hex commitment to the canonical axiom set.
    pub axioms_commitment: String,
    /// Constraint-system version (1 = MVP, >= 2 = derivation circuits).
    pub circuit_version: u64,
    /// Inference-engine identifier, e.g. `"TDFOL_v1"`.
    pub ruleset_id: String,
}

impl Statement {
    /// Replay a statement from a proof's public inputs.
    ///
    /// Groth16 proofs carry all four fields; fails with `MalformedProof`
    /// when one is missing or mistyped.
    pub fn from_public_inputs(
        public_inputs: &std::collections::BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, ZkpError> {
        let get_str = |key: &str| -> Result<String, ZkpError> {
            public_inputs
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ZkpError::MalformedProof(format!("public_inputs.{key} missing")))
        };
        let circuit_version = public_inputs
            .get("circuit_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                ZkpError::MalformedProof("public_inputs.circuit_version missing".into())
            })?;
        Ok(Self {
            theorem_hash: get_str("theorem_hash")?,
            axioms_commitment: get_str("axioms_commitment")?,
            circuit_version,
            ruleset_id: get_str("ruleset_id")?,
        })
    }

    /// Encode the statement as the four BN254 scalars consumed by circuits:
    /// `[theorem_hash mod Fr, axioms_commitment mod Fr, circuit_version,
    /// sha256(ruleset_id) mod Fr]`.
    ///
    /// This is the circuit-side encoding; the EVM boundary serializes the
    /// same values as 32-byte big-endian hex (see the `evm` module).
    pub fn to_field_elements(&self) -> Result<[F; 4], ZkpError> {
        let theorem = hex32_to_field(&self.theorem_hash, "theorem_hash")?;
        let commitment = hex32_to_field(&self.axioms_commitment, "axioms_commitment")?;
        let version = F::from(self.circuit_version);
        let ruleset_digest: [u8; 32] = Sha256::digest(self.ruleset_id.as_bytes()).into();
        let ruleset = F::from_be_bytes_mod_order(&ruleset_digest);
        Ok([theorem, commitment, version, ruleset])
    }
}

/// Decode a 32-byte hex string into an Fr element (big-endian, mod r).
pub(crate) fn hex32_to_field(hex_str: &str, label: &str) -> Result<F, ZkpError> {
    let s = hex_str.strip_prefix("0x").or_else(|| hex_str.strip_prefix("0X")).unwrap_or(hex_str);
    if s.len() != 64 {
        return Err(ZkpError::InvalidInput(format!("{label} must be a 32-byte hex string")));
    }
    let bytes = hex::decode(s)
        .map_err(|_| ZkpError::InvalidInput(format!("{label} must be valid hex")))?;
    Ok(F::from_be_bytes_mod_order(&bytes))
}

/// Private witness satisfying the circuit constraints for a [`Statement`].
///
/// Serializing a witness reveals the axioms; it exists only on the prover
/// side and is consumed by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    /// Canonical (sorted, deduplicated, normalized) private axiom set.
    pub axioms: Vec<String>,
    /// Theorem being proven, as the caller supplied it.
    pub theorem: String,
    /// Derivation trace for version >= 2 circuits; empty otherwise.
    #[serde(default)]
    pub intermediate_steps: Vec<String>,
    /// Hex commitment to `axioms`.
    pub axioms_commitment_hex: String,
    /// Circuit constraint-system version.
    pub circuit_version: u64,
    /// Inference-engine identifier.
    pub ruleset_id: String,
}

/// Proof system selector recorded alongside a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofType {
    /// Hash-based demo backend.
    #[serde(rename = "simulated")]
    Simulated,
    /// Real zkSNARK over BN254 via the external prover.
    #[serde(rename = "groth16")]
    Groth16,
}

/// Complete proof statement: public inputs plus circuit identification,
/// used to route a statement to the right circuit and backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStatement {
    /// The public statement.
    pub statement: Statement,
    /// Circuit identifier, e.g. `"knowledge_of_axioms"`.
    pub circuit_id: String,
    /// Proof system this statement targets.
    pub proof_type: ProofType,
    /// Number of axioms in the witness.
    pub witness_count: usize,
}

impl ProofStatement {
    /// Serialize to a JSON value, including the derived `circuit_ref`.
    pub fn to_value(&self) -> Result<serde_json::Value, ZkpError> {
        let circuit_ref = format_circuit_ref(&self.circuit_id, self.statement.circuit_version)?;
        Ok(json!({
            "statement": serde_json::to_value(&self.statement)
                .map_err(|e| ZkpError::WireFormat(e.to_string()))?,
            "circuit_id": self.circuit_id,
            "circuit_ref": circuit_ref,
            "proof_type": serde_json::to_value(self.proof_type)
                .map_err(|e| ZkpError::WireFormat(e.to_string()))?,
            "witness_count": self.witness_count,
        }))
    }
}

/// Recompute the commitment a witness should carry for its declared circuit
/// version and ruleset.
pub(crate) fn expected_commitment_hex(
    axioms: &[String],
    circuit_version: u64,
    ruleset_id: &str,
) -> String {
    if circuit_version >= 2 && ruleset_id == "TDFOL_v1" {
        canonical::tdfol_v1_axioms_commitment_hex_v2(axioms)
    } else {
        canonical::axioms_commitment_hex(axioms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;

    const U64_MAX: u64 = u64::MAX;

    #[test]
    fn parses_valid_refs() {
        assert_eq!(
            parse_circuit_ref("knowledge_of_axioms@v0").unwrap(),
            ("knowledge_of_axioms".to_string(), 0)
        );
        assert_eq!(
            parse_circuit_ref(&format!("c@v{U64_MAX}")).unwrap(),
            ("c".to_string(), U64_MAX)
        );
    }

    #[test]
    fn rejects_invalid_refs() {
        for bad in [
            "",
            "no_version",
            "@v1",
            "c@v",
            "c@v-1",
            "c@v+1",
            "c@v1.0",
            "c@v01x",
            "c@v1@v2",
            "c@v18446744073709551616",
            "bad@id@v1",
        ] {
            assert!(parse_circuit_ref(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn lenient_accepts_bare_id() {
        assert_eq!(
            parse_circuit_ref_lenient("knowledge_of_axioms", 1).unwrap(),
            ("knowledge_of_axioms".to_string(), 1)
        );
        assert_eq!(parse_circuit_ref_lenient("c@v7", 1).unwrap(), ("c".to_string(), 7));
    }

    #[test]
    fn lenient_rejects_illegal_ids() {
        assert!(parse_circuit_ref_lenient("bad@id", 1).is_err());
        assert!(parse_circuit_ref_lenient("1leading_digit", 1).is_err());
        assert!(parse_circuit_ref_lenient("", 1).is_err());
    }

    #[test]
    fn format_round_trips() {
        let r = format_circuit_ref("knowledge_of_axioms", 1).unwrap();
        assert_eq!(r, "knowledge_of_axioms@v1");
        assert_eq!(parse_circuit_ref(&r).unwrap(), ("knowledge_of_axioms".to_string(), 1));
    }

    #[test]
    fn format_rejects_bad_ids() {
        assert!(format_circuit_ref("", 1).is_err());
        assert!(format_circuit_ref("bad@id", 1).is_err());
        assert!(format_circuit_ref("white space", 1).is_err());
    }

    #[test]
    fn statement_field_elements() {
        let stmt = Statement {
            theorem_hash: crate::canonical::theorem_hash_hex("Q"),
            axioms_commitment: crate::canonical::axioms_commitment_hex(&["P".to_string()]),
            circuit_version: 1,
            ruleset_id: "TDFOL_v1".to_string(),
        };
        let fields = stmt.to_field_elements().unwrap();
        assert_eq!(fields[2], F::from(1u64));
        assert!(!fields[0].is_zero());
        assert!(!fields[3].is_zero());
    }

    #[test]
    fn field_elements_reject_bad_hex() {
        let stmt = Statement {
            theorem_hash: "zz".repeat(32),
            axioms_commitment: "00".repeat(32),
            circuit_version: 1,
            ruleset_id: "TDFOL_v1".to_string(),
        };
        assert!(stmt.to_field_elements().is_err());

        let short = Statement { theorem_hash: "abcd".into(), ..stmt };
        assert!(short.to_field_elements().is_err());
    }

    #[test]
    fn statement_replays_from_public_inputs() {
        use serde_json::json;
        let mut public_inputs = std::collections::BTreeMap::new();
        public_inputs.insert("theorem".to_string(), json!("Q"));
        public_inputs.insert("theorem_hash".to_string(), json!("00".repeat(32)));
        public_inputs.insert("axioms_commitment".to_string(), json!("11".repeat(32)));
        public_inputs.insert("circuit_version".to_string(), json!(2));
        public_inputs.insert("ruleset_id".to_string(), json!("TDFOL_v1"));

        let stmt = Statement::from_public_inputs(&public_inputs).unwrap();
        assert_eq!(stmt.circuit_version, 2);
        assert_eq!(stmt.ruleset_id, "TDFOL_v1");

        public_inputs.remove("axioms_commitment");
        assert!(matches!(
            Statement::from_public_inputs(&public_inputs),
            Err(ZkpError::MalformedProof(_))
        ));
    }

    #[test]
    fn proof_statement_value_carries_circuit_ref() {
        let ps = ProofStatement {
            statement: Statement {
                theorem_hash: "00".repeat(32),
                axioms_commitment: "11".repeat(32),
                circuit_version: 2,
                ruleset_id: "TDFOL_v1".into(),
            },
            circuit_id: "knowledge_of_axioms".into(),
            proof_type: ProofType::Simulated,
            witness_count: 3,
        };
        let v = ps.to_value().unwrap();
        assert_eq!(v["circuit_ref"], "knowledge_of_axioms@v2");
        assert_eq!(v["proof_type"], "simulated");
        assert_eq!(v["witness_count"], 3);
    }
}
