//! EVM-friendly public-input packing for Groth16 verifier calls
//!
//! Solidity Groth16 verifiers over BN254 expect public inputs as scalars in
//! the BN254 scalar field (`uint256[4]` for the
//! `verifyProof(uint256[8] proof, uint256[4] publicInputs)` ABI). The
//! crate's logical public inputs include non-field values (`ruleset_id` is a
//! string), so this boundary converts them deterministically:
//!
//! ```text
//! scalar[0] = be_uint(theorem_hash)        mod Fr
//! scalar[1] = be_uint(axioms_commitment)   mod Fr
//! scalar[2] = circuit_version                      (u64, trivially < Fr)
//! scalar[3] = be_uint(SHA256(ruleset_id))  mod Fr
//! ```
//!
//! Scalars are exposed both as `0x`-prefixed 32-byte big-endian hex strings
//! (for RPC calls) and as `BigUint`s (for ABI encoders). Every value is in
//! `[0, BN254_FR_MODULUS)` by construction.

use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::statement::hex32_to_field;
use crate::{ZkpError, F};

/// BN254 scalar field modulus (altbn128 Fr), decimal form. Matches the
/// constant in the Solidity verifiers this packer targets.
pub const BN254_FR_MODULUS_DEC: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Logical public inputs consumed by the packer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvmPublicInputs {
    /// Hex SHA-256 of the canonical theorem.
    pub theorem_hash_hex: String,
    /// Hex commitment to the canonical axiom set.
    pub axioms_commitment_hex: String,
    /// Circuit version.
    pub circuit_version: u64,
    /// Ruleset identifier.
    pub ruleset_id: String,
}

fn field_to_0x32(value: F) -> String {
    // BigInt<4> big-endian export is always 32 bytes for Fr.
    format!("0x{}", hex::encode(value.into_bigint().to_bytes_be()))
}

/// Hash UTF-8 text with SHA-256 and reduce mod Fr; `0x`-prefixed hex form.
pub fn hash_text_to_field_sha256(text: &str) -> String {
    let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
    field_to_0x32(F::from_be_bytes_mod_order(&digest))
}

/// Pack the logical public inputs into four BN254-Fr scalars for EVM,
/// each a `0x`-prefixed 32-byte big-endian hex string.
pub fn pack_public_inputs_for_evm(inputs: &EvmPublicInputs) -> Result<[String; 4], ZkpError> {
    let theorem_fr = hex32_to_field(&inputs.theorem_hash_hex, "theorem_hash_hex")?;
    let commitment_fr = hex32_to_field(&inputs.axioms_commitment_hex, "axioms_commitment_hex")?;
    let version_fr = F::from(inputs.circuit_version);
    let ruleset_fr_hex = hash_text_to_field_sha256(&inputs.ruleset_id);

    Ok([
        field_to_0x32(theorem_fr),
        field_to_0x32(commitment_fr),
        field_to_0x32(version_fr),
        ruleset_fr_hex,
    ])
}

/// Batch fold of [`pack_public_inputs_for_evm`].
pub fn pack_many_public_inputs_for_evm(
    inputs: &[EvmPublicInputs],
) -> Result<Vec<[String; 4]>, ZkpError> {
    inputs.iter().map(pack_public_inputs_for_evm).collect()
}

/// Same scalars as integers, for `uint256[4]` ABI encoding.
pub fn pack_public_inputs_uint256(inputs: &EvmPublicInputs) -> Result<[BigUint; 4], ZkpError> {
    let hex_scalars = pack_public_inputs_for_evm(inputs)?;
    let mut out: Vec<BigUint> = Vec::with_capacity(4);
    for scalar in &hex_scalars {
        let stripped = scalar.strip_prefix("0x").unwrap_or(scalar);
        let bytes = hex::decode(stripped)
            .map_err(|_| ZkpError::InvalidInput("packed scalar must be valid hex".into()))?;
        out.push(BigUint::from_bytes_be(&bytes));
    }
    Ok(out.try_into().expect("exactly four scalars"))
}

/// Validate a `uint256[]` argument for a Solidity call: expected length and
/// every element `< 2^256`.
pub fn validate_uint256_array(values: &[BigUint], expected_len: usize) -> Result<(), ZkpError> {
    if values.len() != expected_len {
        return Err(ZkpError::InvalidInput(format!(
            "expected uint256 array of length {expected_len}, got {}",
            values.len()
        )));
    }
    for (idx, value) in values.iter().enumerate() {
        if value.bits() > 256 {
            return Err(ZkpError::InvalidInput(format!("values[{idx}] must fit uint256")));
        }
    }
    Ok(())
}
