//! `TDFOL_v1` derivation semantics (propositional Horn fragment)
//!
//! This module pins down, deterministically, what "theorem holds" means for
//! the `TDFOL_v1` ruleset. It is intentionally a *tiny* fragment — facts and
//! single-step implications over atoms — chosen so that derivability is
//! decidable, the fixpoint is finite, and the resulting trace maps directly
//! onto per-step circuit constraints.
//!
//! Supported syntax:
//!
//! - Atom: `[A-Za-z][A-Za-z0-9_]*`
//! - Axiom: an atom (a *fact*) or `<atom> -> <atom>` (an *implication*,
//!   exactly one `->`, whitespace around it ignored)
//! - Theorem: an atom
//!
//! Semantics (forward chaining / modus ponens): start with every fact known;
//! repeatedly add `Q` for each implication `P -> Q` whose `P` is known; the
//! theorem holds iff its atom is in the fixpoint.

use std::collections::HashSet;

use crate::ZkpError;

/// Axiom in the Horn-like propositional fragment.
///
/// `antecedent == None` marks a fact; otherwise the axiom is the implication
/// `antecedent -> consequent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HornAxiom {
    /// Implication antecedent, absent for facts.
    pub antecedent: Option<String>,
    /// Fact atom, or implication consequent.
    pub consequent: String,
}

fn is_atom(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_atom(raw: &str, label: &str) -> Result<String, ZkpError> {
    let atom = raw.trim();
    if atom.is_empty() || !is_atom(atom) {
        return Err(ZkpError::Syntax(format!(
            "{label} must be an atom matching [A-Za-z][A-Za-z0-9_]*"
        )));
    }
    Ok(atom.to_string())
}

/// Parse a single axiom in the supported `TDFOL_v1` fragment.
pub fn parse_tdfol_v1_axiom(text: &str) -> Result<HornAxiom, ZkpError> {
    let s = text.trim();
    if s.is_empty() {
        return Err(ZkpError::Syntax("axiom cannot be empty".into()));
    }

    if s.contains("->") {
        let parts: Vec<&str> = s.split("->").collect();
        if parts.len() != 2 {
            return Err(ZkpError::Syntax("axiom may contain at most one '->'".into()));
        }
        let antecedent = parse_atom(parts[0], "axiom antecedent")?;
        let consequent = parse_atom(parts[1], "axiom consequent")?;
        return Ok(HornAxiom { antecedent: Some(antecedent), consequent });
    }

    Ok(HornAxiom { antecedent: None, consequent: parse_atom(s, "axiom")? })
}

/// Parse a theorem atom for the supported `TDFOL_v1` fragment.
pub fn parse_tdfol_v1_theorem(text: &str) -> Result<String, ZkpError> {
    parse_atom(text, "theorem")
}

fn parse_axioms(private_axioms: &[String]) -> Result<Vec<HornAxiom>, ZkpError> {
    private_axioms.iter().map(|a| parse_tdfol_v1_axiom(a)).collect()
}

/// Return whether `theorem` is derivable from `private_axioms` under
/// `TDFOL_v1` semantics. Deterministic and total over valid syntax.
pub fn evaluate_tdfol_v1_holds(private_axioms: &[String], theorem: &str) -> Result<bool, ZkpError> {
    let axioms = parse_axioms(private_axioms)?;
    let goal = parse_tdfol_v1_theorem(theorem)?;

    let mut known: HashSet<String> = axioms
        .iter()
        .filter(|a| a.antecedent.is_none())
        .map(|a| a.consequent.clone())
        .collect();
    let implications: Vec<&HornAxiom> =
        axioms.iter().filter(|a| a.antecedent.is_some()).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for imp in &implications {
            let antecedent = imp.antecedent.as_deref().unwrap_or_default();
            if known.contains(antecedent) && !known.contains(&imp.consequent) {
                known.insert(imp.consequent.clone());
                changed = true;
            }
        }
    }

    Ok(known.contains(&goal))
}

/// Derive a constraint-friendly forward-chaining trace for `theorem`.
///
/// Returns:
/// - `None` if the theorem is not derivable;
/// - `Some(vec![])` if the theorem is already a base fact;
/// - otherwise `Some(steps)`, the newly derived consequents in the order they
///   became derivable (ties broken by the input order of implications),
///   truncated at the first derivation of the goal — the last step is always
///   the theorem atom.
pub fn derive_tdfol_v1_trace(
    private_axioms: &[String],
    theorem: &str,
) -> Result<Option<Vec<String>>, ZkpError> {
    let axioms = parse_axioms(private_axioms)?;
    let goal = parse_tdfol_v1_theorem(theorem)?;

    let mut known: HashSet<String> = axioms
        .iter()
        .filter(|a| a.antecedent.is_none())
        .map(|a| a.consequent.clone())
        .collect();
    if known.contains(&goal) {
        return Ok(Some(Vec::new()));
    }
    let implications: Vec<&HornAxiom> =
        axioms.iter().filter(|a| a.antecedent.is_some()).collect();

    let mut trace = Vec::new();
    let mut changed = true;
    while changed {
        changed = false;
        for imp in &implications {
            let antecedent = imp.antecedent.as_deref().unwrap_or_default();
            if known.contains(antecedent) && !known.contains(&imp.consequent) {
                known.insert(imp.consequent.clone());
                trace.push(imp.consequent.clone());
                if imp.consequent == goal {
                    return Ok(Some(trace));
                }
                changed = true;
            }
        }
    }

    Ok(None)
}

/// Validate a claimed derivation trace against the step rules used by the
/// version-2 derivation circuit.
///
/// Each step must be either a base-fact consequent or the consequent of an
/// implication whose antecedent is already known, and the final step must be
/// the theorem atom. Empty traces are rejected: a base-fact theorem needs no
/// derivation circuit.
pub fn verify_tdfol_v1_trace(
    private_axioms: &[String],
    theorem: &str,
    steps: &[String],
) -> Result<bool, ZkpError> {
    let axioms = parse_axioms(private_axioms)?;
    let goal = parse_tdfol_v1_theorem(theorem)?;

    if steps.is_empty() {
        return Ok(false);
    }

    let facts: HashSet<&str> = axioms
        .iter()
        .filter(|a| a.antecedent.is_none())
        .map(|a| a.consequent.as_str())
        .collect();
    let mut known: HashSet<String> = facts.iter().map(|s| s.to_string()).collect();

    for step in steps {
        let from_fact = facts.contains(step.as_str());
        let from_implication = axioms.iter().any(|a| {
            a.consequent == *step
                && a.antecedent.as_deref().map(|p| known.contains(p)).unwrap_or(false)
        });
        if !from_fact && !from_implication {
            return Ok(false);
        }
        known.insert(step.clone());
    }

    Ok(steps.last().map(|s| *s == goal).unwrap_or(false))
}
