//! Behler-Parrinello symmetry functions: parameter sets and evaluation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::data::neighbors::{dot, Neighbor};
use crate::error::{Error, Result};

use super::cutoff::CutoffKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymmetryKind {
    /// Radial, two-body.
    G2,
    /// Angular, three-body, includes the j-k distance.
    G3,
    /// Angular, three-body, ignores the j-k distance.
    G4,
}

impl SymmetryKind {
    pub fn is_angular(self) -> bool {
        matches!(self, SymmetryKind::G3 | SymmetryKind::G4)
    }

    /// Number of neighbour symbols a descriptor of this kind names.
    pub fn arity(self) -> usize {
        if self.is_angular() {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for SymmetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// ParameterSet – one entry of the `custom` block
// ---------------------------------------------------------------------------

/// A family of descriptors sharing a kind and neighbour symbols; expands to
/// the cartesian product of its hyperparameter lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSet {
    #[serde(rename = "type")]
    pub kind: SymmetryKind,
    pub symbols: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub eta: Vec<f64>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub gamma: Vec<f64>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub zeta: Vec<f64>,
    /// Gaussian centres; `[0]` when empty.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub rs: Vec<f64>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(f64),
        Many(Vec<f64>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
    })
}

impl ParameterSet {
    pub fn radial(neighbor: &str, eta: Vec<f64>) -> Self {
        Self {
            kind: SymmetryKind::G2,
            symbols: vec![neighbor.to_string()],
            eta,
            gamma: Vec::new(),
            zeta: Vec::new(),
            rs: Vec::new(),
        }
    }

    pub fn angular(kind: SymmetryKind, a: &str, b: &str, eta: Vec<f64>, zeta: Vec<f64>, gamma: Vec<f64>) -> Self {
        Self {
            kind,
            symbols: vec![a.to_string(), b.to_string()],
            eta,
            gamma,
            zeta,
            rs: Vec::new(),
        }
    }

    /// Check ranges; `owner` is the central element, for messages.
    pub fn validate(&self, owner: &str) -> Result<()> {
        let ctx = |msg: String| Error::InvalidParameter(format!("{owner} {}: {msg}", self.kind));

        if self.symbols.len() != self.kind.arity() {
            return Err(ctx(format!(
                "expected {} neighbour symbol(s), got {:?}",
                self.kind.arity(),
                self.symbols
            )));
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ctx("empty chemical symbol".to_string()));
        }
        if self.eta.is_empty() {
            return Err(ctx("'eta' is empty".to_string()));
        }
        if let Some(eta) = self.eta.iter().find(|e| !(e.is_finite() && **e > 0.0)) {
            return Err(ctx(format!("eta must be positive, got {eta}")));
        }
        if let Some(rs) = self.rs.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
            return Err(ctx(format!("rs must be non-negative, got {rs}")));
        }

        if self.kind.is_angular() {
            if self.gamma.is_empty() || self.zeta.is_empty() {
                return Err(ctx("angular functions need 'gamma' and 'zeta'".to_string()));
            }
            if let Some(g) = self.gamma.iter().find(|g| **g != 1.0 && **g != -1.0) {
                return Err(ctx(format!("gamma must be +1 or -1, got {g}")));
            }
            if let Some(z) = self.zeta.iter().find(|z| !(z.is_finite() && **z >= 1.0)) {
                return Err(ctx(format!("zeta must be >= 1, got {z}")));
            }
        } else if !self.gamma.is_empty() || !self.zeta.is_empty() {
            return Err(ctx("radial functions take no 'gamma' or 'zeta'".to_string()));
        }
        Ok(())
    }

    /// Concrete descriptors, ordered η (outer), r_s, ζ, λ (inner).
    pub fn expand(&self) -> Vec<SymmetryFunction> {
        let rs_values: &[f64] = if self.rs.is_empty() { &[0.0] } else { &self.rs };
        let mut neighbors = self.symbols.clone();
        neighbors.sort();

        let mut out = Vec::new();
        for &eta in &self.eta {
            for &rs in rs_values {
                if self.kind.is_angular() {
                    for &zeta in &self.zeta {
                        for &gamma in &self.gamma {
                            out.push(SymmetryFunction {
                                kind: self.kind,
                                neighbors: neighbors.clone(),
                                eta,
                                rs,
                                zeta,
                                gamma,
                            });
                        }
                    }
                } else {
                    out.push(SymmetryFunction {
                        kind: self.kind,
                        neighbors: neighbors.clone(),
                        eta,
                        rs,
                        zeta: 0.0,
                        gamma: 0.0,
                    });
                }
            }
        }
        out
    }
}

/// `n` values evenly spaced in log10 between `start` and `stop` (inclusive).
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let (a, b) = (start.log10(), stop.log10());
            (0..n)
                .map(|k| 10f64.powf(a + (b - a) * k as f64 / (n - 1) as f64))
                .collect()
        }
    }
}

/// Parameter sets used when the configuration carries no `custom` block:
/// a G2 set per neighbour element and a G3 set per unordered element pair.
pub fn default_parameter_sets(symbols: &BTreeSet<String>) -> Vec<ParameterSet> {
    let etas = logspace(0.05, 5.0, 4);
    let symbols: Vec<&String> = symbols.iter().collect();

    let mut sets: Vec<ParameterSet> = symbols
        .iter()
        .map(|s| ParameterSet::radial(s, etas.clone()))
        .collect();
    for (a_idx, a) in symbols.iter().enumerate() {
        for b in &symbols[a_idx..] {
            sets.push(ParameterSet::angular(
                SymmetryKind::G3,
                a,
                b,
                vec![0.005],
                vec![1.0, 4.0],
                vec![1.0, -1.0],
            ));
        }
    }
    sets
}

// ---------------------------------------------------------------------------
// SymmetryFunction – one concrete descriptor
// ---------------------------------------------------------------------------

/// A single fingerprint component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryFunction {
    pub kind: SymmetryKind,
    /// Neighbour symbols, sorted.
    pub neighbors: Vec<String>,
    pub eta: f64,
    pub rs: f64,
    /// Angular only.
    pub zeta: f64,
    /// Angular only (λ, ±1).
    pub gamma: f64,
}

impl fmt::Display for SymmetryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = self.neighbors.join("-");
        if self.kind.is_angular() {
            write!(
                f,
                "{}[{who}](eta={}, zeta={}, gamma={})",
                self.kind, self.eta, self.zeta, self.gamma
            )
        } else {
            write!(f, "{}[{who}](eta={}, rs={})", self.kind, self.eta, self.rs)
        }
    }
}

/// Geometry of one neighbour pair (j, k) around a central atom, j < k.
struct Triplet<'a> {
    sym_j: &'a str,
    sym_k: &'a str,
    r_ij: f64,
    r_ik: f64,
    r_jk: f64,
    cos_theta: f64,
}

/// Shared evaluation parameters for one structure.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    pub cutoff: f64,
    pub cutoff_fn: CutoffKind,
    pub normalized: bool,
}

impl EvalContext {
    fn scale(&self) -> f64 {
        if self.normalized {
            self.cutoff * self.cutoff
        } else {
            1.0
        }
    }
}

/// Evaluate `descriptors` for one central atom.
///
/// `symbols` holds the chemical symbol of every atom of the structure,
/// indexed like `Neighbor::index`.
pub fn evaluate(
    descriptors: &[SymmetryFunction],
    neighbors: &[Neighbor],
    symbols: &[&str],
    ctx: &EvalContext,
) -> Vec<f64> {
    let rc = ctx.cutoff;
    let s = ctx.scale();
    let needs_angular = descriptors.iter().any(|d| d.kind.is_angular());

    let triplets: Vec<Triplet> = if needs_angular {
        let mut t = Vec::new();
        for (a, nj) in neighbors.iter().enumerate() {
            for nk in &neighbors[a + 1..] {
                let d_jk = [
                    nk.displacement[0] - nj.displacement[0],
                    nk.displacement[1] - nj.displacement[1],
                    nk.displacement[2] - nj.displacement[2],
                ];
                t.push(Triplet {
                    sym_j: symbols[nj.index],
                    sym_k: symbols[nk.index],
                    r_ij: nj.distance,
                    r_ik: nk.distance,
                    r_jk: dot(&d_jk, &d_jk).sqrt(),
                    cos_theta: dot(&nj.displacement, &nk.displacement) / (nj.distance * nk.distance),
                });
            }
        }
        t
    } else {
        Vec::new()
    };

    descriptors
        .iter()
        .map(|d| match d.kind {
            SymmetryKind::G2 => neighbors
                .iter()
                .filter(|n| symbols[n.index] == d.neighbors[0])
                .map(|n| {
                    let x = n.distance - d.rs;
                    (-d.eta * x * x / s).exp() * ctx.cutoff_fn.eval(n.distance, rc)
                })
                .sum(),
            SymmetryKind::G3 | SymmetryKind::G4 => {
                let wide = d.kind == SymmetryKind::G4;
                let sum: f64 = triplets
                    .iter()
                    .filter(|t| pair_matches(t.sym_j, t.sym_k, &d.neighbors))
                    .map(|t| {
                        let angular = (1.0 + d.gamma * t.cos_theta).max(0.0).powf(d.zeta);
                        let (r2, fc) = if wide {
                            (
                                t.r_ij * t.r_ij + t.r_ik * t.r_ik,
                                ctx.cutoff_fn.eval(t.r_ij, rc) * ctx.cutoff_fn.eval(t.r_ik, rc),
                            )
                        } else {
                            (
                                t.r_ij * t.r_ij + t.r_ik * t.r_ik + t.r_jk * t.r_jk,
                                ctx.cutoff_fn.eval(t.r_ij, rc)
                                    * ctx.cutoff_fn.eval(t.r_ik, rc)
                                    * ctx.cutoff_fn.eval(t.r_jk, rc),
                            )
                        };
                        angular * (-d.eta * r2 / s).exp() * fc
                    })
                    .sum();
                2f64.powf(1.0 - d.zeta) * sum
            }
        })
        .collect()
}

/// Unordered match of a (j, k) pair against sorted neighbour symbols.
fn pair_matches(a: &str, b: &str, sorted: &[String]) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    sorted[0] == lo && sorted[1] == hi
}
