use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// InfoValue – a single per-structure annotation
// ---------------------------------------------------------------------------

/// A dynamically-typed annotation attached to a structure (energy, tags, ...).
/// Totally ordered so values can be collected into `BTreeSet`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Null,
}

impl Eq for InfoValue {}

impl PartialOrd for InfoValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InfoValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use InfoValue::*;
        fn rank(v: &InfoValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::String(s) => write!(f, "{s}"),
            InfoValue::Integer(i) => write!(f, "{i}"),
            InfoValue::Float(v) => write!(f, "{v}"),
            InfoValue::Bool(b) => write!(f, "{b}"),
            InfoValue::Null => write!(f, "<null>"),
        }
    }
}

impl InfoValue {
    /// Interpret the value as an `f64` (e.g. a reference energy).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Float(v) => Some(*v),
            InfoValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Best-effort typing of a bare token from a text format.
    pub fn guess(s: &str) -> Self {
        if s.is_empty() {
            return InfoValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return InfoValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return InfoValue::Float(f);
        }
        match s {
            "T" | "True" | "true" => InfoValue::Bool(true),
            "F" | "False" | "false" => InfoValue::Bool(false),
            _ => InfoValue::String(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Atom / Structure
// ---------------------------------------------------------------------------

/// One atom: chemical symbol and Cartesian position in Å.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub symbol: String,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(symbol: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            symbol: symbol.into(),
            position,
        }
    }
}

/// A single atomic configuration (one frame of a trajectory).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    pub atoms: Vec<Atom>,
    /// Lattice vectors as rows, in Å.
    pub cell: Option<[[f64; 3]; 3]>,
    /// Periodicity along each lattice vector.
    pub pbc: [bool; 3],
    /// Free-form annotations: key → value.
    pub info: BTreeMap<String, InfoValue>,
}

impl Structure {
    /// Non-periodic structure from atoms alone.
    pub fn molecule(atoms: Vec<Atom>) -> Self {
        Self {
            atoms,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().any(|&p| p)
    }

    /// Reference energy, if the source carried one.
    pub fn energy(&self) -> Option<f64> {
        self.info.get("energy").and_then(InfoValue::as_f64)
    }

    /// Distinct chemical symbols in this structure.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.atoms.iter().map(|a| a.symbol.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Dataset – a loaded collection of structures
// ---------------------------------------------------------------------------

/// All structures of a file together with the element inventory.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub structures: Vec<Structure>,
    /// Sorted set of every chemical symbol appearing in `structures`.
    pub symbols: BTreeSet<String>,
}

impl Dataset {
    pub fn from_structures(structures: Vec<Structure>) -> Self {
        let symbols = structures.iter().flat_map(Structure::symbols).collect();
        Dataset {
            structures,
            symbols,
        }
    }

    /// Number of structures.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Total number of atoms across all structures.
    pub fn n_atoms(&self) -> usize {
        self.structures.iter().map(Structure::len).sum()
    }
}
