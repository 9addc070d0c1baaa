use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fingerprint of one atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomFingerprint {
    /// Index of the structure in its dataset.
    pub structure: usize,
    /// Index of the atom within that structure.
    pub atom: usize,
    pub symbol: String,
    pub values: Vec<f64>,
}

/// Per-atom fingerprints of a whole dataset, ordered by (structure, atom).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub rows: Vec<AtomFingerprint>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a AtomFingerprint> + 'a {
        self.rows.iter().filter(move |r| r.symbol == symbol)
    }

    /// Fingerprint length per element; every row of an element must agree.
    pub fn dimensions(&self) -> Result<BTreeMap<String, usize>> {
        let mut dims: BTreeMap<String, usize> = BTreeMap::new();
        for row in &self.rows {
            match dims.get(&row.symbol) {
                Some(&expected) if expected != row.values.len() => {
                    return Err(Error::DimensionMismatch {
                        context: format!(
                            "{} fingerprint of structure {}, atom {}",
                            row.symbol, row.structure, row.atom
                        ),
                        expected,
                        actual: row.values.len(),
                    });
                }
                Some(_) => {}
                None => {
                    dims.insert(row.symbol.clone(), row.values.len());
                }
            }
        }
        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(structure: usize, atom: usize, symbol: &str, n: usize) -> AtomFingerprint {
        AtomFingerprint {
            structure,
            atom,
            symbol: symbol.to_string(),
            values: vec![0.0; n],
        }
    }

    #[test]
    fn reports_dimensions_per_element() {
        let t = FeatureTable {
            rows: vec![row(0, 0, "O", 3), row(0, 1, "H", 2), row(2, 0, "H", 2)],
        };
        let dims = t.dimensions().unwrap();
        assert_eq!(dims["O"], 3);
        assert_eq!(dims["H"], 2);
        assert_eq!(t.rows_for("H").count(), 2);
    }

    #[test]
    fn inconsistent_lengths_are_rejected() {
        let t = FeatureTable {
            rows: vec![row(0, 0, "H", 2), row(0, 1, "H", 3)],
        };
        assert!(matches!(
            t.dimensions(),
            Err(Error::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
    }
}
