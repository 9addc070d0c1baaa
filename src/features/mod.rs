//! Atom-centred fingerprints.
//!
//! A [`Featurizer`] turns every atom of a structure into a fixed-length
//! vector that is invariant to translation, rotation and permutation of
//! identical neighbours. [`gaussian::Gaussian`] implements the
//! Behler-Parrinello symmetry functions of [`symmetry`].

use rayon::prelude::*;

use crate::data::model::{Dataset, Structure};
use crate::error::Result;

pub mod cutoff;
pub mod gaussian;
pub mod io;
pub mod symmetry;
pub mod table;

use table::{AtomFingerprint, FeatureTable};

pub trait Featurizer: Sync {
    fn name(&self) -> &'static str;

    /// One fingerprint per atom, in atom order.
    fn fingerprint_structure(&self, structure: &Structure) -> Result<Vec<Vec<f64>>>;

    /// Fingerprints of every atom in `dataset`. Structures are processed in
    /// parallel; rows come back ordered by (structure, atom).
    fn fingerprint_dataset(&self, dataset: &Dataset) -> Result<FeatureTable> {
        let per_structure: Vec<Vec<Vec<f64>>> = dataset
            .structures
            .par_iter()
            .map(|s| self.fingerprint_structure(s))
            .collect::<Result<_>>()?;

        let rows = per_structure
            .into_iter()
            .zip(&dataset.structures)
            .enumerate()
            .flat_map(|(si, (fps, structure))| {
                fps.into_iter()
                    .zip(&structure.atoms)
                    .enumerate()
                    .map(move |(ai, (values, atom))| AtomFingerprint {
                        structure: si,
                        atom: ai,
                        symbol: atom.symbol.clone(),
                        values,
                    })
            })
            .collect();

        let table = FeatureTable { rows };
        log::info!(
            "{}: fingerprinted {} atoms in {} structures",
            self.name(),
            table.len(),
            dataset.len()
        );
        Ok(table)
    }
}
