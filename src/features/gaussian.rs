use std::collections::{BTreeMap, BTreeSet};

use crate::data::model::Structure;
use crate::data::neighbors::neighbor_list;
use crate::error::{Error, Result};
use crate::settings::FeatureSettings;

use super::cutoff::CutoffKind;
use super::symmetry::{default_parameter_sets, evaluate, EvalContext, ParameterSet, SymmetryFunction};
use super::Featurizer;

/// Gaussian symmetry-function featurizer.
///
/// Each element owns an ordered list of descriptors; the fingerprint of an
/// atom is that list evaluated over its cutoff sphere.
#[derive(Debug, Clone)]
pub struct Gaussian {
    pub cutoff: f64,
    pub cutoff_fn: CutoffKind,
    pub normalized: bool,
    descriptors: BTreeMap<String, Vec<SymmetryFunction>>,
}

impl Gaussian {
    /// Build from the `features` section. `symbols` is the element inventory
    /// of the data and is only consulted when no `custom` block is given.
    pub fn from_settings(settings: &FeatureSettings, symbols: &BTreeSet<String>) -> Result<Self> {
        settings.validate()?;

        let sets: BTreeMap<String, Vec<ParameterSet>> = match &settings.custom {
            Some(custom) => custom.user_input.clone(),
            None => {
                if symbols.is_empty() {
                    return Err(Error::InvalidConfig(
                        "no custom parameters and no elements to derive defaults from".to_string(),
                    ));
                }
                let defaults = default_parameter_sets(symbols);
                symbols
                    .iter()
                    .map(|s| (s.clone(), defaults.clone()))
                    .collect()
            }
        };

        let descriptors: BTreeMap<String, Vec<SymmetryFunction>> = sets
            .iter()
            .map(|(symbol, family)| {
                let expanded: Vec<SymmetryFunction> =
                    family.iter().flat_map(ParameterSet::expand).collect();
                (symbol.clone(), expanded)
            })
            .collect();

        for (symbol, sfs) in &descriptors {
            log::debug!("{symbol}: {} symmetry functions", sfs.len());
        }

        Ok(Self {
            cutoff: settings.cutoff,
            cutoff_fn: settings.cutofffxn,
            normalized: settings.normalized,
            descriptors,
        })
    }

    /// Fingerprint length for atoms of `symbol`.
    pub fn feature_dimension(&self, symbol: &str) -> Option<usize> {
        self.descriptors.get(symbol).map(Vec::len)
    }

    pub fn dimensions(&self) -> BTreeMap<String, usize> {
        self.descriptors
            .iter()
            .map(|(s, d)| (s.clone(), d.len()))
            .collect()
    }
}

impl Featurizer for Gaussian {
    fn name(&self) -> &'static str {
        "Gaussian"
    }

    fn fingerprint_structure(&self, structure: &Structure) -> Result<Vec<Vec<f64>>> {
        // fail before the neighbour search on elements we cannot describe
        if let Some(atom) = structure
            .atoms
            .iter()
            .find(|a| !self.descriptors.contains_key(&a.symbol))
        {
            return Err(Error::UnknownElement(atom.symbol.clone()));
        }

        let neighbors = neighbor_list(structure, self.cutoff)?;
        let symbols: Vec<&str> = structure.atoms.iter().map(|a| a.symbol.as_str()).collect();
        let ctx = EvalContext {
            cutoff: self.cutoff,
            cutoff_fn: self.cutoff_fn,
            normalized: self.normalized,
        };

        Ok(structure
            .atoms
            .iter()
            .zip(&neighbors)
            .map(|(atom, shell)| evaluate(&self.descriptors[&atom.symbol], shell, &symbols, &ctx))
            .collect())
    }
}
