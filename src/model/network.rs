use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ndarray::{aview1, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::table::FeatureTable;
use crate::settings::ModelSettings;

use super::activation::Activation;

/// Fully-connected layer.
///
/// Computes: y = xW + b
/// where x is (batch, in_features), W is (in_features, out_features), b is (out_features)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Dense {
    /// Xavier/Glorot uniform weights, zero bias.
    pub fn xavier(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (in_features + out_features) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let weights = Array2::from_shape_fn((in_features, out_features), |_| dist.sample(rng));
        Self {
            weights,
            bias: Array1::zeros(out_features),
        }
    }

    pub fn in_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn out_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights) + &self.bias
    }
}

/// Network for one element: fingerprint → atomic energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicNetwork {
    pub layers: Vec<Dense>,
    pub activation: Activation,
}

impl AtomicNetwork {
    /// `input → hidden[0] → … → 1`
    pub fn new(input: usize, hidden: &[usize], activation: Activation, rng: &mut StdRng) -> Self {
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(input);
        widths.extend_from_slice(hidden);
        widths.push(1);

        let layers = widths
            .windows(2)
            .map(|w| Dense::xavier(w[0], w[1], rng))
            .collect();
        Self { layers, activation }
    }

    pub fn input_dimension(&self) -> usize {
        self.layers.first().map(Dense::in_features).unwrap_or(0)
    }

    /// One output per input row. The activation follows every layer but the last.
    pub fn forward(&self, x: &Array2<f64>) -> Array1<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut h = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h);
            if i < last {
                self.activation.apply_inplace(&mut h);
            }
        }
        h.index_axis_move(Axis(1), 0)
    }

    fn check(&self, symbol: &str) -> Result<()> {
        for pair in self.layers.windows(2) {
            if pair[0].out_features() != pair[1].in_features() {
                return Err(Error::DimensionMismatch {
                    context: format!("{symbol} network layer chain"),
                    expected: pair[0].out_features(),
                    actual: pair[1].in_features(),
                });
            }
        }
        for layer in &self.layers {
            if layer.bias.len() != layer.out_features() {
                return Err(Error::DimensionMismatch {
                    context: format!("{symbol} network bias"),
                    expected: layer.out_features(),
                    actual: layer.bias.len(),
                });
            }
        }
        match self.layers.last() {
            Some(out) if out.out_features() == 1 => Ok(()),
            Some(out) => Err(Error::DimensionMismatch {
                context: format!("{symbol} network output"),
                expected: 1,
                actual: out.out_features(),
            }),
            None => Err(Error::InvalidParameter(format!("{symbol} network has no layers"))),
        }
    }
}

/// Behler-Parrinello potential: one [`AtomicNetwork`] per element, structure
/// energy = sum of atomic energies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    pub hiddenlayers: Vec<usize>,
    pub activation: Activation,
    pub networks: BTreeMap<String, AtomicNetwork>,
}

impl NeuralNetwork {
    /// Build a network for every element of `dimensions` (symbol → fingerprint length).
    pub fn new(settings: &ModelSettings, dimensions: &BTreeMap<String, usize>, seed: u64) -> Result<Self> {
        settings.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut networks = BTreeMap::new();
        for (symbol, &dim) in dimensions {
            if let Some(expected) = settings.input_dimension {
                if expected != dim {
                    return Err(Error::DimensionMismatch {
                        context: format!("model.input_dimension for {symbol}"),
                        expected,
                        actual: dim,
                    });
                }
            }
            if dim == 0 {
                return Err(Error::InvalidParameter(format!(
                    "{symbol} has an empty fingerprint"
                )));
            }
            let net = AtomicNetwork::new(dim, &settings.hiddenlayers, settings.activation, &mut rng);
            networks.insert(symbol.clone(), net);
        }

        log::info!(
            "built {} networks: hidden {:?}, activation {}, {} parameters",
            networks.len(),
            settings.hiddenlayers,
            settings.activation,
            count_parameters(&networks)
        );
        Ok(Self {
            hiddenlayers: settings.hiddenlayers.clone(),
            activation: settings.activation,
            networks,
        })
    }

    /// Elements that have a network.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.networks.keys().cloned().collect()
    }

    pub fn n_parameters(&self) -> usize {
        count_parameters(&self.networks)
    }

    /// Energy contribution of every row of `table`, in row order.
    pub fn atomic_energies(&self, table: &FeatureTable) -> Result<Vec<f64>> {
        let mut energies = vec![0.0; table.len()];

        // batch the rows of each element through its network
        for (symbol, net) in &self.networks {
            let idx: Vec<usize> = table
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| &r.symbol == symbol)
                .map(|(i, _)| i)
                .collect();
            if idx.is_empty() {
                continue;
            }

            let dim = net.input_dimension();
            let mut x = Array2::<f64>::zeros((idx.len(), dim));
            for (row_out, &i) in idx.iter().enumerate() {
                let values = &table.rows[i].values;
                if values.len() != dim {
                    return Err(Error::DimensionMismatch {
                        context: format!(
                            "{symbol} input of structure {}, atom {}",
                            table.rows[i].structure, table.rows[i].atom
                        ),
                        expected: dim,
                        actual: values.len(),
                    });
                }
                x.row_mut(row_out).assign(&aview1(values));
            }

            let out = net.forward(&x);
            for (&i, e) in idx.iter().zip(out.iter()) {
                energies[i] = *e;
            }
        }

        if let Some(row) = table.rows.iter().find(|r| !self.networks.contains_key(&r.symbol)) {
            return Err(Error::UnknownElement(row.symbol.clone()));
        }
        Ok(energies)
    }

    /// Sum of atomic energies for each of `n_structures` structures.
    /// Structures without rows (no atoms) get zero.
    pub fn structure_energies(&self, table: &FeatureTable, n_structures: usize) -> Result<Vec<f64>> {
        if let Some(row) = table.rows.iter().find(|r| r.structure >= n_structures) {
            return Err(Error::InvalidParameter(format!(
                "row for structure {} in a table of {n_structures} structures",
                row.structure
            )));
        }
        let atomic = self.atomic_energies(table)?;
        let mut totals = vec![0.0; n_structures];
        for (row, e) in table.rows.iter().zip(atomic) {
            totals[row.structure] += e;
        }
        Ok(totals)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        log::info!("saved model ({} parameters) to {}", self.n_parameters(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let model: NeuralNetwork = serde_json::from_str(&text)?;
        for (symbol, net) in &model.networks {
            net.check(symbol)?;
        }
        Ok(model)
    }
}

fn count_parameters(networks: &BTreeMap<String, AtomicNetwork>) -> usize {
    networks
        .values()
        .flat_map(|n| &n.layers)
        .map(|l| l.weights.len() + l.bias.len())
        .sum()
}
