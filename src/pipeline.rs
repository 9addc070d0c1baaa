use std::borrow::Cow;
use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};

use crate::data::model::Dataset;
use crate::features::gaussian::Gaussian;
use crate::features::table::FeatureTable;
use crate::features::Featurizer;
use crate::model::NeuralNetwork;
use crate::preprocessing::Preprocessor;
use crate::settings::{FeaturizerKind, Settings};

// ---------------------------------------------------------------------------
// Pipeline: settings → featurizer → preprocessor → model
// ---------------------------------------------------------------------------

/// Output of [`Pipeline::featurize`].
#[derive(Debug, Clone)]
pub struct Featurized {
    /// Scaled fingerprints (raw ones when no preprocessor is configured).
    pub table: FeatureTable,
    /// The fitted preprocessor, already written to disk.
    pub preprocessor: Option<Preprocessor>,
}

pub struct Pipeline {
    pub settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Featurizer for `symbols`, checked against `model.input_dimension`.
    pub fn featurizer(&self, symbols: &BTreeSet<String>) -> Result<Gaussian> {
        let features = &self.settings.features;
        let featurizer = match features.name {
            FeaturizerKind::Gaussian => Gaussian::from_settings(features, symbols)?,
        };

        if let Some(expected) = self.settings.model.input_dimension {
            for (symbol, dim) in featurizer.dimensions() {
                if dim != expected {
                    bail!(
                        "model.input_dimension is {expected} but {symbol} fingerprints have {dim} components"
                    );
                }
            }
        }
        Ok(featurizer)
    }

    /// Training-time path: fingerprint `dataset`, fit the configured
    /// preprocessor on the result, scale, and persist the preprocessor.
    pub fn featurize(&self, dataset: &Dataset) -> Result<Featurized> {
        let featurizer = self.featurizer(&dataset.symbols)?;
        let mut table = featurizer
            .fingerprint_dataset(dataset)
            .context("computing fingerprints")?;

        let preprocessor = match self.settings.features.preprocessor {
            Some(kind) => {
                let pre = Preprocessor::fit_transform(kind, &mut table)
                    .with_context(|| format!("fitting {kind}"))?;
                if let Some(path) = self.settings.features.preprocessor_path() {
                    pre.save(&path)
                        .with_context(|| format!("saving preprocessor to {}", path.display()))?;
                }
                Some(pre)
            }
            None => {
                log::info!("no preprocessor configured, fingerprints left unscaled");
                None
            }
        };

        Ok(Featurized {
            table,
            preprocessor,
        })
    }

    /// Inference-time path: fingerprint `dataset` and scale with an already
    /// fitted preprocessor. When none is passed but one is configured, it is
    /// read from `save_preprocessor`.
    ///
    /// The fingerprint layout is rebuilt for the elements the preprocessor was
    /// fitted on, so a dataset holding only some of them (H2 after training on
    /// water) gets the training-time columns.
    pub fn transform(&self, dataset: &Dataset, preprocessor: Option<&Preprocessor>) -> Result<FeatureTable> {
        let preprocessor = self.resolve_preprocessor(preprocessor)?;
        let inventory = match &preprocessor {
            Some(pre) => pre.symbols(),
            None => dataset.symbols.clone(),
        };
        self.scaled_fingerprints(dataset, &inventory, preprocessor.as_deref())
    }

    /// Energy of every structure in `dataset`, one value per structure.
    /// Without a preprocessor the layout follows the elements `model` has
    /// networks for.
    pub fn predict(
        &self,
        dataset: &Dataset,
        model: &NeuralNetwork,
        preprocessor: Option<&Preprocessor>,
    ) -> Result<Vec<f64>> {
        let preprocessor = self.resolve_preprocessor(preprocessor)?;
        let inventory = match &preprocessor {
            Some(pre) => pre.symbols(),
            None => model.symbols(),
        };
        let table = self.scaled_fingerprints(dataset, &inventory, preprocessor.as_deref())?;
        Ok(model.structure_energies(&table, dataset.len())?)
    }

    fn resolve_preprocessor<'a>(
        &self,
        given: Option<&'a Preprocessor>,
    ) -> Result<Option<Cow<'a, Preprocessor>>> {
        if let Some(pre) = given {
            return Ok(Some(Cow::Borrowed(pre)));
        }
        match self.settings.features.preprocessor_path() {
            Some(path) => {
                let pre = Preprocessor::load(&path)
                    .with_context(|| format!("loading preprocessor from {}", path.display()))?;
                Ok(Some(Cow::Owned(pre)))
            }
            None => Ok(None),
        }
    }

    fn scaled_fingerprints(
        &self,
        dataset: &Dataset,
        inventory: &BTreeSet<String>,
        preprocessor: Option<&Preprocessor>,
    ) -> Result<FeatureTable> {
        if let Some(missing) = dataset.symbols.difference(inventory).next() {
            bail!("element '{missing}' was not part of the fitted element set {inventory:?}");
        }
        let featurizer = self.featurizer(inventory)?;
        let mut table = featurizer
            .fingerprint_dataset(dataset)
            .context("computing fingerprints")?;

        if let Some(pre) = preprocessor {
            if let Some(kind) = self.settings.features.preprocessor {
                if kind != pre.kind {
                    log::warn!("settings ask for {kind} but the stored preprocessor is {}", pre.kind);
                }
            }
            pre.transform(&mut table).context("applying preprocessor")?;
        }
        Ok(table)
    }

    /// Network sized for the fingerprints in `table`.
    pub fn build_model(&self, table: &FeatureTable, seed: u64) -> Result<NeuralNetwork> {
        if table.is_empty() {
            bail!("cannot size a model from an empty feature table");
        }
        let dims = table.dimensions()?;
        Ok(NeuralNetwork::new(&self.settings.model, &dims, seed)?)
    }
}
