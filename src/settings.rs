use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::cutoff::CutoffKind;
use crate::features::symmetry::ParameterSet;
use crate::model::activation::Activation;
use crate::preprocessing::ScalerKind;

/// Where the fitted preprocessor goes when `save_preprocessor` is not set.
pub const DEFAULT_PREPROCESSOR_PATH: &str = "atomfeat.scaler";

// ---------------------------------------------------------------------------
// Settings – the whole configuration record
// ---------------------------------------------------------------------------

/// Hyperparameter record: which estimator to build and how atoms are featurized.
///
/// ```json
/// {
///   "model": {"name": "PytorchPotentials", "hiddenlayers": [10, 10],
///             "activation": "relu", "input_dimension": 8},
///   "features": {"name": "Gaussian", "cutoff": 6.5, "normalized": true,
///                "preprocessor": ["MinMaxScaler", {"feature_range": [-1, 1]}],
///                "save_preprocessor": "model.scaler",
///                "custom": {"user_input": {"H": [{"type": "G2", "symbols": ["H"], "eta": [1.0]}]}}}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub model: ModelSettings,
    pub features: FeatureSettings,
}

impl Settings {
    /// Parse and validate.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&text)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.features.validate()
    }
}

// ---------------------------------------------------------------------------
// model section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Per-element feedforward network summing atomic energies.
    #[serde(alias = "NeuralNetwork")]
    PytorchPotentials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSettings {
    pub name: ModelKind,
    #[serde(default)]
    pub hiddenlayers: Vec<usize>,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dimension: Option<usize>,
}

impl ModelSettings {
    pub fn validate(&self) -> Result<()> {
        if let Some(pos) = self.hiddenlayers.iter().position(|&w| w == 0) {
            return Err(Error::InvalidConfig(format!(
                "model.hiddenlayers[{pos}] must be positive"
            )));
        }
        if self.input_dimension == Some(0) {
            return Err(Error::InvalidConfig(
                "model.input_dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// features section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeaturizerKind {
    Gaussian,
}

/// `{"user_input": {central symbol: [parameter set, ...]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomParameters {
    pub user_input: BTreeMap<String, Vec<ParameterSet>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureSettings {
    pub name: FeaturizerKind,
    pub cutoff: f64,
    #[serde(default = "default_true")]
    pub normalized: bool,
    #[serde(default)]
    pub cutofffxn: CutoffKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor: Option<ScalerKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_preprocessor: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomParameters>,
}

fn default_true() -> bool {
    true
}

impl FeatureSettings {
    /// Gaussian featurizer with default parameters and no preprocessing.
    pub fn gaussian(cutoff: f64) -> Self {
        Self {
            name: FeaturizerKind::Gaussian,
            cutoff,
            normalized: true,
            cutofffxn: CutoffKind::Cosine,
            preprocessor: None,
            save_preprocessor: None,
            custom: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "features.cutoff must be positive, got {}",
                self.cutoff
            )));
        }
        if let Some(scaler) = &self.preprocessor {
            scaler.validate()?;
        }
        if let Some(custom) = &self.custom {
            if custom.user_input.is_empty() {
                return Err(Error::InvalidConfig(
                    "features.custom.user_input names no element".to_string(),
                ));
            }
            for (symbol, sets) in &custom.user_input {
                if symbol.trim().is_empty() {
                    return Err(Error::InvalidConfig(
                        "features.custom.user_input has an empty symbol".to_string(),
                    ));
                }
                if sets.is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "features.custom.user_input.{symbol} is empty"
                    )));
                }
                for set in sets {
                    set.validate(symbol)?;
                }
            }
        }
        Ok(())
    }

    /// Target path of the fitted preprocessor, if one is configured.
    pub fn preprocessor_path(&self) -> Option<PathBuf> {
        self.preprocessor.as_ref().map(|_| {
            self.save_preprocessor
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PREPROCESSOR_PATH))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symmetry::SymmetryKind;

    const CONFIG: &str = r#"{
        "model": {
            "name": "PytorchPotentials",
            "hiddenlayers": [10, 10],
            "activation": "ReLU",
            "input_dimension": 6
        },
        "features": {
            "name": "Gaussian",
            "cutoff": 6.5,
            "normalized": true,
            "preprocessor": ["MinMaxScaler", {"feature_range": [-1, 1]}],
            "save_preprocessor": "model.scaler",
            "custom": {
                "user_input": {
                    "H": [
                        {"type": "G2", "symbols": ["H"], "eta": [0.1, 1.0]},
                        {"type": "G3", "symbols": ["H", "O"], "eta": 0.005, "gamma": [1, -1], "zeta": [1, 4]}
                    ],
                    "O": [
                        {"type": "G2", "symbols": ["H"], "eta": [0.1, 1.0, 2.0, 4.0, 8.0, 16.0]}
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn parses_full_record() {
        let s = Settings::from_json_str(CONFIG).unwrap();
        assert_eq!(s.model.name, ModelKind::PytorchPotentials);
        assert_eq!(s.model.hiddenlayers, vec![10, 10]);
        assert_eq!(s.model.activation, Activation::Relu);
        assert_eq!(s.model.input_dimension, Some(6));
        assert_eq!(s.features.cutoff, 6.5);
        assert_eq!(
            s.features.preprocessor,
            Some(ScalerKind::MinMax { feature_range: (-1.0, 1.0) })
        );
        assert_eq!(s.features.preprocessor_path(), Some(PathBuf::from("model.scaler")));

        let custom = s.features.custom.as_ref().unwrap();
        assert_eq!(custom.user_input["H"][1].kind, SymmetryKind::G3);
        assert_eq!(custom.user_input["H"][1].eta, vec![0.005]);
    }

    #[test]
    fn minimal_record_uses_defaults() {
        let s = Settings::from_json_str(
            r#"{"model": {"name": "NeuralNetwork"}, "features": {"name": "Gaussian", "cutoff": 5}}"#,
        )
        .unwrap();
        assert!(s.features.normalized);
        assert_eq!(s.features.cutofffxn, CutoffKind::Cosine);
        assert!(s.features.preprocessor.is_none());
        assert!(s.features.preprocessor_path().is_none());
        assert_eq!(s.model.activation, Activation::Tanh);
    }

    #[test]
    fn default_preprocessor_path() {
        let mut f = FeatureSettings::gaussian(5.0);
        f.preprocessor = Some(ScalerKind::Standard);
        assert_eq!(f.preprocessor_path(), Some(PathBuf::from(DEFAULT_PREPROCESSOR_PATH)));
    }

    #[test]
    fn serializes_back_to_an_equal_record() {
        let s = Settings::from_json_str(CONFIG).unwrap();
        let again = Settings::from_json_str(&s.to_json_string().unwrap()).unwrap();
        assert_eq!(s, again);
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_cutoff = CONFIG.replace("\"cutoff\": 6.5", "\"cutoff\": -1");
        assert!(matches!(
            Settings::from_json_str(&bad_cutoff),
            Err(Error::InvalidConfig(_))
        ));

        let bad_eta = CONFIG.replace("[0.1, 1.0]", "[0.1, -1.0]");
        assert!(matches!(
            Settings::from_json_str(&bad_eta),
            Err(Error::InvalidParameter(_))
        ));

        let bad_width = CONFIG.replace("[10, 10]", "[10, 0]");
        assert!(Settings::from_json_str(&bad_width).is_err());

        let bad_range = CONFIG.replace("[-1, 1]", "[1, -1]");
        assert!(Settings::from_json_str(&bad_range).is_err());
    }

    #[test]
    fn rejects_unknown_names_and_fields() {
        let unknown_model = CONFIG.replace("PytorchPotentials", "KernelRidge");
        assert!(matches!(
            Settings::from_json_str(&unknown_model),
            Err(Error::Json(_))
        ));
        let unknown_field = CONFIG.replace("\"normalized\"", "\"normalised\"");
        assert!(Settings::from_json_str(&unknown_field).is_err());
        let unknown_activation = CONFIG.replace("ReLU", "swish");
        assert!(Settings::from_json_str(&unknown_activation).is_err());
    }
}
