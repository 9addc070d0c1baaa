//! Feature scaling fitted on training fingerprints and persisted for reuse at
//! inference time.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::table::FeatureTable;

// ---------------------------------------------------------------------------
// ScalerKind – what the configuration asks for
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalerRepr", into = "ScalerRepr")]
pub enum ScalerKind {
    /// Map each column onto `feature_range`.
    MinMax { feature_range: (f64, f64) },
    /// Zero mean, unit variance per column.
    Standard,
    /// Unit L2 norm per row.
    Normalizer,
}

impl ScalerKind {
    pub fn validate(&self) -> Result<()> {
        if let ScalerKind::MinMax {
            feature_range: (lo, hi),
        } = *self
        {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(Error::InvalidConfig(format!(
                    "MinMaxScaler feature_range must satisfy min < max, got [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalerKind::MinMax { .. } => "MinMaxScaler",
            ScalerKind::Standard => "StandardScaler",
            ScalerKind::Normalizer => "Normalizer",
        }
    }
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalerKind::MinMax {
                feature_range: (lo, hi),
            } => write!(f, "MinMaxScaler[{lo}, {hi}]"),
            other => f.write_str(other.name()),
        }
    }
}

/// On-disk form: `"StandardScaler"` or `["MinMaxScaler", {"feature_range": [-1, 1]}]`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScalerRepr {
    Name(String),
    WithOptions(String, ScalerOptions),
}

#[derive(Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScalerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_range: Option<[f64; 2]>,
}

impl TryFrom<ScalerRepr> for ScalerKind {
    type Error = String;

    fn try_from(repr: ScalerRepr) -> std::result::Result<Self, Self::Error> {
        let (name, options) = match repr {
            ScalerRepr::Name(name) => (name, ScalerOptions::default()),
            ScalerRepr::WithOptions(name, options) => (name, options),
        };
        match name.as_str() {
            "MinMaxScaler" => {
                let [lo, hi] = options.feature_range.unwrap_or([0.0, 1.0]);
                Ok(ScalerKind::MinMax {
                    feature_range: (lo, hi),
                })
            }
            "StandardScaler" | "Normalizer" if options.feature_range.is_some() => {
                Err(format!("{name} takes no 'feature_range'"))
            }
            "StandardScaler" => Ok(ScalerKind::Standard),
            "Normalizer" => Ok(ScalerKind::Normalizer),
            other => Err(format!("unknown preprocessor '{other}'")),
        }
    }
}

impl From<ScalerKind> for ScalerRepr {
    fn from(kind: ScalerKind) -> Self {
        match kind {
            ScalerKind::MinMax {
                feature_range: (lo, hi),
            } => ScalerRepr::WithOptions(
                kind.name().to_string(),
                ScalerOptions {
                    feature_range: Some([lo, hi]),
                },
            ),
            other => ScalerRepr::Name(other.name().to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Preprocessor – fitted state
// ---------------------------------------------------------------------------

/// Per-column affine map `x' = x * scale + shift`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub scale: Vec<f64>,
    pub shift: Vec<f64>,
}

impl ColumnScaling {
    fn identity(dim: usize) -> Self {
        Self {
            scale: vec![1.0; dim],
            shift: vec![0.0; dim],
        }
    }

    pub fn dimension(&self) -> usize {
        self.scale.len()
    }
}

/// A fitted scaler. Fingerprint lengths differ between elements, so every
/// element gets its own column statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub kind: ScalerKind,
    pub elements: BTreeMap<String, ColumnScaling>,
}

impl Preprocessor {
    pub fn fit(kind: ScalerKind, table: &FeatureTable) -> Result<Self> {
        kind.validate()?;
        if table.is_empty() {
            return Err(Error::InvalidParameter(
                "cannot fit a preprocessor on an empty feature table".to_string(),
            ));
        }

        let dims = table.dimensions()?;
        let mut elements = BTreeMap::new();
        for (symbol, &dim) in &dims {
            let rows: Vec<&[f64]> = table.rows_for(symbol).map(|r| r.values.as_slice()).collect();
            let scaling = match kind {
                ScalerKind::MinMax {
                    feature_range: (lo, hi),
                } => fit_min_max(&rows, dim, lo, hi),
                ScalerKind::Standard => fit_standard(&rows, dim),
                ScalerKind::Normalizer => ColumnScaling::identity(dim),
            };
            log::debug!("fitted {kind} for {symbol} on {} rows x {dim} columns", rows.len());
            elements.insert(symbol.clone(), scaling);
        }

        Ok(Self { kind, elements })
    }

    /// Elements the preprocessor was fitted on. This is the inventory the
    /// fingerprint layout has to be rebuilt from at inference time.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.elements.keys().cloned().collect()
    }

    /// Scale a single fingerprint of element `symbol` in place.
    pub fn transform_row(&self, symbol: &str, values: &mut [f64]) -> Result<()> {
        let scaling = self
            .elements
            .get(symbol)
            .ok_or_else(|| Error::UnknownElement(symbol.to_string()))?;
        if values.len() != scaling.dimension() {
            return Err(Error::DimensionMismatch {
                context: format!("{symbol} fingerprint"),
                expected: scaling.dimension(),
                actual: values.len(),
            });
        }

        match self.kind {
            ScalerKind::Normalizer => {
                let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    values.iter_mut().for_each(|v| *v /= norm);
                }
            }
            _ => {
                for ((v, scale), shift) in values.iter_mut().zip(&scaling.scale).zip(&scaling.shift) {
                    *v = *v * scale + shift;
                }
            }
        }
        Ok(())
    }

    pub fn transform(&self, table: &mut FeatureTable) -> Result<()> {
        for row in &mut table.rows {
            self.transform_row(&row.symbol, &mut row.values)?;
        }
        Ok(())
    }

    pub fn fit_transform(kind: ScalerKind, table: &mut FeatureTable) -> Result<Self> {
        let pre = Self::fit(kind, table)?;
        pre.transform(table)?;
        Ok(pre)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("saved {} to {}", self.kind, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let pre: Preprocessor = serde_json::from_str(&text)?;
        pre.kind.validate()?;
        for (symbol, scaling) in &pre.elements {
            if scaling.scale.len() != scaling.shift.len() {
                return Err(Error::DimensionMismatch {
                    context: format!("stored {symbol} scaling"),
                    expected: scaling.scale.len(),
                    actual: scaling.shift.len(),
                });
            }
        }
        Ok(pre)
    }
}

fn fit_min_max(rows: &[&[f64]], dim: usize, lo: f64, hi: f64) -> ColumnScaling {
    let mut min = vec![f64::INFINITY; dim];
    let mut max = vec![f64::NEG_INFINITY; dim];
    for row in rows {
        for (c, &v) in row.iter().enumerate() {
            min[c] = min[c].min(v);
            max[c] = max[c].max(v);
        }
    }

    let mut scaling = ColumnScaling::identity(dim);
    for c in 0..dim {
        let mut range = max[c] - min[c];
        if range == 0.0 {
            range = 1.0;
        }
        let scale = (hi - lo) / range;
        scaling.scale[c] = scale;
        scaling.shift[c] = lo - min[c] * scale;
    }
    scaling
}

fn fit_standard(rows: &[&[f64]], dim: usize) -> ColumnScaling {
    let n = rows.len() as f64;
    let mut mean = vec![0.0; dim];
    for row in rows {
        for (c, &v) in row.iter().enumerate() {
            mean[c] += v / n;
        }
    }
    let mut var = vec![0.0; dim];
    for row in rows {
        for (c, &v) in row.iter().enumerate() {
            var[c] += (v - mean[c]).powi(2) / n;
        }
    }

    let mut scaling = ColumnScaling::identity(dim);
    for c in 0..dim {
        let mut std = var[c].sqrt();
        if std == 0.0 {
            std = 1.0;
        }
        scaling.scale[c] = 1.0 / std;
        scaling.shift[c] = -mean[c] / std;
    }
    scaling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::table::AtomFingerprint;

    fn table() -> FeatureTable {
        let row = |structure, atom, symbol: &str, values: Vec<f64>| AtomFingerprint {
            structure,
            atom,
            symbol: symbol.to_string(),
            values,
        };
        FeatureTable {
            rows: vec![
                row(0, 0, "O", vec![1.0, 5.0, 2.0]),
                row(0, 1, "H", vec![0.0, 4.0]),
                row(0, 2, "H", vec![2.0, 4.0]),
                row(1, 0, "O", vec![3.0, 5.0, 6.0]),
            ],
        }
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn min_max_maps_onto_range() {
        let mut t = table();
        let kind = ScalerKind::MinMax {
            feature_range: (-1.0, 1.0),
        };
        Preprocessor::fit_transform(kind, &mut t).unwrap();
        assert!(close(&t.rows[0].values, &[-1.0, -1.0, -1.0]));
        assert!(close(&t.rows[3].values, &[1.0, -1.0, 1.0]));
        assert!(close(&t.rows[1].values, &[-1.0, -1.0]));
        assert!(close(&t.rows[2].values, &[1.0, -1.0]));
    }

    #[test]
    fn standard_centres_and_scales() {
        let mut t = table();
        Preprocessor::fit_transform(ScalerKind::Standard, &mut t).unwrap();
        assert!(close(&t.rows[0].values, &[-1.0, 0.0, -1.0]));
        assert!(close(&t.rows[3].values, &[1.0, 0.0, 1.0]));
    }

    #[test]
    fn normalizer_gives_unit_rows() {
        let mut t = table();
        t.rows[1].values = vec![0.0, 0.0];
        Preprocessor::fit_transform(ScalerKind::Normalizer, &mut t).unwrap();
        assert!(close(&t.rows[2].values, &[2.0 / 20f64.sqrt(), 4.0 / 20f64.sqrt()]));
        assert_eq!(t.rows[1].values, vec![0.0, 0.0]);
    }

    #[test]
    fn unseen_element_and_wrong_length_fail() {
        let pre = Preprocessor::fit(ScalerKind::Standard, &table()).unwrap();
        let mut v = vec![1.0, 2.0];
        assert!(matches!(
            pre.transform_row("C", &mut v),
            Err(Error::UnknownElement(_))
        ));
        assert!(matches!(
            pre.transform_row("O", &mut v),
            Err(Error::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn empty_table_cannot_be_fitted() {
        assert!(Preprocessor::fit(ScalerKind::Standard, &FeatureTable::default()).is_err());
    }

    #[test]
    fn persisted_scaler_reproduces_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.scaler");
        let kind = ScalerKind::MinMax {
            feature_range: (0.0, 1.0),
        };
        let pre = Preprocessor::fit(kind, &table()).unwrap();
        pre.save(&path).unwrap();

        let loaded = Preprocessor::load(&path).unwrap();
        assert_eq!(loaded, pre);

        let mut a = table();
        let mut b = table();
        pre.transform(&mut a).unwrap();
        loaded.transform(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parses_config_notations() {
        let k: ScalerKind = serde_json::from_str("\"StandardScaler\"").unwrap();
        assert_eq!(k, ScalerKind::Standard);
        let k: ScalerKind =
            serde_json::from_str(r#"["MinMaxScaler", {"feature_range": [-1, 1]}]"#).unwrap();
        assert_eq!(k, ScalerKind::MinMax { feature_range: (-1.0, 1.0) });
        let k: ScalerKind = serde_json::from_str("\"MinMaxScaler\"").unwrap();
        assert_eq!(k, ScalerKind::MinMax { feature_range: (0.0, 1.0) });
        assert!(serde_json::from_str::<ScalerKind>("\"RobustScaler\"").is_err());
        assert!(serde_json::from_str::<ScalerKind>(r#"["Normalizer", {"feature_range": [0, 1]}]"#).is_err());
    }
}
