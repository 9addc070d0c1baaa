//! Smooth cutoff functions that take neighbour contributions to zero at `Rc`.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default exponent of the polynomial cutoff.
pub const DEFAULT_POLYNOMIAL_GAMMA: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "CutoffRepr", into = "CutoffRepr")]
pub enum CutoffKind {
    /// `0.5 (cos(π r / Rc) + 1)`
    #[default]
    Cosine,
    /// `1 + γ (r/Rc)^(γ+1) − (γ+1) (r/Rc)^γ`
    Polynomial { gamma: f64 },
}

impl CutoffKind {
    /// Value of the cutoff function at distance `r` for radius `rc`.
    pub fn eval(&self, r: f64, rc: f64) -> f64 {
        if r > rc {
            return 0.0;
        }
        match *self {
            CutoffKind::Cosine => 0.5 * ((PI * r / rc).cos() + 1.0),
            CutoffKind::Polynomial { gamma } => {
                let x = r / rc;
                1.0 + gamma * x.powf(gamma + 1.0) - (gamma + 1.0) * x.powf(gamma)
            }
        }
    }
}

impl fmt::Display for CutoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoffKind::Cosine => write!(f, "cosine"),
            CutoffKind::Polynomial { gamma } => write!(f, "polynomial(gamma={gamma})"),
        }
    }
}

/// On-disk form: `"cosine"`, `"polynomial"` or `{"name": "polynomial", "gamma": 4}`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CutoffRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gamma: Option<f64>,
    },
}

impl TryFrom<CutoffRepr> for CutoffKind {
    type Error = String;

    fn try_from(repr: CutoffRepr) -> Result<Self, Self::Error> {
        let (name, gamma) = match repr {
            CutoffRepr::Name(name) => (name, None),
            CutoffRepr::Full { name, gamma } => (name, gamma),
        };
        match name.to_ascii_lowercase().as_str() {
            "cosine" => {
                if gamma.is_some() {
                    return Err("the cosine cutoff takes no 'gamma'".to_string());
                }
                Ok(CutoffKind::Cosine)
            }
            "polynomial" => {
                let gamma = gamma.unwrap_or(DEFAULT_POLYNOMIAL_GAMMA);
                if !(gamma.is_finite() && gamma > 0.0) {
                    return Err(format!("polynomial cutoff gamma must be positive, got {gamma}"));
                }
                Ok(CutoffKind::Polynomial { gamma })
            }
            other => Err(format!("unknown cutoff function '{other}'")),
        }
    }
}

impl From<CutoffKind> for CutoffRepr {
    fn from(kind: CutoffKind) -> Self {
        match kind {
            CutoffKind::Cosine => CutoffRepr::Name("cosine".to_string()),
            CutoffKind::Polynomial { gamma } => CutoffRepr::Full {
                name: "polynomial".to_string(),
                gamma: Some(gamma),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_goes_from_one_to_zero() {
        let fc = CutoffKind::Cosine;
        assert_eq!(fc.eval(0.0, 5.0), 1.0);
        assert!((fc.eval(2.5, 5.0) - 0.5).abs() < 1e-12);
        assert!(fc.eval(5.0, 5.0).abs() < 1e-12);
        assert_eq!(fc.eval(5.1, 5.0), 0.0);
    }

    #[test]
    fn polynomial_is_smooth_at_both_ends() {
        let fc = CutoffKind::Polynomial { gamma: 4.0 };
        assert_eq!(fc.eval(0.0, 6.0), 1.0);
        assert!(fc.eval(6.0, 6.0).abs() < 1e-12);
        let mid = fc.eval(3.0, 6.0);
        assert!(mid > 0.0 && mid < 1.0);
        // monotone decreasing
        let mut prev = 1.0;
        for k in 1..=60 {
            let v = fc.eval(k as f64 * 0.1, 6.0);
            assert!(v <= prev + 1e-15);
            prev = v;
        }
    }

    #[test]
    fn parses_both_notations() {
        let c: CutoffKind = serde_json::from_str("\"Cosine\"").unwrap();
        assert_eq!(c, CutoffKind::Cosine);
        let p: CutoffKind = serde_json::from_str("\"polynomial\"").unwrap();
        assert_eq!(p, CutoffKind::Polynomial { gamma: 4.0 });
        let p: CutoffKind = serde_json::from_str(r#"{"name": "polynomial", "gamma": 2}"#).unwrap();
        assert_eq!(p, CutoffKind::Polynomial { gamma: 2.0 });
        assert!(serde_json::from_str::<CutoffKind>("\"gaussian\"").is_err());
        assert!(serde_json::from_str::<CutoffKind>(r#"{"name": "polynomial", "gamma": -1}"#).is_err());
    }
}
