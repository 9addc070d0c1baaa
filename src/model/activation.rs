use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Element-wise nonlinearity applied after each hidden layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Activation {
    #[default]
    Tanh,
    Relu,
    Sigmoid,
    Softplus,
    Elu,
    Celu,
    LeakyRelu,
    Linear,
}

const LEAKY_SLOPE: f64 = 0.01;

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            // log(1 + e^x) without overflow for large x
            Activation::Softplus => x.max(0.0) + (-x.abs()).exp().ln_1p(),
            // alpha = 1, where ELU and CELU coincide
            Activation::Elu | Activation::Celu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
            Activation::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_SLOPE * x
                }
            }
            Activation::Linear => x,
        }
    }

    pub fn apply_inplace(self, values: &mut Array2<f64>) {
        if self != Activation::Linear {
            values.mapv_inplace(|v| self.apply(v));
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Softplus => "softplus",
            Activation::Elu => "elu",
            Activation::Celu => "celu",
            Activation::LeakyRelu => "leakyrelu",
            Activation::Linear => "linear",
        }
    }
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "softplus" => Ok(Activation::Softplus),
            "elu" => Ok(Activation::Elu),
            "celu" => Ok(Activation::Celu),
            "leakyrelu" => Ok(Activation::LeakyRelu),
            "linear" | "identity" => Ok(Activation::Linear),
            _ => Err(format!("unknown activation '{s}'")),
        }
    }
}

impl TryFrom<String> for Activation {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Activation> for String {
    fn from(a: Activation) -> Self {
        a.name().to_string()
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("leaky_relu".parse::<Activation>().unwrap(), Activation::LeakyRelu);
        assert_eq!("Tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert!("gelu".parse::<Activation>().is_err());
    }

    #[test]
    fn known_values() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(3.0), 3.0);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-15);
        assert!((Activation::Softplus.apply(0.0) - 2f64.ln()).abs() < 1e-15);
        assert!((Activation::Softplus.apply(800.0) - 800.0).abs() < 1e-9);
        assert!((Activation::Elu.apply(-1.0) - (-1f64).exp_m1()).abs() < 1e-15);
        assert_eq!(Activation::LeakyRelu.apply(-1.0), -0.01);
        assert_eq!(Activation::Linear.apply(-7.5), -7.5);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Activation::LeakyRelu).unwrap();
        assert_eq!(json, "\"leakyrelu\"");
        let back: Activation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Activation::LeakyRelu);
    }
}
