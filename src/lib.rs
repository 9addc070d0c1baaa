//! Atom-centred Gaussian symmetry-function fingerprints and per-element
//! neural-network potentials.
//!
//! ```text
//!  settings.json ──► Settings ──┬──► Gaussian featurizer ──► FeatureTable
//!                               │            ▲                    │
//!  structures.xyz ──► Dataset ──┘────────────┘                    ▼
//!                                                         Preprocessor (fit / load)
//!                                                                 │
//!                                                                 ▼
//!                                                          NeuralNetwork ──► energies
//! ```

pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod settings;

pub use data::model::{Atom, Dataset, InfoValue, Structure};
pub use error::{Error, Result};
pub use features::gaussian::Gaussian;
pub use features::table::{AtomFingerprint, FeatureTable};
pub use features::Featurizer;
pub use model::NeuralNetwork;
pub use pipeline::{Featurized, Pipeline};
pub use preprocessing::{Preprocessor, ScalerKind};
pub use settings::Settings;
