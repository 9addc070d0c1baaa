//! Estimators fed by atomic fingerprints.
//!
//! Only inference lives here: networks are built from `ModelSettings` with
//! seeded weights, or loaded from a saved weight file.

pub mod activation;
pub mod network;

pub use activation::Activation;
pub use network::{AtomicNetwork, Dense, NeuralNetwork};
