/// Data layer: atomic structures, loading, and neighbour search.
///
/// Architecture:
/// ```text
///  .xyz / .extxyz / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset  │  Vec<Structure>, element inventory
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ neighbors │  cutoff sphere per atom (periodic images included)
///   └───────────┘
/// ```

pub mod loader;
pub mod model;
pub mod neighbors;
