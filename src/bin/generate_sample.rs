use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use atomfeat::data::loader::to_xyz_string;
use atomfeat::features::symmetry::{ParameterSet, SymmetryKind};
use atomfeat::model::Activation;
use atomfeat::settings::{CustomParameters, FeatureSettings, ModelKind, ModelSettings};
use atomfeat::{Atom, InfoValue, ScalerKind, Settings, Structure};

// Equilibrium water geometry and harmonic constants (eV/Å², eV/rad²)
const R_OH: f64 = 0.9572;
const THETA_HOH: f64 = 104.52 * std::f64::consts::PI / 180.0;
const K_BOND: f64 = 22.0;
const K_ANGLE: f64 = 1.6;

/// One distorted water molecule centred at `origin`, with its harmonic energy.
fn water(origin: [f64; 3], rng: &mut StdRng, noise: &Normal<f64>) -> (Vec<Atom>, f64) {
    let r1 = R_OH + noise.sample(rng);
    let r2 = R_OH + noise.sample(rng);
    let theta = THETA_HOH + 5.0 * noise.sample(rng);

    let half = theta / 2.0;
    let o = origin;
    let h1 = [o[0] + r1 * half.sin(), o[1] + r1 * half.cos(), o[2]];
    let h2 = [o[0] - r2 * half.sin(), o[1] + r2 * half.cos(), o[2]];

    let energy = 0.5 * K_BOND * ((r1 - R_OH).powi(2) + (r2 - R_OH).powi(2))
        + 0.5 * K_ANGLE * (theta - THETA_HOH).powi(2);

    (
        vec![Atom::new("O", o), Atom::new("H", h1), Atom::new("H", h2)],
        energy,
    )
}

fn sample_settings() -> Settings {
    let mut user_input = BTreeMap::new();
    user_input.insert(
        "O".to_string(),
        vec![
            ParameterSet::radial("H", vec![0.05, 4.0, 20.0, 80.0]),
            ParameterSet::radial("O", vec![0.05, 4.0]),
            ParameterSet::angular(SymmetryKind::G3, "H", "H", vec![0.005], vec![1.0], vec![1.0, -1.0]),
        ],
    );
    user_input.insert(
        "H".to_string(),
        vec![
            ParameterSet::radial("H", vec![0.05, 4.0, 20.0]),
            ParameterSet::radial("O", vec![0.05, 4.0, 20.0]),
            ParameterSet::angular(SymmetryKind::G3, "H", "O", vec![0.005], vec![1.0], vec![1.0, -1.0]),
        ],
    );

    let mut features = FeatureSettings::gaussian(6.5);
    features.preprocessor = Some(ScalerKind::MinMax {
        feature_range: (-1.0, 1.0),
    });
    features.save_preprocessor = Some("sample.scaler".into());
    features.custom = Some(CustomParameters { user_input });

    Settings {
        model: ModelSettings {
            name: ModelKind::PytorchPotentials,
            hiddenlayers: vec![10, 10],
            activation: Activation::Relu,
            input_dimension: Some(8),
        },
        features,
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 0.02).context("building noise distribution")?;

    let mut frames = Vec::new();
    for frame in 0..50 {
        // dimers in a periodic box, a few frames of monomers in vacuum
        let periodic = frame % 5 != 0;
        let n_molecules = if periodic { 2 } else { 1 };

        let mut structure = Structure::default();
        let mut total = 0.0;
        for m in 0..n_molecules {
            let origin = [2.0 + 3.0 * m as f64, 2.0, 2.0 + noise.sample(&mut rng)];
            let (atoms, energy) = water(origin, &mut rng, &noise);
            structure.atoms.extend(atoms);
            total += energy;
        }
        if periodic {
            structure.cell = Some([[6.0, 0.0, 0.0], [0.0, 6.0, 0.0], [0.0, 0.0, 6.0]]);
            structure.pbc = [true; 3];
        }
        structure.info.insert("energy".into(), InfoValue::Float(total));
        structure
            .info
            .insert("frame".into(), InfoValue::Integer(frame as i64));
        frames.push(structure);
    }

    let xyz_path = "sample_water.xyz";
    std::fs::write(xyz_path, to_xyz_string(&frames)).context("writing trajectory")?;

    let settings = sample_settings();
    settings.validate()?;
    let settings_path = "sample_settings.json";
    std::fs::write(settings_path, settings.to_json_string()?).context("writing settings")?;

    println!(
        "Wrote {} frames to {xyz_path} and settings to {settings_path}",
        frames.len()
    );
    Ok(())
}
