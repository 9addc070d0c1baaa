//! End-to-end: settings file + trajectory → scaled fingerprints → energies.

use std::path::Path;

use atomfeat::data::loader;
use atomfeat::features::io as feature_io;
use atomfeat::{NeuralNetwork, Pipeline, Preprocessor, ScalerKind, Settings};
use tempfile::TempDir;

const TRAJECTORY: &str = "3
energy=-0.10 pbc=\"F F F\"
O  0.000  0.000  0.119
H  0.000  0.763 -0.477
H  0.000 -0.763 -0.477
3
energy=-0.08 pbc=\"F F F\"
O  0.000  0.000  0.125
H  0.000  0.790 -0.470
H  0.000 -0.741 -0.490
6
Lattice=\"6 0 0 0 6 0 0 0 6\" pbc=\"T T T\" energy=-0.21
O  1.000  1.000  1.119
H  1.000  1.763  0.523
H  1.000  0.237  0.523
O  4.000  1.000  1.119
H  4.000  1.763  0.523
H  4.000  0.237  0.523
";

fn settings_json(scaler: &Path) -> String {
    format!(
        r#"{{
        "model": {{"name": "PytorchPotentials", "hiddenlayers": [10, 10], "activation": "relu", "input_dimension": 6}},
        "features": {{
            "name": "Gaussian",
            "cutoff": 6.5,
            "normalized": true,
            "preprocessor": ["MinMaxScaler", {{"feature_range": [-1, 1]}}],
            "save_preprocessor": {scaler:?},
            "custom": {{"user_input": {{
                "O": [{{"type": "G2", "symbols": ["H"], "eta": [0.05, 4.0]}},
                      {{"type": "G2", "symbols": ["O"], "eta": [0.05, 4.0]}},
                      {{"type": "G3", "symbols": ["H", "H"], "eta": 0.005, "gamma": [1, -1], "zeta": 1}}],
                "H": [{{"type": "G2", "symbols": ["O"], "eta": [0.05, 4.0, 20.0]}},
                      {{"type": "G2", "symbols": ["H"], "eta": 4.0}},
                      {{"type": "G4", "symbols": ["O", "H"], "eta": 0.005, "gamma": [1, -1], "zeta": 2}}]
            }}}}
        }}
    }}"#
    )
}

const HYDROGEN: &str = "2
energy=-4.52
H  0.000  0.000  0.000
H  0.000  0.000  0.741
";

struct Fixture {
    dir: TempDir,
    settings: Settings,
}

impl Fixture {
    fn new() -> Self {
        env_logger::try_init().ok();
        let dir = tempfile::tempdir().expect("tempdir");
        let scaler = dir.path().join("model.scaler");
        let config = dir.path().join("settings.json");
        std::fs::write(&config, settings_json(&scaler)).expect("write settings");
        std::fs::write(dir.path().join("train.xyz"), TRAJECTORY).expect("write trajectory");
        let settings = Settings::from_path(&config).expect("settings parse");
        Fixture { dir, settings }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

#[test]
fn featurize_fits_scales_and_persists() {
    let fx = Fixture::new();
    let dataset = loader::load_file(&fx.path("train.xyz")).unwrap();
    assert_eq!(dataset.len(), 3);

    let pipeline = Pipeline::new(fx.settings.clone());
    let featurized = pipeline.featurize(&dataset).unwrap();

    assert_eq!(featurized.table.len(), 12);
    let dims = featurized.table.dimensions().unwrap();
    assert_eq!(dims["O"], 6);
    assert_eq!(dims["H"], 6);
    for row in &featurized.table.rows {
        for &v in &row.values {
            assert!((-1.0 - 1e-12..=1.0 + 1e-12).contains(&v), "{v} outside feature range");
        }
    }

    // the scaler on disk is the one that was fitted
    assert!(fx.path("model.scaler").exists());
    let stored = Preprocessor::load(&fx.path("model.scaler")).unwrap();
    assert_eq!(Some(stored), featurized.preprocessor);
}

#[test]
fn inference_reuses_the_persisted_scaler() {
    let fx = Fixture::new();
    let dataset = loader::load_file(&fx.path("train.xyz")).unwrap();
    let pipeline = Pipeline::new(fx.settings.clone());
    let featurized = pipeline.featurize(&dataset).unwrap();

    // no scaler passed: it is read back from save_preprocessor
    let table = pipeline.transform(&dataset, None).unwrap();
    assert_eq!(table.len(), featurized.table.len());
    for (a, b) in table.rows.iter().zip(&featurized.table.rows) {
        for (x, y) in a.values.iter().zip(&b.values) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}

#[test]
fn energies_follow_through_saved_files() {
    let fx = Fixture::new();
    let dataset = loader::load_file(&fx.path("train.xyz")).unwrap();
    let pipeline = Pipeline::new(fx.settings.clone());
    let featurized = pipeline.featurize(&dataset).unwrap();

    let features_path = fx.path("features.parquet");
    feature_io::write_file(&featurized.table, &features_path).unwrap();
    let table = feature_io::read_file(&features_path).unwrap();

    let model = pipeline.build_model(&table, 11).unwrap();
    model.save(&fx.path("model.json")).unwrap();
    let model = NeuralNetwork::load(&fx.path("model.json")).unwrap();

    let energies = model.structure_energies(&table, dataset.len()).unwrap();
    assert_eq!(energies.len(), 3);
    assert!(energies.iter().all(|e| e.is_finite()));

    // a rigidly shifted copy of the first frame predicts the same energy
    let mut shifted = dataset.clone();
    for atom in &mut shifted.structures[0].atoms {
        atom.position[0] += 4.2;
        atom.position[2] -= 1.3;
    }
    let shifted_table = pipeline.transform(&shifted, featurized.preprocessor.as_ref()).unwrap();
    let shifted_energies = model
        .structure_energies(&shifted_table, shifted.len())
        .unwrap();
    assert!((shifted_energies[0] - energies[0]).abs() < 1e-10);
}

#[test]
fn input_dimension_disagreement_is_reported() {
    let fx = Fixture::new();
    let mut settings = fx.settings.clone();
    settings.model.input_dimension = Some(7);
    let dataset = loader::load_file(&fx.path("train.xyz")).unwrap();
    let err = Pipeline::new(settings).featurize(&dataset).unwrap_err();
    assert!(err.to_string().contains("input_dimension"), "{err}");
}

#[test]
fn elements_outside_the_custom_block_fail() {
    let fx = Fixture::new();
    let dataset = loader::parse_xyz("2\n\nC 0 0 0\nO 0 0 1.2\n").unwrap();
    let err = Pipeline::new(fx.settings.clone())
        .featurize(&dataset)
        .unwrap_err();
    assert!(format!("{err:#}").contains("'C'"), "{err:#}");
}

/// Default descriptors (no `custom` block) scaled with a StandardScaler.
fn default_layout(fx: &Fixture) -> Settings {
    let mut settings = fx.settings.clone();
    settings.features.custom = None;
    settings.features.preprocessor = Some(ScalerKind::Standard);
    settings.model.input_dimension = None;
    settings
}

#[test]
fn inference_on_fewer_elements_keeps_the_training_layout() {
    let fx = Fixture::new();
    let water = loader::load_file(&fx.path("train.xyz")).unwrap();
    let hydrogen = loader::parse_xyz(HYDROGEN).unwrap();

    let pipeline = Pipeline::new(default_layout(&fx));
    let featurized = pipeline.featurize(&water).unwrap();
    let dims = featurized.table.dimensions().unwrap();
    assert_eq!(dims["H"], 20);
    assert_eq!(dims["O"], 20);

    // both with the scaler in hand and with the one read back from disk
    let table = pipeline
        .transform(&hydrogen, featurized.preprocessor.as_ref())
        .unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.dimensions().unwrap()["H"], 20);
    let reloaded = pipeline.transform(&hydrogen, None).unwrap();
    assert_eq!(reloaded, table);

    let model = pipeline.build_model(&featurized.table, 5).unwrap();
    let energies = pipeline.predict(&hydrogen, &model, None).unwrap();
    assert_eq!(energies.len(), 1);
    assert!(energies[0].is_finite());
}

#[test]
fn prediction_without_scaler_follows_the_model_elements() {
    let fx = Fixture::new();
    let mut settings = default_layout(&fx);
    settings.features.preprocessor = None;
    let water = loader::load_file(&fx.path("train.xyz")).unwrap();
    let hydrogen = loader::parse_xyz(HYDROGEN).unwrap();

    let pipeline = Pipeline::new(settings);
    let featurized = pipeline.featurize(&water).unwrap();
    assert!(featurized.preprocessor.is_none());
    let model = pipeline.build_model(&featurized.table, 5).unwrap();

    let energies = pipeline.predict(&hydrogen, &model, None).unwrap();
    assert_eq!(energies.len(), 1);
    assert!(energies[0].is_finite());
}

#[test]
fn elements_unseen_during_fitting_are_reported() {
    let fx = Fixture::new();
    let water = loader::load_file(&fx.path("train.xyz")).unwrap();
    let methane = loader::parse_xyz("2\n\nC 0 0 0\nH 0 0 1.09\n").unwrap();

    let pipeline = Pipeline::new(default_layout(&fx));
    pipeline.featurize(&water).unwrap();
    let err = pipeline.transform(&methane, None).unwrap_err();
    assert!(err.to_string().contains("'C'"), "{err}");
}

#[test]
fn every_frame_gets_an_energy_including_empty_ones() {
    let fx = Fixture::new();
    let text = format!("{TRAJECTORY}0\nempty\n");
    let dataset = loader::parse_xyz(&text).unwrap();
    assert_eq!(dataset.len(), 4);

    let pipeline = Pipeline::new(fx.settings.clone());
    let featurized = pipeline.featurize(&dataset).unwrap();
    let model = pipeline.build_model(&featurized.table, 3).unwrap();

    let energies = pipeline.predict(&dataset, &model, None).unwrap();
    assert_eq!(energies.len(), 4);
    assert_eq!(energies[3], 0.0);
}
