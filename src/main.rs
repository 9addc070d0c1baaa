use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use atomfeat::data::loader;
use atomfeat::features::io as feature_io;
use atomfeat::{NeuralNetwork, Pipeline, Preprocessor, Settings};

#[derive(Parser)]
#[command(name = "atomfeat", version, about = "Symmetry-function fingerprints and atomistic neural-network potentials")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a settings file and print it with defaults filled in
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Fingerprint structures, fit and save the preprocessor
    Featurize {
        #[arg(short, long)]
        config: PathBuf,
        /// Structures (.xyz, .extxyz, .json)
        #[arg(short, long)]
        input: PathBuf,
        /// Fingerprint table (.parquet, .csv, .json)
        #[arg(short, long, default_value = "features.parquet")]
        output: PathBuf,
    },
    /// Build a network sized for a fingerprint table and save its initial weights
    InitModel {
        #[arg(short, long)]
        config: PathBuf,
        /// Fingerprint table written by `featurize`
        #[arg(short, long)]
        features: PathBuf,
        #[arg(short, long, default_value = "model.json")]
        output: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Predict structure energies with a saved network
    Predict {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        weights: PathBuf,
        /// Fitted preprocessor; defaults to `save_preprocessor` from the settings
        #[arg(short, long)]
        scaler: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check { config } => {
            let settings = load_settings(&config)?;
            println!("{}", settings.to_json_string()?);
        }
        Command::Featurize {
            config,
            input,
            output,
        } => {
            let pipeline = Pipeline::new(load_settings(&config)?);
            let dataset = loader::load_file(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            let featurized = pipeline.featurize(&dataset)?;
            feature_io::write_file(&featurized.table, &output)
                .with_context(|| format!("writing {}", output.display()))?;
            for (symbol, dim) in featurized.table.dimensions()? {
                println!("{symbol}: {dim} features");
            }
        }
        Command::InitModel {
            config,
            features,
            output,
            seed,
        } => {
            let pipeline = Pipeline::new(load_settings(&config)?);
            let table = feature_io::read_file(&features)
                .with_context(|| format!("reading {}", features.display()))?;
            let model = pipeline.build_model(&table, seed)?;
            model.save(&output)?;
            println!("{} parameters written to {}", model.n_parameters(), output.display());
        }
        Command::Predict {
            config,
            input,
            weights,
            scaler,
        } => {
            let pipeline = Pipeline::new(load_settings(&config)?);
            let dataset = loader::load_file(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            let model = NeuralNetwork::load(&weights)
                .with_context(|| format!("loading weights from {}", weights.display()))?;
            let preprocessor = scaler
                .map(|path| {
                    Preprocessor::load(&path)
                        .with_context(|| format!("loading preprocessor from {}", path.display()))
                })
                .transpose()?;

            let energies = pipeline.predict(&dataset, &model, preprocessor.as_ref())?;
            for (i, (energy, structure)) in energies.iter().zip(&dataset.structures).enumerate() {
                match structure.energy() {
                    Some(reference) => println!("{i}\t{energy:.6}\t{reference:.6}"),
                    None => println!("{i}\t{energy:.6}"),
                }
            }
        }
    }
    Ok(())
}

fn load_settings(path: &Path) -> Result<Settings> {
    Settings::from_path(path).with_context(|| format!("reading settings from {}", path.display()))
}
