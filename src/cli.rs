use std::{num::NonZeroUsize, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::training::{TrainingConfig, ARTIFACT_DIR};

/// Train a digit classifier on MNIST, or classify an image with a trained one.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub procedure: Procedure,

    /// GPU device ids exposed to the program, empty for CPU only.
    #[arg(long, global = true, default_value = "")]
    pub gpu: String,

    /// Prints the metrics of every epoch when non-zero.
    #[arg(long, global = true, default_value_t = 0)]
    pub verbose: i32,

    /// Directory holding the checkpoint, its config and the logs.
    #[arg(long, global = true, default_value = ARTIFACT_DIR)]
    pub artifact_dir: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Procedure {
    /// Train a new model and save it in the artifact directory.
    Train(TrainArgs),
    /// Classify an image with the trained model.
    Inference {
        /// Path to the 28x28 grayscale image to classify.
        #[arg(long)]
        image_path: PathBuf,
    },
}

/// Overrides of the default training config.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct TrainArgs {
    #[arg(long)]
    pub num_epochs: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<NonZeroUsize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    /// Default training config with the command line overrides applied.
    pub fn training_config(&self) -> TrainingConfig {
        let mut config = TrainingConfig::default();

        if let Some(num_epochs) = self.num_epochs {
            config.num_epochs = num_epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size.get();
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config
    }
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose != 0
    }
}
