use std::{
    fmt,
    fs::File,
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{
    data::{num_batches, MnistBatcher, NUM_CLASSES},
    error,
    logger::install_file_logger,
    metric::SplitMetrics,
    model::{Model, ModelConfig},
};
use burn::{
    data::{
        dataloader::DataLoaderBuilder,
        dataset::{
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    module::AutodiffModule,
    optim::{AdamConfig, Optimizer},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::AutodiffBackend,
    train::{TrainStep, ValidStep},
};
use serde::Serialize;

/// Recorder used for the trained model, parameters are kept at full precision.
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Default directory holding the checkpoint, its config and the training logs.
pub const ARTIFACT_DIR: &str = "models/mnist_mlp";

pub fn checkpoint_path(artifact_dir: &Path) -> PathBuf {
    artifact_dir.join("model.mpk")
}

pub fn config_path(artifact_dir: &Path) -> PathBuf {
    artifact_dir.join("config.json")
}

fn history_path(artifact_dir: &Path) -> PathBuf {
    artifact_dir.join("history.json")
}

pub fn log_path(artifact_dir: &Path) -> PathBuf {
    artifact_dir.join("experiment.log")
}

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(
            ModelConfig::new(NUM_CLASSES),
            AdamConfig::new().with_epsilon(1e-7),
        )
    }
}

/// Metrics of one epoch, accuracies are percentages.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub seconds: u64,
    pub train_batches: usize,
    pub valid_batches: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub valid_loss: f64,
    pub valid_accuracy: f64,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {:>3} time {} sec / epoch train cce {:.4} acc {:4.2}% test cce {:.4} acc {:4.2}%",
            self.epoch,
            self.seconds,
            self.train_loss,
            self.train_accuracy,
            self.valid_loss,
            self.valid_accuracy,
        )
    }
}

#[derive(Clone, Debug)]
pub struct TrainingSummary {
    pub epochs: Vec<EpochReport>,
    pub checkpoint: PathBuf,
}

/// Trains on the MNIST train split, validating on the test split after every epoch.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &Path,
    config: &TrainingConfig,
    device: B::Device,
    verbose: bool,
) -> error::Result<TrainingSummary> {
    train_with_datasets::<B, _, _>(
        artifact_dir,
        config,
        MnistDataset::train(),
        MnistDataset::test(),
        device,
        verbose,
    )
}

/// Trains on the given datasets and saves the model, its config and the per-epoch metrics
/// in `artifact_dir`.
pub fn train_with_datasets<B, DT, DV>(
    artifact_dir: &Path,
    config: &TrainingConfig,
    dataset_train: DT,
    dataset_valid: DV,
    device: B::Device,
    verbose: bool,
) -> error::Result<TrainingSummary>
where
    B: AutodiffBackend,
    DT: Dataset<MnistItem> + 'static,
    DV: Dataset<MnistItem> + 'static,
{
    if config.batch_size == 0 {
        return Err(error::Error::InvalidBatchSize);
    }

    std::fs::create_dir_all(artifact_dir)?;
    install_file_logger(&log_path(artifact_dir));
    config.save(config_path(artifact_dir))?;

    B::seed(config.seed);

    let mut model: Model<B> = config.model.init(&device);
    let mut optim = config.optimizer.init::<B, Model<B>>();

    // Single worker and no shuffling, batches come in dataset order.
    let dataloader_train = DataLoaderBuilder::new(MnistBatcher::<B>::new(device.clone()))
        .batch_size(config.batch_size)
        .build(dataset_train);
    let dataloader_valid =
        DataLoaderBuilder::new(MnistBatcher::<B::InnerBackend>::new(device.clone()))
            .batch_size(config.batch_size)
            .build(dataset_valid);

    log::info!(
        "Training on {} items ({} batches per epoch), validating on {} items ({} batches)",
        dataloader_train.num_items(),
        num_batches(dataloader_train.num_items(), config.batch_size),
        dataloader_valid.num_items(),
        num_batches(dataloader_valid.num_items(), config.batch_size),
    );

    let mut train_metrics = SplitMetrics::default();
    let mut valid_metrics = SplitMetrics::default();
    let mut reports = Vec::with_capacity(config.num_epochs);

    for epoch in 1..config.num_epochs + 1 {
        let start = Instant::now();

        train_metrics.clear();
        for batch in dataloader_train.iter() {
            let output = TrainStep::step(&model, batch);
            model = optim.step(config.learning_rate, model, output.grads);
            train_metrics.update(output.item);
        }

        // Inference mode: running batch norm statistics and no dropout.
        let model_valid = model.valid();

        valid_metrics.clear();
        for batch in dataloader_valid.iter() {
            let output = ValidStep::step(&model_valid, batch);
            valid_metrics.update(output);
        }

        let report = EpochReport {
            epoch,
            seconds: start.elapsed().as_secs(),
            train_batches: train_metrics.loss.count(),
            valid_batches: valid_metrics.loss.count(),
            train_loss: train_metrics.loss.value(),
            train_accuracy: train_metrics.accuracy.value(),
            valid_loss: valid_metrics.loss.value(),
            valid_accuracy: valid_metrics.accuracy.value(),
        };
        log::info!("{report}");
        if verbose {
            println!("{report}");
        }
        reports.push(report);
    }

    let checkpoint = checkpoint_path(artifact_dir);
    model.save_file(checkpoint.clone(), &CheckpointRecorder::new())?;
    log::info!("Model saved to '{}'", checkpoint.display());

    serde_json::to_writer_pretty(File::create(history_path(artifact_dir))?, &reports)?;

    Ok(TrainingSummary {
        epochs: reports,
        checkpoint,
    })
}
