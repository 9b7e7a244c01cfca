//! Super-Resolution Training
//!
//! Epoch loop for the SRResNet pipeline: mean squared error both as the
//! training loss and the validation score (minimized), early stopping on
//! stagnation, exactly-once persistence of the best snapshot, and an HDF5
//! write-out of the best epoch's validation predictions.

use std::path::PathBuf;

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion},
};
use colored::Colorize;
use ndarray::Array4;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::dataset::batcher::{SrBatch, SrBatcher};
use crate::dataset::sr_pairs::{SrPair, SrPairDataset};
use crate::model::srresnet::{SrResNet, SrResNetConfig};
use crate::output::write_predictions;
use crate::training::early_stopping::{EpochOutcome, ScoreDirection, TrainingState};
use crate::tuning::{override_f64, override_usize, warn_unused, ParamOverrides, SearchIntegration};
use crate::utils::metrics::RunningAverage;

/// Configuration for a super-resolution training run
#[derive(Debug, Clone)]
pub struct SuperResConfig {
    /// Directory holding `train.h5` and `valid.h5`
    pub data_dir: PathBuf,
    /// Output path for the predicted high-resolution images
    pub output_path: PathBuf,
    /// Directory for the persisted snapshot
    pub save_model_path: PathBuf,
    /// Batch size
    pub batch_size: usize,
    /// Learning rate
    pub learning_rate: f64,
    /// Total upscaling factor, one of {2, 4, 8}
    pub scale: usize,
    /// Internal channel width of the residual trunk
    pub channels: usize,
    /// Number of input channels
    pub input_channels: usize,
    /// Kernel size of the entry and exit convolutions
    pub large_kernel: usize,
    /// Kernel size inside residual and upscaling blocks
    pub small_kernel: usize,
    /// Number of residual blocks
    pub n_blocks: usize,
    /// Epoch budget
    pub max_epochs: usize,
    /// Early-stopping patience; `None` disables stagnation-based stopping
    pub patience: Option<usize>,
    /// Random seed
    pub seed: u64,
}

impl Default for SuperResConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_path: PathBuf::from("data/best_hr_predictions.h5"),
            save_model_path: PathBuf::from("saved_models"),
            batch_size: 16,
            learning_rate: 1e-3,
            scale: crate::DEFAULT_SCALE_FACTOR,
            channels: 64,
            input_channels: 3,
            large_kernel: 9,
            small_kernel: 3,
            n_blocks: 16,
            max_epochs: 200,
            patience: Some(10),
            seed: 1407,
        }
    }
}

impl SuperResConfig {
    /// Apply search-service overrides to the tunable fields.
    pub fn apply_overrides(&mut self, overrides: &ParamOverrides) {
        override_f64(overrides, "learning_rate", &mut self.learning_rate);
        override_usize(overrides, "batch_size", &mut self.batch_size);
        override_usize(overrides, "max_epochs", &mut self.max_epochs);
        override_usize(overrides, "channels", &mut self.channels);
        override_usize(overrides, "n_blocks", &mut self.n_blocks);
        override_usize(overrides, "large_kernel", &mut self.large_kernel);
        override_usize(overrides, "small_kernel", &mut self.small_kernel);
        warn_unused(
            overrides,
            &[
                "learning_rate",
                "batch_size",
                "max_epochs",
                "channels",
                "n_blocks",
                "large_kernel",
                "small_kernel",
            ],
        );
    }
}

/// Result of a super-resolution training run
#[derive(Debug)]
pub struct SuperResOutcome {
    /// Best validation loss, if any epoch improved
    pub best_score: Option<f64>,
    /// Epochs actually run
    pub epochs_run: usize,
    /// Path of the persisted snapshot, if one was written
    pub snapshot_path: Option<PathBuf>,
    /// Path of the written predictions, if any
    pub predictions_path: Option<PathBuf>,
}

/// Run super-resolution training with the given configuration.
pub fn run_sr_training<B: AutodiffBackend>(
    config: &SuperResConfig,
    search: Option<&dyn SearchIntegration>,
) -> Result<SuperResOutcome> {
    let mut config = config.clone();
    if let Some(search) = search {
        if let Some(overrides) = search.overrides()? {
            config.apply_overrides(&overrides);
        }
    }

    println!("{}", "Initializing Super-Resolution Training...".green().bold());

    let device = B::Device::default();
    B::seed(&device, config.seed);
    std::fs::create_dir_all(&config.save_model_path)?;

    // Load image pairs
    println!("{}", "Loading Image Pairs...".cyan());
    let train_set = SrPairDataset::load(&config.data_dir.join("train.h5"))?;
    let valid_set = SrPairDataset::load(&config.data_dir.join("valid.h5"))?;

    if train_set.scale != config.scale {
        anyhow::bail!(
            "configured scale {} does not match the data scale {}",
            config.scale,
            train_set.scale
        );
    }
    if train_set.channels != config.input_channels {
        anyhow::bail!(
            "configured input channels {} do not match the data channels {}",
            config.input_channels,
            train_set.channels
        );
    }
    if train_set.len() < config.batch_size {
        anyhow::bail!(
            "not enough training pairs ({}) for batch size {}",
            train_set.len(),
            config.batch_size
        );
    }

    println!();
    println!("{}", "Dataset:".cyan().bold());
    println!("  Training pairs:   {}", train_set.len());
    println!("  Validation pairs: {}", valid_set.len());
    println!(
        "  Input {}x{}x{}, scale {}",
        train_set.lowres_size.0, train_set.lowres_size.1, train_set.channels, train_set.scale
    );

    // Model and optimizer
    let model_config = SrResNetConfig::new()
        .with_input_channels(config.input_channels)
        .with_channels(config.channels)
        .with_n_blocks(config.n_blocks)
        .with_large_kernel(config.large_kernel)
        .with_small_kernel(config.small_kernel)
        .with_scale(config.scale);
    let mut model = model_config.init::<B>(&device)?;
    let mut optimizer = AdamConfig::new().init::<B, SrResNet<B>>();

    let batcher = SrBatcher::new(train_set.channels, train_set.lowres_size, train_set.scale);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut state = TrainingState::new(ScoreDirection::Minimize, config.patience);
    let mut best_model: Option<SrResNet<B>> = None;
    let mut best_predictions: Option<Vec<f32>> = None;

    println!();
    println!("{}", "Starting Training...".green().bold());

    for epoch in 0..config.max_epochs {
        println!(
            "{}",
            format!("Epoch {}/{}", epoch + 1, config.max_epochs)
                .yellow()
                .bold()
        );

        // Training sweep
        let mut epoch_loss = RunningAverage::new();
        let mut indices: Vec<usize> = (0..train_set.len()).collect();
        indices.shuffle(&mut epoch_rng);

        // Trailing partial batch is dropped, matching the loader contract
        let num_batches = indices.len() / config.batch_size;
        for batch_idx in 0..num_batches {
            let start = batch_idx * config.batch_size;
            let items: Vec<SrPair> = indices[start..start + config.batch_size]
                .iter()
                .filter_map(|&i| train_set.get(i).cloned())
                .collect();
            let batch: SrBatch<B> = batcher.batch(items, &device);

            let prediction = model.forward(batch.lowres);
            let loss = MseLoss::new().forward(prediction, batch.highres, Reduction::Mean);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss.add(loss_value);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        // Validation sweep
        let (val_loss, val_predictions) =
            evaluate::<B>(&model, &valid_set, &batcher, config.batch_size);

        let train_loss = epoch_loss.average();
        println!(
            "  {} train loss: {:.6} | val loss: {:.6}",
            "→".cyan(),
            train_loss,
            val_loss
        );

        if let Some(search) = search {
            search.report_intermediate(epoch, val_loss)?;
        }

        match state.record_epoch(train_loss, val_loss) {
            EpochOutcome::Improved => {
                best_model = Some(model.clone());
                best_predictions = Some(val_predictions);
                println!("  {}", "(best)".green());
            }
            EpochOutcome::Stagnant => {}
            EpochOutcome::Stopped => {
                println!(
                    "{}",
                    format!(
                        "no improvement for {} epochs, early stopping",
                        state.stopping.stagnant_epochs()
                    )
                    .yellow()
                );
                break;
            }
        }
    }

    // Persist the best snapshot exactly once, then its predictions
    let (snapshot_path, predictions_path) = match (&best_model, &best_predictions) {
        (Some(best), Some(predictions)) => {
            let path = config.save_model_path.join("best_model");
            let recorder = CompactRecorder::new();
            best.clone()
                .save_file(&path, &recorder)
                .map_err(|e| anyhow::anyhow!("failed to save model: {:?}", e))?;
            info!("saved best model to {}", path.display());

            let (hh, hw) = valid_set.highres_size();
            let n = valid_set.len();
            let array = Array4::from_shape_vec((n, 1, hh, hw), predictions.clone())
                .map_err(|e| anyhow::anyhow!("prediction shape mismatch: {}", e))?;
            write_predictions(&config.output_path, &array)?;

            (Some(path), Some(config.output_path.clone()))
        }
        _ => {
            warn!("no epoch improved the validation loss; nothing persisted");
            (None, None)
        }
    };

    if let Some(search) = search {
        if let Some(best) = state.best_score() {
            search.report_final(best)?;
        }
    }

    println!();
    println!("{}", "Training Complete!".green().bold());
    match state.best_score() {
        Some(best) => println!("  Best validation loss: {:.6}", best),
        None => println!("  No epoch improved the validation loss"),
    }

    Ok(SuperResOutcome {
        best_score: state.best_score(),
        epochs_run: state.epoch,
        snapshot_path,
        predictions_path,
    })
}

/// Mean validation loss over all pairs, plus the flattened predictions in
/// dataset order (the trailing partial batch is kept here).
fn evaluate<B: AutodiffBackend>(
    model: &SrResNet<B>,
    dataset: &SrPairDataset,
    batcher: &SrBatcher,
    batch_size: usize,
) -> (f64, Vec<f32>) {
    let device = <B::InnerBackend as Backend>::Device::default();
    let inner_model = model.valid();

    let mut losses = RunningAverage::new();
    let mut predictions = Vec::new();

    let mut start = 0;
    while start < dataset.len() {
        let end = (start + batch_size).min(dataset.len());
        let items: Vec<SrPair> = (start..end)
            .filter_map(|i| dataset.get(i).cloned())
            .collect();
        let batch: SrBatch<B::InnerBackend> = batcher.batch(items, &device);

        let prediction = inner_model.forward(batch.lowres);
        let loss = MseLoss::new().forward(prediction.clone(), batch.highres, Reduction::Mean);
        let loss_value: f64 = loss.into_scalar().elem();
        losses.add(loss_value);

        let values: Vec<f32> = prediction.into_data().to_vec().unwrap();
        predictions.extend(values);

        start = end;
    }

    (losses.average(), predictions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_match_driver() {
        let config = SuperResConfig::default();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.channels, 64);
        assert_eq!(config.n_blocks, 16);
        assert_eq!(config.large_kernel, 9);
        assert_eq!(config.small_kernel, 3);
        assert_eq!(config.scale, 4);
    }

    #[test]
    fn test_config_overrides() {
        let mut config = SuperResConfig::default();
        let overrides: ParamOverrides =
            serde_json::from_str(r#"{"channels": 16.0, "learning_rate": 0.0001}"#).unwrap();

        config.apply_overrides(&overrides);
        assert_eq!(config.channels, 16);
        assert_eq!(config.learning_rate, 0.0001);
    }
}
