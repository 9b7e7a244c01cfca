//! Cultivated-Land Classification Training
//!
//! Epoch loop for the classification pipeline: per-pixel weighted binary
//! cross-entropy for the gradient step, per-pixel weighted Matthews
//! correlation as the validation score, early stopping on stagnation, and
//! exactly-once persistence of the best snapshot.

use std::path::PathBuf;

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Tensor},
};
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::dataset::batcher::{PatchletBatch, PatchletBatcher};
use crate::dataset::eopatch::EoPatchDataset;
use crate::dataset::sampling::{Patchlet, PatchletSampler, SamplingMode};
use crate::model::classifier::{CultivatedClassifier, CultivatedClassifierConfig};
use crate::training::early_stopping::{EpochOutcome, ScoreDirection, TrainingState};
use crate::tuning::{override_f64, override_usize, warn_unused, ParamOverrides, SearchIntegration};
use crate::utils::metrics::{weighted_matthews, RunningAverage};
use crate::CULTIVATED_THRESHOLD;

/// Configuration for a classification training run
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Directory of processed EO patches
    pub data_dir: PathBuf,
    /// Directory for the persisted snapshot
    pub target_dir: PathBuf,
    /// Number of patches held out for validation
    pub n_valid_patches: usize,
    /// Side length of sampled patchlets at Sentinel-2 resolution
    pub patchlet_size: usize,
    /// Patchlets sampled per patch
    pub patchlets_per_patch: usize,
    /// Randomly positioned (possibly overlapping) patchlets instead of a
    /// systematic grid
    pub random_patchlets: bool,
    /// Batch size
    pub batch_size: usize,
    /// Learning rate
    pub learning_rate: f64,
    /// Epoch budget
    pub max_epochs: usize,
    /// Early-stopping patience; `None` disables stagnation-based stopping
    pub patience: Option<usize>,
    /// Factor between NDVI and mask resolution
    pub scale: usize,
    /// Internal channel width of the classifier
    pub channels: usize,
    /// Number of residual blocks
    pub n_blocks: usize,
    /// Kernel size
    pub kernel_size: usize,
    /// Random seed for splits, sampling and initialization
    pub seed: u64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/eopatches"),
            target_dir: PathBuf::from("output/classify"),
            n_valid_patches: 10,
            patchlet_size: 32,
            patchlets_per_patch: 10,
            random_patchlets: false,
            batch_size: 64,
            learning_rate: 1e-3,
            max_epochs: 100,
            patience: Some(6),
            scale: crate::DEFAULT_SCALE_FACTOR,
            channels: 32,
            n_blocks: 4,
            kernel_size: 3,
            seed: 2021,
        }
    }
}

impl ClassifyConfig {
    /// Apply search-service overrides to the tunable fields.
    pub fn apply_overrides(&mut self, overrides: &ParamOverrides) {
        override_f64(overrides, "learning_rate", &mut self.learning_rate);
        override_usize(overrides, "batch_size", &mut self.batch_size);
        override_usize(overrides, "max_epochs", &mut self.max_epochs);
        override_usize(overrides, "channels", &mut self.channels);
        override_usize(overrides, "n_blocks", &mut self.n_blocks);
        override_usize(overrides, "patchlets_per_patch", &mut self.patchlets_per_patch);
        warn_unused(
            overrides,
            &[
                "learning_rate",
                "batch_size",
                "max_epochs",
                "channels",
                "n_blocks",
                "patchlets_per_patch",
            ],
        );
    }
}

/// Result of a classification training run
#[derive(Debug)]
pub struct ClassifyOutcome {
    /// Best validation score, if any epoch improved
    pub best_score: Option<f64>,
    /// Epochs actually run
    pub epochs_run: usize,
    /// Path of the persisted snapshot, if one was written
    pub snapshot_path: Option<PathBuf>,
    /// Validation predictions of the best epoch, flattened
    pub best_predictions: Option<Vec<f32>>,
}

/// Run classification training with the given configuration.
pub fn run_classification_training<B: AutodiffBackend>(
    config: &ClassifyConfig,
    search: Option<&dyn SearchIntegration>,
) -> Result<ClassifyOutcome> {
    let mut config = config.clone();
    if let Some(search) = search {
        if let Some(overrides) = search.overrides()? {
            config.apply_overrides(&overrides);
        }
    }

    println!("{}", "Initializing Classification Training...".green().bold());

    let device = B::Device::default();
    B::seed(&device, config.seed);
    std::fs::create_dir_all(&config.target_dir)?;

    // Load patches and sample patchlets
    println!("{}", "Loading EO Patches...".cyan());
    let dataset = EoPatchDataset::load(
        &config.data_dir,
        config.n_valid_patches,
        config.scale,
        config.seed,
    )?;
    dataset.stats().print();

    let mode = if config.random_patchlets {
        SamplingMode::Random
    } else {
        SamplingMode::Systematic
    };
    let sampler = PatchletSampler::new(
        config.patchlet_size,
        config.patchlets_per_patch,
        mode,
        config.scale,
    );

    let mut sample_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let train_items = sampler.sample_all(&dataset.train, &mut sample_rng)?;
    let valid_items = sampler.sample_all(&dataset.valid, &mut sample_rng)?;

    if train_items.len() < config.batch_size {
        anyhow::bail!(
            "not enough training patchlets ({}) for batch size {}",
            train_items.len(),
            config.batch_size
        );
    }

    println!();
    println!("{}", "Dataset:".cyan().bold());
    println!("  Training patchlets:   {}", train_items.len());
    println!("  Validation patchlets: {}", valid_items.len());

    // Model and optimizer
    let model_config = CultivatedClassifierConfig::new()
        .with_channels(config.channels)
        .with_n_blocks(config.n_blocks)
        .with_kernel_size(config.kernel_size)
        .with_scale(config.scale);
    let mut model = model_config.init::<B>(&device)?;
    let mut optimizer = AdamConfig::new().init::<B, CultivatedClassifier<B>>();

    let batcher = PatchletBatcher::new();
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut state = TrainingState::new(ScoreDirection::Maximize, config.patience);
    let mut best_model: Option<CultivatedClassifier<B>> = None;
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
        let mut indices: Vec<usize> = (0..train_items.len()).collect();
        indices.shuffle(&mut epoch_rng);

        // Trailing partial batch is dropped, matching the loader contract
        let num_batches = indices.len() / config.batch_size;
        for batch_idx in 0..num_batches {
            let start = batch_idx * config.batch_size;
            let items: Vec<Patchlet> = indices[start..start + config.batch_size]
                .iter()
                .map(|&i| train_items[i].clone())
                .collect();
            let batch: PatchletBatch<B> = batcher.batch(items, &device);

            let probs = model.forward(batch.inputs);
            let loss = weighted_bce(probs, batch.targets, batch.weights);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss.add(loss_value);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        // Validation sweep
        let (val_score, val_predictions) =
            evaluate::<B>(&model, &valid_items, &batcher, config.batch_size);

        let train_loss = epoch_loss.average();
        println!(
            "  {} loss: {:.4} | val MCC: {:.4}",
            "→".cyan(),
            train_loss,
            val_score
        );

        if let Some(search) = search {
            search.report_intermediate(epoch, val_score)?;
        }

        match state.record_epoch(train_loss, val_score) {
            EpochOutcome::Improved => {
                // The optimizer step replaced the parameter tensors, so the
                // clone retains this epoch's weights untouched
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

    // Persist the best snapshot exactly once
    let snapshot_path = match &best_model {
        Some(best) => {
            let path = config.target_dir.join("best_model");
            let recorder = CompactRecorder::new();
            best.clone()
                .save_file(&path, &recorder)
                .map_err(|e| anyhow::anyhow!("failed to save model: {:?}", e))?;
            info!("saved best model to {}", path.display());
            Some(path)
        }
        None => {
            warn!("no epoch improved the validation score; nothing persisted");
            None
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
        Some(best) => println!("  Best validation MCC: {:.4}", best),
        None => println!("  No epoch improved the validation score"),
    }

    Ok(ClassifyOutcome {
        best_score: state.best_score(),
        epochs_run: state.epoch,
        snapshot_path,
        best_predictions,
    })
}

/// Per-pixel weighted binary cross-entropy over probability maps.
///
/// The weighted per-pixel losses are summed and normalized by the total
/// weight, so zero-weight pixels contribute nothing.
pub fn weighted_bce<B: Backend>(
    probs: Tensor<B, 4>,
    targets: Tensor<B, 4>,
    weights: Tensor<B, 4>,
) -> Tensor<B, 1> {
    let device = probs.device();
    let probs = probs.clamp(1e-7, 1.0 - 1e-7);

    let pos = targets.clone() * probs.clone().log();
    let neg = (targets.neg().add_scalar(1.0)) * (probs.neg().add_scalar(1.0)).log();
    let nll = (pos + neg).neg();

    let weighted = (nll * weights.clone()).sum();
    let total_weight = weights.sum() + Tensor::<B, 1>::from_floats([1e-8], &device);
    weighted / total_weight
}

/// Score the model on validation patchlets with the weighted Matthews
/// correlation, averaged over batches (degenerate batches score zero).
///
/// Returns the epoch score and the flattened validation predictions.
fn evaluate<B: AutodiffBackend>(
    model: &CultivatedClassifier<B>,
    items: &[Patchlet],
    batcher: &PatchletBatcher,
    batch_size: usize,
) -> (f64, Vec<f32>) {
    let device = <B::InnerBackend as Backend>::Device::default();
    let inner_model = model.valid();

    let mut scores = RunningAverage::new();
    let mut predictions = Vec::new();
    for chunk in items.chunks(batch_size) {
        let batch: PatchletBatch<B::InnerBackend> = batcher.batch(chunk.to_vec(), &device);

        let probs = inner_model.forward(batch.inputs);

        let preds: Vec<f32> = probs.into_data().to_vec().unwrap();
        let targets: Vec<f32> = batch.targets.into_data().to_vec().unwrap();
        let weights: Vec<f32> = batch.weights.into_data().to_vec().unwrap();

        scores.add(weighted_matthews(
            &preds,
            &targets,
            &weights,
            CULTIVATED_THRESHOLD,
        ));
        predictions.extend(preds);
    }
    (scores.average(), predictions)
}
