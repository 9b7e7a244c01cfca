//! AI4EO CNN Training CLI
//!
//! Entry point for the two satellite-imagery training pipelines:
//! cultivated-land classification on EO patches and super-resolution on
//! paired HDF5 imagery.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use ai4eo_cnn::backend::{backend_name, TrainingBackend};
use ai4eo_cnn::dataset::eopatch::{EoPatch, EoPatchDataset};
use ai4eo_cnn::training::classify::{run_classification_training, ClassifyConfig};
use ai4eo_cnn::training::super_res::{run_sr_training, SuperResConfig};
use ai4eo_cnn::tuning::FileSearchIntegration;
use ai4eo_cnn::utils::logging::{init_logging, LogConfig};

/// CNN training pipelines for satellite imagery
///
/// Trains a cultivated-land classifier on pre-processed EO patches or a
/// super-resolution network on paired low/high-resolution imagery, both with
/// early stopping and best-snapshot persistence.
#[derive(Parser, Debug)]
#[command(name = "ai4eo_cnn")]
#[command(version)]
#[command(about = "Satellite imagery CNN training with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the cultivated-land classifier on EO patches
    Classify {
        /// Directory of processed EO patches
        #[arg(short, long, default_value = "data/eopatches")]
        data_dir: PathBuf,

        /// Output directory for the best model snapshot
        #[arg(short, long, default_value = "output/classify")]
        target_dir: PathBuf,

        /// Number of patches held out for validation
        #[arg(long, default_value = "10")]
        n_valid_patches: usize,

        /// Side length of sampled patchlets (Sentinel-2 resolution)
        #[arg(long, default_value = "32")]
        patchlet_size: usize,

        /// Patchlets sampled per patch
        #[arg(long, default_value = "10")]
        patchlets_per_patch: usize,

        /// Randomly positioned (possibly overlapping) patchlets instead of a
        /// systematic grid
        #[arg(long, default_value = "false")]
        random_patchlets: bool,

        /// Batch size
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Epoch budget
        #[arg(short, long, default_value = "100")]
        max_epochs: usize,

        /// Early-stopping patience (consecutive non-improving epochs)
        #[arg(long, default_value = "6")]
        patience: usize,

        /// Disable early stopping (run the full epoch budget)
        #[arg(long, default_value = "false")]
        no_early_stop: bool,

        /// Factor between NDVI and mask resolution (2, 4 or 8)
        #[arg(long, default_value = "4")]
        scale: usize,

        /// Internal channel width
        #[arg(long, default_value = "32")]
        channels: usize,

        /// Number of residual blocks
        #[arg(long, default_value = "4")]
        blocks: usize,

        /// Kernel size
        #[arg(long, default_value = "3")]
        kernel_size: usize,

        /// Random seed
        #[arg(long, default_value = "2021")]
        seed: u64,

        /// Trial directory of an external hyperparameter search
        #[arg(long)]
        tuning_dir: Option<PathBuf>,
    },

    /// Train the super-resolution network on paired HDF5 imagery
    SuperRes {
        /// Directory holding train.h5 and valid.h5
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Output path for predicted high-resolution images
        #[arg(short, long, default_value = "data/best_hr_predictions.h5")]
        output_path: PathBuf,

        /// Directory for the best model snapshot
        #[arg(short, long, default_value = "saved_models")]
        save_model_path: PathBuf,

        /// Batch size
        #[arg(short, long, default_value = "16")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Total upscaling factor (2, 4 or 8)
        #[arg(long, default_value = "4")]
        scale: usize,

        /// Internal channel width of the residual trunk
        #[arg(long, default_value = "64")]
        channels: usize,

        /// Number of input channels
        #[arg(long, default_value = "3")]
        input_channels: usize,

        /// Kernel size of the entry and exit convolutions
        #[arg(long, default_value = "9")]
        large_kernel: usize,

        /// Kernel size inside residual and upscaling blocks
        #[arg(long, default_value = "3")]
        small_kernel: usize,

        /// Number of residual blocks
        #[arg(long, default_value = "16")]
        blocks: usize,

        /// Epoch budget
        #[arg(short, long, default_value = "200")]
        epochs: usize,

        /// Early-stopping patience (consecutive non-improving epochs)
        #[arg(long, default_value = "10")]
        patience: usize,

        /// Disable early stopping (run the full epoch budget)
        #[arg(long, default_value = "false")]
        no_early_stop: bool,

        /// Random seed
        #[arg(long, default_value = "1407")]
        seed: u64,

        /// Trial directory of an external hyperparameter search
        #[arg(long)]
        tuning_dir: Option<PathBuf>,
    },

    /// Show statistics for a directory of EO patches
    Stats {
        /// Directory of processed EO patches
        #[arg(short, long, default_value = "data/eopatches")]
        data_dir: PathBuf,

        /// Expected factor between NDVI and mask resolution
        #[arg(long, default_value = "4")]
        scale: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();
    info!("backend: {}", backend_name());

    match cli.command {
        Commands::Classify {
            data_dir,
            target_dir,
            n_valid_patches,
            patchlet_size,
            patchlets_per_patch,
            random_patchlets,
            batch_size,
            learning_rate,
            max_epochs,
            patience,
            no_early_stop,
            scale,
            channels,
            blocks,
            kernel_size,
            seed,
            tuning_dir,
        } => {
            let config = ClassifyConfig {
                data_dir,
                target_dir,
                n_valid_patches,
                patchlet_size,
                patchlets_per_patch,
                random_patchlets,
                batch_size,
                learning_rate,
                max_epochs,
                patience: if no_early_stop { None } else { Some(patience) },
                scale,
                channels,
                n_blocks: blocks,
                kernel_size,
                seed,
            };

            let tuning = tuning_dir.map(|dir| FileSearchIntegration::from_trial_dir(&dir));
            let search = tuning
                .as_ref()
                .map(|t| t as &dyn ai4eo_cnn::tuning::SearchIntegration);

            run_classification_training::<TrainingBackend>(&config, search)?;
        }

        Commands::SuperRes {
            data_dir,
            output_path,
            save_model_path,
            batch_size,
            learning_rate,
            scale,
            channels,
            input_channels,
            large_kernel,
            small_kernel,
            blocks,
            epochs,
            patience,
            no_early_stop,
            seed,
            tuning_dir,
        } => {
            let config = SuperResConfig {
                data_dir,
                output_path,
                save_model_path,
                batch_size,
                learning_rate,
                scale,
                channels,
                input_channels,
                large_kernel,
                small_kernel,
                n_blocks: blocks,
                max_epochs: epochs,
                patience: if no_early_stop { None } else { Some(patience) },
                seed,
            };

            let tuning = tuning_dir.map(|dir| FileSearchIntegration::from_trial_dir(&dir));
            let search = tuning
                .as_ref()
                .map(|t| t as &dyn ai4eo_cnn::tuning::SearchIntegration);

            run_sr_training::<TrainingBackend>(&config, search)?;
        }

        Commands::Stats { data_dir, scale } => {
            cmd_stats(&data_dir, scale)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════╗
 ║   AI4EO CNN Pipelines                                ║
 ║   Satellite Imagery Training with Burn + Rust        ║
 ╚══════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn cmd_stats(data_dir: &std::path::Path, scale: usize) -> Result<()> {
    let patch_dirs = EoPatchDataset::discover(data_dir);

    if patch_dirs.is_empty() {
        println!(
            "{} no EO patches found under {}",
            "Error:".red(),
            data_dir.display()
        );
        println!();
        println!("Expected structure:");
        println!("  {}/", data_dir.display());
        println!("  ├── eopatch_0/");
        println!("  │   ├── data/NDVI.npy");
        println!("  │   ├── mask_timeless/CULTIVATED.npy");
        println!("  │   └── data_timeless/WEIGHTS.npy");
        println!("  └── ...");
        return Ok(());
    }

    println!("{}", "Patch Statistics:".cyan().bold());
    println!("  Patches found: {}", patch_dirs.len());

    // Layer geometry from the first patch
    let first = EoPatch::load(&patch_dirs[0], scale)?;
    let (h, w) = first.s2_size();
    let (time_frames, _, _, _) = first.ndvi.dim();
    println!("  NDVI:        {} frames of {}x{}", time_frames, h, w);
    println!(
        "  Targets:     {}x{} (scale {})",
        h * scale,
        w * scale,
        scale
    );

    Ok(())
}
