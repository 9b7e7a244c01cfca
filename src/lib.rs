//! # AI4EO CNN Pipelines
//!
//! Training pipelines for convolutional neural networks on satellite imagery,
//! built with the Burn framework.
//!
//! Two independent experiment drivers are provided:
//!
//! - **Cultivated-land classification**: consumes pre-processed EO patches
//!   (directories of NumPy layers) and trains a CNN mapping low-resolution
//!   NDVI patchlets to higher-resolution cultivated/non-cultivated probability
//!   maps, scored with a per-pixel weighted Matthews correlation coefficient.
//! - **Super-resolution**: consumes paired low/high-resolution images from an
//!   HDF5 file and trains an SRResNet with sub-pixel upscaling, writing the
//!   best model's predictions back out as HDF5.
//!
//! ## Modules
//!
//! - `dataset`: EO patch loading, patchlet sampling, SR pair loading, batching
//! - `model`: network blocks and the two architectures
//! - `training`: epoch loops with early stopping and best-snapshot retention
//! - `tuning`: optional hyperparameter-search integration
//! - `output`: HDF5 prediction writer
//! - `utils`: errors, logging, metrics
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use ai4eo_cnn::backend::TrainingBackend;
//! use ai4eo_cnn::training::classify::{run_classification_training, ClassifyConfig};
//!
//! let config = ClassifyConfig::default();
//! run_classification_training::<TrainingBackend>(&config, None)?;
//! ```

pub mod backend;
pub mod dataset;
pub mod model;
pub mod output;
pub mod training;
pub mod tuning;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::batcher::{PatchletBatch, PatchletBatcher, SrBatch, SrBatcher};
pub use dataset::eopatch::{EoPatch, EoPatchDataset};
pub use dataset::sampling::{Patchlet, PatchletSampler, SamplingMode};
pub use dataset::sr_pairs::SrPairDataset;
pub use model::classifier::{CultivatedClassifier, CultivatedClassifierConfig};
pub use model::srresnet::{SrResNet, SrResNetConfig};
pub use training::early_stopping::{EarlyStopping, EpochOutcome, ScoreDirection};
pub use utils::error::{Ai4EoError, Result};
pub use utils::metrics::weighted_matthews;

/// Upscaling factors supported by the sub-pixel chain (each step doubles both
/// spatial dimensions, so the factor must be a power of two).
pub const SUPPORTED_SCALE_FACTORS: [usize; 3] = [2, 4, 8];

/// Default upscaling factor for both pipelines
pub const DEFAULT_SCALE_FACTOR: usize = 4;

/// Default binarization threshold for cultivated-map predictions
pub const CULTIVATED_THRESHOLD: f32 = 0.5;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
