//! Dataset module for satellite imagery data handling
//!
//! This module provides functionality for:
//! - Loading pre-processed EO patches from disk (directories of NumPy layers)
//! - Sampling small patchlets out of large patches for training
//! - Loading paired low/high-resolution images from HDF5 for super-resolution
//! - Batching samples into Burn tensors
//!
//! ## EO patch layout
//!
//! An EO patch is a directory produced by the preprocessing pipeline:
//!
//! ```text
//! eopatch_0/
//! ├── data/NDVI.npy               [time, h, w, 1]   f32
//! ├── mask_timeless/CULTIVATED.npy [h·scale, w·scale, 1]
//! └── data_timeless/WEIGHTS.npy    [h·scale, w·scale, 1]
//! ```
//!
//! Only the first time frame of the NDVI stack is consumed. The cultivated
//! mask and the pixel weights live at `scale` times the Sentinel-2 resolution.

pub mod batcher;
pub mod eopatch;
pub mod sampling;
pub mod sr_pairs;

// Re-export main types for convenience
pub use batcher::{PatchletBatch, PatchletBatcher, SrBatch, SrBatcher};
pub use eopatch::{EoPatch, EoPatchDataset, EoPatchStats};
pub use sampling::{Patchlet, PatchletSampler, SamplingMode};
pub use sr_pairs::{SrPair, SrPairDataset};

/// NDVI input layer, stored under `data/`
pub const NDVI_LAYER: &str = "NDVI";

/// Cultivated-land target mask, stored under `mask_timeless/`
pub const CULTIVATED_LAYER: &str = "CULTIVATED";

/// Per-pixel weight layer, stored under `data_timeless/`
pub const WEIGHTS_LAYER: &str = "WEIGHTS";

/// HDF5 dataset key for low-resolution inputs
pub const SR_INPUT_KEY: &str = "X";

/// HDF5 dataset key for high-resolution targets
pub const SR_TARGET_KEY: &str = "y";

/// HDF5 dataset key for written predictions
pub const SR_PREDICTION_KEY: &str = "y_pred";
