//! Training-control layer
//!
//! Epoch loops for both pipelines plus the shared early-stopping state
//! machine. Each loop alternates a full training sweep with a validation
//! sweep, tracks the best validation score, retains a deep copy of the best
//! model and its validation predictions, and persists the best snapshot
//! exactly once when training ends (whether by stagnation or by exhausting
//! the epoch budget).

pub mod classify;
pub mod early_stopping;
pub mod super_res;

pub use classify::{run_classification_training, ClassifyConfig, ClassifyOutcome};
pub use early_stopping::{EarlyStopping, EpochOutcome, ScoreDirection, TrainingState};
pub use super_res::{run_sr_training, SuperResConfig, SuperResOutcome};
