//! Early Stopping
//!
//! Epoch-level training control: a validation score is observed once per
//! epoch and either strictly improves on the best-known score (resetting the
//! stagnation counter) or increments it; reaching the configured patience is
//! terminal. Scores that are not finite never count as an improvement, so a
//! run whose metric always fails ends with no best epoch at all.

use serde::{Deserialize, Serialize};

/// Whether a larger or smaller validation score is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreDirection {
    /// Higher scores win (e.g. correlation coefficients)
    Maximize,
    /// Lower scores win (e.g. validation loss)
    Minimize,
}

/// Outcome of observing one epoch's validation score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochOutcome {
    /// Strict improvement over the best-known score
    Improved,
    /// No improvement, patience not yet exhausted
    Stagnant,
    /// Patience exhausted; no further epochs should run
    Stopped,
}

/// Early-stopping tracker, updated once per epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStopping {
    direction: ScoreDirection,
    /// `None` disables stagnation-based stopping
    patience: Option<usize>,
    best_score: Option<f64>,
    best_epoch: Option<usize>,
    stagnant_epochs: usize,
    epochs_seen: usize,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(direction: ScoreDirection, patience: Option<usize>) -> Self {
        Self {
            direction,
            patience,
            best_score: None,
            best_epoch: None,
            stagnant_epochs: 0,
            epochs_seen: 0,
            stopped: false,
        }
    }

    /// Observe one epoch's validation score and return the transition taken.
    ///
    /// Once `Stopped` has been returned the tracker stays stopped.
    pub fn observe(&mut self, score: f64) -> EpochOutcome {
        if self.stopped {
            return EpochOutcome::Stopped;
        }

        let epoch = self.epochs_seen;
        self.epochs_seen += 1;

        let improved = score.is_finite()
            && match self.best_score {
                None => true,
                Some(best) => match self.direction {
                    ScoreDirection::Maximize => score > best,
                    ScoreDirection::Minimize => score < best,
                },
            };

        if improved {
            self.best_score = Some(score);
            self.best_epoch = Some(epoch);
            self.stagnant_epochs = 0;
            EpochOutcome::Improved
        } else {
            self.stagnant_epochs += 1;
            if let Some(patience) = self.patience {
                if self.stagnant_epochs >= patience {
                    self.stopped = true;
                    return EpochOutcome::Stopped;
                }
            }
            EpochOutcome::Stagnant
        }
    }

    /// Best score observed so far, if any epoch improved
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Zero-based epoch index of the best score
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Consecutive non-improving epochs since the last improvement
    pub fn stagnant_epochs(&self) -> usize {
        self.stagnant_epochs
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Per-run training state: epoch bookkeeping plus the stopping tracker.
///
/// Constructed at training start, updated once per epoch, and read out when
/// the loop finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    /// Epochs completed so far
    pub epoch: usize,
    /// Training loss history (one entry per epoch)
    pub train_losses: Vec<f64>,
    /// Validation score history (one entry per epoch)
    pub val_scores: Vec<f64>,
    /// Stopping tracker
    pub stopping: EarlyStopping,
}

impl TrainingState {
    pub fn new(direction: ScoreDirection, patience: Option<usize>) -> Self {
        Self {
            epoch: 0,
            train_losses: Vec::new(),
            val_scores: Vec::new(),
            stopping: EarlyStopping::new(direction, patience),
        }
    }

    /// Record one epoch's results and return the stopping transition.
    pub fn record_epoch(&mut self, train_loss: f64, val_score: f64) -> EpochOutcome {
        self.epoch += 1;
        self.train_losses.push(train_loss);
        self.val_scores.push(val_score);
        self.stopping.observe(val_score)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.stopping.best_score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_score_sequence_with_patience_two() {
        // Best 0.6 is recorded at the third epoch; the two following
        // non-improving epochs exhaust patience after the fifth.
        let mut stopping = EarlyStopping::new(ScoreDirection::Maximize, Some(2));

        assert_eq!(stopping.observe(0.5), EpochOutcome::Improved);
        assert_eq!(stopping.observe(0.4), EpochOutcome::Stagnant);
        assert_eq!(stopping.observe(0.6), EpochOutcome::Improved);
        assert_eq!(stopping.observe(0.6), EpochOutcome::Stagnant);
        assert_eq!(stopping.observe(0.6), EpochOutcome::Stopped);

        assert_eq!(stopping.best_score(), Some(0.6));
        assert_eq!(stopping.best_epoch(), Some(2));
        assert!(stopping.is_stopped());
    }

    #[test]
    fn test_minimize_direction() {
        let mut stopping = EarlyStopping::new(ScoreDirection::Minimize, Some(3));

        assert_eq!(stopping.observe(1.0), EpochOutcome::Improved);
        assert_eq!(stopping.observe(0.5), EpochOutcome::Improved);
        assert_eq!(stopping.observe(0.5), EpochOutcome::Stagnant);
        assert_eq!(stopping.observe(0.7), EpochOutcome::Stagnant);
        assert_eq!(stopping.observe(0.4), EpochOutcome::Improved);
        assert_eq!(stopping.best_score(), Some(0.4));
    }

    #[test]
    fn test_nan_scores_never_improve() {
        let mut stopping = EarlyStopping::new(ScoreDirection::Maximize, Some(2));

        assert_eq!(stopping.observe(f64::NAN), EpochOutcome::Stagnant);
        assert_eq!(stopping.observe(f64::NAN), EpochOutcome::Stopped);
        assert_eq!(stopping.best_score(), None);
        assert_eq!(stopping.best_epoch(), None);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut stopping = EarlyStopping::new(ScoreDirection::Maximize, Some(1));

        assert_eq!(stopping.observe(0.5), EpochOutcome::Improved);
        assert_eq!(stopping.observe(0.5), EpochOutcome::Stopped);
        // Even a better score cannot revive a stopped run
        assert_eq!(stopping.observe(0.9), EpochOutcome::Stopped);
        assert_eq!(stopping.best_score(), Some(0.5));
    }

    #[test]
    fn test_no_patience_never_stops() {
        let mut stopping = EarlyStopping::new(ScoreDirection::Maximize, None);

        for _ in 0..100 {
            assert_ne!(stopping.observe(0.1), EpochOutcome::Stopped);
        }
        assert!(!stopping.is_stopped());
    }

    #[test]
    fn test_training_state_records_histories() {
        let mut state = TrainingState::new(ScoreDirection::Maximize, Some(5));

        state.record_epoch(0.9, 0.5);
        state.record_epoch(0.7, 0.6);

        assert_eq!(state.epoch, 2);
        assert_eq!(state.train_losses, vec![0.9, 0.7]);
        assert_eq!(state.val_scores, vec![0.5, 0.6]);
        assert_eq!(state.best_score(), Some(0.6));
    }
}
