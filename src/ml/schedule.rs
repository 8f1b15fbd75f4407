// ============================================================
// Layer 5 - Learning Rate Schedule & Early Stopping
// ============================================================
// Two small state machines drive the epoch loop.
//
// LrSchedule is a pure function of the epoch index:
//
//   WARMUP   e < ramp               linear start_lr → max_lr
//   SUSTAIN  ramp ≤ e < ramp+sus    max_lr
//   DECAY    otherwise              (max_lr - min_lr)·decay^k + min_lr
//                                   k = e - ramp - sus
//
// EarlyStopping watches the validation loss: an epoch either
// improves on every earlier epoch (checkpoint it) or adds one
// to the stale counter; `patience` stale epochs in a row stop
// the run.

use serde::{Deserialize, Serialize};

use crate::domain::error::{RecError, RecResult};

pub const DEFAULT_PATIENCE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePhase {
    Warmup,
    Sustain,
    Decay,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrSchedule {
    pub start_lr:       f64,
    pub max_lr:         f64,
    pub min_lr:         f64,
    pub ramp_epochs:    usize,
    pub sustain_epochs: usize,
    pub exp_decay:      f64,
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self {
            start_lr:       1e-5,
            max_lr:         1e-4,
            min_lr:         5e-5,
            ramp_epochs:    4,
            sustain_epochs: 0,
            exp_decay:      0.8,
        }
    }
}

impl LrSchedule {
    pub fn new(
        start_lr:       f64,
        max_lr:         f64,
        min_lr:         f64,
        ramp_epochs:    usize,
        sustain_epochs: usize,
        exp_decay:      f64,
    ) -> RecResult<Self> {
        let schedule = Self { start_lr, max_lr, min_lr, ramp_epochs, sustain_epochs, exp_decay };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> RecResult<()> {
        for (name, value) in [("start_lr", self.start_lr), ("max_lr", self.max_lr), ("min_lr", self.min_lr)] {
            if !value.is_finite() || value < 0.0 {
                return Err(RecError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.max_lr <= 0.0 {
            return Err(RecError::InvalidConfig("max_lr must be positive".into()));
        }
        if self.min_lr > self.max_lr {
            return Err(RecError::InvalidConfig(format!(
                "min_lr ({}) must not exceed max_lr ({})",
                self.min_lr, self.max_lr
            )));
        }
        if !(self.exp_decay > 0.0 && self.exp_decay < 1.0) {
            return Err(RecError::InvalidConfig(format!(
                "exp_decay must be in (0, 1), got {}",
                self.exp_decay
            )));
        }
        Ok(())
    }

    pub fn phase(&self, epoch: usize) -> SchedulePhase {
        if epoch < self.ramp_epochs {
            SchedulePhase::Warmup
        } else if epoch < self.ramp_epochs + self.sustain_epochs {
            SchedulePhase::Sustain
        } else {
            SchedulePhase::Decay
        }
    }

    /// Learning rate for a 0-based epoch index.
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        match self.phase(epoch) {
            // ramp_epochs > 0 here, otherwise no epoch is in warmup
            SchedulePhase::Warmup => {
                (self.max_lr - self.start_lr) / self.ramp_epochs as f64 * epoch as f64 + self.start_lr
            }
            SchedulePhase::Sustain => self.max_lr,
            SchedulePhase::Decay => {
                let k = (epoch - self.ramp_epochs - self.sustain_epochs) as i32;
                (self.max_lr - self.min_lr) * self.exp_decay.powi(k) + self.min_lr
            }
        }
    }
}

/// What the end-of-epoch check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochVerdict {
    /// Best validation loss so far: checkpoint this epoch
    Improved,
    /// No improvement, `stale` epochs in a row so far
    Stalled { stale: usize },
    /// No improvement for `patience` epochs: stop training
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience:   usize,
    best_loss:  f64,
    best_epoch: Option<usize>,
    stale:      usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, best_loss: f64::INFINITY, best_epoch: None, stale: 0 }
    }

    /// Feed one epoch's validation loss.
    pub fn observe(&mut self, epoch: usize, val_loss: f64) -> EpochVerdict {
        if val_loss < self.best_loss {
            self.best_loss  = val_loss;
            self.best_epoch = Some(epoch);
            self.stale      = 0;
            return EpochVerdict::Improved;
        }

        self.stale += 1;
        if self.stale >= self.patience {
            EpochVerdict::Stop
        } else {
            EpochVerdict::Stalled { stale: self.stale }
        }
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-15
    }

    #[test]
    fn test_default_schedule_shape() {
        let s = LrSchedule::default();
        s.validate().unwrap();

        // warmup starts at start_lr and climbs linearly
        assert_eq!(s.learning_rate(0), s.start_lr);
        assert!(close(s.learning_rate(2), (s.start_lr + s.max_lr) / 2.0));
        assert_eq!(s.phase(3), SchedulePhase::Warmup);

        // sustain is empty, epoch 4 is the decay base: exactly max_lr
        assert_eq!(s.phase(4), SchedulePhase::Decay);
        assert!(close(s.learning_rate(4), s.max_lr));

        // decay stays strictly inside (min_lr, max_lr) and keeps falling
        let lr10 = s.learning_rate(10);
        assert!(lr10 > s.min_lr && lr10 < s.max_lr);
        for e in 4..30 {
            assert!(s.learning_rate(e + 1) < s.learning_rate(e), "not decreasing at epoch {e}");
        }
    }

    #[test]
    fn test_sustain_window() {
        let s = LrSchedule::new(0.0, 1.0, 0.5, 2, 3, 0.5).unwrap();
        assert_eq!(s.learning_rate(0), 0.0);
        assert_eq!(s.learning_rate(1), 0.5);
        for e in 2..5 {
            assert_eq!(s.phase(e), SchedulePhase::Sustain);
            assert_eq!(s.learning_rate(e), 1.0);
        }
        assert_eq!(s.learning_rate(5), 1.0);
        assert_eq!(s.learning_rate(6), 0.75);
    }

    #[test]
    fn test_zero_ramp_starts_in_decay() {
        let s = LrSchedule::new(1e-3, 1e-3, 1e-4, 0, 0, 0.9).unwrap();
        assert_eq!(s.phase(0), SchedulePhase::Decay);
        assert!(close(s.learning_rate(0), 1e-3));
    }

    #[test]
    fn test_invalid_schedules() {
        // min_lr above max_lr
        assert!(LrSchedule::new(1e-5, 5e-5, 1e-4, 4, 0, 0.8).is_err());
        assert!(LrSchedule::new(1e-5, 1e-4, 5e-5, 4, 0, 1.0).is_err());
        assert!(LrSchedule::new(1e-5, 1e-4, 5e-5, 4, 0, 0.0).is_err());
        assert!(LrSchedule::new(-1.0, 1e-4, 5e-5, 4, 0, 0.8).is_err());
        assert!(LrSchedule::new(1e-5, f64::NAN, 5e-5, 4, 0, 0.8).is_err());
    }

    #[test]
    fn test_same_constants_same_sequence() {
        let a: Vec<f64> = (0..13).map(|e| LrSchedule::default().learning_rate(e)).collect();
        let b: Vec<f64> = (0..13).map(|e| LrSchedule::default().learning_rate(e)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_early_stopping_patience() {
        let mut es = EarlyStopping::new(2);
        assert_eq!(es.observe(0, 1.0), EpochVerdict::Improved);
        assert_eq!(es.observe(1, 0.8), EpochVerdict::Improved);
        assert_eq!(es.observe(2, 0.9), EpochVerdict::Stalled { stale: 1 });
        assert_eq!(es.observe(3, 0.8), EpochVerdict::Stop);
        assert_eq!(es.best_epoch(), Some(1));
        assert_eq!(es.best_loss(), 0.8);
    }

    #[test]
    fn test_improvement_resets_stale_counter() {
        let mut es = EarlyStopping::new(2);
        es.observe(0, 1.0);
        assert_eq!(es.observe(1, 1.5), EpochVerdict::Stalled { stale: 1 });
        assert_eq!(es.observe(2, 0.5), EpochVerdict::Improved);
        assert_eq!(es.observe(3, 0.6), EpochVerdict::Stalled { stale: 1 });
    }
}
