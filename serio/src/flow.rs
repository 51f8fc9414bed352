//! Write-side flow control.
//!
//! The transport tells its protocol to pause once the write queue reaches the
//! high water mark and to resume once it drains back to the low water mark.
//! Everything here is pure bookkeeping; delivering the resulting signal is the
//! transport's job.

use crate::error::{Error, Result};
use crate::DEFAULT_HIGH_WATER_MARK;

/// Write buffer thresholds. Always `high >= low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterMarks {
    high: usize,
    low: usize,
}

impl WaterMarks {
    pub fn new(high: usize, low: usize) -> Result<Self> {
        if high < low {
            return Err(Error::limits(high, low));
        }
        Ok(Self { high, low })
    }

    /// Fills in whichever limit is missing.
    ///
    /// `high` falls back to four times `low`, or to the default high water
    /// mark when both are missing. `low` falls back to a quarter of `high`.
    pub fn from_limits(high: Option<usize>, low: Option<usize>) -> Result<Self> {
        let high = match (high, low) {
            (Some(high), _) => high,
            (None, Some(low)) => low.saturating_mul(4),
            (None, None) => DEFAULT_HIGH_WATER_MARK,
        };
        let low = low.unwrap_or(high / 4);
        Self::new(high, low)
    }

    pub fn high(&self) -> usize {
        self.high
    }

    pub fn low(&self) -> usize {
        self.low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Normal,
    Paused,
}

/// Signal for the protocol produced by a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    Pause,
    Resume,
}

#[derive(Debug)]
pub struct FlowControl {
    marks: WaterMarks,
    state: FlowState,
}

impl FlowControl {
    pub fn new(marks: WaterMarks) -> Self {
        Self {
            marks,
            state: FlowState::Normal,
        }
    }

    pub fn marks(&self) -> WaterMarks {
        self.marks
    }

    pub fn set_marks(&mut self, marks: WaterMarks) {
        self.marks = marks;
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == FlowState::Paused
    }

    /// Re-evaluates against the current buffer level.
    ///
    /// Returns a signal only when a threshold is crossed, so calling this
    /// repeatedly with the same `pending` is a no-op.
    pub fn evaluate(&mut self, pending: usize) -> Option<FlowSignal> {
        match self.state {
            FlowState::Paused if pending <= self.marks.low => {
                self.state = FlowState::Normal;
                Some(FlowSignal::Resume)
            }
            FlowState::Normal if pending >= self.marks.high => {
                self.state = FlowState::Paused;
                Some(FlowSignal::Pause)
            }
            _ => None,
        }
    }

    /// Drops back to `Normal` without producing a signal. Used when the
    /// connection is torn down and nobody is left to resume.
    pub fn reset(&mut self) {
        self.state = FlowState::Normal;
    }
}
