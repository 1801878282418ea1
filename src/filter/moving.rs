//! Simple moving average.

use std::collections::VecDeque;

use super::{Filter, FilterBase};

/// Moving Average over a fixed history of values (FIR filter).
///
/// All values are weighted equally.
#[derive(Debug, Clone, Copy)]
pub struct MovingAvg {
    /// Max. number of values to keep in the history.
    history_size: usize,
}

impl MovingAvg {
    /// Creates a moving average filter that averages the last `history_size` values.
    ///
    /// # Panics
    ///
    /// Panics if `history_size` is 0.
    pub fn new(history_size: usize) -> Self {
        assert!(history_size > 0, "moving average needs a history");
        Self { history_size }
    }
}

/// Filter state for [`MovingAvg`].
#[derive(Debug, Default)]
pub struct State {
    history: VecDeque<f32>,
}

impl FilterBase<f32> for MovingAvg {
    type State = State;
}

impl Filter<f32> for MovingAvg {
    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        state.history.push_back(value);
        while state.history.len() > self.history_size {
            state.history.pop_front();
        }

        let factor = 1.0 / state.history.len() as f32;
        state.history.iter().fold(0.0, |acc, v| acc + v * factor)
    }
}
