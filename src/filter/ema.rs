//! Exponential Moving Average.

use super::{Filter, FilterBase};

/// An Exponential Moving Average (EMA) filter.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// The `alpha` parameter is the weight of the newest value. Values close to 1.0 follow the
    /// input closely, values close to 0.0 smooth more strongly and lag behind.
    ///
    /// # Panics
    ///
    /// This method will panic if `alpha` is not in between 0.0 and 1.0.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha), "invalid EMA factor {alpha}");
        Self { alpha }
    }
}

/// Filter state for [`Ema`] filters.
#[derive(Debug, Default)]
pub struct State {
    last: Option<f32>,
}

impl FilterBase<f32> for Ema {
    type State = State;
}

impl Filter<f32> for Ema {
    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        let avg = match state.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        state.last = Some(avg);
        avg
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::SimpleFilter;

    use super::*;

    #[test]
    fn test_ema() {
        let mut filter = SimpleFilter::new(Ema::new(0.5));
        assert_eq!(filter.filter(1.0), 1.0);
        assert_eq!(filter.filter(2.0), 1.5);
        assert_eq!(filter.filter(2.0), 1.75);

        filter.reset();
        assert_eq!(filter.filter(4.0), 4.0);
    }

    #[test]
    fn full_weight_follows_input() {
        let mut filter = SimpleFilter::new(Ema::new(1.0));
        filter.filter(1.0);
        assert_eq!(filter.filter(-3.0), -3.0);
    }
}
