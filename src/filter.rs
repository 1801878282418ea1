//! Data filtering, averaging and smoothing.
//!
//! Filters are split into their parameters (the type implementing [`Filter`] or
//! [`TimeBasedFilter`]) and their accumulated history ([`FilterBase::State`]), so that one set of
//! parameters can drive many independent values, like every coordinate of a hand's landmarks.

use std::marker::PhantomData;

mod ema;
mod moving;
mod one_euro;

pub use ema::Ema;
pub use moving::MovingAvg;
pub use one_euro::OneEuroFilter;

/// Common supertrait of [`Filter`] and [`TimeBasedFilter`].
pub trait FilterBase<V> {
    /// The history a filter keeps for each filtered value.
    ///
    /// The [`Default`] value is the state of a freshly created filter.
    type State: Default;
}

/// A filter for values of type `V` that ignores timing information.
pub trait Filter<V>: FilterBase<V> {
    /// Pushes a value through the filter, updating `state` and returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}

/// A filter for values of type `V` that takes the time between values into account.
pub trait TimeBasedFilter<V>: FilterBase<V> {
    /// Pushes a value through the filter.
    ///
    /// `elapsed` is the time in seconds since the previous value was pushed.
    fn filter(&self, state: &mut Self::State, value: V, elapsed: f32) -> V;
}

/// Bundles a [`Filter`] with its state, for filtering a single stream of values.
#[derive(Debug)]
pub struct SimpleFilter<V, F: FilterBase<V>> {
    filter: F,
    state: F::State,
    _value: PhantomData<fn(V) -> V>,
}

impl<V, F: FilterBase<V>> SimpleFilter<V, F> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            state: F::State::default(),
            _value: PhantomData,
        }
    }

    /// Discards the accumulated history.
    pub fn reset(&mut self) {
        self.state = F::State::default();
    }
}

impl<V, F: Filter<V>> SimpleFilter<V, F> {
    pub fn filter(&mut self, value: V) -> V {
        Filter::filter(&self.filter, &mut self.state, value)
    }
}

impl<V, F: TimeBasedFilter<V>> SimpleFilter<V, F> {
    pub fn filter_timed(&mut self, value: V, elapsed: f32) -> V {
        TimeBasedFilter::filter(&self.filter, &mut self.state, value, elapsed)
    }
}
