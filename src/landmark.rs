//! Landmark storage and batch filtering.

use std::iter;

use crate::{
    config::Smoothing,
    filter::{Ema, Filter, FilterBase, MovingAvg, OneEuroFilter, TimeBasedFilter},
    iter::zip_exact,
};

/// A landmark position `[x, y, z]`.
///
/// `x` and `y` are normalized frame coordinates, `z` is depth relative to the wrist in the same
/// scale as `x`.
pub type Position = [f32; 3];

/// A fixed-size list of landmark positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` preallocated landmarks.
    ///
    /// All landmarks will start with all coordinates at `0.0`.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0]; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Position {
        self.positions[index]
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn iter(&self) -> impl Iterator<Item = Position> + Clone + '_ {
        self.positions.iter().copied()
    }

    /// Overwrites all positions with those of `other`.
    ///
    /// # Panics
    ///
    /// Panics if `other` has a different number of landmarks.
    pub fn copy_from(&mut self, other: &Landmarks) {
        self.positions.copy_from_slice(&other.positions);
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// Batch-filter for landmarks.
///
/// Every coordinate of every landmark is filtered independently, with its own filter state.
pub struct LandmarkFilter {
    filter: Box<dyn FnMut(&mut Landmarks, f32) + Send>,
}

/// The default [`LandmarkFilter`] does not perform any filtering.
impl Default for LandmarkFilter {
    fn default() -> Self {
        Self {
            filter: Box::new(|_, _| ()),
        }
    }
}

impl LandmarkFilter {
    /// Creates a landmark filter from a [`Filter`] that ignores frame timing.
    ///
    /// `num_landmarks` is the number of landmarks that will be filtered with this filter in each
    /// batch.
    pub fn new<F: Filter<f32> + Send + 'static>(filter: F, num_landmarks: usize) -> Self
    where
        F::State: Send,
    {
        let mut states = states::<F>(num_landmarks);
        Self {
            filter: Box::new(move |landmarks, _| {
                for (lm, state) in zip_exact(landmarks.positions_mut(), &mut states) {
                    for (coord, state) in zip_exact(lm, state) {
                        *coord = Filter::filter(&filter, state, *coord);
                    }
                }
            }),
        }
    }

    /// Creates a landmark filter from a [`TimeBasedFilter`].
    pub fn time_based<F: TimeBasedFilter<f32> + Send + 'static>(
        filter: F,
        num_landmarks: usize,
    ) -> Self
    where
        F::State: Send,
    {
        let mut states = states::<F>(num_landmarks);
        Self {
            filter: Box::new(move |landmarks, elapsed| {
                for (lm, state) in zip_exact(landmarks.positions_mut(), &mut states) {
                    for (coord, state) in zip_exact(lm, state) {
                        *coord = TimeBasedFilter::filter(&filter, state, *coord, elapsed);
                    }
                }
            }),
        }
    }

    /// Creates the landmark filter described by a [`Smoothing`] setting.
    pub fn from_smoothing(smoothing: &Smoothing, num_landmarks: usize) -> Self {
        match *smoothing {
            Smoothing::None => Self::default(),
            Smoothing::Ema { factor } => Self::new(Ema::new(factor), num_landmarks),
            Smoothing::MovingAverage { window } => Self::new(MovingAvg::new(window), num_landmarks),
            Smoothing::OneEuro { min_cutoff, beta } => {
                Self::time_based(OneEuroFilter::new(min_cutoff, beta), num_landmarks)
            }
        }
    }

    /// Filters a list of landmarks in-place.
    ///
    /// `elapsed` is the time in seconds since the previous batch, and is only used by time-based
    /// filters.
    ///
    /// # Panics
    ///
    /// This method panics if `landmarks` does not have exactly as many entries as the filter was
    /// created for.
    pub fn filter(&mut self, landmarks: &mut Landmarks, elapsed: f32) {
        (self.filter)(landmarks, elapsed);
    }
}

fn states<F: FilterBase<f32>>(num_landmarks: usize) -> Vec<[F::State; 3]> {
    iter::repeat_with(|| {
        [
            F::State::default(),
            F::State::default(),
            F::State::default(),
        ]
    })
    .take(num_landmarks)
    .collect()
}
