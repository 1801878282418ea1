//! Performance measurement tools.

use std::{
    cell::{Cell, RefCell},
    fmt::{self, Arguments},
    time::{Duration, Instant},
};

const MAX_DURATIONS: usize = 250;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    durations: RefCell<Vec<Duration>>,
    overflowed: Cell<bool>,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            durations: Default::default(),
            overflowed: Cell::new(false),
        }
    }

    /// Returns the name of the timed operation.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is recorded.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&mut self, start: Instant) {
        let duration = start.elapsed();
        let durations = self.durations.get_mut();
        if durations.len() >= MAX_DURATIONS {
            // Nobody is displaying this timer; keep the most recent window only.
            self.overflowed.set(true);
            durations.clear();
        }
        durations.push(duration);
    }

    /// Returns the average of the recorded durations without resetting them.
    pub fn average(&self) -> Option<Duration> {
        let durations = self.durations.borrow();
        let count = u32::try_from(durations.len()).ok().filter(|&n| n > 0)?;
        Some(durations.iter().sum::<Duration>() / count)
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let avg_ms = self.average().unwrap_or_default().as_secs_f32() * 1000.0;
        let len = self.durations.borrow().len();
        self.durations.borrow_mut().clear();
        let marker = if self.overflowed.replace(false) { "+" } else { "" };

        write!(f, "{}: {len}{marker}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs frames per second with optional extra data.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS and `extra` data if one second has passed.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        struct DisplayExtra<I>(Cell<Option<I>>);

        impl<D: fmt::Display, I: Iterator<Item = D>> fmt::Display for DisplayExtra<I> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let Some(iter) = self.0.take() else {
                    return Ok(());
                };
                let mut first = true;
                for item in iter {
                    f.write_str(if first { " (" } else { ", " })?;
                    write!(f, "{item}")?;
                    first = false;
                }
                if !first {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }

        self.tick_impl(format_args!(
            "{}",
            DisplayExtra(Cell::new(Some(extra.into_iter())))
        ));
    }

    fn tick_impl(&mut self, args: Arguments<'_>) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            log::debug!("{}: {} FPS{}", self.name, self.frames, args);

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}
