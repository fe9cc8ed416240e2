//! Progress reporting for EQ generation.
//!
//! The generator calls a [`PassObserver`] between passes. Interactive front
//! ends can redraw after each pass; batch callers use [`NoopObserver`] or
//! [`LogObserver`].

use log::{debug, info};
use std::time::Instant;

use crate::Curve;
use crate::filter_bank::EqBand;

/// Receives progress notifications from the generator
///
/// Every method defaults to doing nothing.
pub trait PassObserver {
    fn on_pass_start(&mut self, _pass: usize, _name: &str) {}

    /// Bands added by `pass` and the frequencies it found worth correcting
    fn on_bands_generated(&mut self, _pass: usize, _bands: &[EqBand], _active_frequencies: &[f64]) {}

    /// `total_bands` counts the bands of every pass so far
    fn on_pass_complete(&mut self, _pass: usize, _total_bands: usize, _corrected: &Curve) {}

    fn on_progress_update(&mut self, _message: &str) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PassObserver for NoopObserver {}

/// Observer reporting passes and elapsed time through `log`
pub struct LogObserver {
    /// Overall operation name
    name: String,
    /// Number of passes expected
    total_passes: usize,
    /// Name of the running pass
    current: Option<String>,
    /// Overall start time
    start_time: Instant,
    /// Start of the running pass
    pass_start: Instant,
}

impl LogObserver {
    pub fn new(name: impl Into<String>, total_passes: usize) -> Self {
        Self {
            name: name.into(),
            total_passes,
            current: None,
            start_time: Instant::now(),
            pass_start: Instant::now(),
        }
    }

    /// Name of the pass currently running, if any
    pub fn current_pass(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl PassObserver for LogObserver {
    fn on_pass_start(&mut self, pass: usize, name: &str) {
        self.current = Some(name.to_string());
        self.pass_start = Instant::now();
        info!(
            "[{}] Pass {}/{}: {}",
            self.name, pass, self.total_passes, name
        );
    }

    fn on_bands_generated(&mut self, pass: usize, bands: &[EqBand], active_frequencies: &[f64]) {
        info!(
            "[{}] Pass {}: {} bands from {} significant frequencies",
            self.name,
            pass,
            bands.len(),
            active_frequencies.len()
        );
        for band in bands {
            debug!(
                "[{}]   {:6.1} Hz {:+6.2} dB Q {:.2}",
                self.name, band.frequency, band.gain, band.q
            );
        }
    }

    fn on_pass_complete(&mut self, pass: usize, total_bands: usize, _corrected: &Curve) {
        let stage = self.current.take().unwrap_or_default();
        info!(
            "[{}] Pass {} '{}' complete | {} bands in total | pass: {:.2}s | elapsed: {:.2}s",
            self.name,
            pass,
            stage,
            total_bands,
            self.pass_start.elapsed().as_secs_f64(),
            self.start_time.elapsed().as_secs_f64()
        );
    }

    fn on_progress_update(&mut self, message: &str) {
        info!("[{}] {}", self.name, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_observer_tracks_current_pass() {
        let mut observer = LogObserver::new("Test", 4);
        assert_eq!(observer.current_pass(), None);

        observer.on_pass_start(1, "Broad correction");
        assert_eq!(observer.current_pass(), Some("Broad correction"));

        let curve = Curve::from_points(vec![(20.0, 70.0)]);
        observer.on_pass_complete(1, 3, &curve);
        assert_eq!(observer.current_pass(), None);
    }

    #[test]
    fn test_noop_observer_accepts_everything() {
        let mut observer = NoopObserver;
        observer.on_pass_start(1, "x");
        observer.on_bands_generated(1, &[EqBand::peak(50.0, -3.0, 4.0)], &[50.0]);
        observer.on_progress_update("done");
    }
}
