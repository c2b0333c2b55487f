//! Progress reporting seam.
//!
//! RULE: the core never renders progress. Callers inject an observer;
//! during a batch the coordinator thread is its only caller.

/// `fraction` is completion in [0, 1]; `message` is a short status line.
pub trait ProgressObserver {
    fn on_progress(&mut self, fraction: f64, message: &str);
}

/// Closures work directly as observers.
impl<F: FnMut(f64, &str)> ProgressObserver for F {
    fn on_progress(&mut self, fraction: f64, message: &str) {
        self(fraction, message)
    }
}

/// Discards all progress. Default for tests and library callers.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&mut self, _fraction: f64, _message: &str) {}
}

/// Logs progress at info level, throttled to 10% increments.
pub struct LogObserver {
    last_decile: i8,
}

impl LogObserver {
    pub fn new() -> Self {
        Self { last_decile: -1 }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogObserver {
    fn on_progress(&mut self, fraction: f64, message: &str) {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0) as i8;
        if decile > self.last_decile {
            self.last_decile = decile;
            log::info!("progress {:>3.0}% — {message}", fraction * 100.0);
        }
    }
}
