/// Receives the fraction of work completed, in `0.0..=1.0`, as a run advances.
pub trait ProgressReporter {
    fn update(&mut self, fraction: f64);
}

/// Discards progress reports.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&mut self, _fraction: f64) {}
}

impl<F: FnMut(f64)> ProgressReporter for F {
    fn update(&mut self, fraction: f64) {
        self(fraction);
    }
}
