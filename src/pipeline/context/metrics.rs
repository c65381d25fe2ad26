use std::time::{Duration, Instant};

use crate::error::SegmentationError;

/// Metrics collected while one submission is segmented
#[derive(Debug, Clone)]
pub struct SegmentationMetrics {
    succeeded: usize,
    failed: usize,
    timed_out: usize,
    slowest_frame: Option<Duration>,
    started: Instant,
    total_duration: Option<Duration>,
}

impl Default for SegmentationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentationMetrics {
    pub fn new() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            timed_out: 0,
            slowest_frame: None,
            started: Instant::now(),
            total_duration: None,
        }
    }

    pub fn record_frame<T>(&mut self, outcome: &Result<T, SegmentationError>, duration: Duration) {
        match outcome {
            Ok(_) => self.succeeded += 1,
            Err(SegmentationError::Timeout(_)) => {
                self.failed += 1;
                self.timed_out += 1;
            }
            Err(_) => self.failed += 1,
        }
        if self.slowest_frame.map_or(true, |slowest| duration > slowest) {
            self.slowest_frame = Some(duration);
        }
    }

    pub fn finalize(&mut self) {
        self.total_duration = Some(self.started.elapsed());
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn timed_out(&self) -> usize {
        self.timed_out
    }

    pub fn slowest_frame(&self) -> Option<Duration> {
        self.slowest_frame
    }

    pub fn total_duration(&self) -> Option<Duration> {
        self.total_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_count_as_failures() {
        let mut metrics = SegmentationMetrics::new();
        metrics.record_frame(&Ok::<(), _>(()), Duration::from_millis(5));
        metrics.record_frame::<()>(
            &Err(SegmentationError::Timeout(Duration::from_millis(10))),
            Duration::from_millis(10),
        );
        metrics.record_frame::<()>(&Err(SegmentationError::UnknownFailure), Duration::from_millis(1));
        metrics.finalize();

        assert_eq!(metrics.succeeded(), 1);
        assert_eq!(metrics.failed(), 2);
        assert_eq!(metrics.timed_out(), 1);
        assert_eq!(metrics.slowest_frame(), Some(Duration::from_millis(10)));
        assert!(metrics.total_duration().is_some());
    }
}
