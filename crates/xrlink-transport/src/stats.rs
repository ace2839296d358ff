//! Transport counters and pose-stream timing statistics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Arrivals kept by [`ArrivalStats`]
pub const ARRIVAL_WINDOW: usize = 50;

/// Frame sender counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Frames accepted by `submit`
    pub submitted: u64,
    /// Pending frames overwritten before the worker took them
    pub replaced: u64,
    pub encoded: u64,
    pub encode_failures: u64,
    pub frames_sent: u64,
    pub fragments_sent: u64,
    pub send_errors: u64,
}

/// Pose receiver counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Every datagram read, valid or not
    pub datagrams: u64,
    /// Datagrams with the pose size and magics
    pub accepted: u64,
    pub rejected: u64,
    pub recv_errors: u64,
    pub keepalives_sent: u64,
    pub keepalive_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
    #[inline]
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live counters shared with the sender worker
#[derive(Debug, Default)]
pub(crate) struct SenderCounters {
    pub submitted: Counter,
    pub replaced: Counter,
    pub encoded: Counter,
    pub encode_failures: Counter,
    pub frames_sent: Counter,
    pub fragments_sent: Counter,
    pub send_errors: Counter,
}

impl SenderCounters {
    pub fn snapshot(&self) -> SenderStats {
        SenderStats {
            submitted: self.submitted.get(),
            replaced: self.replaced.get(),
            encoded: self.encoded.get(),
            encode_failures: self.encode_failures.get(),
            frames_sent: self.frames_sent.get(),
            fragments_sent: self.fragments_sent.get(),
            send_errors: self.send_errors.get(),
        }
    }
}

/// Live counters shared with the receiver tasks
#[derive(Debug, Default)]
pub(crate) struct ReceiverCounters {
    pub datagrams: Counter,
    pub accepted: Counter,
    pub rejected: Counter,
    pub recv_errors: Counter,
    pub keepalives_sent: Counter,
    pub keepalive_errors: Counter,
}

impl ReceiverCounters {
    pub fn snapshot(&self) -> ReceiverStats {
        ReceiverStats {
            datagrams: self.datagrams.get(),
            accepted: self.accepted.get(),
            rejected: self.rejected.get(),
            recv_errors: self.recv_errors.get(),
            keepalives_sent: self.keepalives_sent.get(),
            keepalive_errors: self.keepalive_errors.get(),
        }
    }
}

/// Summary of recent inter-arrival intervals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalSummary {
    pub mean_interval: Duration,
    /// Standard deviation of the intervals
    pub jitter: Duration,
    /// Spread between the longest and shortest interval
    pub max_jitter: Duration,
}

/// Rolling window of arrival instants
#[derive(Debug, Clone)]
pub struct ArrivalStats {
    arrivals: VecDeque<Instant>,
    capacity: usize,
}

impl ArrivalStats {
    pub fn new() -> Self {
        Self::with_capacity(ARRIVAL_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            arrivals: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, at: Instant) {
        if self.arrivals.len() == self.capacity {
            self.arrivals.pop_front();
        }
        self.arrivals.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Needs at least three arrivals
    pub fn summary(&self) -> Option<ArrivalSummary> {
        if self.arrivals.len() < 3 {
            return None;
        }

        let intervals: Vec<f64> = self
            .arrivals
            .iter()
            .zip(self.arrivals.iter().skip(1))
            .map(|(a, b)| b.saturating_duration_since(*a).as_secs_f64())
            .collect();
        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;
        let max = intervals.iter().copied().fold(f64::MIN, f64::max);
        let min = intervals.iter().copied().fold(f64::MAX, f64::min);

        Some(ArrivalSummary {
            mean_interval: Duration::from_secs_f64(mean),
            jitter: Duration::from_secs_f64(variance.sqrt()),
            max_jitter: Duration::from_secs_f64(max - min),
        })
    }
}

impl Default for ArrivalStats {
    fn default() -> Self {
        Self::new()
    }
}

/// One-way latency relative to the first observed packet.
///
/// The two clocks are not synchronized, so the first sample's offset is taken
/// as the baseline and later samples report drift from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyEstimator {
    offset: Option<f64>,
}

impl LatencyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `sent` is the packet timestamp, `received` the local clock, both in
    /// seconds since the Unix epoch. Returns latency in seconds.
    pub fn observe(&mut self, sent: f64, received: f64) -> f64 {
        let offset = *self.offset.get_or_insert(received - sent);
        received - (sent + offset)
    }

    pub fn reset(&mut self) {
        self.offset = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = SenderCounters::default();
        counters.submitted.incr();
        counters.submitted.incr();
        counters.replaced.incr();
        let stats = counters.snapshot();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.frames_sent, 0);
    }

    #[test]
    fn test_summary_needs_three_arrivals() {
        let mut stats = ArrivalStats::new();
        let t0 = Instant::now();
        stats.record(t0);
        stats.record(t0 + Duration::from_millis(10));
        assert!(stats.summary().is_none());
    }

    #[test]
    fn test_steady_arrivals_have_no_jitter() {
        let mut stats = ArrivalStats::new();
        let t0 = Instant::now();
        for i in 0..10 {
            stats.record(t0 + Duration::from_millis(20 * i));
        }
        let summary = stats.summary().unwrap();
        assert!((summary.mean_interval.as_secs_f64() - 0.020).abs() < 1e-9);
        assert!(summary.jitter.as_secs_f64() < 1e-9);
        assert!(summary.max_jitter.as_secs_f64() < 1e-9);
    }

    #[test]
    fn test_uneven_arrivals() {
        let mut stats = ArrivalStats::new();
        let t0 = Instant::now();
        // intervals 10 ms and 30 ms
        stats.record(t0);
        stats.record(t0 + Duration::from_millis(10));
        stats.record(t0 + Duration::from_millis(40));
        let summary = stats.summary().unwrap();
        assert!((summary.mean_interval.as_secs_f64() - 0.020).abs() < 1e-9);
        assert!((summary.jitter.as_secs_f64() - 0.010).abs() < 1e-9);
        assert!((summary.max_jitter.as_secs_f64() - 0.020).abs() < 1e-9);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = ArrivalStats::with_capacity(5);
        let t0 = Instant::now();
        for i in 0..20 {
            stats.record(t0 + Duration::from_millis(i));
        }
        assert_eq!(stats.len(), 5);
    }

    #[test]
    fn test_latency_relative_to_first_sample() {
        let mut est = LatencyEstimator::new();
        // device clock 100 s behind
        assert_eq!(est.observe(1000.0, 1100.0), 0.0);
        assert!((est.observe(1001.0, 1101.025) - 0.025).abs() < 1e-9);
        est.reset();
        assert_eq!(est.observe(5.0, 6.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_summary_is_ordered(gaps in prop::collection::vec(0u64..200, 2..120), cap in 2usize..64) {
            let mut stats = ArrivalStats::with_capacity(cap);
            let mut at = Instant::now();
            stats.record(at);
            for gap in &gaps {
                at += Duration::from_millis(*gap);
                stats.record(at);
            }
            prop_assert!(stats.len() <= cap);

            if let Some(summary) = stats.summary() {
                prop_assert!(summary.jitter <= summary.max_jitter);
                prop_assert!(summary.mean_interval < Duration::from_millis(200));
            }
        }
    }
}
