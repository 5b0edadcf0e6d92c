use std::collections::VecDeque;

use super::MempoolRate;

/// Arrival-rate bookkeeping. Samples are appended as transactions are
/// ingested and expire out of the window; the once-per-second tick
/// recomputes the smoothed figures.
///
/// Callers gate `record` on the sync flag: during initial catch-up the
/// engine swallows a backlog in seconds, and counting that as live
/// arrivals would spike the rates by orders of magnitude.
pub struct RateTracker {
    window_seconds: u64,
    arrivals: VecDeque<u64>,
    vsizes: VecDeque<(u64, f64)>,
    rate: MempoolRate,
}

impl RateTracker {
    pub fn new(window_seconds: u64) -> RateTracker {
        Self {
            window_seconds,
            arrivals: VecDeque::new(),
            vsizes: VecDeque::new(),
            rate: MempoolRate::default(),
        }
    }

    pub fn record(&mut self, now_ms: u64, vsize: f64) {
        self.arrivals.push_back(now_ms);
        self.vsizes.push_back((now_ms, vsize));
    }

    /// Expires samples older than the window and recomputes both rates.
    pub fn tick(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.window_seconds * 1000);
        while self.arrivals.front().is_some_and(|&ts| ts <= cutoff) {
            self.arrivals.pop_front();
        }
        while self.vsizes.front().is_some_and(|&(ts, _)| ts <= cutoff) {
            self.vsizes.pop_front();
        }

        let window = self.window_seconds as f64;
        let total_vsize: f64 = self.vsizes.iter().map(|&(_, vsize)| vsize).sum();
        self.rate = MempoolRate {
            tx_per_second: self.arrivals.len() as f64 / window,
            vbytes_per_second: (total_vsize / window).round() as u64,
        };
    }

    pub fn current(&self) -> MempoolRate {
        self.rate
    }
}
