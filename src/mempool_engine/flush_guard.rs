use std::time::Duration;
use tokio::time::Instant;

use crate::configuration::FlushProtectionSettings;

/// What the latch tells the pass to do with its deletion set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Nothing suspicious; classify deletions normally.
    Proceed,
    /// Upstream shrank implausibly this pass; the latch armed and the
    /// cache must be kept as-is. The caller also drops its sync flag.
    Triggered,
    /// Latch still armed from an earlier pass; keep the cache as-is.
    Suppress,
    /// First pass after the cooldown elapsed; deletions flow again.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Idle,
    Armed { until: Instant },
    Cooling,
}

/// Guards against propagating the near-empty pool a restarting node
/// transiently reports. Without it a single bad listing would emit
/// thousands of deletions the node re-publishes seconds later.
pub struct FlushGuard {
    latch: Latch,
    min_before_size: usize,
    ratio_threshold: f64,
    cooldown: Duration,
}

impl FlushGuard {
    pub fn new(settings: &FlushProtectionSettings) -> FlushGuard {
        Self {
            latch: Latch::Idle,
            min_before_size: settings.min_before_size,
            ratio_threshold: settings.ratio_threshold,
            cooldown: Duration::from_millis(settings.cooldown_ms),
        }
    }

    /// Ran once per pass, with the cache size recorded *before* any ingest
    /// and the deduplicated upstream listing size.
    pub fn evaluate(&mut self, now: Instant, before_size: usize, upstream_size: usize) -> FlushDecision {
        if let Latch::Armed { until } = self.latch {
            if now >= until {
                self.latch = Latch::Cooling;
            }
        }
        match self.latch {
            Latch::Idle => {
                if self.looks_like_flush(before_size, upstream_size) {
                    self.latch = Latch::Armed {
                        until: now + self.cooldown,
                    };
                    FlushDecision::Triggered
                } else {
                    FlushDecision::Proceed
                }
            }
            Latch::Armed { .. } => FlushDecision::Suppress,
            Latch::Cooling => {
                self.latch = Latch::Idle;
                FlushDecision::Release
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.latch, Latch::Armed { .. })
    }

    fn looks_like_flush(&self, before_size: usize, upstream_size: usize) -> bool {
        before_size > self.min_before_size
            && before_size > 0
            && upstream_size as f64 / before_size as f64 <= self.ratio_threshold
    }
}
