use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::time::Instant;

use super::{
    default_stripper, FlushDecision, FlushGuard, LatestArrivals, MempoolObserver, MempoolRate,
    MempoolSnapshot, MempoolUpdate, ObserverSlot, RateTracker, StrippedTransaction, Stripper,
    TransactionExtended, Txid,
};
use crate::{
    configuration::{MempoolSettings, SettingsError},
    upstream_client::{MempoolInfo, MempoolUpstream, UpstreamError},
};

/// Figures for the supervisor's per-pass log line.
#[derive(Debug, Clone, Copy)]
pub struct PassSummary {
    pub upstream_size: usize,
    pub cache_size: usize,
    pub added: usize,
    pub removed: usize,
    pub truncated: bool,
    pub in_sync: bool,
    pub elapsed: Duration,
}

/// Local replica of one node's mempool.
///
/// A scheduler calls [`run_once`](MempoolEngine::run_once) at a fixed
/// cadence; each pass diffs the upstream listing against the cache, fetches
/// whatever is new, classifies deletions, and publishes a fresh snapshot.
/// All engine state sits behind one mutex that is never held across an
/// upstream call: a pass reads what it needs up front, performs its I/O on
/// pass-local values, and merges in a single locked step at the end. A pass
/// dropped before that merge leaves the replica untouched.
pub struct MempoolEngine {
    upstream: Arc<dyn MempoolUpstream>,
    stripper: Stripper,
    pass_budget: Duration,
    state: Mutex<EngineState>,
}

struct EngineState {
    cache: MempoolSnapshot,
    info: MempoolInfo,
    in_sync: bool,
    guard: FlushGuard,
    tracker: RateTracker,
    latest: LatestArrivals,
    observer: ObserverSlot,
}

impl MempoolEngine {
    /// Invalid settings are fatal here; nothing later re-checks them.
    pub fn build(
        settings: &MempoolSettings,
        upstream: Arc<dyn MempoolUpstream>,
    ) -> Result<MempoolEngine, SettingsError> {
        settings.validate()?;
        Ok(Self {
            upstream,
            stripper: Arc::new(default_stripper),
            pass_budget: settings.pass_budget(),
            state: Mutex::new(EngineState {
                cache: MempoolSnapshot::default(),
                info: MempoolInfo::default(),
                in_sync: false,
                guard: FlushGuard::new(&settings.flush_protection),
                tracker: RateTracker::new(settings.rate_window_seconds),
                latest: LatestArrivals::new(settings.latest_capacity),
                observer: ObserverSlot::new(),
            }),
        })
    }

    /// Swaps in a different latest-arrivals projection.
    pub fn with_stripper(mut self, stripper: Stripper) -> Self {
        self.stripper = stripper;
        self
    }

    /// One reconciliation pass. Returns without touching any state when an
    /// upstream call fails; the caller retries at the next cadence.
    pub async fn run_once(&self) -> Result<PassSummary, UpstreamError> {
        let started = Instant::now();

        // Snapshot phase: everything the pass needs, read once.
        let (cache, was_in_sync) = {
            let state = self.state.lock();
            (state.cache.clone(), state.in_sync)
        };
        let before_size = cache.len();

        let upstream_ids = self.upstream.list_pending_ids().await?;

        // Ingest phase: fetch listed transactions the cache has not seen,
        // bounded by the pass budget.
        let mut added: Vec<Arc<TransactionExtended>> = Vec::new();
        let mut fetched: HashSet<Txid> = HashSet::new();
        let mut truncated = false;
        for txid in &upstream_ids {
            if cache.contains_key(txid) || fetched.contains(txid) {
                continue;
            }
            match self.upstream.get_transaction(txid).await? {
                Some(raw) => {
                    let tx = Arc::new(TransactionExtended::ingest(raw, unix_seconds()));
                    fetched.insert(tx.txid.clone());
                    added.push(tx);
                }
                None => {
                    tracing::debug!(%txid, "listed transaction vanished before it could be fetched");
                }
            }
            if started.elapsed() > self.pass_budget {
                truncated = true;
                tracing::warn!(
                    fetched = added.len(),
                    listed = upstream_ids.len(),
                    "pass budget exhausted, deferring the remainder to the next pass"
                );
                break;
            }
        }

        let membership: HashSet<&str> = upstream_ids.iter().map(String::as_str).collect();
        let upstream_size = membership.len();

        // Merge: one locked step, no upstream I/O from here on.
        let mut state = self.state.lock();

        // The latch trigger always sees the pre-pass cache size, so a
        // budget-truncated ingest cannot skew the ratio.
        let decision = state
            .guard
            .evaluate(Instant::now(), before_size, upstream_size);
        match decision {
            FlushDecision::Triggered => {
                state.in_sync = false;
                tracing::warn!(
                    before = before_size,
                    upstream = upstream_size,
                    "upstream pool shrank implausibly, holding deletions back"
                );
            }
            FlushDecision::Release => {
                tracing::info!("flush protection cooled down, deletions flow again");
            }
            FlushDecision::Proceed | FlushDecision::Suppress => {}
        }
        let suppress = matches!(decision, FlushDecision::Triggered | FlushDecision::Suppress);

        // An armed pass publishes nothing: whatever the ingest loop pulled
        // in is dropped again so the cache leaves the pass exactly as it
        // entered it. The dropped ids are still listed upstream and will be
        // refetched once deletions flow again.
        if suppress && !added.is_empty() {
            tracing::debug!(
                dropped = added.len(),
                "holding new arrivals back while the latch is armed"
            );
            added.clear();
        }

        if was_in_sync {
            let now_ms = unix_millis();
            for tx in &added {
                state.tracker.record(now_ms, tx.vsize);
            }
        }

        // Classification phase.
        let mut removed: Vec<Arc<TransactionExtended>> = Vec::new();
        let new_cache: MempoolSnapshot = if suppress {
            state.cache.clone()
        } else {
            let mut next = HashMap::with_capacity(state.cache.len() + added.len());
            for (txid, tx) in state.cache.iter() {
                if membership.contains(txid.as_str()) {
                    next.insert(txid.clone(), tx.clone());
                } else {
                    removed.push(tx.clone());
                }
            }
            for tx in &added {
                next.insert(tx.txid.clone(), tx.clone());
            }
            Arc::new(next)
        };

        if !added.is_empty() {
            let stripped: Vec<StrippedTransaction> =
                added.iter().map(|tx| (self.stripper)(tx)).collect();
            state.latest.push(stripped);
        }

        if !state.in_sync && upstream_size == new_cache.len() {
            state.in_sync = true;
            tracing::info!(size = new_cache.len(), "mempool is in sync with the upstream node");
        }

        // Publish phase: swap first, then tell the observer.
        let added_count = added.len();
        let removed_count = removed.len();
        state.cache = new_cache;
        if (added_count > 0 || removed_count > 0) && state.observer.is_set() {
            let update = MempoolUpdate {
                snapshot: state.cache.clone(),
                added,
                removed,
            };
            state.observer.notify(&update);
        }

        Ok(PassSummary {
            upstream_size,
            cache_size: state.cache.len(),
            added: added_count,
            removed: removed_count,
            truncated,
            in_sync: state.in_sync,
            elapsed: started.elapsed(),
        })
    }

    /// Current snapshot reference. Read-only until the next observer
    /// callback replaces it.
    pub fn snapshot(&self) -> MempoolSnapshot {
        self.state.lock().cache.clone()
    }

    /// Replaces the cache wholesale (rehydration at process start) and
    /// seeds the observer with an empty diff.
    pub fn set_snapshot(&self, cache: HashMap<Txid, Arc<TransactionExtended>>) {
        let mut state = self.state.lock();
        state.cache = Arc::new(cache);
        let update = MempoolUpdate {
            snapshot: state.cache.clone(),
            added: Vec::new(),
            removed: Vec::new(),
        };
        state.observer.notify(&update);
    }

    /// Registers the single observer, displacing any previous one, and
    /// immediately seeds it with an empty diff. That seeding call is the
    /// only empty-diff notification the observer will ever receive.
    pub fn set_observer(&self, observer: MempoolObserver) {
        let mut state = self.state.lock();
        state.observer.replace(observer);
        let update = MempoolUpdate {
            snapshot: state.cache.clone(),
            added: Vec::new(),
            removed: Vec::new(),
        };
        state.observer.notify(&update);
    }

    pub fn info(&self) -> MempoolInfo {
        self.state.lock().info
    }

    pub async fn refresh_info(&self) -> Result<MempoolInfo, UpstreamError> {
        let info = self.upstream.get_mempool_info().await?;
        self.state.lock().info = info;
        Ok(info)
    }

    pub fn rate(&self) -> MempoolRate {
        self.state.lock().tracker.current()
    }

    /// The once-per-second rate recomputation.
    pub fn tick_rates(&self) {
        self.state.lock().tracker.tick(unix_millis());
    }

    pub fn latest(&self) -> Vec<StrippedTransaction> {
        self.state.lock().latest.list()
    }

    /// Ingest timestamps for the given ids, in order; 0 for unknown ids.
    pub fn first_seen_of(&self, txids: &[Txid]) -> Vec<u64> {
        let state = self.state.lock();
        txids
            .iter()
            .map(|txid| state.cache.get(txid).map_or(0, |tx| tx.first_seen))
            .collect()
    }

    pub fn is_in_sync(&self) -> bool {
        self.state.lock().in_sync
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
