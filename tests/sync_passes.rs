//! Reconciliation scenarios against a scripted in-memory upstream.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use mempool_mirror::{
    configuration::{FlushProtectionSettings, MempoolSettings},
    mempool_engine::{MempoolEngine, MempoolUpdate, Txid},
    supervisor::Supervisor,
    upstream_client::{MempoolInfo, MempoolUpstream, RawTransaction, UpstreamError},
};

/// Upstream double whose listing, transaction set, latency, and health are
/// all settable between passes.
struct ScriptedUpstream {
    listing: Mutex<Vec<Txid>>,
    txs: Mutex<HashMap<Txid, RawTransaction>>,
    fetch_delay: Mutex<Option<Duration>>,
    listing_down: Mutex<bool>,
}

impl ScriptedUpstream {
    fn new() -> Arc<ScriptedUpstream> {
        Arc::new(Self {
            listing: Mutex::new(Vec::new()),
            txs: Mutex::new(HashMap::new()),
            fetch_delay: Mutex::new(None),
            listing_down: Mutex::new(false),
        })
    }

    fn publish(&self, txid: &str, weight: u64, fee: Option<u64>) {
        self.txs.lock().insert(
            txid.to_owned(),
            RawTransaction {
                txid: txid.to_owned(),
                weight,
                fee,
                rest: serde_json::Map::new(),
            },
        );
    }

    fn list<S: AsRef<str>>(&self, txids: &[S]) {
        *self.listing.lock() = txids.iter().map(|id| id.as_ref().to_owned()).collect();
    }

    fn publish_and_list_many(&self, count: usize) -> Vec<String> {
        let ids: Vec<String> = (0..count).map(|i| format!("tx{i:05}")).collect();
        for id in &ids {
            self.publish(id, 400, Some(100));
        }
        self.list(&ids);
        ids
    }

    fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    fn set_listing_down(&self, down: bool) {
        *self.listing_down.lock() = down;
    }
}

#[async_trait]
impl MempoolUpstream for ScriptedUpstream {
    async fn list_pending_ids(&self) -> Result<Vec<Txid>, UpstreamError> {
        if *self.listing_down.lock() {
            return Err(UpstreamError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                endpoint: "mempool/txids".to_owned(),
            });
        }
        Ok(self.listing.lock().clone())
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Option<RawTransaction>, UpstreamError> {
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.txs.lock().get(txid).cloned())
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, UpstreamError> {
        let listing = self.listing.lock();
        Ok(MempoolInfo {
            size: listing.len() as u64,
            bytes: 0,
        })
    }
}

fn engine(upstream: Arc<ScriptedUpstream>, settings: &MempoolSettings) -> MempoolEngine {
    MempoolEngine::build(settings, upstream).expect("settings are valid")
}

fn collecting_observer(engine: &MempoolEngine) -> Arc<Mutex<Vec<MempoolUpdate>>> {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    engine.set_observer(Box::new(move |update| {
        sink.lock().push(update.clone());
    }));
    updates
}

fn added_txids(update: &MempoolUpdate) -> Vec<&str> {
    update.added.iter().map(|tx| tx.txid.as_str()).collect()
}

fn removed_txids(update: &MempoolUpdate) -> Vec<&str> {
    update.removed.iter().map(|tx| tx.txid.as_str()).collect()
}

#[tokio::test]
async fn cold_start_over_a_small_pool() {
    let upstream = ScriptedUpstream::new();
    upstream.publish("a", 400, Some(100));
    upstream.publish("b", 800, Some(200));
    upstream.publish("c", 1200, Some(600));
    upstream.list(&["a", "b", "c"]);

    let engine = engine(upstream, &MempoolSettings::default());
    let updates = collecting_observer(&engine);

    let summary = engine.run_once().await.expect("pass succeeds");
    assert_eq!(summary.added, 3);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.cache_size, 3);
    assert!(summary.in_sync);
    assert!(engine.is_in_sync());

    let snapshot = engine.snapshot();
    assert_eq!(snapshot["a"].vsize, 100.0);
    assert_eq!(snapshot["b"].vsize, 200.0);
    assert_eq!(snapshot["c"].vsize, 300.0);
    assert_eq!(snapshot["a"].fee_per_vsize, 1.0);
    assert_eq!(snapshot["b"].fee_per_vsize, 1.0);
    assert_eq!(snapshot["c"].fee_per_vsize, 2.0);

    let updates = updates.lock();
    // seeding callback plus the one pass
    assert_eq!(updates.len(), 2);
    assert!(updates[0].is_seed());
    assert_eq!(added_txids(&updates[1]), ["a", "b", "c"]);
    assert!(updates[1].removed.is_empty());

    // latest arrivals mirror the pass's additions in listing order
    let latest: Vec<String> = engine.latest().into_iter().map(|tx| tx.txid).collect();
    assert_eq!(latest, ["a", "b", "c"]);
}

#[tokio::test]
async fn steady_state_diff_adds_and_removes() {
    let upstream = ScriptedUpstream::new();
    upstream.publish("a", 400, Some(100));
    upstream.publish("b", 400, Some(100));
    upstream.publish("c", 400, Some(100));
    upstream.list(&["a", "b", "c"]);

    let engine = engine(upstream.clone(), &MempoolSettings::default());
    let updates = collecting_observer(&engine);
    engine.run_once().await.expect("first pass succeeds");

    upstream.publish("d", 400, Some(100));
    upstream.publish("e", 400, Some(100));
    upstream.list(&["b", "c", "d", "e"]);
    let summary = engine.run_once().await.expect("second pass succeeds");

    assert_eq!(summary.added, 2);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.cache_size, 4);
    assert!(summary.in_sync);

    let snapshot = engine.snapshot();
    let mut keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["b", "c", "d", "e"]);

    let updates = updates.lock();
    let last = updates.last().expect("diff notification sent");
    assert_eq!(added_txids(last), ["d", "e"]);
    assert_eq!(removed_txids(last), ["a"]);
}

#[tokio::test]
async fn additions_are_never_already_cached() {
    // Re-listing the same ids over and over must not re-add them.
    let upstream = ScriptedUpstream::new();
    upstream.publish("a", 400, Some(100));
    upstream.publish("b", 400, Some(100));
    upstream.list(&["a", "b"]);

    let engine = engine(upstream, &MempoolSettings::default());
    engine.run_once().await.expect("first pass succeeds");
    let summary = engine.run_once().await.expect("second pass succeeds");
    assert_eq!(summary.added, 0);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.cache_size, 2);
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_trips_the_pass_budget() {
    let upstream = ScriptedUpstream::new();
    upstream.publish_and_list_many(300);
    upstream.set_fetch_delay(Duration::from_millis(5));

    // 50 ms refresh rate -> 500 ms budget -> ~100 fetches per pass at 5 ms.
    let settings = MempoolSettings {
        refresh_rate_ms: 50,
        ..MempoolSettings::default()
    };
    let engine = engine(upstream, &settings);

    let summary = engine.run_once().await.expect("pass succeeds");
    assert!(summary.truncated);
    assert!(summary.added < 300);
    assert!(summary.added > 0);
    assert_eq!(summary.cache_size, summary.added);
    assert!(!summary.in_sync);

    // Later passes drain the remainder and the mirror catches up.
    let mut passes = 1;
    while !engine.is_in_sync() {
        engine.run_once().await.expect("drain pass succeeds");
        passes += 1;
        assert!(passes < 10, "mirror failed to catch up");
    }
    assert_eq!(engine.snapshot().len(), 300);
}

#[tokio::test(start_paused = true)]
async fn flush_protection_holds_the_cache_through_an_upstream_restart() {
    let upstream = ScriptedUpstream::new();
    let ids = upstream.publish_and_list_many(300);

    let settings = MempoolSettings {
        flush_protection: FlushProtectionSettings {
            min_before_size: 100,
            ratio_threshold: 0.80,
            cooldown_ms: 120_000,
        },
        ..MempoolSettings::default()
    };
    let engine = engine(upstream.clone(), &settings);
    let updates = collecting_observer(&engine);
    engine.run_once().await.expect("initial pass succeeds");
    assert!(engine.is_in_sync());

    // The node "restarts" and briefly reports a tiny pool that still
    // carries one genuinely new transaction.
    upstream.publish("fresh", 400, Some(100));
    let mut restart_listing: Vec<String> = ids[..10].to_vec();
    restart_listing.push("fresh".to_owned());
    upstream.list(&restart_listing);

    let summary = engine.run_once().await.expect("armed pass succeeds");
    assert_eq!(summary.added, 0);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.cache_size, 300);
    assert!(!summary.in_sync);
    // The armed pass published nothing, not even the new arrival.
    assert!(!engine.snapshot().contains_key("fresh"));
    assert!(engine.latest().iter().all(|tx| tx.txid != "fresh"));

    // Still armed on the following pass; the cache is untouched.
    let summary = engine.run_once().await.expect("suppressed pass succeeds");
    assert_eq!(summary.added, 0);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.cache_size, 300);
    // No diff was published while deletions were held back.
    assert_eq!(updates.lock().len(), 2);

    // Once the cooldown elapses the deletions flow and the held-back
    // arrival is refetched and merged.
    tokio::time::advance(Duration::from_secs(121)).await;
    let summary = engine.run_once().await.expect("release pass succeeds");
    assert_eq!(summary.added, 1);
    assert_eq!(summary.removed, 290);
    assert_eq!(summary.cache_size, 11);
    assert!(summary.in_sync);
    assert!(engine.snapshot().contains_key("fresh"));

    let updates = updates.lock();
    let last = updates.last().expect("release notification sent");
    assert_eq!(added_txids(last), ["fresh"]);
    assert_eq!(last.removed.len(), 290);
}

#[tokio::test]
async fn transaction_evicted_between_listing_and_fetch_is_skipped() {
    let upstream = ScriptedUpstream::new();
    upstream.publish("a", 400, Some(100));
    // "b" is listed but already gone by the time it is fetched.
    upstream.list(&["a", "b"]);

    let engine = engine(upstream.clone(), &MempoolSettings::default());
    let summary = engine.run_once().await.expect("pass succeeds");
    assert_eq!(summary.added, 1);
    assert_eq!(summary.cache_size, 1);
    assert_eq!(summary.upstream_size, 2);
    assert!(!summary.in_sync);

    upstream.list(&["a"]);
    let summary = engine.run_once().await.expect("pass succeeds");
    assert!(summary.in_sync);
}

#[tokio::test]
async fn failed_listing_aborts_the_pass_without_touching_state() {
    let upstream = ScriptedUpstream::new();
    upstream.publish("a", 400, Some(100));
    upstream.list(&["a"]);

    let engine = engine(upstream.clone(), &MempoolSettings::default());
    engine.run_once().await.expect("healthy pass succeeds");
    assert!(engine.is_in_sync());

    upstream.set_listing_down(true);
    let error = engine.run_once().await.expect_err("pass aborts");
    assert!(matches!(error, UpstreamError::Status { .. }));
    assert_eq!(engine.snapshot().len(), 1);
    assert!(engine.is_in_sync());
}

#[tokio::test(start_paused = true)]
async fn supervisor_fans_updates_out_to_subscribers() {
    let upstream = ScriptedUpstream::new();
    upstream.publish("a", 400, Some(100));
    upstream.list(&["a"]);

    let settings = MempoolSettings::default();
    let engine = Arc::new(MempoolEngine::build(&settings, upstream).expect("settings are valid"));
    let supervisor = Supervisor::build(engine, &settings, Arc::new(AtomicBool::new(false)));

    let updates = supervisor.subscribe();
    let kill_signal = supervisor.shutdown_handle();
    let running = tokio::spawn(supervisor.run());

    let mut received = Vec::new();
    while received.len() < 2 {
        match updates.try_recv() {
            Ok(update) => received.push(update),
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }

    assert!(received[0].is_seed());
    assert_eq!(added_txids(&received[1]), ["a"]);

    kill_signal.store(true, std::sync::atomic::Ordering::Relaxed);
    running.await.expect("supervisor shuts down cleanly");
}
