use crossbeam_channel::{Receiver, Sender};
use futures_util::future::join_all;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    configuration::MempoolSettings,
    mempool_engine::{MempoolEngine, MempoolUpdate},
};

/// Paired endpoints of one broadcast stream.
#[derive(Clone)]
pub struct Channels<T> {
    pub send: Sender<T>,
    pub listen: Receiver<T>,
}

impl<T> Channels<T> {
    pub fn unbounded() -> Channels<T> {
        let (send, listen) = crossbeam_channel::unbounded();
        Self { send, listen }
    }
}

/// Drives the engine: reconciliation passes at the configured cadence and
/// the rate tick once per second, until the kill signal is raised. The
/// engine's single observer slot is wired into an update channel here, so
/// any number of downstream consumers can subscribe without the engine
/// knowing about them.
pub struct Supervisor {
    engine: Arc<MempoolEngine>,
    refresh_rate: Duration,
    kill_signal: Arc<AtomicBool>,
    updates: Channels<MempoolUpdate>,
}

impl Supervisor {
    pub fn build(
        engine: Arc<MempoolEngine>,
        settings: &MempoolSettings,
        kill_signal: Arc<AtomicBool>,
    ) -> Supervisor {
        let updates = Channels::unbounded();
        let send = updates.send.clone();
        engine.set_observer(Box::new(move |update| {
            if send.send(update.clone()).is_err() {
                tracing::error!("every mempool update receiver has been dropped");
            }
        }));
        Self {
            engine,
            refresh_rate: settings.refresh_rate(),
            kill_signal,
            updates,
        }
    }

    /// A receiver over all future updates, starting with the seeding one
    /// emitted while the observer was wired up.
    pub fn subscribe(&self) -> Receiver<MempoolUpdate> {
        self.updates.listen.clone()
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.kill_signal.clone()
    }

    pub async fn run(self) {
        let mut tasks = vec![];

        let pass_engine = self.engine.clone();
        let pass_kill = self.kill_signal.clone();
        let refresh_rate = self.refresh_rate;
        let passes = tokio::spawn(async move {
            tracing::info!("starting the mempool reconciliation loop");
            loop {
                if pass_kill.load(Ordering::Relaxed) {
                    tracing::info!("stopping the mempool reconciliation loop");
                    return;
                }
                if let Err(e) = pass_engine.refresh_info().await {
                    tracing::warn!("failed to refresh the mempool summary: {:?}", e);
                }
                match pass_engine.run_once().await {
                    Ok(summary) => tracing::debug!(
                        added = summary.added,
                        removed = summary.removed,
                        cache = summary.cache_size,
                        in_sync = summary.in_sync,
                        truncated = summary.truncated,
                        elapsed_ms = summary.elapsed.as_millis() as u64,
                        "mempool pass finished"
                    ),
                    Err(e) => tracing::warn!("mempool pass aborted, retrying next cadence: {:?}", e),
                }
                tokio::time::sleep(refresh_rate).await;
            }
        });
        tasks.push(passes);

        let tick_engine = self.engine.clone();
        let tick_kill = self.kill_signal.clone();
        let ticks = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                if tick_kill.load(Ordering::Relaxed) {
                    tracing::info!("stopping the rate tick");
                    return;
                }
                interval.tick().await;
                tick_engine.tick_rates();
            }
        });
        tasks.push(ticks);

        for joined in join_all(tasks).await {
            if let Err(e) = joined {
                tracing::error!("supervisor task ended abnormally: {:?}", e);
            }
        }
    }
}
