use crossbeam_channel::Receiver;
use std::sync::{atomic::AtomicBool, Arc};

use crate::{
    configuration::Settings,
    mempool_engine::{MempoolEngine, MempoolUpdate},
    supervisor::Supervisor,
    upstream_client::EsploraClient,
};

pub struct Application {
    supervisor: Supervisor,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let kill_signal = Arc::new(AtomicBool::new(false));
        let supervisor = build_supervisor(&configuration, kill_signal)?;
        Ok(Self { supervisor })
    }

    /// Update stream for downstream consumers (websocket broadcaster,
    /// block indexer, HTTP API). Subscribe before running.
    pub fn subscribe(&self) -> Receiver<MempoolUpdate> {
        self.supervisor.subscribe()
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.supervisor.shutdown_handle()
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        self.supervisor.run().await;
        Ok(())
    }
}

pub fn build_supervisor(
    configuration: &Settings,
    kill_signal: Arc<AtomicBool>,
) -> Result<Supervisor, anyhow::Error> {
    tracing::info!(
        network = %configuration.application.network,
        upstream = %configuration.upstream.base_url,
        "building the mempool mirror"
    );
    let upstream = EsploraClient::build(&configuration.upstream)?;
    let engine = Arc::new(MempoolEngine::build(
        &configuration.mempool,
        Arc::new(upstream),
    )?);
    Ok(Supervisor::build(engine, &configuration.mempool, kill_signal))
}
