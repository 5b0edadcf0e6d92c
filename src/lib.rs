pub mod configuration;
pub mod mempool_engine;
pub mod upstream_client;
pub mod supervisor;
pub mod startup;
pub mod telemetry;
pub mod error_fmt;
