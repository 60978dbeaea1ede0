use std::{net::SocketAddr, path::PathBuf};

use thiserror::Error;

/// Failures while bringing up or running process-level infrastructure.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured")]
    MissingDatabaseUrl,
    #[error("could not connect to the database")]
    Connect(#[source] sqlx::Error),
    #[error("database migrations failed")]
    Migrate(#[source] sqlx::Error),
    #[error("could not open storage root `{}`", root.display())]
    StorageRoot {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server stopped unexpectedly")]
    Serve(#[source] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}
