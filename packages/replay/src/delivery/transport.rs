// packages/replay/src/delivery/transport.rs
//! Transport and exception-capture seams supplied by the host

use crate::delivery::envelope::ReplayEnvelope;
use crate::utils::errors::{ReplayError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, info};

/// Sends an envelope to the backend
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: &ReplayEnvelope) -> Result<()>;
}

/// Receives errors the pipeline gives up on
pub trait ExceptionCapture: Send + Sync {
    fn capture_exception(&self, error: &ReplayError);
}

/// Writes each envelope to `<dir>/<replay_id>-<segment_id>.envelope`
pub struct DirectoryTransport {
    dir: PathBuf,
}

impl DirectoryTransport {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReplayError::TransportFailure(format!("Failed to create {:?}: {}", dir, e)))?;

        info!("Writing replay envelopes to {:?}", dir);
        Ok(Self { dir })
    }

    pub fn path_for(&self, envelope: &ReplayEnvelope) -> PathBuf {
        self.dir
            .join(format!("{}-{}.envelope", envelope.replay_id(), envelope.segment_id))
    }
}

#[async_trait]
impl Transport for DirectoryTransport {
    async fn send(&self, envelope: &ReplayEnvelope) -> Result<()> {
        let bytes = envelope.to_bytes()?;
        let path = self.path_for(envelope);

        fs::write(&path, &bytes)
            .await
            .map_err(|e| ReplayError::TransportFailure(format!("Failed to write {:?}: {}", path, e)))?;

        debug!("Wrote segment {} ({} bytes) to {:?}", envelope.segment_id, bytes.len(), path);
        Ok(())
    }
}

/// Reports captured exceptions through `tracing`
#[derive(Debug, Default)]
pub struct TracingCapture;

impl ExceptionCapture for TracingCapture {
    fn capture_exception(&self, err: &ReplayError) {
        error!("Captured exception: {}", err);
    }
}
