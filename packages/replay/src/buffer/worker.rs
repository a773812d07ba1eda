// packages/replay/src/buffer/worker.rs
//! Background compression worker
//!
//! A dedicated thread owns a [`StreamCompressor`] and serves three methods:
//! `init` resets the stream, `addEvent` appends one serialized event and
//! `finish` closes the stream, returns the bytes and starts a new one. The
//! worker keeps no session state; it exits when its request channel closes.

use crate::buffer::compressor::{CompressionLevel, StreamCompressor};
use crate::buffer::rpc::{RpcClient, RpcRequest, RpcResponse, Responder};
use crate::utils::errors::{ReplayError, Result};
use bytes::Bytes;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Methods understood by the compression worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerMethod {
    Init,
    AddEvent,
    Finish,
}

impl fmt::Display for WorkerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerMethod::Init => "init",
            WorkerMethod::AddEvent => "addEvent",
            WorkerMethod::Finish => "finish",
        };
        f.write_str(name)
    }
}

/// Client type used to talk to the worker; `args` is one serialized event
pub type WorkerClient = RpcClient<WorkerMethod, Option<String>, Bytes>;

type WorkerRequest = RpcRequest<WorkerMethod, Option<String>>;

/// Handle to a running compression worker
pub struct CompressionWorker {
    client: WorkerClient,
    handle: Option<JoinHandle<()>>,
}

impl CompressionWorker {
    /// Start the worker thread
    pub fn spawn(level: CompressionLevel, request_timeout: Option<Duration>) -> Result<Self> {
        let compressor = StreamCompressor::new(level)?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let client = RpcClient::new(tx, request_timeout);
        let responder = client.responder();

        let handle = thread::Builder::new()
            .name("replay-compressor".to_string())
            .spawn(move || serve(compressor, rx, responder))
            .map_err(|e| ReplayError::WorkerUnavailable(format!("Failed to spawn worker thread: {}", e)))?;

        info!("Compression worker started (level {:?})", level);

        Ok(Self {
            client,
            handle: Some(handle),
        })
    }

    pub fn client(&self) -> &WorkerClient {
        &self.client
    }
}

impl Drop for CompressionWorker {
    fn drop(&mut self) {
        // The request channel closes with the client; the thread exits on its own.
        if self.handle.take().is_some() {
            debug!("Compression worker detached");
        }
    }
}

fn serve(mut compressor: StreamCompressor, requests: Receiver<WorkerRequest>, responder: Responder<WorkerMethod, Bytes>) {
    while let Ok(RpcRequest { id, method, args }) = requests.recv() {
        let result = match method {
            WorkerMethod::Init => compressor.reset().map(|_| Bytes::new()),
            WorkerMethod::AddEvent => match args {
                Some(record) => compressor.add_record(&record).map(|_| Bytes::new()),
                None => Err(ReplayError::CompressionFailed("addEvent without an event".to_string())),
            },
            WorkerMethod::Finish => compressor.finish().map(Bytes::from),
        };
        responder.resolve(RpcResponse::from_result(id, method, result));
    }
    debug!("Compression worker exiting");
}
