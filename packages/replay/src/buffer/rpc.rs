// packages/replay/src/buffer/rpc.rs
//! Minimal request/response client over message passing
//!
//! Requests carry a monotonically increasing id. Callers awaiting an answer
//! register a oneshot in the pending map; the serving side resolves it through
//! a [`Responder`]. Nothing here knows about compression, so the same client
//! drives any worker that speaks `{id, method, args}` / `{id, method, success,
//! response}`.

use crate::utils::errors::{ReplayError, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// Request sent to the serving side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest<M, A> {
    pub id: u64,
    pub method: M,
    pub args: A,
}

/// Answer to a request, matched by `id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse<M, R> {
    pub id: u64,
    pub method: M,
    pub success: bool,
    pub response: Option<R>,
    pub error: Option<String>,
}

impl<M, R> RpcResponse<M, R> {
    pub fn from_result(id: u64, method: M, result: Result<R>) -> Self {
        match result {
            Ok(response) => Self {
                id,
                method,
                success: true,
                response: Some(response),
                error: None,
            },
            Err(e) => Self {
                id,
                method,
                success: false,
                response: None,
                error: Some(e.to_string()),
            },
        }
    }
}

type PendingMap<M, R> = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse<M, R>>>>>;

/// Client half: allocates ids, sends requests, tracks pending calls
pub struct RpcClient<M, A, R> {
    next_id: AtomicU64,
    pending: PendingMap<M, R>,
    outbound: Sender<RpcRequest<M, A>>,
    timeout: Option<Duration>,
}

impl<M, A, R> RpcClient<M, A, R>
where
    M: fmt::Display + Clone + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    pub fn new(outbound: Sender<RpcRequest<M, A>>, timeout: Option<Duration>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound,
            timeout,
        }
    }

    /// Handle for the serving side to resolve pending calls
    pub fn responder(&self) -> Responder<M, R> {
        Responder {
            pending: Arc::clone(&self.pending),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request and register for its answer.
    ///
    /// The request is on the channel when this returns, so callers can swap
    /// local state before awaiting [`PendingCall::response`].
    pub fn request(&self, method: M, args: A) -> Result<PendingCall<M, R>> {
        let id = self.allocate_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = RpcRequest {
            id,
            method: method.clone(),
            args,
        };
        if self.outbound.send(request).is_err() {
            self.pending.lock().remove(&id);
            return Err(ReplayError::WorkerUnavailable(format!(
                "worker channel closed before `{}`",
                method
            )));
        }

        Ok(PendingCall {
            id,
            method,
            rx,
            pending: Arc::clone(&self.pending),
            timeout: self.timeout,
        })
    }

    /// Send a request without waiting for the answer
    pub fn post(&self, method: M, args: A) -> Result<()> {
        let id = self.allocate_id();
        let label = method.to_string();
        self.outbound
            .send(RpcRequest { id, method, args })
            .map_err(|_| ReplayError::WorkerUnavailable(format!("worker channel closed before `{}`", label)))
    }

    /// Number of calls still waiting for an answer
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// A request that has been sent and may be awaited
pub struct PendingCall<M, R> {
    id: u64,
    method: M,
    rx: oneshot::Receiver<RpcResponse<M, R>>,
    pending: PendingMap<M, R>,
    timeout: Option<Duration>,
}

impl<M: fmt::Display, R> PendingCall<M, R> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the answer, honoring the client timeout
    pub async fn response(self) -> Result<R> {
        let PendingCall {
            id,
            method,
            rx,
            pending,
            timeout,
        } = self;

        let answer = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(answer) => answer,
                Err(_) => {
                    pending.lock().remove(&id);
                    return Err(ReplayError::WorkerTimeout(limit));
                }
            },
            None => rx.await,
        };

        let answer = answer.map_err(|_| {
            ReplayError::WorkerUnavailable(format!("worker went away while answering `{}`", method))
        })?;

        if !answer.success {
            return Err(ReplayError::WorkerRequestFailed {
                method: method.to_string(),
                message: answer.error.unwrap_or_default(),
            });
        }

        answer.response.ok_or_else(|| ReplayError::WorkerRequestFailed {
            method: method.to_string(),
            message: "empty response".to_string(),
        })
    }
}

/// Serving half: resolves pending calls by id
///
/// Dropping the responder fails every call still pending, so a worker that
/// exits (or panics) never leaves a caller waiting forever.
pub struct Responder<M, R> {
    pending: PendingMap<M, R>,
}

impl<M: fmt::Display, R> Responder<M, R> {
    pub fn resolve(&self, response: RpcResponse<M, R>) {
        let waiter = self.pending.lock().remove(&response.id);
        match waiter {
            Some(tx) => {
                // receiver may have timed out already
                let _ = tx.send(response);
            }
            None if !response.success => {
                warn!(
                    "Worker request {} (`{}`) failed: {}",
                    response.id,
                    response.method,
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
            None => trace!("Dropping unsolicited response {}", response.id),
        }
    }
}

impl<M, R> Drop for Responder<M, R> {
    fn drop(&mut self) {
        self.pending.lock().clear();
    }
}
