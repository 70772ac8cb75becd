//! Pending-request table for the provider
//!
//! # Request Lifecycle
//!
//! 1. **Generate ID**: time-seeded, strictly increasing per manager
//! 2. **Register**: create a oneshot channel for the response
//! 3. **Send**: the provider writes the frame to the connection
//! 4. **Wait**: the caller awaits the receiver, bounded by the request timeout
//! 5. **Complete**: a response with the same id resolves the channel
//!
//! Completion runs inside the connection's event listener, so the table sits
//! behind a synchronous mutex that is never held across an await.
//!
//! Ids start at `now_ms * 1000 + rand(0..1000)` so two clients started in the
//! same millisecond rarely collide, and every subsequent id is the previous
//! plus one.

use relaykit_core::{Error, Id, JsonRpcResponse, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

type Pending = HashMap<Id, oneshot::Sender<Result<JsonRpcResponse>>>;

/// Tracks requests awaiting a response
#[derive(Clone)]
pub struct RequestManager {
    pending: Arc<Mutex<Pending>>,
    counter: Arc<AtomicI64>,
}

fn seed_id() -> i64 {
    use rand::Rng;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    now_ms * 1000 + rand::thread_rng().gen_range(0..1000)
}

impl RequestManager {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(AtomicI64::new(seed_id())),
        }
    }

    fn table(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Next request id
    pub fn next_id(&self) -> Id {
        Id::Number(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a pending request
    pub fn register(&self, id: Id) -> oneshot::Receiver<Result<JsonRpcResponse>> {
        let (tx, rx) = oneshot::channel();
        self.table().insert(id, tx);
        rx
    }

    /// Resolve the request with `response.id`
    ///
    /// Returns `false` when nothing was waiting for that id.
    pub fn complete(&self, response: JsonRpcResponse) -> bool {
        match self.table().remove(&response.id) {
            Some(tx) => {
                let _ = tx.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Drop a request without resolving it (timeout or failed send)
    pub fn remove(&self, id: &Id) {
        self.table().remove(id);
    }

    /// Fail every pending request with `error`
    pub fn fail_all(&self, error: Error) -> usize {
        let drained: Vec<_> = self.table().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.table().len()
    }
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new()
    }
}
