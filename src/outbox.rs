//! Client-bound message queue.
//!
//! Router handlers must not write to the editor connection while a message
//! is being handled, so they enqueue here and a single worker task drains
//! the queue. The queue is bounded; producers wait when it is full.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::Connection;

/// Room for the messages one handler can produce before the worker catches
/// up. A tunable, not a protocol constant.
const OUTBOX_CAPACITY: usize = 32;

/// A notification or call destined for the editor.
#[derive(Debug)]
pub(crate) struct ClientBound {
    pub method: String,
    pub notification: bool,
    pub params: Value,
}

pub(crate) struct Outbox {
    tx: mpsc::Sender<ClientBound>,
    #[allow(dead_code)]
    worker: JoinHandle<()>,
}

impl Outbox {
    /// Spawn the drain worker against the editor connection. The worker runs
    /// until every producer handle is gone and the queue is empty.
    pub fn start(client: Connection) -> Self {
        let (tx, mut rx) = mpsc::channel::<ClientBound>(OUTBOX_CAPACITY);
        let worker = tokio::spawn(async move {
            tracing::debug!("outbox: worker started");
            while let Some(message) = rx.recv().await {
                deliver(&client, message).await;
            }
            tracing::debug!("outbox: worker finished");
        });
        Self { tx, worker }
    }

    /// Enqueue a client-bound message, waiting if the queue is full.
    pub async fn send(&self, message: ClientBound) {
        if self.tx.send(message).await.is_err() {
            tracing::warn!("outbox: worker gone, message dropped");
        }
    }
}

/// Editor failures are logged and swallowed; one unreachable editor write
/// must not take the worker down with it.
async fn deliver(client: &Connection, message: ClientBound) {
    if message.notification {
        if let Err(e) = client.notify(&message.method, Some(message.params)).await {
            tracing::warn!(method = %message.method, "outbox: notify failed: {e:#}");
        }
        return;
    }
    match client.call(&message.method, Some(message.params)).await {
        Ok(reply) => tracing::trace!(method = %message.method, ?reply, "outbox: call answered"),
        Err(e) => tracing::warn!(method = %message.method, "outbox: call failed: {e:#}"),
    }
}
