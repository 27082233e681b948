//! JSON-RPC 2.0 peer connection.
//!
//! Wraps one framed byte stream in each direction. Outgoing frames funnel
//! through a writer task so concurrent handlers never interleave bytes.
//! Incoming frames are split by shape: replies resolve pending [`call`]s
//! through a correlation map, requests and notifications are handed to the
//! connection's owner over an mpsc channel.
//!
//! [`call`]: Connection::call

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Result, bail};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::codec::{MessageReader, MessageWriter};

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// An incoming request or notification, already stripped of framing.
#[derive(Debug, Clone)]
pub enum Inbound {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl Inbound {
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => method,
        }
    }
}

/// The `result`/`error` halves of a reply. A well-behaved peer sets exactly
/// one; the proxy forwards whichever arrived.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl Reply {
    #[must_use]
    pub fn result(value: Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }
}

type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// One side of the proxy: either the editor client or the upstream server.
/// Cheap to clone; all clones share the same wire.
#[derive(Clone)]
pub struct Connection {
    writer_tx: mpsc::Sender<Value>,
    pending: PendingCalls,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Spawn the reader and writer tasks for a peer. Requests and
    /// notifications from the peer are delivered to `inbound` in arrival
    /// order; replies resolve the matching [`Connection::call`].
    pub fn spawn<R, W>(reader: R, writer: W, inbound: mpsc::Sender<Inbound>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (writer_tx, mut writer_rx) = mpsc::channel::<Value>(WRITER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut output = MessageWriter::new(writer);
            while let Some(frame) = writer_rx.recv().await {
                if let Err(e) = output.write(&frame).await {
                    tracing::warn!("connection: write failed: {e:#}");
                    break;
                }
            }
        });

        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader_pending = pending.clone();
        let reader_closed = closed.clone();
        tokio::spawn(async move {
            let mut input = MessageReader::new(reader);
            loop {
                match input.read().await {
                    Ok(Some(frame)) => route(frame, &reader_pending, &inbound).await,
                    Ok(None) => {
                        tracing::debug!("connection: peer closed the stream");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("connection: read failed: {e:#}");
                        break;
                    }
                }
            }
            // Flag first, then wake every in-flight call with a closed
            // channel; `call` re-checks the flag after registering.
            reader_closed.store(true, Ordering::SeqCst);
            reader_pending.lock().await.clear();
        });

        Self {
            writer_tx,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            closed,
        }
    }

    /// Send a request and wait for the peer's reply.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().await.remove(&id);
            bail!("connection closed");
        }

        let frame = frame(method, Some(Value::from(id)), params);
        if self.writer_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            bail!("connection closed");
        }
        match rx.await {
            Ok(reply) => Ok(reply),
            Err(_) => bail!("connection closed before a reply to {method} arrived"),
        }
    }

    /// Send a notification.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self
            .writer_tx
            .send(frame(method, None, params))
            .await
            .is_err()
        {
            bail!("connection closed");
        }
        Ok(())
    }

    /// Answer a request previously received from this peer.
    pub async fn respond(&self, id: Value, reply: Reply) -> Result<()> {
        let mut body = serde_json::Map::new();
        body.insert("jsonrpc".to_string(), Value::from("2.0"));
        body.insert("id".to_string(), id);
        match reply.error {
            Some(error) => body.insert("error".to_string(), error),
            None => body.insert(
                "result".to_string(),
                reply.result.unwrap_or(Value::Null),
            ),
        };
        if self.writer_tx.send(Value::Object(body)).await.is_err() {
            bail!("connection closed");
        }
        Ok(())
    }
}

fn frame(method: &str, id: Option<Value>, params: Option<Value>) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("jsonrpc".to_string(), Value::from("2.0"));
    if let Some(id) = id {
        body.insert("id".to_string(), id);
    }
    body.insert("method".to_string(), Value::from(method));
    if let Some(params) = params {
        body.insert("params".to_string(), params);
    }
    Value::Object(body)
}

async fn route(frame: Value, pending: &PendingCalls, inbound: &mpsc::Sender<Inbound>) {
    let id = frame.get("id").cloned();
    let method = frame
        .get("method")
        .and_then(Value::as_str)
        .map(String::from);
    let message = match (id, method) {
        (Some(id), None) => {
            let Some(key) = id.as_u64() else {
                tracing::debug!("connection: reply with non-numeric id {id}");
                return;
            };
            let Some(waiter) = pending.lock().await.remove(&key) else {
                tracing::debug!("connection: reply for unknown call {key}");
                return;
            };
            let _ = waiter.send(Reply {
                result: frame.get("result").cloned(),
                error: frame.get("error").cloned(),
            });
            return;
        }
        (Some(id), Some(method)) => Inbound::Request {
            id,
            method,
            params: frame.get("params").cloned(),
        },
        (None, Some(method)) => Inbound::Notification {
            method,
            params: frame.get("params").cloned(),
        },
        (None, None) => {
            tracing::trace!("connection: discarding malformed frame");
            return;
        }
    };
    // A full channel applies backpressure to the peer by stalling the reader.
    let _ = inbound.send(message).await;
}
