//! Proxy harness: a real proxy over in-memory duplex streams, with the
//! editor and the upstream played by the test.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

use templ_lsp::Proxy;
use templ_lsp::codec::{MessageReader, MessageWriter};
use templ_lsp::connection::Connection;

use super::stub::StubEngine;

const RECV_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// One fake peer end: raw framed JSON in and out.
pub struct Peer {
    reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: MessageWriter<WriteHalf<DuplexStream>>,
}

impl Peer {
    fn new(io: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(io);
        Self {
            reader: MessageReader::new(read),
            writer: MessageWriter::new(write),
        }
    }

    pub async fn send(&mut self, frame: Value) {
        self.writer.write(&frame).await.unwrap();
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.send(serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
        .await;
    }

    pub async fn request(&mut self, id: u64, method: &str, params: Value) {
        self.send(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await;
    }

    pub async fn respond(&mut self, id: Value, result: Value) {
        self.send(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
        .await;
    }

    /// Next frame from the proxy; panics if none arrives in time.
    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(RECV_TIMEOUT, self.reader.read())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .expect("stream closed while waiting for a frame")
    }
}

pub struct Harness {
    pub proxy: Arc<Proxy<StubEngine>>,
    pub editor: Peer,
    pub upstream: Peer,
}

impl Harness {
    /// Wire a proxy between two in-memory streams and start serving.
    pub fn start(engine: StubEngine) -> Self {
        let (editor_io, proxy_client_io) = tokio::io::duplex(1 << 20);
        let (upstream_io, proxy_upstream_io) = tokio::io::duplex(1 << 20);

        let (client_tx, client_rx) = mpsc::channel(64);
        let (client_read, client_write) = tokio::io::split(proxy_client_io);
        let client = Connection::spawn(client_read, client_write, client_tx);

        let (upstream_tx, upstream_rx) = mpsc::channel(64);
        let (upstream_read, upstream_write) = tokio::io::split(proxy_upstream_io);
        let upstream = Connection::spawn(upstream_read, upstream_write, upstream_tx);

        let proxy = Proxy::new(engine, client, upstream);
        proxy.serve(client_rx, upstream_rx);

        Self {
            proxy,
            editor: Peer::new(editor_io),
            upstream: Peer::new(upstream_io),
        }
    }

    /// Open a template and consume the two resulting frames: the rewritten
    /// didOpen on the upstream side and the diagnostic clear on the editor
    /// side.
    pub async fn open_template(&mut self, uri: &str, text: &str) {
        self.editor
            .notify(
                "textDocument/didOpen",
                serde_json::json!({
                    "textDocument": {
                        "uri": uri,
                        "languageId": "templ",
                        "version": 1,
                        "text": text,
                    }
                }),
            )
            .await;

        let forwarded = self.upstream.recv().await;
        assert_eq!(forwarded["method"], "textDocument/didOpen");
        let clear = self.editor.recv().await;
        assert_eq!(clear["method"], "textDocument/publishDiagnostics");
        assert!(clear["params"]["diagnostics"].as_array().unwrap().is_empty());
    }
}
