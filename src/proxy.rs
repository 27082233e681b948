//! The message router.
//!
//! Every JSON-RPC message from the editor and from the upstream server
//! passes through here. Template notifications are mirrored into the
//! document store, regenerated into Go, and forwarded under the generated
//! URI; replies and upstream diagnostics are translated back into template
//! coordinates through the cached source map. Everything else passes
//! through untouched.

use std::sync::Arc;

use crate::engine::SourceMap;
use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capabilities;
use crate::connection::{Connection, Inbound, Reply};
use crate::diagnostics;
use crate::documents::DocumentStore;
use crate::engine::{ParseError, TemplateAst, TemplateEngine};
use crate::outbox::{ClientBound, Outbox};
use crate::protocol::{
    CompletionList, CompletionParams, DidChangeParams, DidOpenParams, ContentChange,
    InitializeResult, Position, PublishDiagnosticsParams, Range, ShowMessageParams, TextDocumentParams,
    TextEdit,
};
use crate::snippets;
use crate::sourcemap::SourceMapCache;
use crate::uri;

const METHOD_PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

/// Upstream chatter about editing generated files; meaningless to someone
/// editing the template.
const GENERATED_FILE_WARNING: &str = "Do not edit this file!";

/// What to do with a client notification after rewriting.
enum Forward {
    Send(Option<Value>),
    Skip,
}

pub struct Proxy<E: TemplateEngine> {
    engine: E,
    documents: DocumentStore,
    source_maps: SourceMapCache<E::Map>,
    outbox: Outbox,
    client: Connection,
    upstream: Connection,
}

impl<E: TemplateEngine> Proxy<E> {
    /// Build the router and start its outbox worker. `client` is the editor
    /// connection, `upstream` the Go language server.
    pub fn new(engine: E, client: Connection, upstream: Connection) -> Arc<Self> {
        let outbox = Outbox::start(client.clone());
        Arc::new(Self {
            engine,
            documents: DocumentStore::new(),
            source_maps: SourceMapCache::new(),
            outbox,
            client,
            upstream,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The open-template mirror. Exposed for inspection (debug surfaces,
    /// tests).
    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// The per-template source maps from the last successful generation.
    #[must_use]
    pub fn source_maps(&self) -> &SourceMapCache<E::Map> {
        &self.source_maps
    }

    /// Drive both message pumps until the connections close.
    ///
    /// Notifications are handled in arrival order so the open → change →
    /// close sequence of a document can never reorder; requests run as their
    /// own tasks because they block on the peer's reply.
    pub fn serve(
        self: &Arc<Self>,
        mut client_rx: mpsc::Receiver<Inbound>,
        mut upstream_rx: mpsc::Receiver<Inbound>,
    ) -> JoinHandle<()> {
        let proxy = self.clone();
        let from_client = tokio::spawn(async move {
            while let Some(message) = client_rx.recv().await {
                match message {
                    Inbound::Request { .. } => {
                        let proxy = proxy.clone();
                        tokio::spawn(async move { proxy.handle_client(message).await });
                    }
                    Inbound::Notification { .. } => proxy.handle_client(message).await,
                }
            }
        });

        let proxy = self.clone();
        let from_upstream = tokio::spawn(async move {
            while let Some(message) = upstream_rx.recv().await {
                match message {
                    Inbound::Request { .. } => {
                        let proxy = proxy.clone();
                        tokio::spawn(async move { proxy.handle_upstream(message).await });
                    }
                    Inbound::Notification { .. } => proxy.handle_upstream(message).await,
                }
            }
        });

        tokio::spawn(async move {
            let _ = from_client.await;
            let _ = from_upstream.await;
        })
    }

    // ── Editor → upstream ──────────────────────────────────────────────

    pub async fn handle_client(&self, message: Inbound) {
        match message {
            Inbound::Notification { method, params } => {
                self.client_notification(&method, params).await;
            }
            Inbound::Request { id, method, params } => match method.as_str() {
                "initialize" => self.initialize(id, params).await,
                "textDocument/completion" => self.completion(id, params).await,
                "textDocument/formatting" => self.formatting(id, params).await,
                _ => self.forward_request(id, &method, params).await,
            },
        }
    }

    async fn client_notification(&self, method: &str, params: Option<Value>) {
        tracing::debug!(%method, "client -> upstream: notification");
        let rewritten = match method {
            "textDocument/didOpen" => self.did_open(params).await,
            "textDocument/didChange" => self.did_change(params).await,
            "textDocument/didSave" => self.did_save(params),
            "textDocument/didClose" => self.did_close(params),
            _ => Ok(Forward::Send(params)),
        };
        match rewritten {
            Ok(Forward::Send(params)) => {
                if let Err(e) = self.upstream.notify(method, params).await {
                    tracing::warn!(%method, "client -> upstream: forward failed: {e:#}");
                }
            }
            Ok(Forward::Skip) => {}
            Err(e) => tracing::warn!(%method, "client -> upstream: dropping notification: {e:#}"),
        }
    }

    async fn did_open(&self, params: Option<Value>) -> Result<Forward> {
        let raw = params.context("missing params")?;
        let mut p: DidOpenParams =
            serde_json::from_value(raw.clone()).context("malformed didOpen params")?;
        if !uri::is_template(&p.text_document.uri) {
            return Ok(Forward::Send(Some(raw)));
        }

        self.documents
            .set(&p.text_document.uri, p.text_document.text.as_str());

        let ast = match self.engine.parse(&p.text_document.text) {
            Ok(ast) => ast,
            Err(parse_err) => {
                self.report_parse_failure(&p.text_document.uri, &parse_err)
                    .await;
                return Ok(Forward::Skip);
            }
        };
        self.clear_diagnostics(&p.text_document.uri).await;

        let mut generated = String::new();
        let map = self
            .engine
            .generate(&ast, &mut generated)
            .context("generating Go for the opened template")?;
        self.source_maps.set(&p.text_document.uri, Arc::new(map));

        p.text_document.text = generated;
        p.text_document.uri = uri::to_generated(&p.text_document.uri);
        let raw = serde_json::to_value(&p).context("reserializing didOpen params")?;
        Ok(Forward::Send(Some(raw)))
    }

    async fn did_change(&self, params: Option<Value>) -> Result<Forward> {
        let raw = params.context("missing params")?;
        let mut p: DidChangeParams =
            serde_json::from_value(raw.clone()).context("malformed didChange params")?;
        if !uri::is_template(&p.text_document.uri) {
            return Ok(Forward::Send(Some(raw)));
        }

        let text = self
            .documents
            .apply(&p.text_document.uri, &p.content_changes)
            .context("applying content changes")?;

        // On a parse failure the source map stays at its last good state and
        // the upstream keeps its last good view of the generated file.
        let ast = match self.engine.parse(&text) {
            Ok(ast) => ast,
            Err(parse_err) => {
                self.report_parse_failure(&p.text_document.uri, &parse_err)
                    .await;
                return Ok(Forward::Skip);
            }
        };
        self.clear_diagnostics(&p.text_document.uri).await;

        let mut generated = String::new();
        let map = self
            .engine
            .generate(&ast, &mut generated)
            .context("regenerating Go for the changed template")?;
        self.source_maps.set(&p.text_document.uri, Arc::new(map));

        p.content_changes = vec![ContentChange::full(generated)];
        p.text_document.uri = uri::to_generated(&p.text_document.uri);
        let raw = serde_json::to_value(&p).context("reserializing didChange params")?;
        Ok(Forward::Send(Some(raw)))
    }

    fn did_save(&self, params: Option<Value>) -> Result<Forward> {
        let raw = params.context("missing params")?;
        let mut p: TextDocumentParams =
            serde_json::from_value(raw.clone()).context("malformed didSave params")?;
        if !uri::is_template(&p.text_document.uri) {
            return Ok(Forward::Send(Some(raw)));
        }
        // The upstream re-reads its own buffer for the generated file.
        p.text_document.uri = uri::to_generated(&p.text_document.uri);
        let raw = serde_json::to_value(&p).context("reserializing didSave params")?;
        Ok(Forward::Send(Some(raw)))
    }

    fn did_close(&self, params: Option<Value>) -> Result<Forward> {
        let raw = params.context("missing params")?;
        let mut p: TextDocumentParams =
            serde_json::from_value(raw.clone()).context("malformed didClose params")?;
        if !uri::is_template(&p.text_document.uri) {
            return Ok(Forward::Send(Some(raw)));
        }
        self.documents.delete(&p.text_document.uri);
        self.source_maps.delete(&p.text_document.uri);
        // Have the upstream drop the generated file from its cache too.
        p.text_document.uri = uri::to_generated(&p.text_document.uri);
        let raw = serde_json::to_value(&p).context("reserializing didClose params")?;
        Ok(Forward::Send(Some(raw)))
    }

    async fn initialize(&self, id: Value, params: Option<Value>) {
        let mut result = match self.upstream.call("initialize", params).await {
            Ok(reply) => {
                if let Some(error) = &reply.error {
                    tracing::warn!("initialize: upstream returned an error: {error}");
                }
                reply
                    .result
                    .and_then(|value| match serde_json::from_value::<InitializeResult>(value) {
                        Ok(result) => Some(result),
                        Err(e) => {
                            tracing::warn!("initialize: undecodable upstream reply: {e}");
                            None
                        }
                    })
                    .unwrap_or_default()
            }
            Err(e) => {
                tracing::warn!("initialize: upstream call failed: {e:#}");
                InitializeResult::default()
            }
        };
        capabilities::apply(&mut result);
        self.respond_with(id, &result).await;
    }

    async fn completion(&self, id: Value, params: Option<Value>) {
        let decoded = params.and_then(|value| {
            match serde_json::from_value::<CompletionParams>(value) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("completion: malformed params: {e}");
                    None
                }
            }
        });
        let Some(mut p) = decoded else {
            self.respond_with(id, &CompletionList::default()).await;
            return;
        };

        let trigger = p
            .context
            .as_ref()
            .and_then(|context| context.trigger_character.as_deref());
        let list = match trigger {
            Some("<") => snippets::html(),
            Some("{") => snippets::template(),
            _ => self.delegate_completion(&mut p).await,
        };
        self.respond_with(id, &list).await;
    }

    async fn delegate_completion(&self, p: &mut CompletionParams) -> CompletionList {
        self.rewrite_completion_params(p);
        let params = serde_json::to_value(&*p).ok();
        let mut list = match self.upstream.call("textDocument/completion", params).await {
            Ok(reply) => {
                if let Some(error) = &reply.error {
                    tracing::warn!("completion: upstream returned an error: {error}");
                }
                reply
                    .result
                    .and_then(|value| serde_json::from_value(value).ok())
                    .unwrap_or_default()
            }
            Err(e) => {
                tracing::warn!("completion: upstream call failed: {e:#}");
                CompletionList::default()
            }
        };
        self.rewrite_completion_reply(&p.text_document.uri, &mut list);
        list
    }

    /// Move the completion position into the generated file. Without a
    /// source map (no didOpen yet) the request goes out as it came in.
    fn rewrite_completion_params(&self, p: &mut CompletionParams) {
        if !uri::is_template(&p.text_document.uri) {
            return;
        }
        let Some(map) = self.source_maps.get(&p.text_document.uri) else {
            tracing::warn!(
                uri = %p.text_document.uri,
                "completion: no source map; has didOpen been delivered?"
            );
            return;
        };
        if let Some(target) = map.target_from_source(p.position.line + 1, p.position.character) {
            p.position = Position {
                line: target.line - 1,
                character: target.col.saturating_sub(1),
            };
        }
        p.text_document.uri = uri::to_generated(&p.text_document.uri);
    }

    /// Pull each item's text edit back into template coordinates.
    fn rewrite_completion_reply(&self, generated_uri: &str, list: &mut CompletionList) {
        let template_uri = uri::to_template(generated_uri);
        let Some(map) = self.source_maps.get(&template_uri) else {
            tracing::warn!(
                uri = %template_uri,
                "completion: no source map for the reply; has didOpen been delivered?"
            );
            return;
        };
        for item in &mut list.items {
            let Some(edit) = item.text_edit.as_mut() else {
                continue;
            };
            let range = &mut edit.range;
            if let Some(start) = map.source_from_target(range.start.line + 1, range.start.character)
            {
                range.start = diagnostics::template_to_client(start);
            }
            if let Some(end) = map.source_from_target(range.end.line + 1, range.end.character) {
                range.end = diagnostics::template_to_client(end);
            }
        }
    }

    async fn formatting(&self, id: Value, params: Option<Value>) {
        let decoded = params.and_then(|value| {
            match serde_json::from_value::<TextDocumentParams>(value) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("formatting: malformed params: {e}");
                    None
                }
            }
        });
        let edits = match decoded {
            Some(p) => self.format_document(&p.text_document.uri).await,
            None => Vec::new(),
        };
        self.respond_with(id, &edits).await;
    }

    /// Formatting never touches the upstream: parse the mirrored template
    /// and replace the whole document with its canonical form.
    async fn format_document(&self, uri: &str) -> Vec<TextEdit> {
        let text = self.documents.get(uri).unwrap_or_default();
        let newline_count = text.bytes().filter(|b| *b == b'\n').count() as u32;

        let ast = match self.engine.parse(&text) {
            Ok(ast) => ast,
            Err(parse_err) => {
                self.report_parse_failure(uri, &parse_err).await;
                return Vec::new();
            }
        };
        self.clear_diagnostics(uri).await;

        let mut formatted = String::new();
        if let Err(e) = ast.write(&mut formatted) {
            tracing::warn!("formatting: template write failed: {e:#}");
            return Vec::new();
        }
        vec![TextEdit {
            range: Range {
                start: Position::default(),
                end: Position::new(newline_count + 1, 0),
            },
            new_text: formatted,
        }]
    }

    async fn forward_request(&self, id: Value, method: &str, params: Option<Value>) {
        tracing::debug!(%method, "client -> upstream: request");
        let reply = match self.upstream.call(method, params).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(%method, "client -> upstream: call failed: {e:#}");
                Reply::default()
            }
        };
        if let Err(e) = self.client.respond(id, reply).await {
            tracing::warn!(%method, "upstream -> client: reply failed: {e:#}");
        }
    }

    // ── Upstream → editor ──────────────────────────────────────────────

    pub async fn handle_upstream(&self, message: Inbound) {
        match message {
            Inbound::Notification { method, params } => {
                self.upstream_notification(&method, params).await;
            }
            Inbound::Request { id, method, params } => {
                self.relay_upstream_request(id, &method, params).await;
            }
        }
    }

    async fn upstream_notification(&self, method: &str, params: Option<Value>) {
        tracing::debug!(%method, "upstream -> client: notification");
        let params = match method {
            "window/showMessage" if Self::is_generated_file_warning(params.as_ref()) => {
                tracing::debug!("upstream -> client: suppressed generated-file warning");
                return;
            }
            METHOD_PUBLISH_DIAGNOSTICS => match self.rewrite_upstream_diagnostics(params) {
                Ok(params) => params,
                Err(e) => {
                    tracing::warn!("upstream -> client: dropping diagnostics: {e:#}");
                    return;
                }
            },
            _ => params,
        };
        if let Err(e) = self.client.notify(method, params).await {
            tracing::warn!(%method, "upstream -> client: forward failed: {e:#}");
        }
    }

    fn is_generated_file_warning(params: Option<&Value>) -> bool {
        let Some(value) = params else {
            return false;
        };
        match serde_json::from_value::<ShowMessageParams>(value.clone()) {
            Ok(p) => p.message.starts_with(GENERATED_FILE_WARNING),
            Err(_) => false,
        }
    }

    fn rewrite_upstream_diagnostics(&self, params: Option<Value>) -> Result<Option<Value>> {
        let raw = params.context("missing params")?;
        let mut p: PublishDiagnosticsParams =
            serde_json::from_value(raw).context("malformed publishDiagnostics params")?;

        let template_uri = uri::to_template(&p.uri);
        let map = self.source_maps.get(&template_uri).with_context(|| {
            format!("no source map for {template_uri}; has didOpen been delivered?")
        })?;
        p.uri = template_uri;
        diagnostics::rewrite_from_generated(&mut p, map.as_ref());

        let raw = serde_json::to_value(&p).context("reserializing publishDiagnostics params")?;
        Ok(Some(raw))
    }

    /// A call originated by the upstream: relay it to the editor and hand
    /// the editor's answer back.
    async fn relay_upstream_request(&self, id: Value, method: &str, params: Option<Value>) {
        tracing::debug!(%method, "upstream -> client: request");
        let reply = match self.client.call(method, params).await {
            Ok(reply) => Reply::result(reply.result.unwrap_or(Value::Null)),
            Err(e) => {
                tracing::warn!(%method, "upstream -> client: call failed: {e:#}");
                Reply::default()
            }
        };
        if let Err(e) = self.upstream.respond(id, reply).await {
            tracing::warn!(%method, "client -> upstream: reply failed: {e:#}");
        }
    }

    // ── Outbox helpers ─────────────────────────────────────────────────

    async fn report_parse_failure(&self, uri: &str, err: &ParseError) {
        self.publish(diagnostics::parse_failure(uri, err)).await;
    }

    async fn clear_diagnostics(&self, uri: &str) {
        self.publish(diagnostics::clear(uri)).await;
    }

    async fn publish(&self, params: PublishDiagnosticsParams) {
        match serde_json::to_value(&params) {
            Ok(value) => {
                self.outbox
                    .send(ClientBound {
                        method: METHOD_PUBLISH_DIAGNOSTICS.to_string(),
                        notification: true,
                        params: value,
                    })
                    .await;
            }
            Err(e) => tracing::warn!("diagnostics: unserializable payload: {e}"),
        }
    }

    async fn respond_with<T: serde::Serialize>(&self, id: Value, result: &T) {
        let value = serde_json::to_value(result).unwrap_or_else(|e| {
            tracing::warn!("reply payload failed to serialize: {e}");
            Value::Null
        });
        if let Err(e) = self.client.respond(id, Reply::result(value)).await {
            tracing::warn!("client reply failed: {e:#}");
        }
    }
}
