//! Language-server proxy for `.templ` templates.
//!
//! Sits between an editor and a Go language server. The editor edits
//! templates; the upstream only understands the generated Go. The proxy
//! mirrors every open template, regenerates the Go on each edit, and
//! translates URIs, positions, and payloads in both directions through a
//! source map, so each side sees a coherent world.

pub mod capabilities;
pub mod codec;
pub mod connection;
pub mod diagnostics;
pub mod documents;
pub mod engine;
pub mod protocol;
pub mod snippets;
pub mod sourcemap;
pub mod uri;

mod outbox;
mod proxy;

pub use proxy::Proxy;
