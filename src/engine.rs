//! Parser/generator contract consumed by the proxy.
//!
//! The template parser and the template → Go generator live outside this
//! crate. The proxy needs exactly three operations from them: parse a
//! template, generate Go code (yielding a source map), and write the
//! canonical form of a parsed template back out. [`TemplateEngine`] bundles
//! them behind associated types so the proxy can be driven by stub
//! implementations in tests.

use thiserror::Error;

/// A position in template or generated text: one-based line, zero-based
/// column. Editor-facing positions are zero-based on both axes; the
/// conversions live with the code that crosses that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplatePosition {
    pub line: u32,
    pub col: u32,
}

impl TemplatePosition {
    #[must_use]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Failure reported by the template parser.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub from: TemplatePosition,
    pub to: TemplatePosition,
}

/// Bidirectional position mapping between a template and its generated file.
///
/// Both queries return `None` when nothing is mapped at the given position;
/// callers leave the position unchanged in that case.
pub trait SourceMap: Send + Sync + 'static {
    /// Generated-file position for a template position.
    fn target_from_source(&self, line: u32, col: u32) -> Option<TemplatePosition>;
    /// Template position for a generated-file position.
    fn source_from_target(&self, line: u32, col: u32) -> Option<TemplatePosition>;
}

/// A parsed template.
pub trait TemplateAst: Send + Sync {
    /// Write the canonical re-serialization of the template. Used for
    /// formatting.
    fn write(&self, out: &mut String) -> anyhow::Result<()>;
}

/// The parse and generate operations the proxy delegates to.
pub trait TemplateEngine: Send + Sync + 'static {
    type Ast: TemplateAst;
    type Map: SourceMap;

    fn parse(&self, text: &str) -> Result<Self::Ast, ParseError>;

    /// Generate Go code for `ast` into `out`, returning the source map
    /// relating the template to the generated text.
    fn generate(&self, ast: &Self::Ast, out: &mut String) -> anyhow::Result<Self::Map>;
}
