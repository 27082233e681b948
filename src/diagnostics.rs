//! Template-space diagnostics.
//!
//! Two jobs: build the locally produced parse-failure and clear payloads,
//! and rewrite upstream diagnostics from generated-file coordinates back
//! into template coordinates.

use serde_json::Map;

use crate::engine::{ParseError, SourceMap, TemplatePosition};
use crate::protocol::{Diagnostic, Position, PublishDiagnosticsParams, Range};

/// LSP DiagnosticSeverity.Error.
const SEVERITY_ERROR: u32 = 1;
/// Source tag on locally produced diagnostics.
const DIAGNOSTIC_SOURCE: &str = "templ";

/// Convert a template position (one-based line, zero-based column) to editor
/// coordinates.
// TODO: the emitted character is col + 1, which lands range ends one column
// right of the mapped position; reconcile with the col = character rule used
// when reading editor positions.
pub(crate) fn template_to_client(position: TemplatePosition) -> Position {
    Position {
        line: position.line - 1,
        character: position.col + 1,
    }
}

/// Diagnostics payload for a template that failed to parse.
#[must_use]
pub fn parse_failure(uri: &str, err: &ParseError) -> PublishDiagnosticsParams {
    PublishDiagnosticsParams {
        uri: uri.to_string(),
        diagnostics: vec![Diagnostic {
            range: Range {
                start: template_to_client(err.from),
                end: template_to_client(err.to),
            },
            severity: Some(SEVERITY_ERROR),
            code: None,
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: err.message.clone(),
            rest: Map::new(),
        }],
        rest: Map::new(),
    }
}

/// Payload clearing every diagnostic for `uri`.
#[must_use]
pub fn clear(uri: &str) -> PublishDiagnosticsParams {
    PublishDiagnosticsParams {
        uri: uri.to_string(),
        diagnostics: Vec::new(),
        rest: Map::new(),
    }
}

/// Rewrite upstream diagnostic ranges into template coordinates in place.
/// Positions with no mapping stay as they are. Range starts keep the mapped
/// column as the character; ends go through [`template_to_client`].
pub fn rewrite_from_generated(params: &mut PublishDiagnosticsParams, map: &impl SourceMap) {
    for diagnostic in &mut params.diagnostics {
        let range = &mut diagnostic.range;
        if let Some(start) = map.source_from_target(range.start.line + 1, range.start.character) {
            range.start = Position {
                line: start.line - 1,
                character: start.col,
            };
        }
        if let Some(end) = map.source_from_target(range.end.line + 1, range.end.character) {
            range.end = template_to_client(end);
        }
    }
}
