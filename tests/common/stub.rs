//! Stub template engine with scripted parse/generate behavior.

use std::collections::HashMap;
use std::sync::Mutex;

use templ_lsp::engine::{ParseError, SourceMap, TemplateAst, TemplateEngine, TemplatePosition};

/// A source map backed by two literal lookup tables.
#[derive(Debug, Clone, Default)]
pub struct StubMap {
    pub label: &'static str,
    forward: HashMap<(u32, u32), (u32, u32)>,
    reverse: HashMap<(u32, u32), (u32, u32)>,
}

impl StubMap {
    pub fn labeled(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    /// Add a template → generated mapping.
    pub fn forward(mut self, from: (u32, u32), to: (u32, u32)) -> Self {
        self.forward.insert(from, to);
        self
    }

    /// Add a generated → template mapping.
    pub fn reverse(mut self, from: (u32, u32), to: (u32, u32)) -> Self {
        self.reverse.insert(from, to);
        self
    }
}

impl SourceMap for StubMap {
    fn target_from_source(&self, line: u32, col: u32) -> Option<TemplatePosition> {
        self.forward
            .get(&(line, col))
            .map(|&(line, col)| TemplatePosition::new(line, col))
    }

    fn source_from_target(&self, line: u32, col: u32) -> Option<TemplatePosition> {
        self.reverse
            .get(&(line, col))
            .map(|&(line, col)| TemplatePosition::new(line, col))
    }
}

pub struct StubAst {
    formatted: String,
}

impl TemplateAst for StubAst {
    fn write(&self, out: &mut String) -> anyhow::Result<()> {
        out.push_str(&self.formatted);
        Ok(())
    }
}

/// Engine whose outputs are fixed up front. `fail_parses_with` flips every
/// subsequent parse into the given error until cleared.
pub struct StubEngine {
    generated: String,
    formatted: String,
    map: StubMap,
    parse_error: Mutex<Option<ParseError>>,
}

impl StubEngine {
    pub fn new(generated: &str, formatted: &str, map: StubMap) -> Self {
        Self {
            generated: generated.to_string(),
            formatted: formatted.to_string(),
            map,
            parse_error: Mutex::new(None),
        }
    }

    pub fn fail_parses_with(&self, message: &str, from: (u32, u32), to: (u32, u32)) {
        *self.parse_error.lock().unwrap() = Some(ParseError {
            message: message.to_string(),
            from: TemplatePosition::new(from.0, from.1),
            to: TemplatePosition::new(to.0, to.1),
        });
    }
}

impl TemplateEngine for StubEngine {
    type Ast = StubAst;
    type Map = StubMap;

    fn parse(&self, _text: &str) -> Result<StubAst, ParseError> {
        if let Some(err) = self.parse_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(StubAst {
            formatted: self.formatted.clone(),
        })
    }

    fn generate(&self, _ast: &StubAst, out: &mut String) -> anyhow::Result<StubMap> {
        out.push_str(&self.generated);
        Ok(self.map.clone())
    }
}
