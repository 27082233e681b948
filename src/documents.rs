//! In-memory mirror of open template documents.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::protocol::{ContentChange, Position, Range};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unknown document {uri}")]
    Unknown { uri: String },
    #[error("range out of range: {0:?}")]
    RangeOutOfRange(Range),
}

/// URI → current template text, guarded by a single mutex.
#[derive(Default)]
pub struct DocumentStore {
    contents: Mutex<HashMap<String, String>>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored text for `uri`.
    pub fn set(&self, uri: &str, text: impl Into<String>) {
        self.lock().insert(uri.to_string(), text.into());
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<String> {
        self.lock().get(uri).cloned()
    }

    pub fn delete(&self, uri: &str) {
        self.lock().remove(uri);
    }

    /// Apply an ordered list of content changes and return the resulting
    /// text. Later changes see the effect of earlier ones. Ranges are editor
    /// coordinates (zero-based line and character) addressing the current
    /// template text.
    pub fn apply(&self, uri: &str, changes: &[ContentChange]) -> Result<String, DocumentError> {
        let mut contents = self.lock();
        let text = contents.get_mut(uri).ok_or_else(|| DocumentError::Unknown {
            uri: uri.to_string(),
        })?;
        for change in changes {
            match change.range {
                None => *text = change.text.clone(),
                Some(range) => {
                    let start = offset_at(text, range.start);
                    let end = offset_at(text, range.end);
                    let (Some(start), Some(end)) = (start, end) else {
                        return Err(DocumentError::RangeOutOfRange(range));
                    };
                    if start > end {
                        return Err(DocumentError::RangeOutOfRange(range));
                    }
                    text.replace_range(start..end, &change.text);
                }
            }
        }
        Ok(text.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Byte offset of an editor position, counting characters in Unicode scalar
/// values. `None` when the position does not exist in `text`.
fn offset_at(text: &str, position: Position) -> Option<usize> {
    let mut offset = 0;
    for _ in 0..position.line {
        offset += text[offset..].find('\n')? + 1;
    }
    let line_end = text[offset..]
        .find('\n')
        .map_or(text.len(), |i| offset + i);
    let line = &text[offset..line_end];
    let mut remaining = position.character as usize;
    for (index, _) in line.char_indices() {
        if remaining == 0 {
            return Some(offset + index);
        }
        remaining -= 1;
    }
    (remaining == 0).then_some(line_end)
}
