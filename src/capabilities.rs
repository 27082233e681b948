//! Adjustment of the upstream's `initialize` reply.
//!
//! The editor must see the proxy's surface, not the upstream's: snippet
//! trigger characters for template completions, no upstream commands, and
//! formatting handled locally.

use serde_json::Value;

use crate::protocol::InitializeResult;

/// Trigger characters served from the proxy's own snippet tables.
const SNIPPET_TRIGGERS: [&str; 2] = ["{", "<"];

pub fn apply(result: &mut InitializeResult) {
    let completion = result
        .capabilities
        .completion_provider
        .get_or_insert_with(Default::default);
    for trigger in SNIPPET_TRIGGERS {
        if !completion.trigger_characters.iter().any(|t| t == trigger) {
            completion.trigger_characters.push(trigger.to_string());
        }
    }

    let commands = result
        .capabilities
        .execute_command_provider
        .get_or_insert_with(Default::default);
    commands.commands.clear();

    result.capabilities.document_formatting_provider = Some(Value::Bool(true));
}
