//! Completion: snippet triggers answered locally, everything else
//! translated through the source map and delegated.

use crate::common::{Harness, StubEngine, StubMap};

#[tokio::test]
async fn open_angle_trigger_answers_html_snippets_without_the_upstream() {
    let engine = StubEngine::new("HOST", "FMT", StubMap::labeled("M"));
    let mut h = Harness::start(engine);

    h.editor
        .request(
            1,
            "textDocument/completion",
            serde_json::json!({
                "textDocument": { "uri": "file:///a/b.templ" },
                "position": { "line": 0, "character": 1 },
                "context": { "triggerKind": 2, "triggerCharacter": "<" },
            }),
        )
        .await;

    let reply = h.editor.recv().await;
    assert_eq!(reply["id"], 1);
    let items = reply["result"]["items"].as_array().unwrap();
    let expected = templ_lsp::snippets::html();
    assert_eq!(items.len(), expected.items.len());
    for (item, expected) in items.iter().zip(&expected.items) {
        assert_eq!(item["label"], expected.label.as_str());
        assert_eq!(item["insertTextFormat"], 2);
    }

    // The upstream saw nothing: the sentinel is its first frame.
    h.editor
        .request(2, "shutdown", serde_json::json!(null))
        .await;
    assert_eq!(h.upstream.recv().await["method"], "shutdown");
}

#[tokio::test]
async fn open_brace_trigger_answers_template_snippets() {
    let engine = StubEngine::new("HOST", "FMT", StubMap::labeled("M"));
    let mut h = Harness::start(engine);

    h.editor
        .request(
            1,
            "textDocument/completion",
            serde_json::json!({
                "textDocument": { "uri": "file:///a/b.templ" },
                "position": { "line": 0, "character": 1 },
                "context": { "triggerKind": 2, "triggerCharacter": "{" },
            }),
        )
        .await;

    let reply = h.editor.recv().await;
    let items = reply["result"]["items"].as_array().unwrap();
    let expected = templ_lsp::snippets::template();
    assert_eq!(items.len(), expected.items.len());
    assert_eq!(items[0]["label"], expected.items[0].label.as_str());
}

#[tokio::test]
async fn other_triggers_delegate_with_translated_position_and_uri() {
    let map = StubMap::labeled("M")
        .forward((5, 2), (10, 7))
        .reverse((11, 7), (5, 2))
        .reverse((11, 8), (5, 3));
    let engine = StubEngine::new("HOST", "FMT", map);
    let mut h = Harness::start(engine);
    h.open_template("file:///a/b.templ", "hi").await;

    h.editor
        .request(
            2,
            "textDocument/completion",
            serde_json::json!({
                "textDocument": { "uri": "file:///a/b.templ" },
                "position": { "line": 4, "character": 2 },
                "context": { "triggerKind": 2, "triggerCharacter": "." },
            }),
        )
        .await;

    let delegated = h.upstream.recv().await;
    assert_eq!(delegated["method"], "textDocument/completion");
    assert_eq!(
        delegated["params"]["textDocument"]["uri"],
        "file:///a/b_templ.go"
    );
    assert_eq!(delegated["params"]["position"]["line"], 9);
    assert_eq!(delegated["params"]["position"]["character"], 6);

    h.upstream
        .respond(
            delegated["id"].clone(),
            serde_json::json!({
                "isIncomplete": false,
                "items": [{
                    "label": "Name",
                    "textEdit": {
                        "range": {
                            "start": { "line": 10, "character": 7 },
                            "end": { "line": 10, "character": 8 },
                        },
                        "newText": "Name",
                    },
                }],
            }),
        )
        .await;

    let reply = h.editor.recv().await;
    assert_eq!(reply["id"], 2);
    let edit = &reply["result"]["items"][0]["textEdit"];
    assert_eq!(edit["range"]["start"]["line"], 4);
    assert_eq!(edit["range"]["start"]["character"], 3);
    assert_eq!(edit["range"]["end"]["line"], 4);
    assert_eq!(edit["range"]["end"]["character"], 4);
    assert_eq!(edit["newText"], "Name");
}

#[tokio::test]
async fn completion_without_a_source_map_goes_out_unrewritten() {
    let engine = StubEngine::new("HOST", "FMT", StubMap::labeled("M"));
    let mut h = Harness::start(engine);
    // No didOpen: no source map exists yet.

    h.editor
        .request(
            3,
            "textDocument/completion",
            serde_json::json!({
                "textDocument": { "uri": "file:///a/b.templ" },
                "position": { "line": 4, "character": 2 },
            }),
        )
        .await;

    let delegated = h.upstream.recv().await;
    assert_eq!(
        delegated["params"]["textDocument"]["uri"],
        "file:///a/b.templ"
    );
    assert_eq!(delegated["params"]["position"]["line"], 4);
    assert_eq!(delegated["params"]["position"]["character"], 2);

    h.upstream
        .respond(
            delegated["id"].clone(),
            serde_json::json!({ "isIncomplete": false, "items": [] }),
        )
        .await;
    let reply = h.editor.recv().await;
    assert!(reply["result"]["items"].as_array().unwrap().is_empty());
}
