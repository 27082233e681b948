//! The initialize handshake and the capability filter.

use crate::common::{Harness, StubEngine, StubMap};

#[tokio::test]
async fn initialize_reply_is_filtered_before_reaching_the_editor() {
    let engine = StubEngine::new("HOST", "FMT", StubMap::labeled("M"));
    let mut h = Harness::start(engine);

    h.editor
        .request(
            1,
            "initialize",
            serde_json::json!({
                "processId": 1234,
                "rootUri": "file:///workspace",
                "capabilities": {},
            }),
        )
        .await;

    let delegated = h.upstream.recv().await;
    assert_eq!(delegated["method"], "initialize");
    assert_eq!(delegated["params"]["rootUri"], "file:///workspace");

    h.upstream
        .respond(
            delegated["id"].clone(),
            serde_json::json!({
                "capabilities": {
                    "hoverProvider": true,
                    "completionProvider": { "triggerCharacters": ["."] },
                    "executeCommandProvider": { "commands": ["gopls.tidy"] },
                    "documentFormattingProvider": false,
                }
            }),
        )
        .await;

    let reply = h.editor.recv().await;
    assert_eq!(reply["id"], 1);
    let capabilities = &reply["result"]["capabilities"];
    assert_eq!(
        capabilities["completionProvider"]["triggerCharacters"],
        serde_json::json!([".", "{", "<"])
    );
    assert_eq!(
        capabilities["executeCommandProvider"]["commands"],
        serde_json::json!([])
    );
    assert_eq!(capabilities["documentFormattingProvider"], true);
    // Capabilities the proxy does not touch survive.
    assert_eq!(capabilities["hoverProvider"], true);
}

#[tokio::test]
async fn initialize_with_a_bare_upstream_still_advertises_the_proxy_surface() {
    let engine = StubEngine::new("HOST", "FMT", StubMap::labeled("M"));
    let mut h = Harness::start(engine);

    h.editor
        .request(1, "initialize", serde_json::json!({"capabilities": {}}))
        .await;

    let delegated = h.upstream.recv().await;
    h.upstream
        .respond(delegated["id"].clone(), serde_json::json!({"capabilities": {}}))
        .await;

    let reply = h.editor.recv().await;
    let capabilities = &reply["result"]["capabilities"];
    assert_eq!(
        capabilities["completionProvider"]["triggerCharacters"],
        serde_json::json!(["{", "<"])
    );
    assert_eq!(capabilities["documentFormattingProvider"], true);
}
