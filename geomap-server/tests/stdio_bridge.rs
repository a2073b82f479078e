//! Stdio Bridge Integration Tests
//!
//! Runs the bridge over in-memory pipes and checks the framing:
//! - One response line per request, in request order
//! - Notifications precede the response of the request that caused them
//! - Unparsable lines get a -32700 response with a null id

use geomap_server::{handle_line, run_stdio, ServerConfig};
use geomap_rpc::MapRpcServer;
use proptest::prelude::*;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Feed `input` lines to a bridge and collect every output frame.
async fn run(input: &[String]) -> Vec<Value> {
    let (client, server) = tokio::io::duplex(256 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let config = ServerConfig::default();
    let bridge =
        tokio::spawn(async move { run_stdio(&config, server_read, server_write).await });

    let (mut client_read, mut client_write) = tokio::io::split(client);
    for line in input {
        client_write
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("should write request");
    }
    client_write.shutdown().await.expect("should close input");

    let mut output = String::new();
    client_read
        .read_to_string(&mut output)
        .await
        .expect("should read output");
    bridge
        .await
        .expect("bridge task should finish")
        .expect("bridge should exit cleanly");

    output
        .lines()
        .map(|line| serde_json::from_str(line).expect("every frame should be JSON"))
        .collect()
}

fn request(id: u64, method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string()
}

// ============================================================================
// Framing
// ============================================================================

#[tokio::test]
async fn test_responses_follow_request_order() {
    let frames = run(&[
        request(1, "initialize", Value::Null),
        request(2, "map/describe", Value::Null),
        request(3, "map/unknown", Value::Null),
    ])
    .await;

    let ids: Vec<Value> = frames.iter().map(|f| f["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(frames[1]["result"]["id"], "map");
    assert_eq!(frames[2]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_parse_error_line() {
    let frames = run(&["this is not json".to_string()]).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], Value::Null);
    assert_eq!(frames[0]["error"]["code"], -32700);
}

#[tokio::test]
async fn test_events_precede_response() {
    let frames = run(&[
        request(1, "map/create", json!({"options": {"events": ["zoomend"]}})),
        request(
            2,
            "map/call",
            json!({"targetId": "map", "methodName": "setZoom", "arguments": "[5]"}),
        ),
    ])
    .await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["id"], 1);
    assert_eq!(frames[1]["method"], "map/event");
    assert_eq!(frames[1]["params"]["event"]["event"], "zoomend");
    assert!(frames[1].get("id").is_none());
    assert_eq!(frames[2]["id"], 2);
}

#[tokio::test]
async fn test_readiness_announced_once() {
    let frames = run(&[
        request(1, "initialize", Value::Null),
        request(2, "map/update", Value::Null),
        request(3, "map/ready", Value::Null),
        request(4, "map/ready", Value::Null),
    ])
    .await;

    let ready: Vec<&Value> = frames
        .iter()
        .filter(|f| f["params"]["event"]["event"] == "ready")
        .collect();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0]["params"]["session"], "default");
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn prop_any_line_gets_at_most_one_response(line in "\\PC{0,64}") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("should build runtime");
        let server = MapRpcServer::default();
        let response = runtime.block_on(handle_line(&server, &line));

        match response {
            None => prop_assert!(
                line.trim().is_empty()
                    || serde_json::from_str::<Value>(line.trim())
                        .map(|v| v.get("id").is_none())
                        .unwrap_or(false)
            ),
            Some(response) => prop_assert!(response.result.is_some() || response.error.is_some()),
        }
    }
}
