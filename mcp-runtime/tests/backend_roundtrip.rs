use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use treasury_mcp_runtime::{McpServer, Mode, RuntimeConfig};

async fn process_payment(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let payment = headers
        .get("x-payment")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "xPayment": payment,
        "contentType": content_type,
        "received": body
    }))
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route(
            "/api/status",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
        )
        .route("/api/payments/process", post(process_payment));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn server_for(base_url: &str) -> McpServer {
    McpServer::new(&RuntimeConfig {
        mode: Mode::Core,
        base_url_override: Some(base_url.to_string()),
        ..RuntimeConfig::default()
    })
    .unwrap()
}

async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let responses = server
        .handle_incoming_message(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }))
        .await;
    responses[0]["result"].clone()
}

fn envelope(result: &Value) -> Value {
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn health_check_round_trips_through_a_real_http_server() {
    let base_url = spawn_backend().await;
    let server = server_for(&base_url);

    let result = call_tool(&server, "health_check", json!({})).await;
    assert_eq!(
        envelope(&result),
        json!({
            "url": format!("{base_url}/health"),
            "status": 200,
            "data": { "status": "ok" }
        })
    );
}

#[tokio::test]
async fn payment_is_reshaped_and_credential_forwarded() {
    let base_url = spawn_backend().await;
    let server = server_for(&base_url);

    let result = call_tool(
        &server,
        "process_payment",
        json!({
            "xPayment": "x402-abc",
            "customerName": "Ada Lovelace",
            "customerEmail": "ada@example.com",
            "country": "GB",
            "amount": 19.99,
            "description": "Analytical engine parts"
        }),
    )
    .await;

    let data = &envelope(&result)["data"];
    assert_eq!(data["xPayment"], "x402-abc");
    assert_eq!(data["contentType"], "application/json");
    assert_eq!(
        data["received"],
        json!({
            "customer": { "name": "Ada Lovelace", "email": "ada@example.com" },
            "address": { "country": "GB" },
            "payment": { "amount": 1999, "currency": "USD", "description": "Analytical engine parts" }
        })
    );
}

#[tokio::test]
async fn server_errors_and_text_bodies_pass_through() {
    let base_url = spawn_backend().await;
    let server = server_for(&base_url);

    let result = call_tool(&server, "get_system_status", json!({})).await;
    assert!(result.get("isError").is_none());
    let envelope = envelope(&result);
    assert_eq!(envelope["status"], 500);
    assert_eq!(envelope["data"], "upstream down");
}

#[tokio::test]
async fn unreachable_backend_is_an_error_result() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server = server_for(&format!("http://{addr}"));
    let result = call_tool(&server, "health_check", json!({})).await;

    assert_eq!(result["isError"], json!(true));
    assert_eq!(envelope(&result)["error"], "transport_error");
}
