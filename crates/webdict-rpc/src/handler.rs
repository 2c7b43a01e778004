//! JSON-RPC request handlers.
//!
//! The RPC methods are the SRU operations: `explain`, `scan` and
//! `searchRetrieve`. Their params object carries the SRU parameters under
//! their protocol names (`scanClause`, `maximumRecords`, `x-dataview`, ...).

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};
use webdict_core::config::DiagnosticCodes;
use webdict_core::{CollectingDiagnostics, IndexStore, SruEndpoint, SruParams};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Map an SRU diagnostic code to a JSON-RPC error code.
pub fn to_rpc_error_code(diagnostic: u32) -> i32 {
    match diagnostic {
        DiagnosticCodes::UNSUPPORTED_OPERATION => -32601,
        DiagnosticCodes::QUERY_SYNTAX_ERROR | DiagnosticCodes::UNSUPPORTED_INDEX => -32602,
        _ => -32000,
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = request.method.clone();
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    // Store access is synchronous
    let call_method = method.clone();
    let result = tokio::task::spawn_blocking(move || {
        dispatch_method(&state.endpoint, &call_method, params)
    })
    .await
    .unwrap_or_else(|e| Err(JsonRpcError::new(-32603, format!("Internal error: {}", e))));

    match result {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            error!("RPC error for {}: {}", method, e.message);
            (StatusCode::OK, Json(JsonRpcResponse::failure(id, e)))
        }
    }
}

/// Run one SRU operation and render its result model.
fn dispatch_method<S: IndexStore>(
    endpoint: &SruEndpoint<S>,
    method: &str,
    params: Value,
) -> Result<Value, JsonRpcError> {
    if !matches!(method, "explain" | "scan" | "searchRetrieve") {
        return Err(JsonRpcError::new(
            -32601,
            format!("Method not found: {}", method),
        ));
    }

    let mut sru: SruParams = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(-32602, format!("Invalid params: {}", e)))?;
    sru.operation = method.to_string();

    let mut diagnostics = CollectingDiagnostics::new();
    match endpoint.process_request(&sru, &mut diagnostics) {
        Some(response) => serde_json::to_value(response)
            .map_err(|e| JsonRpcError::new(-32603, format!("Internal error: {}", e))),
        None => {
            let (code, message) = diagnostics
                .first()
                .map(|d| (d.code, d.message.clone()))
                .unwrap_or((DiagnosticCodes::GENERAL_SYSTEM_ERROR, "Request failed".to_string()));
            Err(JsonRpcError {
                code: to_rpc_error_code(code),
                message,
                data: Some(json!({ "diagnostics": diagnostics.reports })),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rusqlite::Connection;
    use tower::ServiceExt;
    use webdict_core::{EndpointConfig, IndexDescriptor, SqliteStore};

    fn create_endpoint() -> SruEndpoint<SqliteStore> {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE dict (id INTEGER PRIMARY KEY, entry TEXT, lemma TEXT);
             CREATE TABLE dict_ndx (id INTEGER, xpath TEXT, txt TEXT);
             INSERT INTO dict VALUES (1, '<teiHeader><fileDesc><titleStmt><title>Test</title></titleStmt></fileDesc></teiHeader>', NULL);
             INSERT INTO dict VALUES (10, '<entry>Apple</entry>', 'Apple');
             INSERT INTO dict VALUES (11, '<entry>Banana</entry>', 'Banana');
             INSERT INTO dict_ndx VALUES (10, '-entry-form-orth-', 'Apple');
             INSERT INTO dict_ndx VALUES (11, '-entry-form-orth-', 'Banana');",
        )
        .unwrap();
        let config = EndpointConfig {
            table: "dict".to_string(),
            public_name: "test".to_string(),
            indices: vec![IndexDescriptor {
                name: "lemma".to_string(),
                xpath: "-form-orth-".to_string(),
                search: true,
                scan: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        SruEndpoint::new(SqliteStore::from_connection(conn).unwrap(), config)
    }

    async fn call(body: Value) -> Value {
        let app = build_router(Arc::new(AppState {
            endpoint: create_endpoint(),
        }));
        let request = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_json_rpc_response_success() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"data": "test"}));
        assert!(response.error.is_none());
        assert!(response.result.is_some());
    }

    #[test]
    fn test_json_rpc_response_failure() {
        let response =
            JsonRpcResponse::failure(Some(json!(1)), JsonRpcError::new(-32600, "Test error"));
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(to_rpc_error_code(1), -32000);
        assert_eq!(to_rpc_error_code(4), -32601);
        assert_eq!(to_rpc_error_code(10), -32602);
        assert_eq!(to_rpc_error_code(16), -32602);
    }

    #[test]
    fn test_dispatch_scan() {
        let endpoint = create_endpoint();
        let result = dispatch_method(
            &endpoint,
            "scan",
            json!({"scanClause": "lemma=B", "maximumTerms": 5}),
        )
        .unwrap();
        assert_eq!(result["operation"], "scan");
        assert_eq!(result["terms"][0]["value"], "Banana");
        assert_eq!(result["terms"][0]["position"], 2);
    }

    #[test]
    fn test_dispatch_unknown_method() {
        let endpoint = create_endpoint();
        let err = dispatch_method(&endpoint, "update", json!({})).unwrap_err();
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn test_dispatch_invalid_params() {
        let endpoint = create_endpoint();
        let err = dispatch_method(&endpoint, "scan", json!({"maximumTerms": "many"})).unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn test_dispatch_reports_diagnostics() {
        let endpoint = create_endpoint();
        let err = dispatch_method(&endpoint, "searchRetrieve", json!({"query": "sense=x"}))
            .unwrap_err();
        assert_eq!(err.code, -32602);
        assert_eq!(err.data.unwrap()["diagnostics"][0]["code"], 16);
    }

    #[tokio::test]
    async fn test_rpc_search_retrieve() {
        let response = call(json!({
            "jsonrpc": "2.0",
            "method": "searchRetrieve",
            "params": {"query": "lemma==Apple", "x-dataview": "title"},
            "id": 7
        }))
        .await;
        assert_eq!(response["id"], 7);
        let result = &response["result"];
        assert_eq!(result["numberOfRecords"], 1);
        assert_eq!(result["hits"][0]["content"], "<entry>Apple</entry>");
        assert_eq!(result["hits"][0]["title"], "Test");
    }

    #[tokio::test]
    async fn test_rpc_explain_without_params() {
        let response = call(json!({"jsonrpc": "2.0", "method": "explain", "id": 1})).await;
        assert_eq!(response["result"]["databaseTitle"], "Test");
        assert!(response.get("error").is_none());
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = build_router(Arc::new(AppState {
            endpoint: create_endpoint(),
        }));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
