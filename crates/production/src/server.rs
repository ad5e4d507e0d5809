//! HTTP gateway: submit/query endpoints plus health, readiness, and
//! Prometheus metrics.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use rollup_core::RejectReason;
use rollup_types::{Address, Hash, Transaction, TxId, TxStatus, TxType};

use crate::runtime::{Node, SubmitOutcome};

pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/transactions", post(submit_transaction))
        .route("/transactions/{tx_id}", get(get_transaction))
        .route("/senders/{address}/transactions", get(get_transactions_by_sender))
        .with_state(node)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ts": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    }))
}

async fn ready(State(node): State<Arc<Node>>) -> Json<serde_json::Value> {
    let store_status = node.store_health_status().await;
    let dependencies = node.dependency_health();
    Json(json!({
        "store": store_status,
        "dependencies": dependencies,
    }))
}

async fn metrics(State(node): State<Arc<Node>>) -> Response {
    node.refresh_cache_gauges();
    (StatusCode::OK, node.metrics.render()).into_response()
}

/// Canonical submit-transaction request body. Byte-strings are hex-encoded.
#[derive(Debug, Deserialize)]
struct SubmitTransactionRequest {
    sender: String,
    recipient: String,
    amount: u64,
    #[serde(default)]
    nonce: u64,
    #[serde(default)]
    expiry: Option<u64>,
    #[serde(default)]
    #[serde(rename = "type")]
    tx_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    priority: Option<u8>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    kind: String,
    message: String,
    correlation_id: String,
}

fn api_error(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let body = ApiError {
        error: ApiErrorBody { kind: kind.to_string(), message: message.into(), correlation_id: uuid_like() },
    };
    (status, Json(body)).into_response()
}

/// A correlation id good enough to grep logs by, without pulling in a UUID
/// dependency for one call site.
fn uuid_like() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("corr-{nanos:x}")
}

fn parse_address(hex_str: &str) -> Result<Address, Response> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "validation", format!("bad address hex: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "validation", "address must be 32 bytes"))?;
    Ok(Address::new(arr))
}

fn parse_tx_type(raw: Option<&str>) -> TxType {
    match raw {
        Some("deposit") => TxType::Deposit,
        Some("withdrawal") => TxType::Withdrawal,
        Some("other") => TxType::Other,
        _ => TxType::Transfer,
    }
}

async fn submit_transaction(
    State(node): State<Arc<Node>>,
    Json(req): Json<SubmitTransactionRequest>,
) -> Response {
    let sender = match parse_address(&req.sender) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let recipient = match parse_address(&req.recipient) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let data = match req.data.as_deref().map(hex::decode).transpose() {
        Ok(d) => d.unwrap_or_default(),
        Err(e) => return api_error(StatusCode::BAD_REQUEST, "validation", format!("bad data hex: {e}")),
    };
    let signature = match req.signature.as_deref().map(hex::decode).transpose() {
        Ok(s) => s.unwrap_or_default(),
        Err(e) => return api_error(StatusCode::BAD_REQUEST, "validation", format!("bad signature hex: {e}")),
    };

    let tx = Transaction {
        id: TxId::from(Hash::ZERO),
        sender,
        recipient,
        amount: req.amount,
        nonce: req.nonce,
        expiry_unix_seconds: req.expiry.unwrap_or(node.now() + 3600),
        tx_type: parse_tx_type(req.tx_type.as_deref()),
        status: TxStatus::Pending,
        data,
        signature,
    };

    match node.submit(tx, req.priority).await {
        SubmitOutcome::Accepted(tx_id) => (StatusCode::ACCEPTED, Json(json!({"tx_id": tx_id.to_string(), "status": "accepted"}))).into_response(),
        SubmitOutcome::Rejected(reason) => reject_response(reason),
    }
}

fn reject_response(reason: RejectReason) -> Response {
    let status = match reason {
        RejectReason::BackpressureActive => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    };
    let kind = if matches!(reason, RejectReason::BackpressureActive) { "backpressure" } else { "validation" };
    api_error(status, kind, format!("{reason:?}"))
}

async fn get_transaction(State(node): State<Arc<Node>>, Path(tx_id_hex): Path<String>) -> Response {
    let Ok(hash) = Hash::from_hex(&tx_id_hex) else {
        return api_error(StatusCode::BAD_REQUEST, "validation", "tx_id must be 64 hex characters");
    };
    match node.get_transaction(TxId::from(hash)).await {
        Some(tx) => Json(tx).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "not_found", "no such transaction"),
    }
}

#[derive(Debug, Deserialize)]
struct PaginationQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

async fn get_transactions_by_sender(
    State(node): State<Arc<Node>>,
    Path(address_hex): Path<String>,
    Query(page): Query<PaginationQuery>,
) -> Response {
    let sender = match parse_address(&address_hex) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let txs = node.get_transactions_by_sender(sender, page.limit, page.offset).await;
    Json(txs).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, HsmProviderKind, SecretsProviderKind};
    use crate::settlement::InMemorySettlementChain;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            store_connection_string: "memory://".into(),
            settlement_chain_connection_string: "memory://".into(),
            hsm_provider: HsmProviderKind::Soft,
            hsm_credentials: "pw".into(),
            sequencer_keypair_path: "./k".into(),
            shard_count: 2,
            replication_factor: 1,
            max_batch_size: 10,
            batch_interval: Duration::from_secs(1000),
            cache_base_capacity: 100,
            cache_base_ttl: Duration::from_secs(60),
            hsm_grace_period: Duration::from_secs(3600),
            secrets_provider: SecretsProviderKind::Env,
            listen_addr: "127.0.0.1:0".into(),
            checkpoint_path: std::env::temp_dir().join("rollup-server-test-checkpoint.bin").to_string_lossy().into_owned(),
            checkpoint_interval: 1000,
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let node = Arc::new(Node::new(test_config(), Arc::new(InMemorySettlementChain::new()), 0));
        let app = router(node);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_then_fetch_round_trips_through_http() {
        let node = Arc::new(Node::new(test_config(), Arc::new(InMemorySettlementChain::new()), 0));
        let app = router(node);

        let body = json!({
            "sender": hex::encode([1u8; 32]),
            "recipient": hex::encode([2u8; 32]),
            "amount": 10,
            "nonce": 1,
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transactions")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_with_validation_error() {
        let node = Arc::new(Node::new(test_config(), Arc::new(InMemorySettlementChain::new()), 0));
        let app = router(node);

        let body = json!({"sender": "not-hex", "recipient": hex::encode([2u8; 32]), "amount": 10});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transactions")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
