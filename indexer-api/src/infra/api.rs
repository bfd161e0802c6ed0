// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{QueryService, storage::Storage};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use log::{info, warn};
use serde::Deserialize;
use std::{future::Future, io, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::oneshot,
    task,
    time::timeout,
};
use tower_http::cors::CorsLayer;

/// Largest accepted `limit` of the blocks listing.
const MAX_BLOCKS_LIMIT: u32 = 1_000;

/// Bound on the graceful drain after a shutdown request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listen address, e.g. `:8080` for all interfaces or `127.0.0.1:8080`.
    pub port: String,
}

/// Serve the read API until the given shutdown future completes, then drain connections for at
/// most five seconds before forcing termination.
pub async fn serve<S>(
    config: Config,
    service: QueryService<S>,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<(), Error>
where
    S: Storage,
{
    let app = make_app(Arc::new(service));

    let address = listen_address(&config.port);
    let listener = TcpListener::bind(&address).await.map_err(Error::Bind)?;
    info!(address; "listening for HTTP connections");

    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let mut serve_task = task::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut serve_task => {
            return result.map_err(|_| Error::Panicked)?.map_err(Error::Serve);
        }

        _ = shutdown => {
            info!("shutdown requested");
            let _ = drain_tx.send(());
        }
    }

    match timeout(SHUTDOWN_GRACE, &mut serve_task).await {
        Ok(result) => result.map_err(|_| Error::Panicked)?.map_err(Error::Serve),

        Err(_) => {
            warn!("graceful shutdown timed out, forcing termination");
            serve_task.abort();
            Ok(())
        }
    }
}

/// Error possibly returned by [serve].
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot bind tcp listener")]
    Bind(#[source] io::Error),

    #[error("cannot serve API")]
    Serve(#[source] io::Error),

    #[error("API server task panicked")]
    Panicked,
}

fn make_app<S>(service: Arc<QueryService<S>>) -> Router
where
    S: Storage,
{
    Router::new()
        .route("/blocks/", get(get_blocks_by_limit::<S>))
        .route("/blocks/{id}", get(get_block_by_id::<S>))
        .route("/transaction/{tx_hash}", get(get_transaction_by_tx_hash::<S>))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// `:8080` means all interfaces.
fn listen_address(port: &str) -> String {
    if port.starts_with(':') {
        format!("0.0.0.0{port}")
    } else {
        port.to_string()
    }
}

#[derive(Debug, Default, Deserialize)]
struct BlocksQuery {
    #[serde(default)]
    limit: String,
}

async fn get_blocks_by_limit<S>(
    State(service): State<Arc<QueryService<S>>>,
    Query(query): Query<BlocksQuery>,
) -> Response
where
    S: Storage,
{
    // Unparseable values collapse to zero.
    let limit = query.limit.parse::<u32>().unwrap_or_default();
    if limit > MAX_BLOCKS_LIMIT {
        return (
            StatusCode::BAD_REQUEST,
            format!("limit must not exceed {MAX_BLOCKS_LIMIT}"),
        )
            .into_response();
    }

    let blocks = service.blocks_by_limit(limit).await;
    Json(&*blocks).into_response()
}

async fn get_block_by_id<S>(
    State(service): State<Arc<QueryService<S>>>,
    Path(id): Path<String>,
) -> Response
where
    S: Storage,
{
    // Unparseable ids collapse to zero; the response then reflects the unknown block.
    let id = id.parse::<u64>().unwrap_or_default();

    let block = service.block_by_number(id).await;
    Json(&*block).into_response()
}

async fn get_transaction_by_tx_hash<S>(
    State(service): State<Arc<QueryService<S>>>,
    Path(tx_hash): Path<String>,
) -> Response
where
    S: Storage,
{
    let transaction = service.transaction_by_hash(&tx_hash).await;
    Json(&*transaction).into_response()
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{
            BlockWithTransactions, LogEntry, QueryService, TransactionWithLogs,
            storage::Storage,
        },
        infra::api::{listen_address, make_app},
    };
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use indexer_common::domain::{Block, hex_encode};
    use serde_json::{Value, json};
    use std::{num::NonZeroUsize, sync::Arc};
    use tower::ServiceExt;

    #[test]
    fn test_listen_address() {
        assert_eq!(listen_address(":8080"), "0.0.0.0:8080");
        assert_eq!(listen_address("127.0.0.1:8080"), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_get_blocks_by_limit() {
        let (status, body) = request(app(), "/blocks/?limit=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {
                    "block_num": 8,
                    "block_hash": "0xbbbb",
                    "block_time": 800,
                    "parent_hash": "0xaaaa",
                    "stable": 0
                },
                {
                    "block_num": 7,
                    "block_hash": "0xaaaa",
                    "block_time": 700,
                    "parent_hash": "0x9999",
                    "stable": 1
                }
            ])
        );
    }

    #[tokio::test]
    async fn test_get_blocks_by_limit_unparseable() {
        let (status, body) = request(app(), "/blocks/?limit=bogus").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_get_blocks_by_limit_overflow() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/blocks/?limit=1001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_block_by_id() {
        let (status, body) = request(app(), "/blocks/7").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "block_num": 7,
                "block_hash": "0xaaaa",
                "block_time": 700,
                "parent_hash": "0x9999",
                "transactions": ["0xcafe"]
            })
        );
    }

    #[tokio::test]
    async fn test_get_block_by_id_unknown() {
        let (status, body) = request(app(), "/blocks/12345").await;

        // Unknown ids return a zero-valued block with 200.
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block_num"], json!(0));
        assert_eq!(body["block_hash"], json!(""));
    }

    #[tokio::test]
    async fn test_get_block_by_id_unparseable() {
        let (status, body) = request(app(), "/blocks/bogus").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block_num"], json!(0));
    }

    #[tokio::test]
    async fn test_get_transaction_by_tx_hash() {
        let (status, body) = request(app(), "/transaction/0xcafe").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "tx_hash": "0xcafe",
                "from": "0x00000000000000000000000000000000000000aa",
                "to": "",
                "nonce": 1,
                "data": "0xdeadbeef",
                "value": "1000000000000000000",
                "logs": [{ "index": 0, "data": "0x00ff" }]
            })
        );
    }

    fn app() -> Router {
        let service = QueryService::new(FixtureStorage, NonZeroUsize::new(16).unwrap());
        make_app(Arc::new(service))
    }

    async fn request(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&body).unwrap();

        (status, body)
    }

    /// Two blocks, 7 (stable) and 8 (unstable), and one transaction `0xcafe` in block 7.
    #[derive(Clone)]
    struct FixtureStorage;

    impl Storage for FixtureStorage {
        async fn blocks_by_limit(&self, limit: u32) -> Result<Vec<Block>, sqlx::Error> {
            let blocks = [
                Block {
                    number: 8,
                    hash: "0xbbbb".to_string(),
                    parent_hash: "0xaaaa".to_string(),
                    time: 800,
                    stable: false,
                },
                Block {
                    number: 7,
                    hash: "0xaaaa".to_string(),
                    parent_hash: "0x9999".to_string(),
                    time: 700,
                    stable: true,
                },
            ];

            Ok(blocks.into_iter().take(limit as usize).collect())
        }

        async fn block_with_transactions(
            &self,
            number: u64,
        ) -> Result<BlockWithTransactions, sqlx::Error> {
            if number != 7 {
                return Ok(BlockWithTransactions::default());
            }

            Ok(BlockWithTransactions {
                block_num: 7,
                block_hash: "0xaaaa".to_string(),
                block_time: 700,
                parent_hash: "0x9999".to_string(),
                transactions: vec!["0xcafe".to_string()],
                stable: true,
            })
        }

        async fn transaction_with_logs(
            &self,
            tx_hash: &str,
        ) -> Result<TransactionWithLogs, sqlx::Error> {
            if tx_hash != "0xcafe" {
                return Ok(TransactionWithLogs {
                    data: hex_encode([]),
                    ..Default::default()
                });
            }

            Ok(TransactionWithLogs {
                tx_hash: "0xcafe".to_string(),
                from: "0x00000000000000000000000000000000000000aa".to_string(),
                to: String::new(),
                nonce: 1,
                data: hex_encode([0xde, 0xad, 0xbe, 0xef]),
                value: "1000000000000000000".to_string(),
                logs: vec![LogEntry {
                    index: 0,
                    data: hex_encode([0x00, 0xff]),
                }],
                stable: true,
            })
        }
    }
}
