// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::domain::node::Node;
use alloy::{
    consensus::{Transaction as _, TxReceipt as _},
    eips::BlockNumberOrTag,
    providers::{DynProvider, Provider, ProviderBuilder},
    transports::{RpcError, TransportErrorKind},
};
use async_stream::stream;
use futures::{Stream, StreamExt};
use indexer_common::{
    domain::{Block, BlockData, Log, Transaction},
    error::StdErrorExt,
};
use log::{info, warn};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Head polling interval for endpoints without a native subscription.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chain node URL; `ws(s)` endpoints get a native head subscription, `http(s)` ones are
    /// polled.
    pub endpoint: String,
}

/// A [Node] implementation based on the alloy provider stack.
#[derive(Clone)]
pub struct AlloyNode {
    provider: DynProvider,
}

impl AlloyNode {
    /// Connect to the configured endpoint. The chain id is resolved once to validate the
    /// connection; sender addresses recovered by the node are bound to it (EIP-155).
    pub async fn new(config: Config) -> Result<Self, Error> {
        let Config { endpoint } = config;

        let provider = ProviderBuilder::new()
            .connect(&endpoint)
            .await
            .map_err(Error::Connect)?
            .erased();

        let chain_id = provider.get_chain_id().await.map_err(Error::ChainId)?;
        info!(chain_id, endpoint; "connected to chain node");

        Ok(Self { provider })
    }
}

impl Node for AlloyNode {
    type Error = NodeError;

    async fn latest_height(&self) -> Result<u64, NodeError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn subscribe_heights(
        &self,
    ) -> Result<impl Stream<Item = Result<u64, NodeError>> + Send, NodeError> {
        let provider = self.provider.clone();

        let heights = stream! {
            match provider.subscribe_blocks().await {
                Ok(subscription) => {
                    let mut headers = subscription.into_stream();
                    while let Some(header) = headers.next().await {
                        yield Ok(header.inner.number);
                    }
                }

                // Subscriptions need a pubsub transport; plain http endpoints are polled.
                Err(error) => {
                    warn!(error = error.as_chain(); "no head subscription, polling instead");
                    loop {
                        sleep(POLL_INTERVAL).await;
                        yield provider.get_block_number().await.map_err(NodeError::from);
                    }
                }
            }
        };

        Ok(heights)
    }

    async fn block_data(&self, number: u64) -> Result<BlockData, NodeError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await?
            .ok_or(NodeError::UnknownBlock(number))?;

        let header = &block.header;
        let mut data = BlockData {
            block: Block {
                number,
                hash: header.hash.to_string(),
                parent_hash: header.inner.parent_hash.to_string(),
                time: header.inner.timestamp,
                stable: false,
            },
            ..Default::default()
        };

        for tx in block.transactions.into_transactions() {
            let tx_hash = *tx.inner.tx_hash();

            // Logs come from the receipt; a transaction whose receipt cannot be fetched is
            // skipped and the fixer fills it in on a later pass.
            let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => receipt,

                Ok(None) => {
                    warn!(number, tx_hash:%; "missing receipt, skipping transaction");
                    continue;
                }

                Err(error) => {
                    warn!(
                        number,
                        tx_hash:%,
                        error = error.as_chain();
                        "cannot fetch receipt, skipping transaction"
                    );
                    continue;
                }
            };

            for log in receipt.inner.logs() {
                data.logs.push(Log {
                    block_number: number,
                    tx_hash: tx_hash.to_string(),
                    index: log.log_index.unwrap_or_default() as u32,
                    data: log.inner.data.data.to_vec(),
                });
            }

            data.transactions.push(Transaction {
                block_number: number,
                hash: tx_hash.to_string(),
                from: tx.inner.signer().to_string(),
                to: tx.to().map(|to| to.to_string()).unwrap_or_default(),
                nonce: tx.nonce(),
                data: tx.input().to_vec(),
                value: tx.value().to_string(),
            });
        }

        Ok(data)
    }
}

/// Error possibly returned by [AlloyNode::new].
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot connect to chain node")]
    Connect(#[source] RpcError<TransportErrorKind>),

    #[error("cannot get chain id")]
    ChainId(#[source] RpcError<TransportErrorKind>),
}

/// Error possibly returned by [Node] operations of [AlloyNode].
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("chain node rpc call failed")]
    Rpc(#[from] RpcError<TransportErrorKind>),

    #[error("chain node does not know block {0}")]
    UnknownBlock(u64),
}
