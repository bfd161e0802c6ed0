// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod cache;
pub mod storage;

use crate::domain::{
    cache::{FreshnessCache, NEVER_EXPIRES},
    storage::Storage,
};
use indexer_common::{domain::Block, error::StdErrorExt};
use log::error;
use serde::Serialize;
use std::{
    num::NonZeroUsize,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// TTL for answers touching unstable rows.
const UNSTABLE_TTL_SECS: i64 = 1;

/// One row of the `/blocks/` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub block_num: u64,
    pub block_hash: String,
    pub block_time: u64,
    pub parent_hash: String,
    pub stable: u8,
}

impl From<Block> for BlockSummary {
    fn from(block: Block) -> Self {
        Self {
            block_num: block.number,
            block_hash: block.hash,
            block_time: block.time,
            parent_hash: block.parent_hash,
            stable: block.stable.into(),
        }
    }
}

/// Response body of `/blocks/{id}`; zero-valued for unknown ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockWithTransactions {
    pub block_num: u64,
    pub block_hash: String,
    pub block_time: u64,
    pub parent_hash: String,
    pub transactions: Vec<String>,

    /// Drives the cache TTL, not part of the response body.
    #[serde(skip)]
    pub stable: bool,
}

/// Response body of `/transaction/{txHash}`; zero-valued for unknown hashes. Byte payloads are
/// rendered as `0x`-prefixed lowercase hex, the value as a decimal string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionWithLogs {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub nonce: u64,
    pub data: String,
    pub value: String,
    pub logs: Vec<LogEntry>,

    /// Drives the cache TTL, not part of the response body.
    #[serde(skip)]
    pub stable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub index: u32,
    pub data: String,
}

/// The query layer: every store query is wrapped in a bounded LRU cache whose entry TTL depends
/// on whether the answer touches unstable rows.
pub struct QueryService<S> {
    storage: S,
    blocks_by_limit: FreshnessCache<u32, Vec<BlockSummary>>,
    block_by_number: FreshnessCache<u64, BlockWithTransactions>,
    transaction_by_hash: FreshnessCache<String, TransactionWithLogs>,
}

impl<S> QueryService<S>
where
    S: Storage,
{
    pub fn new(storage: S, cache_capacity: NonZeroUsize) -> Self {
        Self {
            storage,
            blocks_by_limit: FreshnessCache::new(cache_capacity),
            block_by_number: FreshnessCache::new(cache_capacity),
            transaction_by_hash: FreshnessCache::new(cache_capacity),
        }
    }

    /// The newest `limit` blocks. The first rows inevitably include unstable blocks, so entries
    /// always get the short TTL.
    pub async fn blocks_by_limit(&self, limit: u32) -> Arc<Vec<BlockSummary>> {
        let now = unix_now();
        if let Some(blocks) = self.blocks_by_limit.get(&limit, now) {
            return blocks;
        }

        let blocks = match self.storage.blocks_by_limit(limit).await {
            Ok(blocks) => blocks.into_iter().map(Into::into).collect::<Vec<_>>(),

            Err(error) => {
                error!(limit, error = error.as_chain(); "cannot query blocks");
                Vec::new()
            }
        };

        let blocks = Arc::new(blocks);
        self.blocks_by_limit
            .insert(limit, blocks.clone(), now + UNSTABLE_TTL_SECS);
        blocks
    }

    /// The block with the given number and the hashes of its transactions.
    pub async fn block_by_number(&self, number: u64) -> Arc<BlockWithTransactions> {
        let now = unix_now();
        if let Some(block) = self.block_by_number.get(&number, now) {
            return block;
        }

        let block = match self.storage.block_with_transactions(number).await {
            Ok(block) => block,

            Err(error) => {
                error!(number, error = error.as_chain(); "cannot query block");
                BlockWithTransactions::default()
            }
        };

        let expires_at = expires_at(block.stable, now);
        let block = Arc::new(block);
        self.block_by_number.insert(number, block.clone(), expires_at);
        block
    }

    /// The transaction with the given hash and its logs.
    pub async fn transaction_by_hash(&self, tx_hash: &str) -> Arc<TransactionWithLogs> {
        let now = unix_now();
        if let Some(transaction) = self.transaction_by_hash.get(&tx_hash.to_string(), now) {
            return transaction;
        }

        let transaction = match self.storage.transaction_with_logs(tx_hash).await {
            Ok(transaction) => transaction,

            Err(error) => {
                error!(tx_hash, error = error.as_chain(); "cannot query transaction");
                TransactionWithLogs::default()
            }
        };

        let expires_at = expires_at(transaction.stable, now);
        let transaction = Arc::new(transaction);
        self.transaction_by_hash
            .insert(tx_hash.to_string(), transaction.clone(), expires_at);
        transaction
    }
}

/// Entries backed exclusively by stable rows never expire; anything else lives one second.
fn expires_at(stable: bool, now: i64) -> i64 {
    if stable { NEVER_EXPIRES } else { now + UNSTABLE_TTL_SECS }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        BlockWithTransactions, QueryService, TransactionWithLogs, cache::NEVER_EXPIRES,
        expires_at, storage::Storage,
    };
    use indexer_common::domain::Block;
    use std::{
        num::NonZeroUsize,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    #[test]
    fn test_expires_at() {
        assert_eq!(expires_at(true, 100), NEVER_EXPIRES);
        assert_eq!(expires_at(false, 100), 101);
    }

    #[tokio::test]
    async fn test_block_by_number_cached() {
        let storage = CountingStorage::default();
        let service = QueryService::new(storage.clone(), capacity());

        let first = service.block_by_number(42).await;
        assert_eq!(first.block_num, 42);
        assert_eq!(storage.queries(), 1);

        // Stable block, second lookup must come from the cache.
        let second = service.block_by_number(42).await;
        assert_eq!(storage.queries(), 1);
        assert_eq!(first, second);

        // Unstable block, still cached within its TTL.
        let _ = service.block_by_number(100).await;
        let _ = service.block_by_number(100).await;
        assert_eq!(storage.queries(), 2);
    }

    #[tokio::test]
    async fn test_unknown_block_is_zero_valued() {
        let service = QueryService::new(CountingStorage::default(), capacity());

        let block = service.block_by_number(0).await;
        assert_eq!(*block, BlockWithTransactions::default());
    }

    #[tokio::test]
    async fn test_blocks_by_limit_cached() {
        let storage = CountingStorage::default();
        let service = QueryService::new(storage.clone(), capacity());

        let blocks = service.blocks_by_limit(2).await;
        assert_eq!(blocks.len(), 2);
        let _ = service.blocks_by_limit(2).await;
        assert_eq!(storage.queries(), 1);

        // A different limit is a different cache key.
        let _ = service.blocks_by_limit(3).await;
        assert_eq!(storage.queries(), 2);
    }

    #[tokio::test]
    async fn test_transaction_by_hash_cached() {
        let storage = CountingStorage::default();
        let service = QueryService::new(storage.clone(), capacity());

        let transaction = service.transaction_by_hash("0xcafe").await;
        assert_eq!(transaction.tx_hash, "0xcafe");
        assert_eq!(transaction.data, "0xabcd");
        let _ = service.transaction_by_hash("0xcafe").await;
        assert_eq!(storage.queries(), 1);
    }

    fn capacity() -> NonZeroUsize {
        NonZeroUsize::new(16).unwrap()
    }

    /// Blocks up to number 99 are stable, 100 and beyond unstable; number 0 and empty hashes
    /// are unknown. Counts storage roundtrips to observe cache hits.
    #[derive(Clone, Default)]
    struct CountingStorage {
        queries: Arc<AtomicUsize>,
    }

    impl CountingStorage {
        fn queries(&self) -> usize {
            self.queries.load(Ordering::Relaxed)
        }
    }

    impl Storage for CountingStorage {
        async fn blocks_by_limit(&self, limit: u32) -> Result<Vec<Block>, sqlx::Error> {
            self.queries.fetch_add(1, Ordering::Relaxed);
            let blocks = (0..limit as u64)
                .map(|number| Block {
                    number: 200 - number,
                    ..Default::default()
                })
                .collect();
            Ok(blocks)
        }

        async fn block_with_transactions(
            &self,
            number: u64,
        ) -> Result<BlockWithTransactions, sqlx::Error> {
            self.queries.fetch_add(1, Ordering::Relaxed);

            if number == 0 {
                return Ok(BlockWithTransactions::default());
            }

            Ok(BlockWithTransactions {
                block_num: number,
                block_hash: format!("0x{number:064x}"),
                stable: number < 100,
                ..Default::default()
            })
        }

        async fn transaction_with_logs(
            &self,
            tx_hash: &str,
        ) -> Result<TransactionWithLogs, sqlx::Error> {
            self.queries.fetch_add(1, Ordering::Relaxed);

            Ok(TransactionWithLogs {
                tx_hash: tx_hash.to_string(),
                data: "0xabcd".to_string(),
                stable: true,
                ..Default::default()
            })
        }
    }
}
