// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{BlockWithTransactions, TransactionWithLogs};
use indexer_common::domain::Block;

/// Storage abstraction for the read side.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// The newest `limit` blocks, newest first.
    async fn blocks_by_limit(&self, limit: u32) -> Result<Vec<Block>, sqlx::Error>;

    /// The block with the given number and the hashes of its transactions; zero-valued if
    /// unknown.
    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<BlockWithTransactions, sqlx::Error>;

    /// The transaction with the given hash and its logs; zero-valued if unknown.
    async fn transaction_with_logs(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionWithLogs, sqlx::Error>;
}
