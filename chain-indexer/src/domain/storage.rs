// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use indexer_common::domain::BlockData;

/// Storage abstraction for the write side of the indexer.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// The highest persisted block number, if any.
    async fn max_block_number(&self) -> Result<Option<u64>, sqlx::Error>;

    /// The smallest persisted block number still marked unstable, if any.
    async fn min_unstable_block_number(&self) -> Result<Option<u64>, sqlx::Error>;

    /// Delete all unstable blocks along with their transactions and logs; returns the number of
    /// deleted blocks.
    async fn delete_unstable_blocks(&self) -> Result<u64, sqlx::Error>;

    /// Upsert the given batch: all blocks, then all transactions, then all logs, so references
    /// stay resolvable. Conflicts on a primary key update the full row, except that a block row
    /// never loses its stable mark. A failed statement is logged and does not stop the
    /// remaining tables; the first failure is returned after every table was attempted.
    async fn bulk_upsert(&self, batch: &[BlockData]) -> Result<(), sqlx::Error>;

    /// Atomically replace the persisted block with the same number as the given one, including
    /// all its transactions and logs.
    async fn replace_block(&self, data: &BlockData) -> Result<(), sqlx::Error>;
}
