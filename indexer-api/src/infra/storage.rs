// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{BlockWithTransactions, LogEntry, TransactionWithLogs, storage::Storage};
use indexer_common::{
    domain::{Block, hex_encode},
    infra::pool::postgres::PostgresPool,
};
use indoc::indoc;

/// Postgres based implementation of [Storage].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    /// Create a new [PostgresStorage].
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

impl Storage for PostgresStorage {
    async fn blocks_by_limit(&self, limit: u32) -> Result<Vec<Block>, sqlx::Error> {
        let query = indoc! {"
            SELECT block_num, block_hash, block_time, parent_hash, block_stable
            FROM eth_block
            ORDER BY block_num DESC
            LIMIT $1
        "};

        let blocks = sqlx::query_as::<_, (i64, String, i64, String, i32)>(query)
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(|(number, hash, time, parent_hash, stable)| Block {
                number: number as u64,
                hash,
                parent_hash,
                time: time as u64,
                stable: stable != 0,
            })
            .collect();

        Ok(blocks)
    }

    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<BlockWithTransactions, sqlx::Error> {
        let query = indoc! {"
            SELECT block_hash, block_time, parent_hash, block_stable
            FROM eth_block
            WHERE block_num = $1
        "};

        let block = sqlx::query_as::<_, (String, i64, String, i32)>(query)
            .bind(number as i64)
            .fetch_optional(&*self.pool)
            .await?;

        // Unknown ids resolve to a zero-valued body.
        let Some((block_hash, block_time, parent_hash, stable)) = block else {
            return Ok(BlockWithTransactions::default());
        };

        let query = indoc! {"
            SELECT tx_hash
            FROM block_transaction
            WHERE block_num = $1
            ORDER BY tx_hash
        "};

        let transactions = sqlx::query_scalar::<_, String>(query)
            .bind(number as i64)
            .fetch_all(&*self.pool)
            .await?;

        Ok(BlockWithTransactions {
            block_num: number,
            block_hash,
            block_time: block_time as u64,
            parent_hash,
            transactions,
            stable: stable != 0,
        })
    }

    async fn transaction_with_logs(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionWithLogs, sqlx::Error> {
        let query = indoc! {"
            SELECT tx_from, tx_to, tx_nonce, tx_data, tx_value
            FROM block_transaction
            WHERE tx_hash = $1
        "};

        let transaction = sqlx::query_as::<_, (String, String, i64, Vec<u8>, String)>(query)
            .bind(tx_hash)
            .fetch_optional(&*self.pool)
            .await?;

        let Some((from, to, nonce, data, value)) = transaction else {
            return Ok(TransactionWithLogs {
                data: hex_encode([]),
                ..Default::default()
            });
        };

        let query = indoc! {"
            SELECT transaction_log.log_index, transaction_log.log_data, eth_block.block_stable
            FROM transaction_log
            JOIN eth_block ON transaction_log.block_num = eth_block.block_num
            WHERE transaction_log.tx_hash = $1
            ORDER BY transaction_log.log_index
        "};

        let log_rows = sqlx::query_as::<_, (i64, Vec<u8>, i32)>(query)
            .bind(tx_hash)
            .fetch_all(&*self.pool)
            .await?;

        let mut stable = false;
        let logs = log_rows
            .into_iter()
            .map(|(index, data, block_stable)| {
                stable = block_stable != 0;
                LogEntry {
                    index: index as u32,
                    data: hex_encode(data),
                }
            })
            .collect();

        Ok(TransactionWithLogs {
            tx_hash: tx_hash.to_string(),
            from,
            to,
            nonce: nonce as u64,
            data: hex_encode(data),
            value,
            logs,
            stable,
        })
    }
}
