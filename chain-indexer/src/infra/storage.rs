// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::domain::storage::Storage;
use indexer_common::{
    domain::{Block, BlockData, Log, Transaction},
    error::StdErrorExt,
    infra::pool::postgres::PostgresPool,
};
use indoc::indoc;
use log::error;
use sqlx::{Executor, Postgres, QueryBuilder};

/// Rows per multi-row statement, conservative against the bind parameter limit.
const INSERT_BATCH_SIZE: usize = 1_000;

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
    async fn max_block_number(&self) -> Result<Option<u64>, sqlx::Error> {
        let query = indoc! {"
            SELECT MAX(block_num)
            FROM eth_block
        "};

        let (max,) = sqlx::query_as::<_, (Option<i64>,)>(query)
            .fetch_one(&*self.pool)
            .await?;

        Ok(max.map(|max| max as u64))
    }

    async fn min_unstable_block_number(&self) -> Result<Option<u64>, sqlx::Error> {
        let query = indoc! {"
            SELECT MIN(block_num)
            FROM eth_block
            WHERE block_stable = 0
        "};

        let (min,) = sqlx::query_as::<_, (Option<i64>,)>(query)
            .fetch_one(&*self.pool)
            .await?;

        Ok(min.map(|min| min as u64))
    }

    async fn delete_unstable_blocks(&self) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // The schema does not cascade: dependents go first, in the order logs, transactions,
        // block.
        let query = indoc! {"
            DELETE FROM transaction_log
            WHERE block_num IN (SELECT block_num FROM eth_block WHERE block_stable = 0)
        "};
        sqlx::query(query).execute(&mut *tx).await?;

        let query = indoc! {"
            DELETE FROM block_transaction
            WHERE block_num IN (SELECT block_num FROM eth_block WHERE block_stable = 0)
        "};
        sqlx::query(query).execute(&mut *tx).await?;

        let deleted = sqlx::query("DELETE FROM eth_block WHERE block_stable = 0")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted)
    }

    async fn bulk_upsert(&self, batch: &[BlockData]) -> Result<(), sqlx::Error> {
        let blocks = batch.iter().map(|data| &data.block).collect::<Vec<_>>();
        let transactions = batch
            .iter()
            .flat_map(|data| &data.transactions)
            .collect::<Vec<_>>();
        let logs = batch.iter().flat_map(|data| &data.logs).collect::<Vec<_>>();

        // Blocks before transactions before logs keeps references resolvable on commit. The
        // statements are independent: a failed chunk is logged and must not stop the remaining
        // chunks or tables.
        let mut first_error = None;

        for chunk in blocks.chunks(INSERT_BATCH_SIZE) {
            if let Err(error) = upsert_blocks(chunk, &*self.pool).await {
                error!(error = error.as_chain(); "cannot upsert into eth_block");
                first_error.get_or_insert(error);
            }
        }
        for chunk in transactions.chunks(INSERT_BATCH_SIZE) {
            if let Err(error) = upsert_transactions(chunk, &*self.pool).await {
                error!(error = error.as_chain(); "cannot upsert into block_transaction");
                first_error.get_or_insert(error);
            }
        }
        for chunk in logs.chunks(INSERT_BATCH_SIZE) {
            if let Err(error) = upsert_logs(chunk, &*self.pool).await {
                error!(error = error.as_chain(); "cannot upsert into transaction_log");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    async fn replace_block(&self, data: &BlockData) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let number = data.block.number as i64;

        // Dependents first; orphans of the replaced version must not survive.
        sqlx::query("DELETE FROM transaction_log WHERE block_num = $1")
            .bind(number)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM block_transaction WHERE block_num = $1")
            .bind(number)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM eth_block WHERE block_num = $1")
            .bind(number)
            .execute(&mut *tx)
            .await?;

        upsert_blocks(&[&data.block], &mut *tx).await?;
        let transactions = data.transactions.iter().collect::<Vec<_>>();
        if !transactions.is_empty() {
            upsert_transactions(&transactions, &mut *tx).await?;
        }
        let logs = data.logs.iter().collect::<Vec<_>>();
        if !logs.is_empty() {
            upsert_logs(&logs, &mut *tx).await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

async fn upsert_blocks<'a, E>(blocks: &[&Block], executor: E) -> Result<(), sqlx::Error>
where
    E: Executor<'a, Database = Postgres>,
{
    if blocks.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO eth_block (block_num, block_hash, block_time, parent_hash, block_stable) ",
    );

    query.push_values(blocks, |mut row, block| {
        row.push_bind(block.number as i64)
            .push_bind(block.hash.as_str())
            .push_bind(block.time as i64)
            .push_bind(block.parent_hash.as_str())
            .push_bind(block.stable as i32);
    });

    // A stable row is immutable; the upsert refreshes content but never clears the mark.
    query.push(indoc! {"
         ON CONFLICT (block_num) DO UPDATE SET
            block_hash = EXCLUDED.block_hash,
            block_time = EXCLUDED.block_time,
            parent_hash = EXCLUDED.parent_hash,
            block_stable = GREATEST(eth_block.block_stable, EXCLUDED.block_stable)
    "});

    query.build().execute(executor).await?;

    Ok(())
}

async fn upsert_transactions<'a, E>(
    transactions: &[&Transaction],
    executor: E,
) -> Result<(), sqlx::Error>
where
    E: Executor<'a, Database = Postgres>,
{
    if transactions.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO block_transaction \
         (tx_hash, block_num, tx_from, tx_to, tx_nonce, tx_data, tx_value) ",
    );

    query.push_values(transactions, |mut row, transaction| {
        row.push_bind(transaction.hash.as_str())
            .push_bind(transaction.block_number as i64)
            .push_bind(transaction.from.as_str())
            .push_bind(transaction.to.as_str())
            .push_bind(transaction.nonce as i64)
            .push_bind(transaction.data.as_slice())
            .push_bind(transaction.value.as_str());
    });

    query.push(indoc! {"
         ON CONFLICT (tx_hash) DO UPDATE SET
            block_num = EXCLUDED.block_num,
            tx_from = EXCLUDED.tx_from,
            tx_to = EXCLUDED.tx_to,
            tx_nonce = EXCLUDED.tx_nonce,
            tx_data = EXCLUDED.tx_data,
            tx_value = EXCLUDED.tx_value
    "});

    query.build().execute(executor).await?;

    Ok(())
}

async fn upsert_logs<'a, E>(logs: &[&Log], executor: E) -> Result<(), sqlx::Error>
where
    E: Executor<'a, Database = Postgres>,
{
    if logs.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO transaction_log (tx_hash, log_index, block_num, log_data) ",
    );

    query.push_values(logs, |mut row, log| {
        row.push_bind(log.tx_hash.as_str())
            .push_bind(log.index as i64)
            .push_bind(log.block_number as i64)
            .push_bind(log.data.as_slice());
    });

    query.push(indoc! {"
         ON CONFLICT (tx_hash, log_index) DO UPDATE SET
            block_num = EXCLUDED.block_num,
            log_data = EXCLUDED.log_data
    "});

    query.build().execute(executor).await?;

    Ok(())
}
