// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{node::Node, storage::Storage};
use anyhow::Context;
use futures::StreamExt;
use indexer_common::{domain::BlockData, error::StdErrorExt};
use log::{debug, error, info, warn};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Deserialize;
use std::{
    future::Future,
    mem,
    pin::pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{task, time::sleep};

/// Distance from the head beyond which a block is assumed final.
const DEFAULT_SAFETY_DEPTH: u64 = 20;

/// Pre-allocated capacity of the two ingest buffers.
const BUFFER_CAPACITY: usize = 1_000;

/// Backoff of a reader that has caught up with the head, and of an idle fixer.
const CATCH_UP_BACKOFF: Duration = Duration::from_millis(10);

/// Backoff of the writer when the ingest buffer is empty.
const WRITER_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff before re-subscribing after the head subscription fails or ends.
const SUBSCRIBE_BACKOFF: Duration = Duration::from_secs(1);

/// Concurrent block fetches of one fixer pass.
const FIXER_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Initial scan floor.
    #[serde(default)]
    pub startblock: u64,

    /// Number of parallel readers, at least one.
    pub parallel: usize,

    #[serde(default = "safety_depth_default")]
    pub safety_depth: u64,
}

fn safety_depth_default() -> u64 {
    DEFAULT_SAFETY_DEPTH
}

/// Run the indexing pipeline until the given shutdown future completes: one head subscriber,
/// `parallel` readers claiming block numbers from a shared counter, one batch writer draining
/// the ingest buffer, and one fixer re-fetching unstable blocks that have aged past the safety
/// depth.
pub async fn run(
    config: Config,
    node: impl Node,
    storage: impl Storage,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let Config {
        startblock,
        parallel,
        safety_depth,
    } = config;
    anyhow::ensure!(parallel >= 1, "parallel must be at least 1");

    // Discard half-written unstable state from a previous run; readers re-fetch those blocks.
    let deleted = storage
        .delete_unstable_blocks()
        .await
        .context("delete unstable blocks")?;
    if deleted > 0 {
        info!(deleted; "deleted unstable blocks of previous run");
    }

    let max_persisted = storage
        .max_block_number()
        .await
        .context("get max persisted block number")?;
    let next_block = Arc::new(AtomicU64::new(max_persisted.unwrap_or_default().max(startblock)));

    let newest_height = node.latest_height().await.context("get newest height")?;
    let newest_known = Arc::new(AtomicU64::new(newest_height));
    info!(
        newest_height,
        next_block = next_block.load(Ordering::Relaxed);
        "starting indexing"
    );

    let quit = Arc::new(AtomicBool::new(false));
    let buffer = Arc::new(Mutex::new(Vec::with_capacity(BUFFER_CAPACITY)));

    let subscriber = task::spawn(subscribe_heads(
        node.clone(),
        newest_known.clone(),
        quit.clone(),
    ));

    let readers = (0..parallel)
        .map(|id| {
            task::spawn(read_blocks(
                id,
                node.clone(),
                next_block.clone(),
                newest_known.clone(),
                buffer.clone(),
                safety_depth,
                quit.clone(),
            ))
        })
        .collect::<Vec<_>>();

    let writer = task::spawn(write_blocks(storage.clone(), buffer.clone(), quit.clone()));

    let fixer = task::spawn(fix_blocks(
        node.clone(),
        storage.clone(),
        newest_known.clone(),
        safety_depth,
        quit.clone(),
    ));

    shutdown.await;
    info!("shutdown requested");
    quit.store(true, Ordering::Relaxed);
    subscriber.abort();

    for handle in readers.into_iter().chain([writer, fixer]) {
        if let Err(error) = handle.await {
            error!(error:%; "indexer task panicked");
        }
    }
    let _ = subscriber.await;

    Ok(())
}

/// Keep `newest_known` up to date with heads announced by the node. Reads never block on
/// liveness of the subscription; a failed one keeps serving the last known value until the
/// re-subscribe succeeds.
async fn subscribe_heads(node: impl Node, newest_known: Arc<AtomicU64>, quit: Arc<AtomicBool>) {
    while !quit.load(Ordering::Relaxed) {
        match node.subscribe_heights().await {
            Ok(heights) => {
                let mut heights = pin!(heights);

                while let Some(height) = heights.next().await {
                    match height {
                        Ok(height) => {
                            let newest = newest_known
                                .fetch_max(height, Ordering::Relaxed)
                                .max(height);
                            debug!(height, newest; "received new chain head");
                            gauge!("indexer_newest_known_height").set(newest as f64);
                        }

                        Err(error) => {
                            warn!(error = error.as_chain(); "head subscription error");
                        }
                    }

                    if quit.load(Ordering::Relaxed) {
                        return;
                    }
                }

                warn!("head subscription ended, re-subscribing");
            }

            Err(error) => {
                warn!(error = error.as_chain(); "cannot subscribe to heads, retrying");
            }
        }

        sleep(SUBSCRIBE_BACKOFF).await;
    }
}

/// Claim block numbers from the shared counter and push assembled [BlockData] into the ingest
/// buffer. A claimed number past the head is kept and re-checked after a short backoff, so each
/// number is fetched exactly once.
async fn read_blocks(
    id: usize,
    node: impl Node,
    next_block: Arc<AtomicU64>,
    newest_known: Arc<AtomicU64>,
    buffer: Arc<Mutex<Vec<BlockData>>>,
    safety_depth: u64,
    quit: Arc<AtomicBool>,
) {
    debug!(id; "reader started");

    let mut reserved = None;
    while !quit.load(Ordering::Relaxed) {
        let number = reserved
            .take()
            .unwrap_or_else(|| next_block.fetch_add(1, Ordering::Relaxed));

        // Snapshot the head before assembly, so a head advancing mid-fetch cannot mark a too
        // recent block stable.
        let newest = newest_known.load(Ordering::Relaxed);
        if number > newest {
            reserved = Some(number);
            sleep(CATCH_UP_BACKOFF).await;
            continue;
        }

        let data = match node.block_data(number).await {
            Ok(mut data) => {
                data.block.stable = number + safety_depth <= newest;
                data
            }

            Err(error) => {
                warn!(
                    number,
                    error = error.as_chain();
                    "cannot fetch block, writing placeholder"
                );
                BlockData::placeholder(number)
            }
        };

        buffer.lock().push(data);
    }

    debug!(id; "reader stopped");
}

/// Drain the ingest buffer in batches. The buffer mutex is held only for the swap against the
/// pre-allocated spare, so readers are never blocked on database I/O. After a shutdown request
/// the remaining buffer content is written before the task exits.
async fn write_blocks(
    storage: impl Storage,
    buffer: Arc<Mutex<Vec<BlockData>>>,
    quit: Arc<AtomicBool>,
) {
    let mut spare = Vec::with_capacity(BUFFER_CAPACITY);

    loop {
        if swap_buffer(&buffer, &mut spare) {
            write_batch(&storage, &mut spare).await;
        } else if quit.load(Ordering::Relaxed) {
            break;
        } else {
            sleep(WRITER_BACKOFF).await;
        }
    }

    debug!("writer stopped");
}

/// Swap the live buffer against the empty spare if it holds any data.
fn swap_buffer(buffer: &Mutex<Vec<BlockData>>, spare: &mut Vec<BlockData>) -> bool {
    let mut live = buffer.lock();

    if live.is_empty() {
        false
    } else {
        mem::swap(&mut *live, spare);
        true
    }
}

async fn write_batch(storage: &impl Storage, batch: &mut Vec<BlockData>) {
    debug!(blocks = batch.len(); "writing batch");

    match storage.bulk_upsert(batch).await {
        Ok(_) => counter!("indexer_blocks_written_total").increment(batch.len() as u64),

        // Failed statements are not retried inline; affected blocks stay unstable and the
        // fixer converges them on a later pass.
        Err(error) => error!(error = error.as_chain(); "batch written incompletely"),
    }

    batch.clear();
}

/// Walk blocks still marked unstable whose age exceeds the safety depth, re-fetch them from the
/// node and replace them wholesale. The canonical version past the safety depth is written as
/// authoritative and marked stable.
async fn fix_blocks(
    node: impl Node,
    storage: impl Storage,
    newest_known: Arc<AtomicU64>,
    safety_depth: u64,
    quit: Arc<AtomicBool>,
) {
    while !quit.load(Ordering::Relaxed) {
        let newest = newest_known.load(Ordering::Relaxed);

        let min_unstable = match storage.min_unstable_block_number().await {
            Ok(min_unstable) => min_unstable,

            Err(error) => {
                error!(error = error.as_chain(); "cannot query min unstable block number");
                sleep(CATCH_UP_BACKOFF).await;
                continue;
            }
        };

        let horizon = newest.checked_sub(safety_depth);
        let Some((min_unstable, horizon)) = min_unstable
            .zip(horizon)
            .filter(|(min_unstable, horizon)| min_unstable <= horizon)
        else {
            sleep(CATCH_UP_BACKOFF).await;
            continue;
        };

        debug!(min_unstable, horizon; "re-fetching aged unstable blocks");

        let refetched = futures::stream::iter(min_unstable..=horizon)
            .map(|number| {
                let node = node.clone();
                async move { (number, node.block_data(number).await) }
            })
            .buffer_unordered(FIXER_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        for (number, result) in refetched {
            match result {
                Ok(mut data) => {
                    data.block.stable = number + safety_depth <= newest;

                    match storage.replace_block(&data).await {
                        Ok(_) => counter!("indexer_blocks_repaired_total").increment(1),
                        Err(error) => {
                            error!(number, error = error.as_chain(); "cannot replace block");
                        }
                    }
                }

                Err(error) => {
                    warn!(number, error = error.as_chain(); "cannot re-fetch block");
                }
            }
        }
    }

    debug!("fixer stopped");
}
