// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use futures::Stream;
use indexer_common::domain::BlockData;
use std::error::Error as StdError;

/// Chain node abstraction.
#[trait_variant::make(Send)]
pub trait Node
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// The height of the current chain head.
    async fn latest_height(&self) -> Result<u64, Self::Error>;

    /// A stream of head heights as announced by the node. Heights are not guaranteed to be
    /// strictly increasing; callers must keep their own maximum.
    async fn subscribe_heights(
        &self,
    ) -> Result<impl Stream<Item = Result<u64, Self::Error>> + Send, Self::Error>;

    /// Fetch the full block with the given number along with the receipts of all its
    /// transactions, assembled into a [BlockData]. The stable flag is left unset; the caller
    /// decides it against its own head snapshot.
    async fn block_data(&self, number: u64) -> Result<BlockData, Self::Error>;
}
