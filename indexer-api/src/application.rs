// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    domain::{QueryService, storage::Storage},
    infra,
};
use anyhow::Context;
use serde::Deserialize;
use std::{future::Future, num::NonZeroUsize};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Entries per cache; there is one cache per query shape.
    #[serde(default = "cache_capacity_default")]
    pub cache_capacity: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: cache_capacity_default(),
        }
    }
}

fn cache_capacity_default() -> NonZeroUsize {
    const { NonZeroUsize::new(1_024).unwrap() }
}

/// Run the API: wrap the given storage into the caching query layer and serve it over HTTP
/// until the given shutdown future completes.
pub async fn run(
    config: Config,
    api_config: infra::api::Config,
    storage: impl Storage,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let service = QueryService::new(storage, config.cache_capacity);

    infra::api::serve(api_config, service, shutdown)
        .await
        .context("serve API")
}
