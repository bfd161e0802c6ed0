// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use chain_indexer::{
    application,
    config::{Config, InfraConfig},
    infra::{node::AlloyNode, storage::PostgresStorage},
};
use indexer_common::{
    config::ConfigExt,
    infra::{migrations, pool::postgres::PostgresPool},
    telemetry,
};
use log::{error, info};
use std::panic;
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() {
    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let error = format!("{error:#}");
        error!(error; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        run_migrations,
        application_config,
        infra_config:
            InfraConfig {
                node_config,
                storage_config,
            },
        telemetry_config,
    } = config;

    telemetry::init_metrics(telemetry_config.metrics_config)
        .context("install metrics exporter")?;

    let pool = PostgresPool::new(storage_config)
        .await
        .context("create DB pool for Postgres")?;
    if run_migrations {
        migrations::postgres::run(&pool)
            .await
            .context("run migrations for Postgres")?;
    }
    let storage = PostgresStorage::new(pool);

    let node = AlloyNode::new(node_config)
        .await
        .context("connect to chain node")?;

    application::run(application_config, node, storage, async move {
        let _ = sigterm.recv().await;
    })
    .await
    .context("run Chain Indexer application")
}
