// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use log::info;
use logforth::{append, filter::env_filter::EnvFilterBuilder};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Deserialize;
use std::net::IpAddr;

/// Telemetry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "metrics", default)]
    pub metrics_config: Option<MetricsConfig>,
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub address: IpAddr,
    pub port: u16,
}

/// Initialize logging: env-filtered, writing to stderr.
pub fn init_logging() {
    logforth::starter_log::builder()
        .dispatch(|dispatch| {
            dispatch
                .filter(EnvFilterBuilder::from_default_env().build())
                .append(append::Stderr::default())
        })
        .apply();
}

/// Install the Prometheus metrics exporter if configured; without configuration metrics are
/// recorded into the void.
pub fn init_metrics(config: Option<MetricsConfig>) -> Result<(), BuildError> {
    if let Some(MetricsConfig { address, port }) = config {
        PrometheusBuilder::new()
            .with_http_listener((address, port))
            .install()?;

        info!(port; "serving Prometheus metrics");
    }

    Ok(())
}
