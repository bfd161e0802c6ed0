// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{application, infra};
use indexer_common::{infra::pool, telemetry};
use serde::Deserialize;

/// Top-level configuration of the Indexer API.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "application", default)]
    pub application_config: application::Config,

    #[serde(rename = "infra")]
    pub infra_config: InfraConfig,

    #[serde(rename = "telemetry", default)]
    pub telemetry_config: telemetry::Config,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfraConfig {
    #[serde(rename = "api")]
    pub api_config: infra::api::Config,

    #[serde(rename = "storage")]
    pub storage_config: pool::postgres::Config,
}
