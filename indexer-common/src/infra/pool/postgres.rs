// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::ops::Deref;

/// Configuration for a Postgres connection pool. The DSN carries credentials and is redacted
/// from debug output.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dsn: SecretString,

    #[serde(default = "max_connections_default")]
    pub max_connections: u32,
}

fn max_connections_default() -> u32 {
    10
}

/// New-type for a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresPool(PgPool);

impl PostgresPool {
    /// Create a new [PostgresPool] with the given [Config].
    pub async fn new(config: Config) -> Result<Self, sqlx::Error> {
        let Config {
            dsn,
            max_connections,
        } = config;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn.expose_secret())
            .await?;

        Ok(Self(pool))
    }
}

impl Deref for PostgresPool {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
