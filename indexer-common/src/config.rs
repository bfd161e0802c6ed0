// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use figment::{
    Figment,
    providers::{Env, Format, Json},
};
use serde::de::DeserializeOwned;
use std::env;

const CONFIG_FILE_ENV_VAR: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.json";
const ENV_VAR_PREFIX: &str = "APP__";
const ENV_VAR_SEPARATOR: &str = "__";

/// Extension methods for configuration types.
pub trait ConfigExt
where
    Self: DeserializeOwned,
{
    /// Load the configuration from the JSON file named by the `CONFIG_FILE` environment
    /// variable, defaulting to `config.json`, with `APP__` prefixed environment variables
    /// taking precedence over file values.
    fn load() -> Result<Self, figment::Error> {
        let config_file =
            env::var(CONFIG_FILE_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Figment::new()
            .merge(Json::file(config_file))
            .merge(Env::prefixed(ENV_VAR_PREFIX).split(ENV_VAR_SEPARATOR))
            .extract()
    }
}

impl<T> ConfigExt for T where T: DeserializeOwned {}
