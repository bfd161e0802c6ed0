// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod telemetry;
