/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Bridge tuning knobs, loadable from json5.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_THREAD_POOL_NAME: &str = "exchange-streams";
const DEFAULT_WORKER_THREADS: usize = 4;
const DEFAULT_MAX_INFLIGHT_EXCHANGES: usize = 128;
const DEFAULT_PUBLISHER_BUFFER_SIZE: usize = 1024;
const DEFAULT_SUBSCRIBER_BUFFER_SIZE: usize = 1024;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct BridgeConfig {
    /// Prefix of the worker thread names.
    pub thread_pool_name: String,
    pub worker_threads: usize,
    /// Upper bound on exchanges handed to a consumer and not yet completed, per stream.
    pub max_inflight_exchanges: usize,
    pub publisher_buffer_size: usize,
    pub subscriber_buffer_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thread_pool_name: DEFAULT_THREAD_POOL_NAME.to_string(),
            worker_threads: DEFAULT_WORKER_THREADS,
            max_inflight_exchanges: DEFAULT_MAX_INFLIGHT_EXCHANGES,
            publisher_buffer_size: DEFAULT_PUBLISHER_BUFFER_SIZE,
            subscriber_buffer_size: DEFAULT_SUBSCRIBER_BUFFER_SIZE,
        }
    }
}

impl BridgeConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = json5::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.thread_pool_name.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "thread_pool_name must not be empty".to_string(),
            ));
        }

        let sizes = [
            ("worker_threads", self.worker_threads),
            ("max_inflight_exchanges", self.max_inflight_exchanges),
            ("publisher_buffer_size", self.publisher_buffer_size),
            ("subscriber_buffer_size", self.subscriber_buffer_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(BridgeError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }

        // Demand requested upstream is bounded by max_inflight_exchanges, so the
        // buffer must be able to hold all of it after a consumer detaches.
        if self.subscriber_buffer_size < self.max_inflight_exchanges {
            return Err(BridgeError::InvalidConfig(
                "subscriber_buffer_size must be at least max_inflight_exchanges".to_string(),
            ));
        }

        Ok(())
    }
}
