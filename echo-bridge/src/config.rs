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

use exchange_streams::{BridgeConfig, BridgeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5_000;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) bridge: BridgeConfig,
    pub(crate) streams: Vec<StreamConfig>,
    /// Locators answered in-process by an echo consumer.
    #[serde(default)]
    pub(crate) echo_locators: Vec<String>,
    /// Requests issued once at startup.
    #[serde(default)]
    pub(crate) requests: Vec<RequestConfig>,
    #[serde(default = "default_reply_timeout_ms")]
    pub(crate) reply_timeout_ms: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) reply: ReplyMode,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    #[default]
    Echo,
    Uppercase,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    #[serde(default)]
    pub(crate) stream: Option<String>,
    #[serde(default)]
    pub(crate) locator: Option<String>,
    pub(crate) body: Value,
}

/// Where a startup request goes.
#[derive(Debug, Eq, PartialEq)]
pub enum RequestTarget<'a> {
    Stream(&'a str),
    Locator(&'a str),
}

fn default_reply_timeout_ms() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}

impl RequestConfig {
    pub(crate) fn target(&self) -> Result<RequestTarget<'_>, BridgeError> {
        match (self.stream.as_deref(), self.locator.as_deref()) {
            (Some(stream), None) => Ok(RequestTarget::Stream(stream)),
            (None, Some(locator)) => Ok(RequestTarget::Locator(locator)),
            _ => Err(BridgeError::InvalidConfig(
                "each request needs exactly one of `stream` or `locator`".to_string(),
            )),
        }
    }
}

impl Config {
    pub(crate) fn from_json5_str(contents: &str) -> Result<Self, BridgeError> {
        let config: Config = json5::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        self.bridge.validate()?;

        let mut names = HashSet::new();
        for stream in &self.streams {
            if !names.insert(stream.name.as_str()) {
                return Err(BridgeError::InvalidConfig(format!(
                    "duplicate stream name found: {}",
                    stream.name
                )));
            }
        }

        for request in &self.requests {
            request.target()?;
        }
        Ok(())
    }
}
