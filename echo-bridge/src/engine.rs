/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

use crate::config::ReplyMode;
use crate::consumers::ReplyingConsumer;
use async_trait::async_trait;
use exchange_streams::{PipelineEngine, PipelineError, RouteDefinition, RouteEndpoint, StreamBridge};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::info;

/// Engine that can only serve request routes to locators answered in-process.
pub struct EchoLocatorEngine {
    locators: HashSet<String>,
    bridge: Mutex<Weak<StreamBridge>>,
}

impl EchoLocatorEngine {
    pub fn new(locators: impl IntoIterator<Item = String>) -> Self {
        Self {
            locators: locators.into_iter().collect(),
            bridge: Mutex::new(Weak::new()),
        }
    }

    pub fn bind(&self, bridge: &Arc<StreamBridge>) {
        *self.bridge.lock() = Arc::downgrade(bridge);
    }
}

#[async_trait]
impl PipelineEngine for EchoLocatorEngine {
    async fn install_route(&self, route: RouteDefinition) -> Result<(), PipelineError> {
        let (RouteEndpoint::Stream(stream), RouteEndpoint::Locator(locator)) = (&route.from, &route.to)
        else {
            return Err(PipelineError::Rejected(format!(
                "only stream -> locator routes are served, got {route}"
            )));
        };
        if !self.locators.contains(locator) {
            return Err(PipelineError::UnknownLocator(locator.clone()));
        }

        let bridge = self
            .bridge
            .lock()
            .upgrade()
            .ok_or_else(|| PipelineError::Rejected("bridge is gone".to_string()))?;
        bridge
            .attach_consumer(stream, Arc::new(ReplyingConsumer::new(stream, ReplyMode::Echo)))
            .map_err(|err| PipelineError::Rejected(err.to_string()))?;

        info!(route = %route, "echo route installed");
        Ok(())
    }
}
