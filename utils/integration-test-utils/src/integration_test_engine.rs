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

use crate::{EchoConsumer, TestProducer};
use async_trait::async_trait;
use exchange_streams::{
    Completion, Exchange, ExchangeOutcome, PipelineEngine, PipelineError, RouteDefinition,
    RouteEndpoint, StreamBridge, StreamPayload,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// In-memory engine: every locator is served inside the process.
///
/// * `locator -> stream` routes attach a producer to the stream; [`LoopbackEngine::emit`]
///   then pushes exchanges "arriving" from the locator into it.
/// * `stream -> locator` routes attach a shared [`EchoConsumer`] to the stream.
/// * `locator -> processor` routes hand exchanges from the locator to the stream's
///   processor; [`LoopbackEngine::call`] waits for its reply. The latest route wins.
#[derive(Default)]
pub struct LoopbackEngine {
    bridge: Mutex<Weak<StreamBridge>>,
    installed: Mutex<Vec<RouteDefinition>>,
    sources: Mutex<HashMap<String, String>>,
    processors: Mutex<HashMap<String, String>>,
    failures_left: AtomicUsize,
    echo: Arc<EchoConsumer>,
}

impl LoopbackEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stream endpoints are wired through `bridge`, held weakly.
    pub fn bind(&self, bridge: &Arc<StreamBridge>) {
        *self.bridge.lock() = Arc::downgrade(bridge);
    }

    /// Makes the next `count` installations fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn installed_routes(&self) -> Vec<RouteDefinition> {
        self.installed.lock().clone()
    }

    pub fn echo(&self) -> Arc<EchoConsumer> {
        self.echo.clone()
    }

    /// Publishes `body` as arriving from `locator`. Returns `false` if no route reads `locator`.
    ///
    /// A processor route on `locator` runs too; its reply is discarded.
    pub fn emit(&self, locator: &str, body: impl Into<Value>) -> bool {
        let Some(bridge) = self.bridge.lock().upgrade() else {
            return false;
        };
        let body = body.into();
        let mut delivered = false;

        let source = self.sources.lock().get(locator).cloned();
        if let Some(stream) = source {
            if let Ok(publisher) = bridge.publisher(&stream) {
                publisher.publish(StreamPayload::detached(Exchange::new(body.clone())));
                delivered = true;
            }
        }

        let processor = self.processors.lock().get(locator).cloned();
        if let Some(stream) = processor {
            delivered |= bridge
                .process_exchange(&stream, Exchange::request(body), Completion::new(|_| {}))
                .is_ok();
        }
        delivered
    }

    /// Sends `body` through the processor route on `locator` and waits for the reply.
    ///
    /// Returns `None` if no processor route reads `locator`.
    pub async fn call(&self, locator: &str, body: impl Into<Value>) -> Option<ExchangeOutcome> {
        let stream = self.processors.lock().get(locator).cloned()?;
        let bridge = self.bridge.lock().upgrade()?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        let completion = Completion::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        bridge
            .process_exchange(&stream, Exchange::request(body), completion)
            .ok()?;
        drop(bridge);
        rx.await.ok()
    }

    fn wire(&self, route: &RouteDefinition) -> Result<(), PipelineError> {
        let bridge = self
            .bridge
            .lock()
            .upgrade()
            .ok_or_else(|| PipelineError::Rejected("engine not bound to a bridge".to_string()))?;

        match (&route.from, &route.to) {
            (RouteEndpoint::Locator(locator), RouteEndpoint::Stream(stream)) => {
                bridge
                    .attach_producer(stream, Arc::new(TestProducer::new(locator)))
                    .map_err(|err| PipelineError::Rejected(err.to_string()))?;
                self.sources.lock().insert(locator.clone(), stream.clone());
                Ok(())
            }
            (RouteEndpoint::Locator(locator), RouteEndpoint::Processor(stream)) => {
                bridge
                    .subscriber(stream)
                    .and_then(|subscriber| subscriber.consumer())
                    .map_err(|err| PipelineError::Rejected(err.to_string()))?;
                self.processors.lock().insert(locator.clone(), stream.clone());
                Ok(())
            }
            (RouteEndpoint::Stream(stream), RouteEndpoint::Locator(_)) => bridge
                .attach_consumer(stream, self.echo.clone())
                .map_err(|err| PipelineError::Rejected(err.to_string())),
            _ => Err(PipelineError::Rejected(route.to_string())),
        }
    }
}

#[async_trait]
impl PipelineEngine for LoopbackEngine {
    async fn install_route(&self, route: RouteDefinition) -> Result<(), PipelineError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PipelineError::UnknownLocator(route.to_string()));
        }

        // Yield so concurrent binders genuinely overlap.
        tokio::task::yield_now().await;
        self.wire(&route)?;
        debug!(route = %route, "loopback route installed");
        self.installed.lock().push(route);
        Ok(())
    }
}
