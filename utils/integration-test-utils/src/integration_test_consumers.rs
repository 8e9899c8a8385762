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

use exchange_streams::{Completion, Exchange, ExchangeConsumer, ExchangeProducer, StreamError};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Completes every exchange inline with its input copied to the output.
#[derive(Default)]
pub struct EchoConsumer {
    seen: Mutex<Vec<Value>>,
    stream_errors: Mutex<Vec<StreamError>>,
}

impl EchoConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input bodies in processing order.
    pub fn seen(&self) -> Vec<Value> {
        self.seen.lock().clone()
    }

    pub fn stream_errors(&self) -> Vec<StreamError> {
        self.stream_errors.lock().clone()
    }
}

impl ExchangeConsumer for EchoConsumer {
    fn process(&self, mut exchange: Exchange, completion: Completion) {
        debug!(exchange_id = exchange.id(), "echo consumer processing exchange");
        self.seen.lock().push(exchange.input().body.clone());
        let reply = exchange.input().clone();
        exchange.set_output(reply);
        completion.complete(exchange);
    }

    fn on_stream_error(&self, _stream: &str, error: &StreamError) {
        self.stream_errors.lock().push(error.clone());
    }
}

/// Keeps every completion until the test releases it.
#[derive(Default)]
pub struct HoldingConsumer {
    held: Mutex<Vec<(Exchange, Completion)>>,
}

impl HoldingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held_len(&self) -> usize {
        self.held.lock().len()
    }

    /// Completes the oldest held exchange; returns `false` when nothing is held.
    pub fn complete_oldest(&self) -> bool {
        let oldest = {
            let mut held = self.held.lock();
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        let (exchange, completion) = oldest;
        completion.complete(exchange);
        true
    }

    /// Drops every held completion, abandoning the exchanges.
    pub fn abandon_all(&self) {
        let held = std::mem::take(&mut *self.held.lock());
        drop(held);
    }
}

impl ExchangeConsumer for HoldingConsumer {
    fn process(&self, exchange: Exchange, completion: Completion) {
        self.held.lock().push((exchange, completion));
    }
}

pub struct TestProducer {
    id: String,
}

impl TestProducer {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl ExchangeProducer for TestProducer {
    fn producer_id(&self) -> &str {
        &self.id
    }
}
