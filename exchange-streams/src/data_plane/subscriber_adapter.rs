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

//! Subscriber side of a named stream.
//!
//! Receives items from one external publisher and hands them to the attached
//! pipeline consumer. Upstream demand is only requested while a consumer is
//! attached, and never exceeds `max_inflight` minus what is already outstanding,
//! buffered or being processed.

use crate::endpoint::{Completion, ExchangeConsumer, ExchangeOutcome};
use crate::error::{BridgeError, StreamError};
use crate::exchange::Exchange;
use crate::observability::{events, fields};
use crate::protocol::{Subscriber, Subscription};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "subscriber_adapter";

struct SubscriberState {
    consumer: Option<Arc<dyn ExchangeConsumer>>,
    upstream: Option<Arc<dyn Subscription>>,
    buffer: VecDeque<Exchange>,
    // Requested from upstream but not received yet.
    outstanding: u64,
    inflight: usize,
    draining: bool,
    closed: bool,
    rejected: u64,
}

enum DrainStep {
    Handoff(Arc<dyn ExchangeConsumer>, Exchange),
    Request(Arc<dyn Subscription>, u64),
    Idle,
}

impl SubscriberState {
    fn next_step(&mut self, max_inflight: usize) -> DrainStep {
        if self.closed {
            return DrainStep::Idle;
        }
        let Some(consumer) = self.consumer.as_ref() else {
            return DrainStep::Idle;
        };

        if self.inflight < max_inflight {
            if let Some(exchange) = self.buffer.pop_front() {
                self.inflight += 1;
                return DrainStep::Handoff(consumer.clone(), exchange);
            }
        }

        let Some(upstream) = self.upstream.as_ref() else {
            return DrainStep::Idle;
        };
        let committed = self.outstanding + (self.buffer.len() + self.inflight) as u64;
        let target = max_inflight as u64;
        if committed < target {
            let wanted = target - committed;
            self.outstanding += wanted;
            return DrainStep::Request(upstream.clone(), wanted);
        }

        DrainStep::Idle
    }
}

struct SubscriberInner {
    name: String,
    max_inflight: usize,
    buffer_capacity: usize,
    state: Mutex<SubscriberState>,
}

impl SubscriberInner {
    fn drain(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let step = {
                let mut state = self.state.lock();
                let step = state.next_step(self.max_inflight);
                if matches!(step, DrainStep::Idle) {
                    state.draining = false;
                }
                step
            };

            match step {
                DrainStep::Handoff(consumer, exchange) => {
                    debug!(
                        event = events::SUBSCRIBER_HANDOFF,
                        component = COMPONENT,
                        stream = self.name.as_str(),
                        exchange_id = exchange.id(),
                        "handing exchange to consumer"
                    );
                    let adapter = Arc::downgrade(self);
                    consumer.process(
                        exchange,
                        Completion::new(move |outcome| Self::on_handoff_done(&adapter, outcome)),
                    );
                }
                DrainStep::Request(upstream, n) => {
                    debug!(
                        event = events::SUBSCRIBER_REQUEST_DEMAND,
                        component = COMPONENT,
                        stream = self.name.as_str(),
                        demand = n,
                        "requesting upstream demand"
                    );
                    upstream.request(n);
                }
                DrainStep::Idle => return,
            }
        }
    }

    fn on_handoff_done(adapter: &Weak<Self>, outcome: ExchangeOutcome) {
        let Some(adapter) = adapter.upgrade() else {
            return;
        };
        adapter.state.lock().inflight -= 1;

        if let Err(err) = outcome {
            warn!(
                event = events::SUBSCRIBER_EXCHANGE_FAILED,
                component = COMPONENT,
                stream = adapter.name.as_str(),
                err = %err,
                "consumer failed to process exchange"
            );
        }
        adapter.drain();
    }
}

/// Registry-owned subscriber for one stream name. Clones share state.
#[derive(Clone)]
pub struct SubscriberAdapter {
    inner: Arc<SubscriberInner>,
}

impl SubscriberAdapter {
    pub(crate) fn new(name: &str, max_inflight: usize, buffer_capacity: usize) -> Self {
        Self {
            inner: Arc::new(SubscriberInner {
                name: name.to_string(),
                max_inflight,
                buffer_capacity,
                state: Mutex::new(SubscriberState {
                    consumer: None,
                    upstream: None,
                    buffer: VecDeque::new(),
                    outstanding: 0,
                    inflight: 0,
                    draining: false,
                    closed: false,
                    rejected: 0,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// This adapter as a protocol subscriber, ready to hand to an external publisher.
    pub fn as_subscriber(&self) -> Arc<dyn Subscriber<Exchange>> {
        Arc::new(self.clone())
    }

    pub fn attach_consumer(&self, consumer: Arc<dyn ExchangeConsumer>) -> Result<(), BridgeError> {
        {
            let mut state = self.inner.state.lock();
            if state.consumer.is_some() {
                warn!(
                    event = events::CONSUMER_ATTACH_REJECTED,
                    component = COMPONENT,
                    stream = self.inner.name.as_str(),
                    reason = fields::REASON_SLOT_OCCUPIED,
                    "consumer already attached"
                );
                return Err(BridgeError::ConsumerAlreadyAttached {
                    stream: self.inner.name.clone(),
                });
            }
            info!(
                event = events::CONSUMER_ATTACH,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                buffered = state.buffer.len(),
                "consumer attached"
            );
            state.consumer = Some(consumer);
        }

        self.inner.drain();
        Ok(())
    }

    /// Unbinds the consumer. Buffered items wait for the next one.
    pub fn detach_consumer(&self) -> Option<Arc<dyn ExchangeConsumer>> {
        let mut state = self.inner.state.lock();
        let detached = state.consumer.take();
        if detached.is_some() {
            info!(
                event = events::CONSUMER_DETACH,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                buffered = state.buffer.len(),
                inflight = state.inflight,
                "consumer detached"
            );
        }
        detached
    }

    /// The attached consumer, or [`BridgeError::NoConsumerAttached`].
    pub fn consumer(&self) -> Result<Arc<dyn ExchangeConsumer>, BridgeError> {
        self.inner
            .state
            .lock()
            .consumer
            .clone()
            .ok_or_else(|| BridgeError::NoConsumerAttached {
                stream: self.inner.name.clone(),
            })
    }

    pub fn has_upstream(&self) -> bool {
        self.inner.state.lock().upstream.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.inner.state.lock().inflight
    }

    /// Items refused because the buffer was full or the stream was closed.
    pub fn rejected_count(&self) -> u64 {
        self.inner.state.lock().rejected
    }

    /// Cancels the upstream subscription and stops handing off. Idempotent.
    pub fn close(&self) {
        let upstream = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.consumer = None;
            state.outstanding = 0;
            info!(
                event = events::SUBSCRIBER_CLOSED,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                buffered = state.buffer.len(),
                inflight = state.inflight,
                "subscriber closed"
            );
            state.upstream.take()
        };

        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

impl Subscriber<Exchange> for SubscriberAdapter {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let accepted = {
            let mut state = self.inner.state.lock();
            if state.closed || state.upstream.is_some() {
                false
            } else {
                state.upstream = Some(subscription.clone());
                state.outstanding = 0;
                true
            }
        };

        if !accepted {
            warn!(
                event = events::SUBSCRIBER_UPSTREAM_REJECTED,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                reason = fields::REASON_SLOT_OCCUPIED,
                "stream already fed by an upstream publisher; cancelling new subscription"
            );
            subscription.cancel();
            return;
        }

        info!(
            event = events::SUBSCRIBER_UPSTREAM_SUBSCRIBE,
            component = COMPONENT,
            stream = self.inner.name.as_str(),
            "upstream publisher subscribed"
        );
        self.inner.drain();
    }

    fn on_next(&self, item: Exchange) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                state.rejected += 1;
                warn!(
                    event = events::SUBSCRIBER_CLOSED,
                    component = COMPONENT,
                    stream = self.inner.name.as_str(),
                    exchange_id = item.id(),
                    reason = fields::REASON_SHUTDOWN,
                    rejected = state.rejected,
                    "stream closed; rejecting item still in flight from upstream"
                );
                return;
            }
            state.outstanding = state.outstanding.saturating_sub(1);
            if state.buffer.len() >= self.inner.buffer_capacity {
                state.rejected += 1;
                warn!(
                    event = events::SUBSCRIBER_BUFFER_OVERFLOW,
                    component = COMPONENT,
                    stream = self.inner.name.as_str(),
                    exchange_id = item.id(),
                    capacity = self.inner.buffer_capacity,
                    rejected = state.rejected,
                    "buffer full; rejecting item sent beyond requested demand"
                );
                return;
            }
            state.buffer.push_back(item);
        }

        self.inner.drain();
    }

    fn on_error(&self, error: StreamError) {
        let consumer = {
            let mut state = self.inner.state.lock();
            state.upstream = None;
            state.outstanding = 0;
            state.consumer.clone()
        };

        error!(
            event = events::SUBSCRIBER_UPSTREAM_ERROR,
            component = COMPONENT,
            stream = self.inner.name.as_str(),
            err = %error,
            "upstream publisher failed"
        );
        if let Some(consumer) = consumer {
            consumer.on_stream_error(&self.inner.name, &error);
        }
    }

    fn on_complete(&self) {
        let mut state = self.inner.state.lock();
        state.upstream = None;
        state.outstanding = 0;
        info!(
            event = events::SUBSCRIBER_UPSTREAM_COMPLETE,
            component = COMPONENT,
            stream = self.inner.name.as_str(),
            buffered = state.buffer.len(),
            "upstream publisher completed"
        );
    }
}
