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

//! Publisher side of a named stream.
//!
//! Internal producers push envelopes in; at most one downstream subscriber drains
//! them in FIFO order, bounded by its demand.

use crate::data_plane::payload::StreamPayload;
use crate::endpoint::ExchangeProducer;
use crate::error::{BridgeError, StreamError};
use crate::exchange::Exchange;
use crate::observability::{events, fields};
use crate::protocol::{reject_subscriber, Publisher, Subscriber, Subscription};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

const COMPONENT: &str = "publisher_adapter";

struct Downstream {
    id: u64,
    subscriber: Arc<dyn Subscriber<Exchange>>,
    // u64::MAX means unbounded.
    demand: u64,
}

struct PublisherState {
    producer: Option<Arc<dyn ExchangeProducer>>,
    downstream: Option<Downstream>,
    buffer: VecDeque<StreamPayload<Exchange>>,
    draining: bool,
    closed: bool,
    next_subscription_id: u64,
}

enum DrainStep {
    Deliver(Arc<dyn Subscriber<Exchange>>, StreamPayload<Exchange>),
    Close(Option<Arc<dyn Subscriber<Exchange>>>, Vec<StreamPayload<Exchange>>),
    Idle,
}

impl PublisherState {
    fn next_step(&mut self) -> DrainStep {
        if self.closed {
            let subscriber = self.downstream.take().map(|downstream| downstream.subscriber);
            let pending: Vec<_> = self.buffer.drain(..).collect();
            if subscriber.is_some() || !pending.is_empty() {
                return DrainStep::Close(subscriber, pending);
            }
            return DrainStep::Idle;
        }

        let Some(downstream) = self.downstream.as_mut() else {
            return DrainStep::Idle;
        };
        if downstream.demand == 0 {
            return DrainStep::Idle;
        }
        let Some(payload) = self.buffer.pop_front() else {
            return DrainStep::Idle;
        };

        if downstream.demand != u64::MAX {
            downstream.demand -= 1;
        }
        DrainStep::Deliver(downstream.subscriber.clone(), payload)
    }
}

struct PublisherInner {
    name: String,
    buffer_capacity: usize,
    state: Mutex<PublisherState>,
}

impl PublisherInner {
    /// Single-writer delivery loop; concurrent callers hand off to the active drainer.
    fn drain(&self) {
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
                let step = state.next_step();
                if matches!(step, DrainStep::Idle) {
                    state.draining = false;
                }
                step
            };

            match step {
                DrainStep::Deliver(subscriber, payload) => {
                    debug!(
                        event = events::PUBLISHER_DELIVER,
                        component = COMPONENT,
                        stream = self.name.as_str(),
                        exchange_id = payload.data().id(),
                        "delivering exchange downstream"
                    );
                    subscriber.on_next(payload.data().clone());
                    payload.complete(Ok(()));
                }
                DrainStep::Close(subscriber, pending) => {
                    let closed = StreamError::StreamClosed {
                        stream: self.name.clone(),
                    };
                    for payload in pending {
                        payload.complete(Err(closed.clone()));
                    }
                    if let Some(subscriber) = subscriber {
                        subscriber.on_complete();
                    }
                }
                DrainStep::Idle => return,
            }
        }
    }

    fn add_demand(&self, subscription_id: u64, n: u64) {
        {
            let mut state = self.state.lock();
            match state.downstream.as_mut() {
                Some(downstream) if downstream.id == subscription_id => {
                    downstream.demand = downstream.demand.saturating_add(n);
                }
                _ => return,
            }
        }
        self.drain();
    }

    fn reject_request(&self, subscription_id: u64) {
        let subscriber = {
            let mut state = self.state.lock();
            let current = matches!(
                state.downstream.as_ref(),
                Some(downstream) if downstream.id == subscription_id
            );
            if current {
                state.downstream.take().map(|downstream| downstream.subscriber)
            } else {
                None
            }
        };

        if let Some(subscriber) = subscriber {
            warn!(
                event = events::PUBLISHER_INVALID_REQUEST,
                component = COMPONENT,
                stream = self.name.as_str(),
                reason = fields::REASON_ZERO_DEMAND,
                "subscriber requested zero items; cancelling subscription"
            );
            subscriber.on_error(StreamError::NonPositiveRequest);
        }
    }

    fn cancel(&self, subscription_id: u64) {
        let mut state = self.state.lock();
        if matches!(state.downstream.as_ref(), Some(downstream) if downstream.id == subscription_id)
        {
            state.downstream = None;
            info!(
                event = events::PUBLISHER_CANCEL,
                component = COMPONENT,
                stream = self.name.as_str(),
                buffered = state.buffer.len(),
                "downstream subscription cancelled"
            );
        }
    }
}

struct PublisherSubscription {
    publisher: Weak<PublisherInner>,
    id: u64,
}

impl Subscription for PublisherSubscription {
    fn request(&self, n: u64) {
        let Some(publisher) = self.publisher.upgrade() else {
            return;
        };
        if n == 0 {
            publisher.reject_request(self.id);
        } else {
            publisher.add_demand(self.id, n);
        }
    }

    fn cancel(&self) {
        if let Some(publisher) = self.publisher.upgrade() {
            publisher.cancel(self.id);
        }
    }
}

/// Registry-owned publisher for one stream name. Clones share state.
#[derive(Clone)]
pub struct PublisherAdapter {
    inner: Arc<PublisherInner>,
}

impl PublisherAdapter {
    pub(crate) fn new(name: &str, buffer_capacity: usize) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                name: name.to_string(),
                buffer_capacity,
                state: Mutex::new(PublisherState {
                    producer: None,
                    downstream: None,
                    buffer: VecDeque::new(),
                    draining: false,
                    closed: false,
                    next_subscription_id: 0,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queues `payload` for delivery. Never blocks.
    ///
    /// A full buffer or a closed stream completes the payload with an error instead.
    pub fn publish(&self, payload: StreamPayload<Exchange>) {
        let rejected = {
            let mut state = self.inner.state.lock();
            if state.closed {
                Some((
                    payload,
                    StreamError::StreamClosed {
                        stream: self.inner.name.clone(),
                    },
                ))
            } else if state.buffer.len() >= self.inner.buffer_capacity {
                Some((
                    payload,
                    StreamError::BufferOverflow {
                        stream: self.inner.name.clone(),
                        capacity: self.inner.buffer_capacity,
                    },
                ))
            } else {
                debug!(
                    event = events::PUBLISHER_BUFFERED,
                    component = COMPONENT,
                    stream = self.inner.name.as_str(),
                    exchange_id = payload.data().id(),
                    buffered = state.buffer.len() + 1,
                    "exchange queued"
                );
                state.buffer.push_back(payload);
                None
            }
        };

        if let Some((payload, error)) = rejected {
            warn!(
                event = events::PUBLISHER_BUFFER_OVERFLOW,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                exchange_id = payload.data().id(),
                capacity = self.inner.buffer_capacity,
                err = %error,
                "exchange rejected"
            );
            payload.complete(Err(error));
            return;
        }

        self.inner.drain();
    }

    pub fn attach_producer(&self, producer: Arc<dyn ExchangeProducer>) -> Result<(), BridgeError> {
        let mut state = self.inner.state.lock();
        if let Some(existing) = state.producer.as_ref() {
            warn!(
                event = events::PRODUCER_ATTACH_REJECTED,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                producer = existing.producer_id(),
                reason = fields::REASON_SLOT_OCCUPIED,
                "producer already attached"
            );
            return Err(BridgeError::ProducerAlreadyAttached {
                stream: self.inner.name.clone(),
            });
        }

        info!(
            event = events::PRODUCER_ATTACH,
            component = COMPONENT,
            stream = self.inner.name.as_str(),
            producer = producer.producer_id(),
            "producer attached"
        );
        state.producer = Some(producer);
        Ok(())
    }

    /// Unbinds the producer, returning it when one was attached.
    pub fn detach_producer(&self) -> Option<Arc<dyn ExchangeProducer>> {
        let detached = self.inner.state.lock().producer.take();
        if let Some(producer) = detached.as_ref() {
            info!(
                event = events::PRODUCER_DETACH,
                component = COMPONENT,
                stream = self.inner.name.as_str(),
                producer = producer.producer_id(),
                "producer detached"
            );
        }
        detached
    }

    pub fn producer(&self) -> Option<Arc<dyn ExchangeProducer>> {
        self.inner.state.lock().producer.clone()
    }

    pub fn has_subscriber(&self) -> bool {
        self.inner.state.lock().downstream.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// Fails every buffered payload and completes the subscriber. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.producer = None;
        }

        info!(
            event = events::PUBLISHER_CLOSED,
            component = COMPONENT,
            stream = self.inner.name.as_str(),
            "publisher closed"
        );
        self.inner.drain();
    }
}

impl Publisher<Exchange> for PublisherAdapter {
    /// Only one downstream subscriber at a time; a second one is rejected with
    /// [`StreamError::AlreadySubscribed`].
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<Exchange>>) {
        let accepted = {
            let mut state = self.inner.state.lock();
            if state.closed {
                Err(StreamError::StreamClosed {
                    stream: self.inner.name.clone(),
                })
            } else if state.downstream.is_some() {
                Err(StreamError::AlreadySubscribed {
                    stream: self.inner.name.clone(),
                })
            } else {
                state.next_subscription_id += 1;
                let id = state.next_subscription_id;
                state.downstream = Some(Downstream {
                    id,
                    subscriber: subscriber.clone(),
                    demand: 0,
                });
                Ok(id)
            }
        };

        match accepted {
            Ok(id) => {
                info!(
                    event = events::PUBLISHER_SUBSCRIBE_OK,
                    component = COMPONENT,
                    stream = self.inner.name.as_str(),
                    "downstream subscriber attached"
                );
                subscriber.on_subscribe(Arc::new(PublisherSubscription {
                    publisher: Arc::downgrade(&self.inner),
                    id,
                }));
            }
            Err(error) => {
                warn!(
                    event = events::PUBLISHER_SUBSCRIBE_REJECTED,
                    component = COMPONENT,
                    stream = self.inner.name.as_str(),
                    err = %error,
                    "downstream subscriber rejected"
                );
                reject_subscriber(&subscriber, error);
            }
        }
    }
}
