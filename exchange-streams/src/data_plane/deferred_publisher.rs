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

//! One-shot publisher carrying the eventual reply of a single request.

use crate::error::StreamError;
use crate::observability::events;
use crate::observability::fields::WorkerContext;
use crate::protocol::{reject_subscriber, Publisher, Subscriber, Subscription};
use crate::runtime::worker_runtime::WorkerPool;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

const COMPONENT: &str = "deferred_publisher";

enum Resolution<T> {
    Pending,
    Resolved(T),
    Failed(StreamError),
    // Terminal signal handed to the worker pool, or subscriber gone.
    Delivered,
}

struct Downstream<T> {
    subscriber: Arc<dyn Subscriber<T>>,
    requested: bool,
}

struct DeferredState<T> {
    resolution: Resolution<T>,
    downstream: Option<Downstream<T>>,
    subscribed: bool,
}

enum Delivery<T> {
    Value(Arc<dyn Subscriber<T>>, T),
    Error(Arc<dyn Subscriber<T>>, StreamError),
}

struct DeferredInner<T> {
    stream: String,
    pool: WorkerPool,
    state: Mutex<DeferredState<T>>,
}

impl<T: Send + 'static> DeferredInner<T> {
    fn try_deliver(&self) {
        let delivery = {
            let mut state = self.state.lock();
            let ready = match (&state.resolution, state.downstream.as_ref()) {
                (Resolution::Resolved(_), Some(downstream)) => downstream.requested,
                (Resolution::Failed(_), Some(_)) => true,
                _ => false,
            };
            if !ready {
                return;
            }

            let Some(downstream) = state.downstream.take() else {
                return;
            };
            match std::mem::replace(&mut state.resolution, Resolution::Delivered) {
                Resolution::Resolved(value) => Delivery::Value(downstream.subscriber, value),
                Resolution::Failed(error) => Delivery::Error(downstream.subscriber, error),
                Resolution::Pending | Resolution::Delivered => return,
            }
        };

        self.dispatch(delivery);
    }

    fn dispatch(&self, delivery: Delivery<T>) {
        let subscriber = match &delivery {
            Delivery::Value(subscriber, _) | Delivery::Error(subscriber, _) => subscriber.clone(),
        };

        debug!(
            event = events::DEFERRED_DISPATCH,
            component = COMPONENT,
            stream = self.stream.as_str(),
            worker_pool = self.pool.name(),
            "dispatching terminal signal"
        );
        let worker_pool = self.pool.name().to_string();
        let stream = self.stream.clone();
        let dropped_stream = self.stream.clone();
        self.pool.dispatch(
            move || {
                let context = WorkerContext::with_current_thread(worker_pool);
                trace!(
                    event = events::DEFERRED_DISPATCH,
                    component = COMPONENT,
                    stream = stream.as_str(),
                    worker_pool = context.worker_pool.as_str(),
                    worker_thread = context.worker_thread.as_str(),
                    "delivering terminal signal"
                );
                match delivery {
                    Delivery::Value(subscriber, value) => {
                        subscriber.on_next(value);
                        subscriber.on_complete();
                    }
                    Delivery::Error(subscriber, error) => subscriber.on_error(error),
                }
            },
            move |err| {
                warn!(
                    event = events::DEFERRED_DISPATCH,
                    component = COMPONENT,
                    stream = dropped_stream.as_str(),
                    err = %err,
                    "worker pool unavailable; failing subscriber inline"
                );
                subscriber.on_error(err);
            },
        );
    }

    fn request(&self, n: u64) {
        if n == 0 {
            let subscriber = {
                let mut state = self.state.lock();
                state.resolution = Resolution::Delivered;
                state.downstream.take().map(|downstream| downstream.subscriber)
            };
            if let Some(subscriber) = subscriber {
                subscriber.on_error(StreamError::NonPositiveRequest);
            }
            return;
        }

        {
            let mut state = self.state.lock();
            match state.downstream.as_mut() {
                Some(downstream) => downstream.requested = true,
                None => return,
            }
        }
        self.try_deliver();
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        if state.downstream.take().is_some() {
            debug!(
                event = events::PUBLISHER_CANCEL,
                component = COMPONENT,
                stream = self.stream.as_str(),
                "reply subscriber cancelled"
            );
        }
    }
}

struct DeferredSubscription<T> {
    publisher: Weak<DeferredInner<T>>,
}

impl<T: Send + 'static> Subscription for DeferredSubscription<T> {
    fn request(&self, n: u64) {
        if let Some(publisher) = self.publisher.upgrade() {
            publisher.request(n);
        }
    }

    fn cancel(&self) {
        if let Some(publisher) = self.publisher.upgrade() {
            publisher.cancel();
        }
    }
}

/// Publisher of exactly one value or one error, resolved later by a completion callback.
///
/// Resolution is first-wins: once resolved or failed, [`DeferredPublisher::set_data`] and
/// [`DeferredPublisher::set_exception`] return `false` and change nothing. Terminal signals
/// are always emitted from the worker pool, never from the resolving thread. Only one
/// subscriber is accepted over the publisher's lifetime.
pub struct DeferredPublisher<T: Send + 'static> {
    inner: Arc<DeferredInner<T>>,
}

impl<T: Send + 'static> Clone for DeferredPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> DeferredPublisher<T> {
    pub fn new(stream: &str, pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(DeferredInner {
                stream: stream.to_string(),
                pool,
                state: Mutex::new(DeferredState {
                    resolution: Resolution::Pending,
                    downstream: None,
                    subscribed: false,
                }),
            }),
        }
    }

    pub fn stream(&self) -> &str {
        &self.inner.stream
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.state.lock().resolution, Resolution::Pending)
    }

    /// Resolves with `value`. Returns `false` if already resolved or failed.
    pub fn set_data(&self, value: T) -> bool {
        if !self.resolve(Resolution::Resolved(value)) {
            return false;
        }
        debug!(
            event = events::DEFERRED_RESOLVED,
            component = COMPONENT,
            stream = self.inner.stream.as_str(),
            "reply resolved"
        );
        self.inner.try_deliver();
        true
    }

    /// Fails with `error`. Returns `false` if already resolved or failed.
    pub fn set_exception(&self, error: StreamError) -> bool {
        let message = error.to_string();
        if !self.resolve(Resolution::Failed(error)) {
            return false;
        }
        debug!(
            event = events::DEFERRED_FAILED,
            component = COMPONENT,
            stream = self.inner.stream.as_str(),
            err = message.as_str(),
            "reply failed"
        );
        self.inner.try_deliver();
        true
    }

    fn resolve(&self, resolution: Resolution<T>) -> bool {
        let mut state = self.inner.state.lock();
        if !matches!(state.resolution, Resolution::Pending) {
            debug!(
                event = events::DEFERRED_ALREADY_TERMINAL,
                component = COMPONENT,
                stream = self.inner.stream.as_str(),
                "reply already settled; ignoring"
            );
            return false;
        }
        state.resolution = resolution;
        true
    }
}

impl<T: Send + 'static> Publisher<T> for DeferredPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let accepted = {
            let mut state = self.inner.state.lock();
            if state.subscribed {
                false
            } else {
                state.subscribed = true;
                state.downstream = Some(Downstream {
                    subscriber: subscriber.clone(),
                    requested: false,
                });
                true
            }
        };

        if !accepted {
            warn!(
                event = events::DEFERRED_SUBSCRIBE_REJECTED,
                component = COMPONENT,
                stream = self.inner.stream.as_str(),
                "reply publisher accepts a single subscriber"
            );
            reject_subscriber(
                &subscriber,
                StreamError::AlreadySubscribed {
                    stream: self.inner.stream.clone(),
                },
            );
            return;
        }

        subscriber.on_subscribe(Arc::new(DeferredSubscription {
            publisher: Arc::downgrade(&self.inner),
        }));
        // A failure is terminal and needs no demand.
        self.inner.try_deliver();
    }
}
