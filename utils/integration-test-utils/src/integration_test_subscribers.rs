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

use exchange_streams::{StreamError, Subscriber, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamSignal<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

struct CollectorState<T> {
    subscription: Option<Arc<dyn Subscription>>,
    subscribe_count: usize,
    signals: Vec<StreamSignal<T>>,
}

/// Subscriber recording every signal, awaitable from async tests.
pub struct CollectingSubscriber<T> {
    initial_request: u64,
    state: Mutex<CollectorState<T>>,
    changed: Notify,
}

impl<T: Clone + Send + 'static> CollectingSubscriber<T> {
    /// `initial_request` is requested on subscribe; `0` requests nothing.
    pub fn new(initial_request: u64) -> Arc<Self> {
        Arc::new(Self {
            initial_request,
            state: Mutex::new(CollectorState {
                subscription: None,
                subscribe_count: 0,
                signals: Vec::new(),
            }),
            changed: Notify::new(),
        })
    }

    pub fn unbounded() -> Arc<Self> {
        Self::new(u64::MAX)
    }

    pub fn request(&self, n: u64) {
        let subscription = self.state.lock().subscription.clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    pub fn cancel(&self) {
        let subscription = self.state.lock().subscription.clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.state.lock().subscribe_count
    }

    pub fn signals(&self) -> Vec<StreamSignal<T>> {
        self.state.lock().signals.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.state
            .lock()
            .signals
            .iter()
            .filter_map(|signal| match signal {
                StreamSignal::Next(item) => Some(item.clone()),
                _ => None,
            })
            .collect()
    }

    /// Waits until `count` signals arrived; panics after `timeout`.
    pub async fn wait_for_signals(&self, count: usize, timeout: Duration) -> Vec<StreamSignal<T>> {
        let waiting = async {
            loop {
                let notified = self.changed.notified();
                {
                    let state = self.state.lock();
                    if state.signals.len() >= count {
                        return state.signals.clone();
                    }
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, waiting).await {
            Ok(signals) => signals,
            Err(_) => panic!(
                "timed out waiting for {count} signals, got {:?} so far",
                self.state.lock().signals.len()
            ),
        }
    }

    fn push(&self, signal: StreamSignal<T>) {
        self.state.lock().signals.push(signal);
        self.changed.notify_waiters();
    }
}

impl<T: Clone + Send + 'static> Subscriber<T> for CollectingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        {
            let mut state = self.state.lock();
            state.subscribe_count += 1;
            state.subscription = Some(subscription.clone());
        }
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&self, item: T) {
        self.push(StreamSignal::Next(item));
    }

    fn on_error(&self, error: StreamError) {
        self.push(StreamSignal::Error(error));
    }

    fn on_complete(&self) {
        self.push(StreamSignal::Complete);
    }
}
