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

//! Typed views over exchange streams.
//!
//! Conversion failures never drop items silently: the upstream subscription is
//! cancelled and the failure reaches the subscriber through `on_error`.

use crate::error::StreamError;
use crate::exchange::Exchange;
use crate::observability::{events, fields};
use crate::protocol::{Publisher, Subscriber, Subscription};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

const COMPONENT: &str = "converting";

/// Narrows exchanges to `T` and widens `T` back into exchanges.
pub trait TypeConverter<T>: Send + Sync {
    fn narrow(&self, exchange: &Exchange) -> Result<T, StreamError>;
    fn widen(&self, value: T) -> Result<Exchange, StreamError>;
}

/// Converter going through the exchange's JSON body.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonConverter;

impl<T> TypeConverter<T> for JsonConverter
where
    T: Serialize + DeserializeOwned,
{
    fn narrow(&self, exchange: &Exchange) -> Result<T, StreamError> {
        serde_json::from_value(exchange.message().body.clone())
            .map_err(|err| StreamError::Conversion(err.to_string()))
    }

    fn widen(&self, value: T) -> Result<Exchange, StreamError> {
        serde_json::to_value(value)
            .map(Exchange::new)
            .map_err(|err| StreamError::Conversion(err.to_string()))
    }
}

/// Guards the upstream link of a converting wrapper and stops it after the first failure.
struct ConversionGuard {
    stream: String,
    upstream: Mutex<Option<Arc<dyn Subscription>>>,
    failed: AtomicBool,
}

impl ConversionGuard {
    fn new(stream: &str) -> Self {
        Self {
            stream: stream.to_string(),
            upstream: Mutex::new(None),
            failed: AtomicBool::new(false),
        }
    }

    fn set_upstream(&self, subscription: Arc<dyn Subscription>) {
        *self.upstream.lock() = Some(subscription);
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Returns `false` when a failure was already reported.
    fn fail(&self, body_kind: &'static str, error: &StreamError) -> bool {
        if self.failed.swap(true, Ordering::AcqRel) {
            return false;
        }
        warn!(
            event = events::CONVERSION_FAILED,
            component = COMPONENT,
            stream = self.stream.as_str(),
            body_kind,
            err = %error,
            "conversion failed; cancelling upstream"
        );
        let upstream = self.upstream.lock().take();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
        true
    }
}

struct NarrowingSubscriber<T> {
    downstream: Arc<dyn Subscriber<T>>,
    converter: Arc<dyn TypeConverter<T>>,
    guard: ConversionGuard,
}

impl<T: Send + 'static> Subscriber<Exchange> for NarrowingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.guard.set_upstream(subscription.clone());
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&self, item: Exchange) {
        if self.guard.has_failed() {
            return;
        }
        match self.converter.narrow(&item) {
            Ok(value) => self.downstream.on_next(value),
            Err(error) => {
                if self
                    .guard
                    .fail(fields::format_exchange_body_kind(&item), &error)
                {
                    self.downstream.on_error(error);
                }
            }
        }
    }

    fn on_error(&self, error: StreamError) {
        if !self.guard.has_failed() {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if !self.guard.has_failed() {
            self.downstream.on_complete();
        }
    }
}

/// `Publisher<T>` view over a publisher of exchanges.
pub struct ConvertingPublisher<T> {
    stream: String,
    inner: Arc<dyn Publisher<Exchange>>,
    converter: Arc<dyn TypeConverter<T>>,
}

impl<T> Clone for ConvertingPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            inner: self.inner.clone(),
            converter: self.converter.clone(),
        }
    }
}

impl<T: Send + 'static> ConvertingPublisher<T> {
    pub fn new(
        stream: &str,
        inner: Arc<dyn Publisher<Exchange>>,
        converter: Arc<dyn TypeConverter<T>>,
    ) -> Self {
        Self {
            stream: stream.to_string(),
            inner,
            converter,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }
}

impl<T: Send + 'static> Publisher<T> for ConvertingPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.inner.subscribe(Arc::new(NarrowingSubscriber {
            downstream: subscriber,
            converter: self.converter.clone(),
            guard: ConversionGuard::new(&self.stream),
        }));
    }
}

/// `Subscriber<T>` view over a subscriber of exchanges.
pub struct ConvertingSubscriber<T> {
    inner: Arc<dyn Subscriber<Exchange>>,
    converter: Arc<dyn TypeConverter<T>>,
    guard: ConversionGuard,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> ConvertingSubscriber<T> {
    pub fn new(
        stream: &str,
        inner: Arc<dyn Subscriber<Exchange>>,
        converter: Arc<dyn TypeConverter<T>>,
    ) -> Self {
        Self {
            inner,
            converter,
            guard: ConversionGuard::new(stream),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for ConvertingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.guard.set_upstream(subscription.clone());
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&self, item: T) {
        if self.guard.has_failed() {
            return;
        }
        match self.converter.widen(item) {
            Ok(exchange) => self.inner.on_next(exchange),
            Err(error) => {
                if self.guard.fail(fields::NONE, &error) {
                    self.inner.on_error(error);
                }
            }
        }
    }

    fn on_error(&self, error: StreamError) {
        if !self.guard.has_failed() {
            self.inner.on_error(error);
        }
    }

    fn on_complete(&self) {
        if !self.guard.has_failed() {
            self.inner.on_complete();
        }
    }
}
