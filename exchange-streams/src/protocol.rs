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

//! Demand-driven publish/subscribe contract.
//!
//! Every callback is synchronous and must return quickly. A publisher signals
//! `on_subscribe` first, never emits more `on_next` calls than the cumulative
//! `request(n)` total, and stops signalling after a terminal event or after
//! `cancel`.

use crate::error::StreamError;
use std::sync::Arc;

/// Link between one publisher and one subscriber.
pub trait Subscription: Send + Sync {
    /// Adds `n` to the outstanding demand. `0` is a protocol violation.
    fn request(&self, n: u64);

    /// Stops delivery. Idempotent.
    fn cancel(&self);
}

/// Receiving side of a stream.
pub trait Subscriber<T>: Send + Sync {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);
    fn on_next(&self, item: T);
    fn on_error(&self, error: StreamError);
    fn on_complete(&self);
}

/// Emitting side of a stream.
pub trait Publisher<T>: Send + Sync {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// Subscription handed to a subscriber that is rejected on arrival.
pub(crate) struct InertSubscription;

impl Subscription for InertSubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}

/// Signals the protocol-mandated `on_subscribe` followed by `on_error`.
pub(crate) fn reject_subscriber<T>(subscriber: &Arc<dyn Subscriber<T>>, error: StreamError) {
    subscriber.on_subscribe(Arc::new(InertSubscription));
    subscriber.on_error(error);
}
