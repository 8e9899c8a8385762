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

//! # exchange-streams
//!
//! `exchange-streams` bridges push-based exchange processing (a consumer is handed an
//! exchange and signals completion later, from any thread) with demand-driven
//! publish/subscribe streams (`subscribe`, `request(n)`, `on_next`, `on_complete`,
//! `on_error`, `cancel`).
//!
//! Typical usage is API-first and centered on [`StreamBridge`]: streams are addressed by
//! name, created on first use and kept for the bridge's lifetime.
//!
//! ## Request/reply
//!
//! ```
//! use std::sync::{mpsc, Arc};
//! use exchange_streams::{
//!     BridgeConfig, Completion, Exchange, ExchangeConsumer, PipelineEngine, PipelineError,
//!     Publisher, RouteDefinition, StreamBridge, StreamError, Subscriber, Subscription,
//! };
//!
//! # struct NoRoutes;
//! #
//! # #[async_trait::async_trait]
//! # impl PipelineEngine for NoRoutes {
//! #     async fn install_route(&self, route: RouteDefinition) -> Result<(), PipelineError> {
//! #         Err(PipelineError::Rejected(route.to_string()))
//! #     }
//! # }
//! #
//! struct Echo;
//!
//! impl ExchangeConsumer for Echo {
//!     fn process(&self, mut exchange: Exchange, completion: Completion) {
//!         let reply = exchange.input().clone();
//!         exchange.set_output(reply);
//!         completion.complete(exchange);
//!     }
//! }
//!
//! struct FirstReply(mpsc::Sender<String>);
//!
//! impl Subscriber<Exchange> for FirstReply {
//!     fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
//!         subscription.request(1);
//!     }
//!     fn on_next(&self, item: Exchange) {
//!         let _ = self.0.send(item.message().body.to_string());
//!     }
//!     fn on_error(&self, _error: StreamError) {}
//!     fn on_complete(&self) {}
//! }
//!
//! let bridge = StreamBridge::new(BridgeConfig::default(), Arc::new(NoRoutes)).unwrap();
//! bridge.attach_consumer("echo", Arc::new(Echo)).unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! bridge.request("echo", "hello").unwrap().subscribe(Arc::new(FirstReply(tx)));
//! assert_eq!(rx.recv().unwrap(), "\"hello\"");
//!
//! // Requests to a stream nobody consumes fail fast.
//! assert!(bridge.request("nobody", "hello").is_err());
//! bridge.shutdown();
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`StreamBridge`]
//! - Control plane: stream registry, locator bindings, pipeline engine boundary
//! - Data plane: payload envelopes, publisher/subscriber adapters, deferred replies, typed views
//! - Runtime: worker pool that delivers every terminal reply signal
//!
//! ## Backpressure policy
//!
//! - A publisher adapter serves one subscriber at a time; a second one receives
//!   [`StreamError::AlreadySubscribed`].
//! - A full publisher buffer completes the new payload with [`StreamError::BufferOverflow`].
//! - A subscriber adapter keeps at most `max_inflight_exchanges` items requested, buffered or
//!   in flight, and requests nothing while no consumer is attached. Items pushed past that
//!   demand into a full buffer are rejected and counted.
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not unconditionally initialize a global
//! subscriber. Binaries and tests are responsible for one-time
//! `tracing_subscriber` initialization at process boundaries.

mod bridge;
pub use bridge::{PendingRequest, StreamBridge};

mod config;
pub use config::BridgeConfig;

mod control_plane;
pub use control_plane::pipeline::{PipelineEngine, RouteDefinition, RouteEndpoint};

mod data_plane;
pub use data_plane::converting::{
    ConvertingPublisher, ConvertingSubscriber, JsonConverter, TypeConverter,
};
pub use data_plane::deferred_publisher::DeferredPublisher;
pub use data_plane::payload::StreamPayload;
pub use data_plane::processing::ProcessorReply;
pub use data_plane::publisher_adapter::PublisherAdapter;
pub use data_plane::single_value::SingleValuePublisher;
pub use data_plane::subscriber_adapter::SubscriberAdapter;

mod endpoint;
pub use endpoint::{Completion, ExchangeConsumer, ExchangeOutcome, ExchangeProducer};

mod error;
pub use error::{BridgeError, PipelineError, StreamError};

mod exchange;
pub use exchange::{Exchange, ExchangePattern, Message};

#[doc(hidden)]
pub mod observability;

mod protocol;
pub use protocol::{Publisher, Subscriber, Subscription};

mod runtime;
pub use runtime::worker_runtime::WorkerPool;

#[cfg(test)]
mod test_support;
