//! Data-plane layer.
//!
//! Owns the per-stream adapters that move exchanges between the pipeline and
//! protocol subscribers: payload envelopes, publisher and subscriber adapters,
//! the one-shot reply publisher, processor routes and typed views. Each adapter
//! serializes its own state transitions and never invokes a callback while
//! holding its lock.
//!
//! ```
//! use std::sync::Arc;
//! use exchange_streams::{
//!     BridgeConfig, Completion, Exchange, ExchangeConsumer, PipelineEngine, PipelineError,
//!     RouteDefinition, StreamBridge, StreamPayload,
//! };
//!
//! struct NoRoutes;
//!
//! #[async_trait::async_trait]
//! impl PipelineEngine for NoRoutes {
//!     async fn install_route(&self, route: RouteDefinition) -> Result<(), PipelineError> {
//!         Err(PipelineError::Rejected(route.to_string()))
//!     }
//! }
//!
//! struct Upper;
//!
//! impl ExchangeConsumer for Upper {
//!     fn process(&self, mut exchange: Exchange, completion: Completion) {
//!         let body = exchange.input().body.as_str().unwrap_or_default().to_uppercase();
//!         exchange.set_output(exchange_streams::Message::new(body));
//!         completion.complete(exchange);
//!     }
//! }
//!
//! let bridge = StreamBridge::new(BridgeConfig::default(), Arc::new(NoRoutes)).unwrap();
//! bridge.attach_consumer("upper", Arc::new(Upper)).unwrap();
//!
//! // Producers push envelopes without blocking; nothing is lost before a subscriber arrives.
//! bridge.publisher("data").unwrap().publish(StreamPayload::detached(Exchange::new("queued")));
//! assert_eq!(bridge.publisher("data").unwrap().buffered_len(), 1);
//! bridge.shutdown();
//! ```

pub(crate) mod converting;
pub(crate) mod deferred_publisher;
pub(crate) mod payload;
pub(crate) mod processing;
pub(crate) mod publisher_adapter;
pub(crate) mod single_value;
pub(crate) mod subscriber_adapter;
