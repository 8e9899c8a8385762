//! Boundary to the engine that builds and runs processing pipelines.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};

/// One end of a route.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RouteEndpoint {
    /// External source or sink, interpreted by the engine only.
    Locator(String),
    /// Registry-managed stream of this bridge.
    Stream(String),
    /// Request/reply sink: the consumer attached to this stream answers each exchange.
    Processor(String),
}

impl Display for RouteEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteEndpoint::Locator(locator) => write!(f, "{locator}"),
            RouteEndpoint::Stream(name) => write!(f, "stream:{name}"),
            RouteEndpoint::Processor(name) => write!(f, "processor:{name}"),
        }
    }
}

/// A `from -> to` pipeline for the engine to install.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RouteDefinition {
    pub from: RouteEndpoint,
    pub to: RouteEndpoint,
}

impl RouteDefinition {
    /// Route pulling from `locator` into stream `stream`.
    pub fn locator_to_stream(locator: &str, stream: &str) -> Self {
        Self {
            from: RouteEndpoint::Locator(locator.to_string()),
            to: RouteEndpoint::Stream(stream.to_string()),
        }
    }

    /// Route sending exchanges of stream `stream` to `locator`.
    pub fn stream_to_locator(stream: &str, locator: &str) -> Self {
        Self {
            from: RouteEndpoint::Stream(stream.to_string()),
            to: RouteEndpoint::Locator(locator.to_string()),
        }
    }

    /// Route answering every exchange from `locator` through the consumer of stream `stream`.
    pub fn locator_to_processor(locator: &str, stream: &str) -> Self {
        Self {
            from: RouteEndpoint::Locator(locator.to_string()),
            to: RouteEndpoint::Processor(stream.to_string()),
        }
    }
}

impl Display for RouteDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Builds and starts pipelines on behalf of the bridge.
///
/// Stream endpoints are wired by the engine through the bridge's own adapters:
/// a `Stream` source attaches a consumer to the stream's subscriber adapter, a
/// `Stream` sink attaches a producer to its publisher adapter. A `Processor`
/// sink hands each exchange to
/// [`StreamBridge::process_exchange`](crate::StreamBridge::process_exchange) and
/// answers the locator with the completed exchange.
#[async_trait]
pub trait PipelineEngine: Send + Sync {
    /// Constructs and starts `route`. Returns only once the route is live.
    async fn install_route(&self, route: RouteDefinition) -> Result<(), PipelineError>;
}
