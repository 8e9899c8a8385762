//! Locator bindings: one generated stream per locator and direction.

use crate::control_plane::pipeline::{PipelineEngine, RouteDefinition};
use crate::error::BridgeError;
use crate::observability::events;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "uri_binder";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BindDirection {
    /// `locator -> stream`
    PublishFrom,
    /// `stream -> locator`
    RequestTo,
    /// `locator -> processor`, never memoized
    ProcessFrom,
}

impl BindDirection {
    fn as_str(self) -> &'static str {
        match self {
            BindDirection::PublishFrom => "publish_from",
            BindDirection::RequestTo => "request_to",
            BindDirection::ProcessFrom => "process_from",
        }
    }

    fn route(self, locator: &str, stream: &str) -> RouteDefinition {
        match self {
            BindDirection::PublishFrom => RouteDefinition::locator_to_stream(locator, stream),
            BindDirection::RequestTo => RouteDefinition::stream_to_locator(stream, locator),
            BindDirection::ProcessFrom => RouteDefinition::locator_to_processor(locator, stream),
        }
    }
}

// Empty until the route for that locator is installed.
type Binding = Arc<OnceCell<String>>;

/// Memoizes `locator -> stream name` per direction and installs the backing route once.
///
/// Binds for the same locator wait on each other; binds for different locators never do.
pub(crate) struct UriBinder {
    engine: Arc<dyn PipelineEngine>,
    publish_bindings: Mutex<HashMap<String, Binding>>,
    request_bindings: Mutex<HashMap<String, Binding>>,
}

impl UriBinder {
    pub(crate) fn new(engine: Arc<dyn PipelineEngine>) -> Self {
        Self {
            engine,
            publish_bindings: Mutex::new(HashMap::new()),
            request_bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Stream fed by `locator`.
    pub(crate) async fn publish_from_locator(&self, locator: &str) -> Result<String, BridgeError> {
        self.bind(BindDirection::PublishFrom, locator).await
    }

    /// Stream whose exchanges are sent to `locator`.
    pub(crate) async fn request_to_locator(&self, locator: &str) -> Result<String, BridgeError> {
        self.bind(BindDirection::RequestTo, locator).await
    }

    /// Installs a processor route from `locator` into `stream`, whose consumer must already be
    /// attached. Every call installs a new route.
    pub(crate) async fn process_from_locator(
        &self,
        locator: &str,
        stream: &str,
    ) -> Result<(), BridgeError> {
        self.install(BindDirection::ProcessFrom, locator, stream.to_string())
            .await
            .map(|_| ())
    }

    async fn bind(&self, direction: BindDirection, locator: &str) -> Result<String, BridgeError> {
        let bindings = match direction {
            BindDirection::PublishFrom | BindDirection::ProcessFrom => &self.publish_bindings,
            BindDirection::RequestTo => &self.request_bindings,
        };
        let binding = bindings
            .lock()
            .entry(locator.to_string())
            .or_default()
            .clone();

        if let Some(stream) = binding.get() {
            debug!(
                event = events::BIND_REUSE,
                component = COMPONENT,
                locator,
                stream = stream.as_str(),
                direction = direction.as_str(),
                "reusing locator binding"
            );
            return Ok(stream.clone());
        }

        // A failed install leaves the cell empty so the next caller retries.
        let stream = binding
            .get_or_try_init(|| self.install(direction, locator, Uuid::new_v4().to_string()))
            .await?;
        Ok(stream.clone())
    }

    async fn install(
        &self,
        direction: BindDirection,
        locator: &str,
        stream: String,
    ) -> Result<String, BridgeError> {
        let route = direction.route(locator, &stream);
        info!(
            event = events::BIND_START,
            component = COMPONENT,
            locator,
            stream = stream.as_str(),
            direction = direction.as_str(),
            route = %route,
            "installing locator route"
        );

        if let Err(source) = self.engine.install_route(route).await {
            warn!(
                event = events::BIND_FAILED,
                component = COMPONENT,
                locator,
                direction = direction.as_str(),
                err = %source,
                "unable to install locator route"
            );
            return Err(BridgeError::PipelineConstruction {
                locator: locator.to_string(),
                source,
            });
        }

        info!(
            event = events::BIND_OK,
            component = COMPONENT,
            locator,
            stream = stream.as_str(),
            direction = direction.as_str(),
            "locator route installed"
        );
        Ok(stream)
    }
}
