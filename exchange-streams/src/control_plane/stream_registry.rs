//! Stream registry: owner of every publisher and subscriber adapter, keyed by stream name.

use crate::config::BridgeConfig;
use crate::data_plane::publisher_adapter::PublisherAdapter;
use crate::data_plane::subscriber_adapter::SubscriberAdapter;
use crate::error::BridgeError;
use crate::observability::{events, fields};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

const COMPONENT: &str = "stream_registry";

#[derive(Default)]
struct RegistryState {
    publishers: HashMap<String, PublisherAdapter>,
    subscribers: HashMap<String, SubscriberAdapter>,
    // Set by `close_all`; no adapter is created afterwards.
    closed: bool,
}

/// Lazily creates adapters, at most one of each kind per name, and never removes them.
pub(crate) struct StreamRegistry {
    publisher_buffer_size: usize,
    subscriber_buffer_size: usize,
    max_inflight_exchanges: usize,
    state: Mutex<RegistryState>,
}

impl StreamRegistry {
    pub(crate) fn new(config: &BridgeConfig) -> Self {
        Self {
            publisher_buffer_size: config.publisher_buffer_size,
            subscriber_buffer_size: config.subscriber_buffer_size,
            max_inflight_exchanges: config.max_inflight_exchanges,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Get-or-create; concurrent first calls observe the same adapter.
    pub(crate) fn publisher(&self, name: &str) -> Result<PublisherAdapter, BridgeError> {
        let mut state = self.state.lock();
        if let Some(publisher) = state.publishers.get(name) {
            return Ok(publisher.clone());
        }
        if state.closed {
            return Err(Self::refuse(name));
        }

        debug!(
            event = events::REGISTRY_PUBLISHER_CREATE,
            component = COMPONENT,
            stream = name,
            capacity = self.publisher_buffer_size,
            "creating publisher adapter"
        );
        let publisher = PublisherAdapter::new(name, self.publisher_buffer_size);
        state.publishers.insert(name.to_string(), publisher.clone());
        Ok(publisher)
    }

    /// Get-or-create; concurrent first calls observe the same adapter.
    pub(crate) fn subscriber(&self, name: &str) -> Result<SubscriberAdapter, BridgeError> {
        let mut state = self.state.lock();
        if let Some(subscriber) = state.subscribers.get(name) {
            return Ok(subscriber.clone());
        }
        if state.closed {
            return Err(Self::refuse(name));
        }

        debug!(
            event = events::REGISTRY_SUBSCRIBER_CREATE,
            component = COMPONENT,
            stream = name,
            capacity = self.subscriber_buffer_size,
            inflight = self.max_inflight_exchanges,
            "creating subscriber adapter"
        );
        let subscriber = SubscriberAdapter::new(
            name,
            self.max_inflight_exchanges,
            self.subscriber_buffer_size,
        );
        state.subscribers.insert(name.to_string(), subscriber.clone());
        Ok(subscriber)
    }

    fn refuse(name: &str) -> BridgeError {
        warn!(
            event = events::REGISTRY_CREATE_REJECTED,
            component = COMPONENT,
            stream = name,
            reason = fields::REASON_SHUTDOWN,
            "registry closed; not creating adapter"
        );
        BridgeError::Stopped
    }

    /// Sorted names of every stream with at least one adapter.
    pub(crate) fn stream_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let names: BTreeSet<&String> = state.publishers.keys().chain(state.subscribers.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Drains and closes every adapter and refuses to create new ones. Adapters stay registered.
    pub(crate) fn close_all(&self) {
        let (publishers, subscribers) = {
            let mut state = self.state.lock();
            state.closed = true;
            let publishers: Vec<_> = state.publishers.values().cloned().collect();
            let subscribers: Vec<_> = state.subscribers.values().cloned().collect();
            (publishers, subscribers)
        };

        info!(
            event = events::REGISTRY_CLOSE_ALL,
            component = COMPONENT,
            publishers = publishers.len(),
            subscribers = subscribers.len(),
            "closing all stream adapters"
        );
        for publisher in publishers {
            publisher.close();
        }
        for subscriber in subscribers {
            subscriber.close();
        }
    }
}
