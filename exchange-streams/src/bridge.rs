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

use crate::config::BridgeConfig;
use crate::control_plane::pipeline::PipelineEngine;
use crate::control_plane::stream_registry::StreamRegistry;
use crate::control_plane::uri_binder::UriBinder;
use crate::data_plane::converting::{ConvertingPublisher, ConvertingSubscriber, JsonConverter};
use crate::data_plane::deferred_publisher::DeferredPublisher;
use crate::data_plane::payload::StreamPayload;
use crate::data_plane::processing::{ProcessingConsumer, ProcessorReply};
use crate::data_plane::publisher_adapter::PublisherAdapter;
use crate::data_plane::single_value::SingleValuePublisher;
use crate::data_plane::subscriber_adapter::SubscriberAdapter;
use crate::endpoint::{Completion, ExchangeConsumer, ExchangeProducer};
use crate::error::{BridgeError, StreamError};
use crate::exchange::{Exchange, ExchangePattern};
use crate::observability::{events, fields};
use crate::protocol::Publisher;
use crate::runtime::worker_runtime::WorkerPool;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "stream_bridge";

/// Bridge between exchange processing and demand-driven streams.
///
/// Streams are addressed by name and created on first use. Every stream has
/// one [`PublisherAdapter`] (exchanges leaving the pipeline) and one
/// [`SubscriberAdapter`] (exchanges entering it). Request/reply calls return a
/// [`DeferredPublisher`] resolved by the consumer's completion.
pub struct StreamBridge {
    config: BridgeConfig,
    pool: WorkerPool,
    owns_pool: bool,
    registry: StreamRegistry,
    binder: UriBinder,
    stopped: AtomicBool,
}

impl StreamBridge {
    /// Starts a bridge with its own worker pool sized by `config`.
    pub fn new(config: BridgeConfig, engine: Arc<dyn PipelineEngine>) -> Result<Self, BridgeError> {
        config.validate()?;
        let pool = WorkerPool::new(&config)?;
        Ok(Self::start(config, engine, pool, true))
    }

    /// Starts a bridge on a worker pool owned by the host; `shutdown` leaves it running.
    pub fn with_worker_pool(
        config: BridgeConfig,
        engine: Arc<dyn PipelineEngine>,
        pool: WorkerPool,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self::start(config, engine, pool, false))
    }

    fn start(
        config: BridgeConfig,
        engine: Arc<dyn PipelineEngine>,
        pool: WorkerPool,
        owns_pool: bool,
    ) -> Self {
        info!(
            event = events::BRIDGE_START,
            component = COMPONENT,
            worker_pool = pool.name(),
            owns_pool,
            max_inflight_exchanges = config.max_inflight_exchanges,
            publisher_buffer_size = config.publisher_buffer_size,
            subscriber_buffer_size = config.subscriber_buffer_size,
            "stream bridge started"
        );

        Self {
            registry: StreamRegistry::new(&config),
            binder: UriBinder::new(engine),
            config,
            pool,
            owns_pool,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn worker_pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), BridgeError> {
        if self.is_stopped() {
            return Err(BridgeError::Stopped);
        }
        Ok(())
    }

    /// Publisher side of stream `name`.
    pub fn publisher(&self, name: &str) -> Result<PublisherAdapter, BridgeError> {
        self.ensure_running()?;
        self.registry.publisher(name)
    }

    /// Publisher side of stream `name`, narrowed to `T`.
    pub fn publisher_as<T>(&self, name: &str) -> Result<ConvertingPublisher<T>, BridgeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let publisher = self.publisher(name)?;
        Ok(ConvertingPublisher::new(
            name,
            Arc::new(publisher),
            Arc::new(JsonConverter),
        ))
    }

    /// Subscriber side of stream `name`.
    pub fn subscriber(&self, name: &str) -> Result<SubscriberAdapter, BridgeError> {
        self.ensure_running()?;
        self.registry.subscriber(name)
    }

    /// Subscriber side of stream `name`, widening `T` items into exchanges.
    pub fn subscriber_as<T>(&self, name: &str) -> Result<ConvertingSubscriber<T>, BridgeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let subscriber = self.subscriber(name)?;
        Ok(ConvertingSubscriber::new(
            name,
            subscriber.as_subscriber(),
            Arc::new(JsonConverter),
        ))
    }

    pub fn stream_names(&self) -> Vec<String> {
        self.registry.stream_names()
    }

    /// Pushes `exchange` into stream `name`; `callback` receives it back with the delivery outcome.
    pub fn send_exchange(
        &self,
        name: &str,
        exchange: Exchange,
        callback: impl FnOnce(Exchange, Result<(), StreamError>) + Send + 'static,
    ) -> Result<(), BridgeError> {
        self.publisher(name)?
            .publish(StreamPayload::new(exchange, callback));
        Ok(())
    }

    /// Sends `body` to the consumer of stream `name` and returns a publisher of its reply.
    ///
    /// Fails immediately with [`BridgeError::NoConsumerAttached`] when nothing consumes `name`.
    pub fn request(
        &self,
        name: &str,
        body: impl Into<Value>,
    ) -> Result<DeferredPublisher<Exchange>, BridgeError> {
        self.request_exchange(name, Exchange::request(body))
    }

    pub fn request_exchange(
        &self,
        name: &str,
        mut exchange: Exchange,
    ) -> Result<DeferredPublisher<Exchange>, BridgeError> {
        self.ensure_running()?;
        let consumer = self.registry.subscriber(name)?.consumer().inspect_err(|err| {
            warn!(
                event = events::REQUEST_NO_CONSUMER,
                component = COMPONENT,
                stream = name,
                err = %err,
                "request rejected"
            );
        })?;

        exchange.set_pattern(ExchangePattern::InOut);
        debug!(
            event = events::REQUEST_START,
            component = COMPONENT,
            stream = name,
            exchange_id = exchange.id(),
            body_kind = fields::format_exchange_body_kind(&exchange),
            "dispatching request"
        );

        let reply = DeferredPublisher::new(name, self.pool.clone());
        let resolver = reply.clone();
        consumer.process(
            exchange,
            Completion::new(move |outcome| {
                // State transition only; delivery happens on the worker pool.
                match outcome {
                    Ok(exchange) => resolver.set_data(exchange),
                    Err(error) => resolver.set_exception(error),
                };
            }),
        );
        Ok(reply)
    }

    /// Typed request: `body` is serialized, the reply narrowed to `T`.
    pub fn request_as<T>(
        &self,
        name: &str,
        body: impl Serialize,
    ) -> Result<ConvertingPublisher<T>, BridgeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let body = serde_json::to_value(body)
            .map_err(|err| StreamError::Conversion(err.to_string()))?;
        let reply = self.request(name, body)?;
        Ok(typed_reply(name, reply))
    }

    /// Request function bound to stream `name`.
    pub fn requester<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Fn(Value) -> Result<DeferredPublisher<Exchange>, BridgeError> + 'a {
        move |body| self.request(name, body)
    }

    /// Typed request function bound to stream `name`.
    pub fn requester_as<'a, I, T>(
        &'a self,
        name: &'a str,
    ) -> impl Fn(I) -> Result<ConvertingPublisher<T>, BridgeError> + 'a
    where
        I: Serialize,
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        move |body| self.request_as(name, body)
    }

    /// Publisher of the exchanges arriving from `locator`; the route is installed on first use.
    pub async fn publish_uri(&self, locator: &str) -> Result<PublisherAdapter, BridgeError> {
        self.ensure_running()?;
        let stream = self.binder.publish_from_locator(locator).await?;
        self.publisher(&stream)
    }

    pub async fn publish_uri_as<T>(&self, locator: &str) -> Result<ConvertingPublisher<T>, BridgeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.ensure_running()?;
        let stream = self.binder.publish_from_locator(locator).await?;
        self.publisher_as(&stream)
    }

    /// Sends `body` to `locator` and returns a publisher of the reply.
    pub async fn request_uri(
        &self,
        locator: &str,
        body: impl Into<Value>,
    ) -> Result<DeferredPublisher<Exchange>, BridgeError> {
        self.ensure_running()?;
        let stream = self.binder.request_to_locator(locator).await?;
        self.request(&stream, body)
    }

    pub async fn request_uri_as<T>(
        &self,
        locator: &str,
        body: impl Serialize,
    ) -> Result<ConvertingPublisher<T>, BridgeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.ensure_running()?;
        let stream = self.binder.request_to_locator(locator).await?;
        self.request_as(&stream, body)
    }

    /// Request function bound to `locator`. The route is installed by the first call.
    pub fn uri_requester<'a>(
        &'a self,
        locator: &'a str,
    ) -> impl Fn(Value) -> PendingRequest<'a, DeferredPublisher<Exchange>> + 'a {
        move |body| Box::pin(self.request_uri(locator, body))
    }

    pub fn uri_requester_as<'a, I, T>(
        &'a self,
        locator: &'a str,
    ) -> impl Fn(I) -> PendingRequest<'a, ConvertingPublisher<T>> + 'a
    where
        I: Serialize + Send + 'a,
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        move |body| Box::pin(self.request_uri_as(locator, body))
    }

    /// Runs `processor` for every exchange arriving from `locator` and answers with its reply.
    ///
    /// Each call installs a new route backed by a fresh stream. When the pipeline
    /// rejects the route the processor is detached again.
    pub async fn process_from_uri<F>(&self, locator: &str, processor: F) -> Result<(), BridgeError>
    where
        F: Fn(SingleValuePublisher<Exchange>) -> Result<ProcessorReply, StreamError>
            + Send
            + Sync
            + 'static,
    {
        self.ensure_running()?;
        let stream = Uuid::new_v4().to_string();
        let subscriber = self.subscriber(&stream)?;
        subscriber.attach_consumer(Arc::new(ProcessingConsumer::new(&stream, Arc::new(processor))))?;
        info!(
            event = events::PROCESSOR_ATTACH,
            component = COMPONENT,
            locator,
            stream = stream.as_str(),
            "processor attached"
        );

        if let Err(err) = self.binder.process_from_locator(locator, &stream).await {
            subscriber.detach_consumer();
            return Err(err);
        }
        Ok(())
    }

    /// Like [`process_from_uri`](Self::process_from_uri), with each input narrowed to `T`.
    pub async fn process_from_uri_as<T, F>(
        &self,
        locator: &str,
        processor: F,
    ) -> Result<(), BridgeError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(ConvertingPublisher<T>) -> Result<ProcessorReply, StreamError>
            + Send
            + Sync
            + 'static,
    {
        let source = locator.to_string();
        self.process_from_uri(locator, move |input: SingleValuePublisher<Exchange>| {
            processor(ConvertingPublisher::new(
                &source,
                Arc::new(input),
                Arc::new(JsonConverter),
            ))
        })
        .await
    }

    /// Hands `exchange` to the consumer of stream `name`.
    ///
    /// This is the entry point for pipeline engines driving processor routes. On
    /// error `completion` is dropped unsignalled and reports
    /// [`StreamError::ExchangeAbandoned`].
    pub fn process_exchange(
        &self,
        name: &str,
        exchange: Exchange,
        completion: Completion,
    ) -> Result<(), BridgeError> {
        self.ensure_running()?;
        let consumer = self.registry.subscriber(name)?.consumer()?;
        consumer.process(exchange, completion);
        Ok(())
    }

    pub fn attach_consumer(
        &self,
        name: &str,
        consumer: Arc<dyn ExchangeConsumer>,
    ) -> Result<(), BridgeError> {
        self.subscriber(name)?.attach_consumer(consumer)
    }

    pub fn detach_consumer(&self, name: &str) -> Result<Option<Arc<dyn ExchangeConsumer>>, BridgeError> {
        Ok(self.subscriber(name)?.detach_consumer())
    }

    pub fn attach_producer(
        &self,
        name: &str,
        producer: Arc<dyn ExchangeProducer>,
    ) -> Result<(), BridgeError> {
        self.publisher(name)?.attach_producer(producer)
    }

    pub fn detach_producer(&self, name: &str) -> Result<Option<Arc<dyn ExchangeProducer>>, BridgeError> {
        Ok(self.publisher(name)?.detach_producer())
    }

    /// Closes every stream and stops an owned worker pool. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        self.registry.close_all();
        if self.owns_pool {
            self.pool.shutdown();
        }
        info!(
            event = events::BRIDGE_SHUTDOWN,
            component = COMPONENT,
            worker_pool = self.pool.name(),
            streams = self.registry.stream_names().len(),
            "stream bridge shut down"
        );
    }
}

/// Future returned by the functions of [`StreamBridge::uri_requester`].
pub type PendingRequest<'a, P> = Pin<Box<dyn Future<Output = Result<P, BridgeError>> + Send + 'a>>;

fn typed_reply<T>(name: &str, reply: DeferredPublisher<Exchange>) -> ConvertingPublisher<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let reply: Arc<dyn Publisher<Exchange>> = Arc::new(reply);
    ConvertingPublisher::new(name, reply, Arc::new(JsonConverter))
}

#[cfg(test)]
mod tests {
    use super::StreamBridge;
    use crate::config::BridgeConfig;
    use crate::control_plane::pipeline::{PipelineEngine, RouteDefinition};
    use crate::data_plane::processing::ProcessorReply;
    use crate::endpoint::{Completion, ExchangeConsumer};
    use crate::error::{BridgeError, PipelineError, StreamError};
    use crate::exchange::{Exchange, Message};
    use crate::protocol::Publisher;
    use crate::runtime::worker_runtime::WorkerPool;
    use crate::test_support::{RecordingSubscriber, Signal};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    struct RejectingEngine;

    #[async_trait]
    impl PipelineEngine for RejectingEngine {
        async fn install_route(&self, route: RouteDefinition) -> Result<(), PipelineError> {
            Err(PipelineError::Rejected(route.to_string()))
        }
    }

    struct Echo;

    impl ExchangeConsumer for Echo {
        fn process(&self, mut exchange: Exchange, completion: Completion) {
            let reply = exchange.input().clone();
            exchange.set_output(reply);
            completion.complete(exchange);
        }
    }

    struct Failing;

    impl ExchangeConsumer for Failing {
        fn process(&self, _exchange: Exchange, completion: Completion) {
            completion.fail(StreamError::ExchangeFailed("no route".to_string()));
        }
    }

    fn bridge() -> StreamBridge {
        StreamBridge::with_worker_pool(
            BridgeConfig::default(),
            Arc::new(RejectingEngine),
            WorkerPool::from_handle("bridge-test", tokio::runtime::Handle::current()),
        )
        .expect("default config is valid")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn request_without_consumer_fails_immediately() {
        let bridge = bridge();

        let result = bridge.request("nobody", "hello");

        assert!(matches!(
            result,
            Err(BridgeError::NoConsumerAttached { ref stream }) if stream == "nobody"
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn request_resolves_with_consumer_reply() {
        let bridge = bridge();
        bridge.attach_consumer("echo", Arc::new(Echo)).expect("attach");

        let reply = bridge.request("echo", "hello").expect("consumer attached");
        let subscriber = RecordingSubscriber::<Exchange>::new(1);
        reply.subscribe(subscriber.clone());

        let signals = subscriber.wait_for_signals(2, WAIT);
        assert_eq!(signals.len(), 2);
        match &signals[0] {
            Signal::Next(exchange) => assert_eq!(exchange.message().body, json!("hello")),
            other => panic!("unexpected signal {other:?}"),
        }
        assert_eq!(signals[1], Signal::Complete);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_exchange_resolves_reply_with_error() {
        let bridge = bridge();
        bridge.attach_consumer("broken", Arc::new(Failing)).expect("attach");

        let reply = bridge.request("broken", 1).expect("consumer attached");
        let subscriber = RecordingSubscriber::<Exchange>::new(0);
        reply.subscribe(subscriber.clone());

        assert_eq!(
            subscriber.wait_for_signals(1, WAIT),
            vec![Signal::Error(StreamError::ExchangeFailed(
                "no route".to_string()
            ))]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn typed_request_narrows_reply() {
        let bridge = bridge();
        bridge.attach_consumer("echo", Arc::new(Echo)).expect("attach");

        let reply = bridge
            .request_as::<Vec<u32>>("echo", vec![1_u32, 2, 3])
            .expect("consumer attached");
        let subscriber = RecordingSubscriber::<Vec<u32>>::new(1);
        reply.subscribe(subscriber.clone());

        subscriber.wait_for_signals(2, WAIT);
        assert_eq!(subscriber.items(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_exchange_reports_delivery_outcome() {
        let bridge = bridge();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let subscriber = RecordingSubscriber::<Exchange>::new(u64::MAX);
        bridge
            .publisher("out")
            .expect("running")
            .subscribe(subscriber.clone());

        bridge
            .send_exchange("out", Exchange::new("ping"), move |exchange, result| {
                let _ = tx.send((exchange.input().body.clone(), result));
            })
            .expect("running");

        assert_eq!(rx.await.expect("callback runs"), (json!("ping"), Ok(())));
        assert_eq!(subscriber.items().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publish_uri_surfaces_pipeline_failure() {
        let bridge = bridge();

        let result = bridge.publish_uri("timer:tick").await;

        assert!(matches!(
            result,
            Err(BridgeError::PipelineConstruction { ref locator, .. }) if locator == "timer:tick"
        ));
        assert!(bridge.stream_names().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_stops_operations_but_not_borrowed_pool() {
        let bridge = bridge();
        bridge.publisher("s").expect("running");

        bridge.shutdown();
        bridge.shutdown();

        assert!(bridge.is_stopped());
        assert!(matches!(bridge.publisher("s"), Err(BridgeError::Stopped)));
        assert!(matches!(
            bridge.request("s", Message::default().body),
            Err(BridgeError::Stopped)
        ));
        assert!(!bridge.worker_pool().is_stopped());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn typed_requester_reuses_its_stream() {
        let bridge = bridge();
        bridge.attach_consumer("echo", Arc::new(Echo)).expect("attach");
        let request = bridge.requester_as::<u32, u32>("echo");

        for n in [4_u32, 9] {
            let reply = request(n).expect("consumer attached");
            let subscriber = RecordingSubscriber::<u32>::new(1);
            reply.subscribe(subscriber.clone());
            subscriber.wait_for_signals(2, WAIT);
            assert_eq!(subscriber.items(), vec![n]);
        }
        assert_eq!(bridge.stream_names(), vec!["echo".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_processor_route_leaves_no_consumer_behind() {
        let bridge = bridge();

        let result = bridge
            .process_from_uri("direct:upper", |_input| Ok(ProcessorReply::Body(json!(null))))
            .await;

        assert!(matches!(
            result,
            Err(BridgeError::PipelineConstruction { ref locator, .. }) if locator == "direct:upper"
        ));
        let streams = bridge.stream_names();
        assert_eq!(streams.len(), 1);
        assert!(matches!(
            bridge.subscriber(&streams[0]).expect("running").consumer(),
            Err(BridgeError::NoConsumerAttached { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn process_exchange_reaches_the_attached_consumer() {
        let bridge = bridge();
        bridge.attach_consumer("echo", Arc::new(Echo)).expect("attach");
        let (tx, rx) = tokio::sync::oneshot::channel();

        bridge
            .process_exchange(
                "echo",
                Exchange::request("ping"),
                Completion::new(move |outcome| {
                    let _ = tx.send(outcome);
                }),
            )
            .expect("consumer attached");

        let replied = rx.await.expect("completion fires").expect("processed");
        assert_eq!(replied.message().body, json!("ping"));
        assert!(matches!(
            bridge.process_exchange("idle", Exchange::request(1), Completion::new(|_| {})),
            Err(BridgeError::NoConsumerAttached { .. })
        ));
    }
}
