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

mod support;

use exchange_streams::{
    BridgeError, Exchange, ProcessorReply, Publisher, RouteDefinition, RouteEndpoint, StreamError,
};
use integration_test_utils::{CollectingSubscriber, LoopbackEngine, StreamSignal};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread")]
async fn publish_uri_twice_builds_one_pipeline_for_the_same_stream() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    let first = bridge.publish_uri("timer:tick").await.expect("bind");
    let second = bridge.publish_uri("timer:tick").await.expect("bind");

    assert_eq!(first.name(), second.name());
    assert_eq!(
        engine.installed_routes(),
        vec![RouteDefinition::locator_to_stream("timer:tick", first.name())]
    );
    assert!(first.producer().is_some());

    let subscriber = CollectingSubscriber::<Exchange>::unbounded();
    second.subscribe(subscriber.clone());
    assert!(engine.emit("timer:tick", "tick-1"));
    assert!(engine.emit("timer:tick", "tick-2"));

    let signals = subscriber.wait_for_signals(2, support::WAIT).await;
    assert_eq!(support::bodies(&signals), vec![json!("tick-1"), json!("tick-2")]);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_first_publish_binds_share_one_pipeline() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    let (a, b) = tokio::join!(bridge.publish_uri("queue:jobs"), bridge.publish_uri("queue:jobs"));

    assert_eq!(a.expect("bind").name(), b.expect("bind").name());
    assert_eq!(engine.installed_routes().len(), 1);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn request_uri_reaches_the_locator_and_reuses_its_stream() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    for body in ["one", "two"] {
        let reply = bridge
            .request_uri("http://svc/echo", body)
            .await
            .expect("route installs");
        let subscriber = CollectingSubscriber::<Exchange>::new(1);
        reply.subscribe(subscriber.clone());
        let signals = subscriber.wait_for_signals(2, support::WAIT).await;
        assert_eq!(support::bodies(&signals), vec![json!(body)]);
        assert_eq!(signals[1], StreamSignal::Complete);
    }

    let routes = engine.installed_routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].to, RouteEndpoint::Locator("http://svc/echo".to_string()));
    assert_eq!(engine.echo().seen(), vec![json!("one"), json!("two")]);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn typed_uri_request_narrows_the_reply() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    let reply = bridge
        .request_uri_as::<u64>("http://svc/echo", 41_u64)
        .await
        .expect("route installs");
    let subscriber = CollectingSubscriber::<u64>::new(1);
    reply.subscribe(subscriber.clone());

    assert_eq!(
        subscriber.wait_for_signals(2, support::WAIT).await,
        vec![StreamSignal::Next(41), StreamSignal::Complete]
    );

    let typed = bridge
        .publish_uri_as::<u64>("counter:ticks")
        .await
        .expect("route installs");
    let ticks = CollectingSubscriber::<u64>::unbounded();
    typed.subscribe(ticks.clone());
    assert!(engine.emit("counter:ticks", 3));
    assert_eq!(
        ticks.wait_for_signals(1, support::WAIT).await,
        vec![StreamSignal::Next(3)]
    );
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_pipeline_construction_is_fatal_then_retryable() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);
    engine.fail_next(1);

    let failed = bridge.request_uri("http://svc/flaky", "x").await;
    assert!(matches!(
        failed,
        Err(BridgeError::PipelineConstruction { ref locator, .. }) if locator == "http://svc/flaky"
    ));
    assert!(engine.installed_routes().is_empty());

    let reply = bridge
        .request_uri("http://svc/flaky", "retry")
        .await
        .expect("second attempt installs the route");
    let subscriber = CollectingSubscriber::<Exchange>::new(1);
    reply.subscribe(subscriber.clone());
    let signals = subscriber.wait_for_signals(2, support::WAIT).await;
    assert_eq!(support::bodies(&signals), vec![json!("retry")]);
    assert_eq!(engine.installed_routes().len(), 1);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn locator_operations_fail_after_shutdown() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);
    bridge.shutdown();

    assert!(matches!(
        bridge.publish_uri("timer:late").await,
        Err(BridgeError::Stopped)
    ));
    assert!(engine.installed_routes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn uri_requester_binds_once_and_serves_every_call() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    let request = bridge.uri_requester("http://svc/echo");
    for body in ["a", "b"] {
        let reply = request(json!(body)).await.expect("route installs");
        let subscriber = CollectingSubscriber::<Exchange>::new(1);
        reply.subscribe(subscriber.clone());
        let signals = subscriber.wait_for_signals(2, support::WAIT).await;
        assert_eq!(support::bodies(&signals), vec![json!(body)]);
    }

    let typed = bridge.uri_requester_as::<u64, u64>("http://svc/echo");
    let reply = typed(8).await.expect("route reused");
    let subscriber = CollectingSubscriber::<u64>::new(1);
    reply.subscribe(subscriber.clone());
    assert_eq!(
        subscriber.wait_for_signals(2, support::WAIT).await,
        vec![StreamSignal::Next(8), StreamSignal::Complete]
    );
    assert_eq!(engine.installed_routes().len(), 1);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn process_from_uri_answers_every_exchange_from_the_locator() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    bridge
        .process_from_uri("direct:upper", move |input| {
            counter.fetch_add(1, Ordering::SeqCst);
            let text = input.value().input().body.as_str().unwrap_or_default().to_uppercase();
            Ok(ProcessorReply::Body(json!(text)))
        })
        .await
        .expect("route installs");

    let routes = engine.installed_routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].from, RouteEndpoint::Locator("direct:upper".to_string()));
    assert!(matches!(routes[0].to, RouteEndpoint::Processor(_)));

    let replied = engine
        .call("direct:upper", "hello")
        .await
        .expect("processor route present")
        .expect("processed");
    assert_eq!(replied.message().body, json!("HELLO"));

    assert!(engine.emit("direct:upper", "fire and forget"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(engine.call("direct:missing", "x").await.is_none());
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn processor_may_return_its_input_or_fail() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    bridge
        .process_from_uri("direct:echo", |input| Ok(ProcessorReply::Stream(Arc::new(input))))
        .await
        .expect("route installs");
    bridge
        .process_from_uri("direct:broken", |_input| {
            Err(StreamError::ExchangeFailed("rejected".to_string()))
        })
        .await
        .expect("route installs");

    let echoed = engine.call("direct:echo", json!({"id": 7})).await.expect("route present");
    assert_eq!(echoed.expect("processed").message().body, json!({"id": 7}));
    assert_eq!(
        engine.call("direct:broken", "x").await,
        Some(Err(StreamError::ExchangeFailed("rejected".to_string())))
    );
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn typed_processor_receives_narrowed_input() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);

    bridge
        .process_from_uri_as::<u64, _>("direct:double", |input| {
            let seen = CollectingSubscriber::<u64>::new(1);
            input.subscribe(seen.clone());
            let n = seen
                .items()
                .first()
                .copied()
                .ok_or_else(|| StreamError::ExchangeFailed("no input".to_string()))?;
            ProcessorReply::body(n * 2)
        })
        .await
        .expect("route installs");

    let replied = engine.call("direct:double", 21).await.expect("route present");
    assert_eq!(replied.expect("processed").message().body, json!(42));

    let malformed = engine.call("direct:double", "not a number").await.expect("route present");
    assert!(matches!(malformed, Err(StreamError::ExchangeFailed(_))));
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_processor_route_is_reported() {
    integration_test_utils::init_logging();
    let engine = LoopbackEngine::new();
    let bridge = support::make_bridge(engine.clone(), 8);
    engine.bind(&bridge);
    engine.fail_next(1);

    let result = bridge
        .process_from_uri("direct:flaky", |_input| Ok(ProcessorReply::Body(json!(null))))
        .await;

    assert!(matches!(
        result,
        Err(BridgeError::PipelineConstruction { ref locator, .. }) if locator == "direct:flaky"
    ));
    assert!(engine.call("direct:flaky", "x").await.is_none());
}
