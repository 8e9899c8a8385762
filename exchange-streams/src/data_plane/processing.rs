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

//! Processor routes.
//!
//! Each exchange arriving from a locator is offered to a user function as a
//! single-value stream. Whatever the function returns becomes the exchange's
//! reply; a returned stream is drained first.

use crate::data_plane::single_value::SingleValuePublisher;
use crate::endpoint::{Completion, ExchangeConsumer};
use crate::error::StreamError;
use crate::exchange::{Exchange, Message};
use crate::observability::events;
use crate::protocol::{Publisher, Subscriber, Subscription};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "processing";

/// What a processor answers for one exchange.
pub enum ProcessorReply {
    /// Reply body, used as is.
    Body(Value),
    /// Drained to completion. One item's message body becomes the reply body,
    /// several become an array of bodies, none becomes `null`.
    Stream(Arc<dyn Publisher<Exchange>>),
}

impl ProcessorReply {
    /// Serializes `value` into a reply body.
    pub fn body(value: impl Serialize) -> Result<Self, StreamError> {
        serde_json::to_value(value)
            .map(ProcessorReply::Body)
            .map_err(|err| StreamError::Conversion(err.to_string()))
    }
}

impl From<Value> for ProcessorReply {
    fn from(body: Value) -> Self {
        ProcessorReply::Body(body)
    }
}

pub(crate) type ExchangeProcessor =
    dyn Fn(SingleValuePublisher<Exchange>) -> Result<ProcessorReply, StreamError> + Send + Sync;

/// Consumer that runs a processor function for every exchange handed to it.
pub(crate) struct ProcessingConsumer {
    stream: String,
    processor: Arc<ExchangeProcessor>,
}

impl ProcessingConsumer {
    pub(crate) fn new(stream: &str, processor: Arc<ExchangeProcessor>) -> Self {
        Self {
            stream: stream.to_string(),
            processor,
        }
    }
}

impl ExchangeConsumer for ProcessingConsumer {
    fn process(&self, exchange: Exchange, completion: Completion) {
        // The processor gets its own copy; the original carries the reply back.
        let input = SingleValuePublisher::new(exchange.copy());
        match (self.processor)(input) {
            Ok(ProcessorReply::Body(body)) => reply_with(exchange, body, completion),
            Ok(ProcessorReply::Stream(publisher)) => {
                debug!(
                    event = events::PROCESSOR_UNWRAP,
                    component = COMPONENT,
                    stream = self.stream.as_str(),
                    exchange_id = exchange.id(),
                    "draining processor reply stream"
                );
                publisher.subscribe(Arc::new(ReplyCollector::new(&self.stream, exchange, completion)));
            }
            Err(error) => {
                warn!(
                    event = events::PROCESSOR_FAILED,
                    component = COMPONENT,
                    stream = self.stream.as_str(),
                    exchange_id = exchange.id(),
                    err = %error,
                    "processor failed"
                );
                completion.fail(error);
            }
        }
    }
}

fn reply_with(mut exchange: Exchange, body: Value, completion: Completion) {
    let mut reply = Message::new(body);
    reply.headers = exchange.input().headers.clone();
    exchange.set_output(reply);
    completion.complete(exchange);
}

struct PendingReply {
    exchange: Exchange,
    completion: Completion,
    bodies: Vec<Value>,
}

/// Collects every item of a processor's reply stream, then completes the exchange.
struct ReplyCollector {
    stream: String,
    pending: Mutex<Option<PendingReply>>,
}

impl ReplyCollector {
    fn new(stream: &str, exchange: Exchange, completion: Completion) -> Self {
        Self {
            stream: stream.to_string(),
            pending: Mutex::new(Some(PendingReply {
                exchange,
                completion,
                bodies: Vec::new(),
            })),
        }
    }
}

impl Subscriber<Exchange> for ReplyCollector {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        subscription.request(u64::MAX);
    }

    fn on_next(&self, item: Exchange) {
        if let Some(pending) = self.pending.lock().as_mut() {
            pending.bodies.push(item.message().body.clone());
        }
    }

    fn on_error(&self, error: StreamError) {
        let Some(pending) = self.pending.lock().take() else {
            return;
        };
        warn!(
            event = events::PROCESSOR_FAILED,
            component = COMPONENT,
            stream = self.stream.as_str(),
            exchange_id = pending.exchange.id(),
            err = %error,
            "processor reply stream failed"
        );
        pending.completion.fail(error);
    }

    fn on_complete(&self) {
        let Some(mut pending) = self.pending.lock().take() else {
            return;
        };
        let body = match pending.bodies.len() {
            0 => Value::Null,
            1 => pending.bodies.remove(0),
            _ => Value::Array(pending.bodies),
        };
        reply_with(pending.exchange, body, pending.completion);
    }
}

#[cfg(test)]
mod tests {
    use super::{ProcessingConsumer, ProcessorReply};
    use crate::data_plane::single_value::SingleValuePublisher;
    use crate::endpoint::{Completion, ExchangeConsumer, ExchangeOutcome};
    use crate::error::StreamError;
    use crate::exchange::Exchange;
    use crate::protocol::{Publisher, Subscriber, Subscription};
    use crate::test_support::RecordingSubscriber;
    use serde_json::{json, Value};
    use std::sync::{mpsc, Arc};

    fn processing(
        stream: &str,
        processor: impl Fn(SingleValuePublisher<Exchange>) -> Result<ProcessorReply, StreamError>
            + Send
            + Sync
            + 'static,
    ) -> ProcessingConsumer {
        ProcessingConsumer::new(stream, Arc::new(processor))
    }

    fn run(consumer: &ProcessingConsumer, exchange: Exchange) -> ExchangeOutcome {
        let (tx, rx) = mpsc::channel();
        consumer.process(
            exchange,
            Completion::new(move |outcome| tx.send(outcome).expect("receiver alive")),
        );
        rx.try_recv().expect("processing completes inline")
    }

    /// Emits the given exchanges right after subscription, ignoring demand.
    struct Burst(Vec<Exchange>);

    impl Publisher<Exchange> for Burst {
        fn subscribe(&self, subscriber: Arc<dyn Subscriber<Exchange>>) {
            struct Noop;
            impl Subscription for Noop {
                fn request(&self, _n: u64) {}
                fn cancel(&self) {}
            }
            subscriber.on_subscribe(Arc::new(Noop));
            for item in &self.0 {
                subscriber.on_next(item.clone());
            }
            subscriber.on_complete();
        }
    }

    #[test]
    fn body_reply_keeps_headers_and_exchange_id() {
        let consumer = processing("upper", |input| {
            let body = input.value().input().body.as_str().unwrap_or_default().to_uppercase();
            Ok(ProcessorReply::Body(Value::String(body)))
        });
        let mut exchange = Exchange::request("hi");
        exchange
            .input_mut()
            .headers
            .insert("trace".to_string(), "t-9".to_string());
        let id = exchange.id().to_string();

        let replied = run(&consumer, exchange).expect("processed");

        assert_eq!(replied.id(), id);
        let reply = replied.output().expect("reply set");
        assert_eq!(reply.body, json!("HI"));
        assert_eq!(reply.headers.get("trace").map(String::as_str), Some("t-9"));
    }

    #[test]
    fn processor_sees_a_copy_with_its_own_id() {
        let (seen_tx, seen_rx) = mpsc::channel();
        let seen_tx = parking_lot::Mutex::new(seen_tx);
        let consumer = processing("copy", move |input| {
            let subscriber = RecordingSubscriber::<Exchange>::new(1);
            input.subscribe(subscriber.clone());
            seen_tx.lock().send(subscriber.items()).expect("receiver alive");
            Ok(ProcessorReply::Body(Value::Null))
        });
        let exchange = Exchange::request("payload");
        let id = exchange.id().to_string();

        run(&consumer, exchange).expect("processed");

        let seen = seen_rx.recv().expect("processor ran");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].input().body, json!("payload"));
        assert_ne!(seen[0].id(), id);
    }

    #[test]
    fn returned_input_stream_echoes_the_body() {
        let consumer = processing("echo", |input| Ok(ProcessorReply::Stream(Arc::new(input))));

        let replied = run(&consumer, Exchange::request(json!({"n": 1}))).expect("processed");

        assert_eq!(replied.message().body, json!({"n": 1}));
    }

    #[test]
    fn stream_replies_collapse_by_item_count() {
        let cases = [
            (vec![], Value::Null),
            (vec![Exchange::new("a"), Exchange::new("b")], json!(["a", "b"])),
        ];
        for (items, expected) in cases {
            let consumer = processing("burst", move |_input| {
                Ok(ProcessorReply::Stream(Arc::new(Burst(items.clone()))))
            });

            let replied = run(&consumer, Exchange::request("x")).expect("processed");

            assert_eq!(replied.message().body, expected);
        }
    }

    #[test]
    fn processor_error_fails_the_exchange() {
        let consumer = processing("broken", |_input| {
            Err(StreamError::ExchangeFailed("nope".to_string()))
        });

        assert_eq!(
            run(&consumer, Exchange::request("x")),
            Err(StreamError::ExchangeFailed("nope".to_string()))
        );
    }

    #[test]
    fn unfinished_reply_stream_abandons_the_exchange() {
        struct Silent;
        impl Publisher<Exchange> for Silent {
            fn subscribe(&self, _subscriber: Arc<dyn Subscriber<Exchange>>) {}
        }
        let consumer = processing("silent", |_input| Ok(ProcessorReply::Stream(Arc::new(Silent))));

        assert_eq!(
            run(&consumer, Exchange::request("x")),
            Err(StreamError::ExchangeAbandoned)
        );
    }

    #[test]
    fn typed_body_helper_serializes() {
        match ProcessorReply::body(vec![1, 2]).expect("serializable") {
            ProcessorReply::Body(body) => assert_eq!(body, json!([1, 2])),
            ProcessorReply::Stream(_) => panic!("expected a body reply"),
        }
    }
}
