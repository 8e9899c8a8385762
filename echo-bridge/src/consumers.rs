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

use crate::config::ReplyMode;
use exchange_streams::{
    Completion, Exchange, ExchangeConsumer, Message, StreamError, Subscriber, Subscription,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Replies to every exchange according to its [`ReplyMode`].
pub struct ReplyingConsumer {
    stream: String,
    mode: ReplyMode,
}

impl ReplyingConsumer {
    pub fn new(stream: &str, mode: ReplyMode) -> Self {
        Self {
            stream: stream.to_string(),
            mode,
        }
    }
}

fn reply_body(mode: ReplyMode, body: &Value) -> Value {
    match (mode, body) {
        (ReplyMode::Uppercase, Value::String(text)) => Value::String(text.to_uppercase()),
        _ => body.clone(),
    }
}

impl ExchangeConsumer for ReplyingConsumer {
    fn process(&self, mut exchange: Exchange, completion: Completion) {
        debug!(
            stream = self.stream.as_str(),
            exchange_id = exchange.id(),
            "replying to exchange"
        );
        let mut reply = Message::new(reply_body(self.mode, &exchange.input().body));
        reply.headers = exchange.input().headers.clone();
        exchange.set_output(reply);
        completion.complete(exchange);
    }

    fn on_stream_error(&self, stream: &str, error: &StreamError) {
        error!(stream, err = %error, "inbound stream failed");
    }
}

/// Outcome of one startup request.
pub type ReplyOutcome = Result<Value, StreamError>;

/// Forwards the single reply of a request to a channel.
pub struct ReplyForwarder {
    label: String,
    replies: mpsc::UnboundedSender<(String, ReplyOutcome)>,
}

impl ReplyForwarder {
    pub fn new(label: &str, replies: mpsc::UnboundedSender<(String, ReplyOutcome)>) -> Self {
        Self {
            label: label.to_string(),
            replies,
        }
    }

    fn forward(&self, outcome: ReplyOutcome) {
        if self.replies.send((self.label.clone(), outcome)).is_err() {
            debug!(request = self.label.as_str(), "reply arrived after shutdown");
        }
    }
}

impl Subscriber<Exchange> for ReplyForwarder {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        subscription.request(1);
    }

    fn on_next(&self, item: Exchange) {
        self.forward(Ok(item.message().body.clone()));
    }

    fn on_error(&self, error: StreamError) {
        self.forward(Err(error));
    }

    fn on_complete(&self) {}
}
