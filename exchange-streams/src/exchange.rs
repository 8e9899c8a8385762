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

//! Canonical message type moved through the bridge.

use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Whether the sender of an exchange waits for a reply.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExchangePattern {
    #[default]
    InOnly,
    InOut,
}

/// One message: string headers plus a JSON body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl Message {
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// A unit of work flowing through a processing pipeline.
///
/// # Examples
///
/// ```
/// use exchange_streams::{Exchange, ExchangePattern, Message};
///
/// let mut exchange = Exchange::request("hello");
/// assert_eq!(exchange.pattern(), ExchangePattern::InOut);
///
/// exchange.set_output(Message::new("HELLO"));
/// assert_eq!(exchange.message().body, "HELLO");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Exchange {
    id: String,
    pattern: ExchangePattern,
    input: Message,
    output: Option<Message>,
}

impl Exchange {
    /// Creates a one-way exchange carrying `body`.
    pub fn new(body: impl Into<Value>) -> Self {
        Self::from_message(ExchangePattern::InOnly, Message::new(body))
    }

    /// Creates a request/reply exchange carrying `body`.
    pub fn request(body: impl Into<Value>) -> Self {
        Self::from_message(ExchangePattern::InOut, Message::new(body))
    }

    pub fn from_message(pattern: ExchangePattern, input: Message) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pattern,
            input,
            output: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> ExchangePattern {
        self.pattern
    }

    pub fn set_pattern(&mut self, pattern: ExchangePattern) {
        self.pattern = pattern;
    }

    pub fn input(&self) -> &Message {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut Message {
        &mut self.input
    }

    pub fn output(&self) -> Option<&Message> {
        self.output.as_ref()
    }

    pub fn set_output(&mut self, output: Message) {
        self.output = Some(output);
    }

    /// The reply when one was produced, otherwise the request.
    pub fn message(&self) -> &Message {
        self.output.as_ref().unwrap_or(&self.input)
    }

    /// Copy with a fresh id, used when the same content must travel twice.
    pub fn copy(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}

impl From<Value> for Exchange {
    fn from(body: Value) -> Self {
        Exchange::new(body)
    }
}
