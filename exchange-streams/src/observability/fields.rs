/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
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

//! Canonical structured field keys and value-format helpers.

use crate::exchange::Exchange;
use serde_json::Value;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const STREAM: &str = "stream";
pub const LOCATOR: &str = "locator";
pub const WORKER_POOL: &str = "worker_pool";
pub const WORKER_THREAD: &str = "worker_thread";

pub const EXCHANGE_ID: &str = "exchange_id";
pub const BODY_KIND: &str = "body_kind";
pub const DEMAND: &str = "demand";
pub const BUFFERED: &str = "buffered";
pub const INFLIGHT: &str = "inflight";
pub const CAPACITY: &str = "capacity";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_SLOT_OCCUPIED: &str = "slot_occupied";
pub const REASON_SHUTDOWN: &str = "shutdown";
pub const REASON_ZERO_DEMAND: &str = "zero_demand";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_pool: String,
    pub worker_thread: String,
}

impl WorkerContext {
    pub fn with_current_thread(worker_pool: impl Into<String>) -> Self {
        Self {
            worker_pool: worker_pool.into(),
            worker_thread: current_thread_name_or_default(),
        }
    }
}

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_WORKER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}

pub fn format_body_kind(body: &Value) -> &'static str {
    match body {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn format_exchange_body_kind(exchange: &Exchange) -> &'static str {
    format_body_kind(&exchange.message().body)
}

#[cfg(test)]
mod tests {
    use super::{
        format_body_kind, format_exchange_body_kind, thread_name_or_default, WorkerContext,
        DEFAULT_WORKER_THREAD,
    };
    use crate::exchange::{Exchange, Message};
    use serde_json::json;

    #[test]
    fn format_body_kind_names_every_json_shape() {
        assert_eq!(format_body_kind(&json!(null)), "null");
        assert_eq!(format_body_kind(&json!(true)), "bool");
        assert_eq!(format_body_kind(&json!(7)), "number");
        assert_eq!(format_body_kind(&json!("x")), "string");
        assert_eq!(format_body_kind(&json!([1])), "array");
        assert_eq!(format_body_kind(&json!({"a": 1})), "object");
    }

    #[test]
    fn format_exchange_body_kind_prefers_output() {
        let mut exchange = Exchange::new("text");
        exchange.set_output(Message::new(json!({"reply": 1})));

        assert_eq!(format_exchange_body_kind(&exchange), "object");
    }

    #[test]
    fn thread_name_or_default_falls_back_when_absent() {
        assert_eq!(thread_name_or_default(None), DEFAULT_WORKER_THREAD);
        assert_eq!(thread_name_or_default(Some("named-thread")), "named-thread");
    }

    #[test]
    fn worker_context_captures_current_thread_name() {
        let context = std::thread::Builder::new()
            .name("ctx-thread".to_string())
            .spawn(|| WorkerContext::with_current_thread("pool"))
            .expect("thread should spawn")
            .join()
            .expect("thread should not panic");

        assert_eq!(context.worker_pool, "pool");
        assert_eq!(context.worker_thread, "ctx-thread");
    }
}
