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

//! Error taxonomy for bridge calls and stream signals.

use thiserror::Error;

/// Failures returned synchronously to the caller of a bridge operation.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no consumer attached to stream '{stream}'")]
    NoConsumerAttached { stream: String },

    #[error("a consumer is already attached to stream '{stream}'")]
    ConsumerAlreadyAttached { stream: String },

    #[error("a producer is already attached to stream '{stream}'")]
    ProducerAlreadyAttached { stream: String },

    #[error("unable to create reactive stream pipeline for locator '{locator}'")]
    PipelineConstruction {
        locator: String,
        #[source]
        source: PipelineError,
    },

    #[error("bridge has been shut down")]
    Stopped,

    #[error("invalid bridge configuration: {0}")]
    InvalidConfig(String),

    #[error("unable to read bridge configuration")]
    ConfigIo(#[from] std::io::Error),

    #[error("unable to parse bridge configuration")]
    ConfigParse(#[from] json5::Error),

    #[error("unable to build worker pool '{name}'")]
    WorkerPool {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Failures carried through the protocol error channel and payload callbacks.
///
/// Cloneable because one failure may need to reach both a producer callback
/// and a downstream subscriber.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream '{stream}' already has an active subscriber")]
    AlreadySubscribed { stream: String },

    #[error("request(n) must be positive, got 0")]
    NonPositiveRequest,

    #[error("buffer of stream '{stream}' is full ({capacity} items)")]
    BufferOverflow { stream: String, capacity: usize },

    #[error("stream '{stream}' is closed")]
    StreamClosed { stream: String },

    #[error("payload dropped before being dispatched")]
    PayloadDropped,

    #[error("exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("exchange was abandoned without completion")]
    ExchangeAbandoned,

    #[error("unable to convert exchange body: {0}")]
    Conversion(String),

    #[error("worker pool is shut down")]
    WorkerPoolStopped,
}

/// Failures reported by the pipeline engine when installing a route.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown locator '{0}'")]
    UnknownLocator(String),

    #[error("route rejected by engine: {0}")]
    Rejected(String),
}
