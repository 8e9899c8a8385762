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

mod config;
mod consumers;
mod engine;

use crate::config::{Config, RequestTarget};
use crate::consumers::{ReplyForwarder, ReplyingConsumer};
use crate::engine::EchoLocatorEngine;
use clap::Parser;
use exchange_streams::{BridgeError, Publisher, StreamBridge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command()]
struct BridgeArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Exit once the startup requests have been answered.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    info!("Started echo-bridge");

    let args = BridgeArgs::parse();
    let config = Config::from_file(&args.config)?;

    let engine = Arc::new(EchoLocatorEngine::new(config.echo_locators.clone()));
    let bridge = Arc::new(StreamBridge::new(config.bridge.clone(), engine.clone())?);
    engine.bind(&bridge);

    for stream in &config.streams {
        bridge.attach_consumer(
            &stream.name,
            Arc::new(ReplyingConsumer::new(&stream.name, stream.reply)),
        )?;
    }

    let (replies_tx, mut replies_rx) = mpsc::unbounded_channel();
    for (index, request) in config.requests.iter().enumerate() {
        let label = format!("request-{index}");
        let reply = match request.target()? {
            RequestTarget::Stream(stream) => bridge.request(stream, request.body.clone())?,
            RequestTarget::Locator(locator) => {
                bridge.request_uri(locator, request.body.clone()).await?
            }
        };
        reply.subscribe(Arc::new(ReplyForwarder::new(&label, replies_tx.clone())));
    }
    drop(replies_tx);

    let reply_timeout = Duration::from_millis(config.reply_timeout_ms);
    for _ in 0..config.requests.len() {
        match tokio::time::timeout(reply_timeout, replies_rx.recv()).await {
            Ok(Some((label, Ok(body)))) => {
                info!(request = label.as_str(), reply = %body, "reply received");
            }
            Ok(Some((label, Err(err)))) => {
                warn!(request = label.as_str(), err = %err, "request failed");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(timeout_ms = config.reply_timeout_ms, "timed out waiting for replies");
                break;
            }
        }
    }

    if !args.once {
        info!(streams = ?bridge.stream_names(), "serving; press Ctrl-C to stop");
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(err = %err, "unable to listen for Ctrl-C");
        }
    }

    bridge.shutdown();
    Ok(())
}
