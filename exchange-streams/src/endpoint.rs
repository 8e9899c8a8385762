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

use crate::error::StreamError;
use crate::exchange::Exchange;

/// Result of processing one exchange.
pub type ExchangeOutcome = Result<Exchange, StreamError>;

type CompletionCallback = Box<dyn FnOnce(ExchangeOutcome) + Send>;

///
/// [`Completion`] is the one-shot completion signal handed to an [`ExchangeConsumer`]
/// together with the exchange it has to process.
///
/// It may be signalled from any thread. Dropping it without calling [`Completion::complete`]
/// or [`Completion::fail`] reports [`StreamError::ExchangeAbandoned`], so a cancelled or lost
/// exchange still resolves the waiting side.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc;
/// use exchange_streams::{Completion, Exchange, StreamError};
///
/// let (tx, rx) = mpsc::channel();
/// let completion = Completion::new(move |outcome| tx.send(outcome).unwrap());
/// drop(completion);
///
/// assert_eq!(rx.recv().unwrap(), Err(StreamError::ExchangeAbandoned));
/// ```
pub struct Completion {
    callback: Option<CompletionCallback>,
}

impl Completion {
    pub fn new(callback: impl FnOnce(ExchangeOutcome) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Reports successful processing; `exchange` carries the reply, if any.
    pub fn complete(mut self, exchange: Exchange) {
        self.signal(Ok(exchange));
    }

    /// Reports failed processing.
    pub fn fail(mut self, error: StreamError) {
        self.signal(Err(error));
    }

    fn signal(&mut self, outcome: ExchangeOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.signal(Err(StreamError::ExchangeAbandoned));
    }
}

/// Pipeline-side component that receives exchanges pushed into a stream from outside.
pub trait ExchangeConsumer: Send + Sync {
    /// Hands `exchange` to the processing pipeline.
    ///
    /// Must not block; the outcome is reported through `completion`, possibly later and
    /// from another thread.
    fn process(&self, exchange: Exchange, completion: Completion);

    /// Called when the external publisher feeding the stream fails.
    fn on_stream_error(&self, _stream: &str, _error: &StreamError) {}
}

/// Pipeline-side component that pushes exchanges into a stream.
pub trait ExchangeProducer: Send + Sync {
    fn producer_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::Completion;
    use crate::error::StreamError;
    use crate::exchange::Exchange;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn completion_signals_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let completion = Completion::new(move |outcome| {
            assert!(outcome.is_ok());
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        completion.complete(Exchange::new("done"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_reports_the_given_error() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen_clone = seen.clone();
        let completion = Completion::new(move |outcome| {
            *seen_clone.lock() = outcome.err();
        });

        completion.fail(StreamError::ExchangeFailed("boom".to_string()));

        assert_eq!(
            *seen.lock(),
            Some(StreamError::ExchangeFailed("boom".to_string()))
        );
    }
}
