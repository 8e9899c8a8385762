//! Protocol test doubles shared by the unit tests of this crate.

use crate::error::StreamError;
use crate::protocol::{Subscriber, Subscription};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Signal<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

struct RecorderState<T> {
    subscribed: bool,
    subscription: Option<Arc<dyn Subscription>>,
    signals: Vec<Signal<T>>,
}

/// Subscriber that records every signal and optionally requests demand on subscribe.
pub(crate) struct RecordingSubscriber<T> {
    initial_request: u64,
    state: Mutex<RecorderState<T>>,
    changed: Condvar,
}

impl<T: Clone + Send + 'static> RecordingSubscriber<T> {
    pub(crate) fn new(initial_request: u64) -> Arc<Self> {
        Arc::new(Self {
            initial_request,
            state: Mutex::new(RecorderState {
                subscribed: false,
                subscription: None,
                signals: Vec::new(),
            }),
            changed: Condvar::new(),
        })
    }

    pub(crate) fn request(&self, n: u64) {
        let subscription = self.state.lock().subscription.clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    pub(crate) fn cancel(&self) {
        let subscription = self.state.lock().subscription.clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    pub(crate) fn signals(&self) -> Vec<Signal<T>> {
        self.state.lock().signals.clone()
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.state
            .lock()
            .signals
            .iter()
            .filter_map(|signal| match signal {
                Signal::Next(item) => Some(item.clone()),
                _ => None,
            })
            .collect()
    }

    /// Blocks until at least `count` signals arrived or `timeout` elapsed.
    pub(crate) fn wait_for_signals(&self, count: usize, timeout: Duration) -> Vec<Signal<T>> {
        let mut state = self.state.lock();
        let deadline = std::time::Instant::now() + timeout;
        while state.signals.len() < count {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.signals.clone()
    }

    fn push(&self, signal: Signal<T>) {
        self.state.lock().signals.push(signal);
        self.changed.notify_all();
    }
}

impl<T: Clone + Send + 'static> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        {
            let mut state = self.state.lock();
            state.subscribed = true;
            state.subscription = Some(subscription.clone());
        }
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&self, item: T) {
        self.push(Signal::Next(item));
    }

    fn on_error(&self, error: StreamError) {
        self.push(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.push(Signal::Complete);
    }
}
