//! Publisher of one value that is already known.

use crate::error::StreamError;
use crate::protocol::{Publisher, Subscriber, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;

/// Emits a clone of its value to every subscriber, inline on the first `request`.
///
/// Unlike [`DeferredPublisher`](crate::DeferredPublisher) the value exists up front, so
/// nothing is handed to the worker pool.
///
/// ```
/// use std::sync::Arc;
/// use exchange_streams::{Publisher, SingleValuePublisher, StreamError, Subscriber, Subscription};
///
/// struct Print;
///
/// impl Subscriber<u32> for Print {
///     fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
///         subscription.request(1);
///     }
///     fn on_next(&self, item: u32) {
///         assert_eq!(item, 7);
///     }
///     fn on_error(&self, error: StreamError) {
///         panic!("{error}");
///     }
///     fn on_complete(&self) {}
/// }
///
/// SingleValuePublisher::new(7_u32).subscribe(Arc::new(Print));
/// ```
#[derive(Clone, Debug)]
pub struct SingleValuePublisher<T> {
    value: T,
}

impl<T> SingleValuePublisher<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Send + Sync + 'static> Publisher<T> for SingleValuePublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let subscription = Arc::new(SingleValueSubscription {
            pending: Mutex::new(Some((self.value.clone(), subscriber.clone()))),
        });
        subscriber.on_subscribe(subscription);
    }
}

// Emptied by the first `request` or by `cancel`; that also releases the subscriber.
struct SingleValueSubscription<T> {
    pending: Mutex<Option<(T, Arc<dyn Subscriber<T>>)>>,
}

impl<T: Send + Sync> Subscription for SingleValueSubscription<T> {
    fn request(&self, n: u64) {
        let Some((value, subscriber)) = self.pending.lock().take() else {
            return;
        };
        if n == 0 {
            subscriber.on_error(StreamError::NonPositiveRequest);
            return;
        }
        subscriber.on_next(value);
        subscriber.on_complete();
    }

    fn cancel(&self) {
        self.pending.lock().take();
    }
}
