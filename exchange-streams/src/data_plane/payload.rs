//! Payload envelope: one in-flight item plus its delivery-outcome callback.

use crate::error::StreamError;

type DispatchCallback<T> = Box<dyn FnOnce(T, Result<(), StreamError>) + Send>;

/// An item travelling through a publisher adapter.
///
/// The callback runs exactly once: on [`StreamPayload::complete`], or with
/// [`StreamError::PayloadDropped`] if the envelope is dropped first.
pub struct StreamPayload<T: Send + 'static> {
    data: Option<T>,
    callback: Option<DispatchCallback<T>>,
}

impl<T: Send + 'static> StreamPayload<T> {
    pub fn new(data: T, callback: impl FnOnce(T, Result<(), StreamError>) + Send + 'static) -> Self {
        Self {
            data: Some(data),
            callback: Some(Box::new(callback)),
        }
    }

    /// Envelope whose outcome nobody waits for.
    pub fn detached(data: T) -> Self {
        Self::new(data, |_, _| {})
    }

    pub fn data(&self) -> &T {
        // Only `complete` and `Drop` take the data, and both consume the envelope.
        self.data
            .as_ref()
            .unwrap_or_else(|| unreachable!("payload data present until consumed"))
    }

    /// Hands the data back to the producer together with the delivery outcome.
    pub fn complete(mut self, result: Result<(), StreamError>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<(), StreamError>) {
        if let (Some(data), Some(callback)) = (self.data.take(), self.callback.take()) {
            callback(data, result);
        }
    }
}

impl<T: Send + 'static> Drop for StreamPayload<T> {
    fn drop(&mut self) {
        self.finish(Err(StreamError::PayloadDropped));
    }
}
