// ── Reactive value streams ──
//
// Subscription wrapper for consuming watch-backed cells from the
// TelemetryStore, directory, and binders.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to one reactive cell.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed`](Self::changed) or by converting to a `Stream`. A
/// subscriber created after a value exists sees that value immediately
/// -- it never waits for the next update.
pub struct ValueStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> ValueStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The value captured at creation time.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// The latest value (may have changed since creation).
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new value.
    /// Returns `None` once the writer (the session) has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = value.clone();
        Some(value)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ValueWatchStream<T> {
        ValueWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current value first, then a new value each time the cell
/// is replaced. Intermediate values may be skipped (last-write-wins).
pub struct ValueWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for ValueWatchStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_subscriber_sees_current_value() {
        let (tx, rx) = watch::channel(0_u32);
        tx.send(7).expect("receiver alive");

        let stream = ValueStream::new(rx);
        assert_eq!(*stream.current(), 7);
        assert_eq!(stream.latest(), 7);
    }

    #[tokio::test]
    async fn changed_returns_new_value() {
        let (tx, rx) = watch::channel(0_u32);
        let mut stream = ValueStream::new(rx);

        tx.send(1).expect("receiver alive");
        assert_eq!(stream.changed().await, Some(1));
        assert_eq!(*stream.current(), 1);
    }

    #[tokio::test]
    async fn changed_is_none_after_writer_drops() {
        let (tx, rx) = watch::channel(0_u32);
        let mut stream = ValueStream::new(rx);

        drop(tx);
        assert_eq!(stream.changed().await, None);
    }

    #[tokio::test]
    async fn intermediate_values_are_coalesced() {
        let (tx, rx) = watch::channel(0_u32);
        let mut stream = ValueStream::new(rx);

        // Bursty writer: only the latest value matters for display.
        for i in 1..=5 {
            tx.send(i).expect("receiver alive");
        }
        assert_eq!(stream.changed().await, Some(5));
    }
}
