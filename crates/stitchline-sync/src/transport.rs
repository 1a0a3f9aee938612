//! Transport abstraction for change feeds.
//!
//! A transport opens one stream of [`FeedMessage`]s per selector. Delivery
//! order on the stream is the order batches must be applied in.

use async_trait::async_trait;
use tokio::sync::mpsc;

use stitchline_core::CollectionSelector;
use stitchline_store::{FeedMessage, MemoryRemote};

use crate::error::{Result, SyncError};

/// An open change feed stream. Closing the receiver closes the feed.
pub type FeedStream = mpsc::UnboundedReceiver<FeedMessage>;

/// Transport trait for opening change feeds.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Open a feed for `selector`.
    ///
    /// The first message on the stream is the initial contents of the
    /// selection as a batch of additions.
    async fn open(&self, selector: &CollectionSelector) -> Result<FeedStream>;
}

#[async_trait]
impl FeedTransport for MemoryRemote {
    async fn open(&self, selector: &CollectionSelector) -> Result<FeedStream> {
        Ok(self.listen(selector.clone())?)
    }
}

/// A hand-driven transport for testing.
///
/// Nothing arrives on an opened stream until the test pushes it.
pub mod scripted {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use stitchline_core::{DeltaBatch, Document};

    /// Transport whose streams are fed by [`ScriptedTransport::push`].
    #[derive(Default)]
    pub struct ScriptedTransport {
        inner: Mutex<ScriptedInner>,
    }

    #[derive(Default)]
    struct ScriptedInner {
        /// Open streams, by collection name.
        streams: HashMap<String, Vec<mpsc::UnboundedSender<FeedMessage>>>,
        /// Collections whose next `open` fails.
        refuse: Vec<String>,
        opened: usize,
    }

    impl ScriptedTransport {
        /// Create a new scripted transport.
        pub fn new() -> Self {
            Self::default()
        }

        /// Send a batch to every open stream of `collection`.
        ///
        /// Returns the number of streams that received it.
        pub fn push(&self, collection: &str, batch: DeltaBatch<Document>) -> usize {
            self.send(collection, FeedMessage::Batch(batch))
        }

        /// Send a delivery error to every open stream of `collection`.
        pub fn push_error(&self, collection: &str, message: &str) -> usize {
            self.send(collection, FeedMessage::Error(message.to_string()))
        }

        /// Make the next `open` for `collection` fail.
        pub fn refuse_next_open(&self, collection: &str) {
            self.lock().refuse.push(collection.to_string());
        }

        /// Number of streams of `collection` whose receiver is still alive.
        pub fn open_streams(&self, collection: &str) -> usize {
            let mut inner = self.lock();
            match inner.streams.get_mut(collection) {
                Some(senders) => {
                    senders.retain(|tx| !tx.is_closed());
                    senders.len()
                }
                None => 0,
            }
        }

        /// Total number of successful `open` calls.
        pub fn opened(&self) -> usize {
            self.lock().opened
        }

        fn send(&self, collection: &str, message: FeedMessage) -> usize {
            let mut inner = self.lock();
            match inner.streams.get_mut(collection) {
                Some(senders) => {
                    senders.retain(|tx| tx.send(message.clone()).is_ok());
                    senders.len()
                }
                None => 0,
            }
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedInner> {
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    #[async_trait]
    impl FeedTransport for ScriptedTransport {
        async fn open(&self, selector: &CollectionSelector) -> Result<FeedStream> {
            let mut inner = self.lock();
            if let Some(pos) = inner.refuse.iter().position(|c| *c == selector.collection) {
                inner.refuse.remove(pos);
                return Err(SyncError::TransportError(format!(
                    "refused to open feed on {}",
                    selector.collection
                )));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            inner
                .streams
                .entry(selector.collection.clone())
                .or_default()
                .push(tx);
            inner.opened += 1;
            Ok(rx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedTransport;
    use super::*;
    use stitchline_core::DeltaBatch;

    #[tokio::test]
    async fn test_scripted_push_reaches_open_streams() {
        let transport = ScriptedTransport::new();
        let selector = CollectionSelector::collection("Events");
        let mut a = transport.open(&selector).await.unwrap();
        let mut b = transport.open(&selector).await.unwrap();

        assert_eq!(transport.push("Events", DeltaBatch::default()), 2);
        assert!(matches!(a.recv().await, Some(FeedMessage::Batch(_))));
        assert!(matches!(b.recv().await, Some(FeedMessage::Batch(_))));

        drop(b);
        assert_eq!(transport.push_error("Events", "boom"), 1);
        assert_eq!(transport.open_streams("Events"), 1);
        assert_eq!(transport.push("UserEvents", DeltaBatch::default()), 0);
    }

    #[tokio::test]
    async fn test_scripted_refuse_next_open() {
        let transport = ScriptedTransport::new();
        let selector = CollectionSelector::collection("Events");
        transport.refuse_next_open("Events");

        assert!(matches!(
            transport.open(&selector).await,
            Err(SyncError::TransportError(_))
        ));
        assert!(transport.open(&selector).await.is_ok());
        assert_eq!(transport.opened(), 1);
    }

    #[tokio::test]
    async fn test_memory_remote_is_a_transport() {
        let remote = MemoryRemote::new();
        let mut stream = FeedTransport::open(&remote, &CollectionSelector::collection("Events"))
            .await
            .unwrap();
        match stream.recv().await {
            Some(FeedMessage::Batch(batch)) => assert!(batch.is_empty()),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
