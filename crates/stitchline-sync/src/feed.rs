//! Change feed subscriptions.
//!
//! [`ChangeFeedClient::subscribe`] opens a feed and forwards every message to
//! a callback from a background task. The callback runs under the
//! subscription's gate; [`Subscription::unsubscribe`] closes the gate while
//! holding it, so once it returns the callback is never entered again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;

use stitchline_core::{CollectionSelector, DeltaBatch, Document};
use stitchline_store::FeedMessage;

use crate::error::Result;
use crate::transport::FeedTransport;

/// Token identifying one live subscription.
///
/// Generations are never reused by a client, so a delivery carrying an old
/// generation can always be told apart from the current subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generation({})", self.0)
    }
}

/// A delivery failure reported by the remote in place of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feed delivery failed: {0}")]
pub struct FeedError(pub String);

/// What a feed delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    Batch(DeltaBatch<Document>),
    Error(FeedError),
}

/// One message handed to a subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDelivery {
    pub generation: Generation,
    pub payload: FeedPayload,
}

/// Opens change feeds over a [`FeedTransport`].
pub struct ChangeFeedClient {
    transport: Arc<dyn FeedTransport>,
    next_generation: AtomicU64,
}

impl ChangeFeedClient {
    pub fn new(transport: Arc<dyn FeedTransport>) -> Self {
        Self {
            transport,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Open a feed for `selector` and forward each message to `callback`.
    ///
    /// Must be called from within a tokio runtime. The callback runs on a
    /// background task and should only hand the delivery off; it must not
    /// call [`Subscription::unsubscribe`] on its own subscription.
    pub async fn subscribe<F>(&self, selector: CollectionSelector, mut callback: F) -> Result<Subscription>
    where
        F: FnMut(FeedDelivery) + Send + 'static,
    {
        let mut stream = self.transport.open(&selector).await?;
        let generation = Generation(self.next_generation.fetch_add(1, Ordering::Relaxed));
        let gate = Arc::new(Mutex::new(true));

        tracing::debug!(
            collection = %selector.collection,
            generation = generation.0,
            "subscribed to change feed"
        );

        let task_gate = gate.clone();
        let collection = selector.collection;
        let task = tokio::spawn(async move {
            while let Some(message) = stream.recv().await {
                let payload = match message {
                    FeedMessage::Batch(batch) => FeedPayload::Batch(batch),
                    FeedMessage::Error(message) => FeedPayload::Error(FeedError(message)),
                };

                let open = task_gate.lock().unwrap_or_else(|e| e.into_inner());
                if !*open {
                    return;
                }
                callback(FeedDelivery {
                    generation,
                    payload,
                });
            }
            tracing::debug!(%collection, generation = generation.0, "change feed closed by remote");
        });

        Ok(Subscription {
            generation,
            gate,
            task: Some(task),
        })
    }
}

/// Handle to a live feed. Dropping it unsubscribes.
pub struct Subscription {
    generation: Generation,
    gate: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the feed. Idempotent.
    ///
    /// Waits for a callback already in progress to finish; after that the
    /// callback is never invoked again.
    pub fn unsubscribe(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = false;
        task.abort();
        tracing::debug!(generation = self.generation.0, "unsubscribed from change feed");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::ScriptedTransport;
    use std::sync::atomic::AtomicUsize;
    use stitchline_core::{Delta, Fields};
    use tokio::sync::mpsc;

    fn added(id: &str, index: usize) -> DeltaBatch<Document> {
        DeltaBatch::new(vec![Delta::Added {
            new_index: index,
            entity: Document::new(id, Fields::new()),
        }])
    }

    #[tokio::test]
    async fn test_deliveries_arrive_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ChangeFeedClient::new(transport.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = client
            .subscribe(CollectionSelector::collection("Events"), move |d| {
                let _ = tx.send(d);
            })
            .await
            .unwrap();

        transport.push("Events", added("a", 0));
        transport.push_error("Events", "flaky");
        transport.push("Events", added("b", 1));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.generation, sub.generation());
        assert_eq!(first.payload, FeedPayload::Batch(added("a", 0)));
        assert_eq!(
            rx.recv().await.unwrap().payload,
            FeedPayload::Error(FeedError("flaky".into()))
        );
        assert_eq!(rx.recv().await.unwrap().payload, FeedPayload::Batch(added("b", 1)));
    }

    #[tokio::test]
    async fn test_generations_are_unique() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ChangeFeedClient::new(transport);
        let a = client
            .subscribe(CollectionSelector::collection("Events"), |_| {})
            .await
            .unwrap();
        let b = client
            .subscribe(CollectionSelector::collection("Events"), |_| {})
            .await
            .unwrap();
        assert_ne!(a.generation(), b.generation());
    }

    #[tokio::test]
    async fn test_no_callback_after_unsubscribe() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ChangeFeedClient::new(transport.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let mut sub = client
            .subscribe(CollectionSelector::collection("Events"), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());

        transport.push("Events", added("a", 0));
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.open_streams("Events"), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ChangeFeedClient::new(transport.clone());
        let sub = client
            .subscribe(CollectionSelector::collection("Events"), |_| {})
            .await
            .unwrap();
        drop(sub);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(transport.open_streams("Events"), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.refuse_next_open("Events");
        let client = ChangeFeedClient::new(transport);
        assert!(client
            .subscribe(CollectionSelector::collection("Events"), |_| {})
            .await
            .is_err());
    }
}
