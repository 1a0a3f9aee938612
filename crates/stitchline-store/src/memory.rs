//! In-memory implementations of the store traits.
//!
//! [`MemoryRemote`] stands in for the hosted document database: it keeps
//! collections in memory, assigns ids, and pushes positional change feeds to
//! listeners exactly the way the hosted store orders them. It also carries a
//! few hooks for exercising failure paths (offline mode, injected feed
//! errors, artificial latency).

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use stitchline_core::{CollectionSelector, Delta, DeltaBatch, Document, FieldFilter, Fields};

use crate::error::{Result, StoreError};
use crate::project::{sort_projects, NewProject, Project, ProjectId};
use crate::traits::{FeedMessage, ProjectStore, RemoteStore};

/// Length of generated document ids.
const ID_LEN: usize = 20;

/// In-memory remote document store with live change feeds.
pub struct MemoryRemote {
    inner: RwLock<RemoteInner>,
    offline: AtomicBool,
    latency: Option<Duration>,
}

struct RemoteInner {
    /// Collection name -> document id -> fields.
    collections: HashMap<String, BTreeMap<String, Fields>>,

    /// Open change feeds.
    watchers: Vec<Watcher>,
}

/// One open feed: its selection, the ordered view the listener has been
/// told about, and where to send deltas.
struct Watcher {
    selector: CollectionSelector,
    view: Vec<Document>,
    tx: mpsc::UnboundedSender<FeedMessage>,
}

impl Watcher {
    /// Move the document `id` to where `after` belongs and describe the move.
    fn track(&mut self, collection: &str, id: &str, after: Option<&Document>) -> Option<Delta<Document>> {
        let old_index = self.view.iter().position(|d| d.id == id);
        let before = old_index.map(|i| self.view.remove(i));

        let new_index = after
            .filter(|doc| self.selector.selects(collection, doc))
            .map(|doc| {
                let index = self
                    .view
                    .partition_point(|d| self.selector.compare(d, doc) == Ordering::Less);
                self.view.insert(index, doc.clone());
                index
            });

        match (old_index, new_index, before) {
            (None, Some(new_index), _) => Some(Delta::Added {
                new_index,
                entity: self.view[new_index].clone(),
            }),
            (Some(old_index), Some(new_index), _) => Some(Delta::Modified {
                old_index,
                new_index,
                entity: self.view[new_index].clone(),
            }),
            (Some(old_index), None, Some(entity)) => Some(Delta::Removed { old_index, entity }),
            _ => None,
        }
    }
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RemoteInner {
                collections: HashMap::new(),
                watchers: Vec::new(),
            }),
            offline: AtomicBool::new(false),
            latency: None,
        }
    }

    /// Delay every remote operation by `latency` before it touches state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    /// Open feeds are unaffected.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Open a change feed.
    ///
    /// The first message is a batch adding the current contents of the
    /// selection in order. Every later write that touches the selection
    /// produces one batch.
    pub fn listen(&self, selector: CollectionSelector) -> Result<mpsc::UnboundedReceiver<FeedMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.write()?;

        let mut view: Vec<Document> = inner
            .collections
            .get(&selector.collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .filter(|doc| selector.selects(&selector.collection, doc))
            .collect();
        view.sort_by(|a, b| selector.compare(a, b));

        let initial = view
            .iter()
            .enumerate()
            .map(|(new_index, doc)| Delta::Added {
                new_index,
                entity: doc.clone(),
            })
            .collect();
        // The receiver is still in hand, this cannot fail.
        let _ = tx.send(FeedMessage::Batch(initial));

        tracing::debug!(collection = %selector.collection, initial = view.len(), "feed opened");
        inner.watchers.push(Watcher { selector, view, tx });
        Ok(rx)
    }

    /// Deliver a transient error to every open feed on `collection`.
    pub fn inject_feed_error(&self, collection: &str, message: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.watchers.retain(|w| {
            w.selector.collection != collection
                || w.tx.send(FeedMessage::Error(message.to_string())).is_ok()
        });
        Ok(())
    }

    /// Number of documents currently in a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.read()
            .map(|inner| inner.collections.get(collection).map_or(0, |c| c.len()))
            .unwrap_or(0)
    }

    /// Number of feeds whose receiver is still alive.
    pub fn open_feeds(&self) -> usize {
        self.write()
            .map(|mut inner| {
                inner.watchers.retain(|w| !w.tx.is_closed());
                inner.watchers.len()
            })
            .unwrap_or(0)
    }

    async fn enter(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("remote is offline".into()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RemoteInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RemoteInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteInner {
    /// Store `fields` (or delete when `None`) and fan the change out.
    fn write_document(&mut self, collection: &str, id: &str, fields: Option<Fields>) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        let after = match fields {
            Some(fields) => {
                docs.insert(id.to_string(), fields.clone());
                Some(Document::new(id, fields))
            }
            None => {
                docs.remove(id);
                None
            }
        };

        self.watchers.retain_mut(|watcher| {
            if watcher.selector.collection != collection {
                return !watcher.tx.is_closed();
            }
            match watcher.track(collection, id, after.as_ref()) {
                Some(delta) => watcher
                    .tx
                    .send(FeedMessage::Batch(DeltaBatch::new(vec![delta])))
                    .is_ok(),
                None => !watcher.tx.is_closed(),
            }
        });
    }

    fn fields(&self, collection: &str, id: &str) -> Result<Fields> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))
    }

    fn fresh_id(&self, collection: &str) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(ID_LEN)
                .map(char::from)
                .collect();
            let taken = self
                .collections
                .get(collection)
                .map_or(false, |docs| docs.contains_key(&id));
            if !taken {
                return id;
            }
        }
    }

    /// Apply `update` to an array field. Publishes only if the array changed.
    fn update_array(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        update: impl FnOnce(&mut Vec<Value>),
    ) -> Result<()> {
        let mut fields = self.fields(collection, id)?;
        let mut array = match fields.remove(field) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(array)) => array,
            Some(other) => {
                return Err(StoreError::InvalidData(format!(
                    "{}/{} field {} is not an array: {}",
                    collection, id, field, other
                )))
            }
        };

        let before = array.clone();
        update(&mut array);
        let changed = array != before;
        fields.insert(field.to_string(), Value::Array(array));

        if changed {
            self.write_document(collection, id, Some(fields));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String> {
        self.enter().await?;
        let mut inner = self.write()?;
        let id = inner.fresh_id(collection);
        inner.write_document(collection, &id, Some(fields));
        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.enter().await?;
        let mut inner = self.write()?;
        inner.write_document(collection, id, Some(fields));
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.enter().await?;
        let inner = self.read()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        self.enter().await?;
        let mut inner = self.write()?;
        let exists = inner
            .collections
            .get(collection)
            .map_or(false, |docs| docs.contains_key(id));
        if exists {
            inner.write_document(collection, id, None);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filter: &FieldFilter) -> Result<Vec<Document>> {
        self.enter().await?;
        let inner = self.read()?;
        Ok(inner
            .collections
            .get(collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .filter(|doc| filter.matches(doc))
            .collect())
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        self.enter().await?;
        let mut inner = self.write()?;
        inner.update_array(collection, id, field, |array| {
            for value in values {
                if !array.contains(&value) {
                    array.push(value);
                }
            }
        })
    }

    async fn array_remove(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        self.enter().await?;
        let mut inner = self.write()?;
        inner.update_array(collection, id, field, |array| {
            array.retain(|v| !values.contains(v));
        })
    }
}

/// In-memory project store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryProjectStore {
    inner: RwLock<ProjectsInner>,
    changes: watch::Sender<Arc<Vec<Project>>>,
}

struct ProjectsInner {
    projects: BTreeMap<ProjectId, Project>,
    next_id: i64,
}

impl MemoryProjectStore {
    /// Create a new empty project store.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: RwLock::new(ProjectsInner {
                projects: BTreeMap::new(),
                next_id: 1,
            }),
            changes,
        }
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ProjectsInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn publish(&self, inner: &ProjectsInner) {
        let mut all: Vec<Project> = inner.projects.values().cloned().collect();
        sort_projects(&mut all);
        self.changes.send_replace(Arc::new(all));
    }
}

impl Default for MemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: NewProject) -> Result<Project> {
        let mut inner = self.write()?;
        let id = ProjectId(inner.next_id);
        inner.next_id += 1;

        let project = project.into_project(id);
        inner.projects.insert(id, project.clone());
        self.publish(&inner);
        Ok(project)
    }

    async fn delete(&self, id: ProjectId) -> Result<bool> {
        let mut inner = self.write()?;
        let existed = inner.projects.remove(&id).is_some();
        if existed {
            self.publish(&inner);
        }
        Ok(existed)
    }

    async fn toggle_completion(&self, id: ProjectId) -> Result<Project> {
        let mut inner = self.write()?;
        let project = inner
            .projects
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("project {}", id)))?;
        project.is_completed = !project.is_completed;
        let updated = project.clone();
        self.publish(&inner);
        Ok(updated)
    }

    async fn fetch_all(&self) -> Result<Vec<Project>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
        let mut all: Vec<Project> = inner.projects.values().cloned().collect();
        sort_projects(&mut all);
        Ok(all)
    }

    fn subscribe(&self) -> watch::Receiver<Arc<Vec<Project>>> {
        self.changes.subscribe()
    }
}
