//! The sync controller: one live mirroring session at a time.
//!
//! [`SyncController`] is a handle to an actor task that owns the events
//! mirror, the relation mirror, the feed subscriptions and the session's
//! membership tasks. Feed callbacks only enqueue deliveries; every mirror
//! mutation and every observer dispatch happens on the actor, one command at
//! a time.
//!
//! ```text
//!              start(auth)            first events batch
//! Disconnected ───────────▶ Connecting ─────────────────▶ Connected
//!      ▲                        │                             │
//!      └──── logout / reset / desync / shutdown ──────────────┘
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};

use stitchline_core::relation::OWNER_FIELD;
use stitchline_core::{
    CollectionSelector, DeltaBatch, Document, Event, EventDraft, EventId, FieldFilter, IntoFields,
    MirrorError, OrderedMirror, RelationRecord, Skipped, Snapshot, UserId, UserProfile,
    EVENTS_COLLECTION, USERS_COLLECTION, USER_EVENTS_COLLECTION,
};
use stitchline_store::{MemoryRemote, RemoteStore};
use stitchline_sync::{
    ChangeFeedClient, FeedDelivery, FeedPayload, FeedTransport, Generation, Interest, ListenerId,
    ListenerRegistry, Notification, Observer, ProfileStore, RelationStore, SessionFault,
    Subscription,
};

use crate::auth::AuthProvider;
use crate::error::{ControllerError, Result};

/// Configuration for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Collection holding one document per event.
    pub events_collection: String,
    /// Collection holding one relation record per user.
    pub relations_collection: String,
    /// Collection holding one profile per user.
    pub profiles_collection: String,
    /// Field the events feed is ordered by. Ordered by document id when
    /// `None`.
    pub events_order_by: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            events_collection: EVENTS_COLLECTION.to_string(),
            relations_collection: USER_EVENTS_COLLECTION.to_string(),
            profiles_collection: USERS_COLLECTION.to_string(),
            events_order_by: None,
        }
    }
}

/// Lifecycle of a mirroring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Feeds are open; the events mirror has not received its first batch.
    Connecting,
    Connected,
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type SessionJob = Box<dyn FnOnce(SessionContext) -> BoxFuture + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feed {
    Events,
    Relations,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Logout,
    Reset,
    Desync,
    Restart,
    Shutdown,
}

enum Command {
    Start {
        user: Option<UserId>,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reason: Teardown,
        reply: oneshot::Sender<()>,
    },
    AddListener {
        observer: Arc<dyn Observer>,
        interest: Interest,
        reply: oneshot::Sender<ListenerId>,
    },
    Session {
        job: SessionJob,
        ack: oneshot::Sender<Result<()>>,
    },
    Delivery {
        feed: Feed,
        delivery: FeedDelivery,
    },
    Shutdown {
        reply: Option<oneshot::Sender<()>>,
    },
}

/// What a membership operation runs with, captured when it is spawned.
struct SessionContext {
    user: UserId,
    remote: Arc<dyn RemoteStore>,
    relations: RelationStore,
    events_collection: String,
    /// The relation record currently mirrored, if the feed has one.
    record: Option<RelationRecord>,
}

impl SessionContext {
    async fn record_or_create(&self) -> Result<RelationRecord> {
        match &self.record {
            Some(record) => Ok(record.clone()),
            None => Ok(self.relations.find_or_create(&self.user).await?),
        }
    }

    async fn existing_record(&self) -> Result<Option<RelationRecord>> {
        match &self.record {
            Some(record) => Ok(Some(record.clone())),
            None => Ok(self.relations.find(&self.user).await?),
        }
    }
}

/// Handle to the controller actor.
///
/// Dropping the handle shuts the actor down.
pub struct SyncController {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    events: watch::Receiver<Snapshot<Event>>,
    membership: watch::Receiver<Snapshot<Event>>,
    registry: Arc<ListenerRegistry>,
    profiles: ProfileStore,
}

impl SyncController {
    /// Create a controller and spawn its actor on the current runtime.
    ///
    /// Fails with [`ControllerError::Initialization`] outside a tokio
    /// runtime.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        transport: Arc<dyn FeedTransport>,
        config: ControllerConfig,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ControllerError::Initialization(e.to_string()))?;

        let (sender, commands) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Disconnected);
        let (events_tx, events) = watch::channel(Snapshot::empty());
        let (membership_tx, membership) = watch::channel(Snapshot::empty());
        let registry = Arc::new(ListenerRegistry::new());
        let profiles =
            ProfileStore::with_collection(remote.clone(), config.profiles_collection.clone());

        let actor = Actor {
            relations: RelationStore::with_collection(
                remote.clone(),
                config.relations_collection.clone(),
            ),
            remote,
            client: ChangeFeedClient::new(transport),
            registry: registry.clone(),
            commands,
            sender: sender.clone(),
            state: state_tx,
            events: events_tx,
            membership: membership_tx,
            session: None,
            config,
        };
        runtime.spawn(actor.run());

        Ok(Self {
            commands: sender,
            state,
            events,
            membership,
            registry,
            profiles,
        })
    }

    /// A controller whose remote and feeds are both served by `remote`.
    pub fn in_memory(remote: Arc<MemoryRemote>, config: ControllerConfig) -> Result<Self> {
        Self::new(remote.clone(), remote, config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a session for the user `auth` reports.
    ///
    /// A running session is torn down first. Returns once the feeds are
    /// open; the session reaches [`SessionState::Connected`] when the first
    /// events batch has been applied.
    ///
    /// Registered observers survive a start, including one that fails to
    /// open its feeds: the controller is left disconnected with empty
    /// snapshots and the caller may simply start again. Only logout, reset,
    /// a desync and shutdown drop observers.
    pub async fn start(&self, auth: &dyn AuthProvider) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.send(Command::Start {
            user: auth.current_user(),
            reply,
        })?;
        result.await.map_err(|_| ControllerError::Shutdown)?
    }

    /// End the session and drop every listener.
    pub async fn logout(&self) -> Result<()> {
        self.stop(Teardown::Logout).await
    }

    /// Same teardown as [`SyncController::logout`], for callers that are
    /// not signing out.
    pub async fn reset(&self) -> Result<()> {
        self.stop(Teardown::Reset).await
    }

    /// Stop the actor. Later calls fail with [`ControllerError::Shutdown`].
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.send(Command::Shutdown { reply: Some(reply) }).is_ok() {
            let _ = done.await;
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`.
    pub async fn wait_for_state(&self, target: SessionState) -> Result<()> {
        let mut state = self.state.clone();
        loop {
            if *state.borrow_and_update() == target {
                return Ok(());
            }
            state.changed().await.map_err(|_| ControllerError::Shutdown)?;
        }
    }

    /// A receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observers and Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an observer. It receives the latest snapshot(s) for its
    /// interest right away, before any later change.
    pub async fn add_listener(
        &self,
        observer: Arc<dyn Observer>,
        interest: Interest,
    ) -> Result<ListenerId> {
        let (reply, id) = oneshot::channel();
        self.send(Command::AddListener {
            observer,
            interest,
            reply,
        })?;
        id.await.map_err(|_| ControllerError::Shutdown)
    }

    /// Unregister by identity. The observer is not called again once this
    /// returns, except for a callback already running.
    pub fn remove_listener<O: ?Sized>(&self, observer: &Arc<O>) -> bool {
        self.registry.remove_listener(observer)
    }

    pub fn remove_listener_by_id(&self, id: ListenerId) -> bool {
        self.registry.remove_by_id(id)
    }

    /// The current events snapshot.
    pub fn events(&self) -> Snapshot<Event> {
        self.events.borrow().clone()
    }

    /// The signed-in user's events, resolved against the current snapshot.
    pub fn membership(&self) -> Snapshot<Event> {
        self.membership.borrow().clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Membership Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `event` to the user's memberships, creating the relation record
    /// on first use.
    pub async fn join_event(&self, event: &EventId) -> Result<()> {
        let event = event.clone();
        self.run_in_session(move |ctx| async move {
            let record = ctx.record_or_create().await?;
            ctx.relations.add_member(&record, &event).await?;
            tracing::debug!(user = %ctx.user, %event, "joined event");
            Ok(())
        })
        .await
    }

    /// Remove `event` from the user's memberships. Leaving an event the user
    /// never joined is not an error.
    pub async fn leave_event(&self, event: &EventId) -> Result<()> {
        let event = event.clone();
        self.run_in_session(move |ctx| async move {
            if let Some(record) = ctx.existing_record().await? {
                ctx.relations.remove_member(&record, &event).await?;
                tracing::debug!(user = %ctx.user, %event, "left event");
            }
            Ok(())
        })
        .await
    }

    /// Create an event hosted by the signed-in user and add it to their
    /// memberships. Returns the new event's id.
    pub async fn host_event(&self, draft: EventDraft) -> Result<EventId> {
        self.run_in_session(move |ctx| async move {
            let event = Event::from_draft(draft, ctx.user.clone());
            let id = ctx
                .remote
                .add_document(&ctx.events_collection, event.into_fields()?)
                .await?;
            let id = EventId::new(id);

            let record = ctx.record_or_create().await?;
            ctx.relations.add_member(&record, &id).await?;
            tracing::debug!(user = %ctx.user, event = %id, "hosted event");
            Ok(id)
        })
        .await
    }

    /// Delete an event, then remove it from the signed-in user's
    /// memberships.
    pub async fn cancel_event(&self, event: &EventId) -> Result<()> {
        let event = event.clone();
        self.run_in_session(move |ctx| async move {
            ctx.remote
                .delete_document(&ctx.events_collection, event.as_str())
                .await?;
            if let Some(record) = ctx.existing_record().await? {
                ctx.relations.remove_member(&record, &event).await?;
            }
            tracing::debug!(user = %ctx.user, %event, "cancelled event");
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profiles
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a user's names, e.g. right after sign-up.
    ///
    /// Profiles are read and written straight through the remote; no
    /// session is needed.
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        Ok(self.profiles.save(profile).await?)
    }

    /// The display name of `user`, such as an event's host. `None` when the
    /// user has no profile.
    pub async fn fetch_user_name(&self, user: &UserId) -> Result<Option<String>> {
        Ok(self.profiles.fetch_user_name(user).await?)
    }

    /// Run `op` as a task of the current session and wait for its result.
    async fn run_in_session<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(SessionContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: SessionJob = Box::new(move |ctx| {
            Box::pin(async move {
                let _ = reply.send(op(ctx).await);
            }) as BoxFuture
        });

        let (ack, accepted) = oneshot::channel();
        self.send(Command::Session { job, ack })?;
        accepted.await.map_err(|_| ControllerError::Shutdown)??;

        // The reply is dropped unsent when teardown aborts the task.
        result.await.map_err(|_| ControllerError::Cancelled)?
    }

    async fn stop(&self, reason: Teardown) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Stop { reason, reply })?;
        done.await.map_err(|_| ControllerError::Shutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ControllerError::Shutdown)
    }
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("state", &self.state())
            .field("events", &self.events.borrow().len())
            .finish()
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown { reply: None });
    }
}

/// State owned by one running session.
struct Session {
    user: Option<UserId>,
    events_feed: Subscription,
    relations_feed: Option<Subscription>,
    events: OrderedMirror<Event>,
    records: OrderedMirror<RelationRecord>,
    membership: Snapshot<Event>,
    tasks: JoinSet<()>,
}

impl Session {
    fn is_live(&self, feed: Feed, generation: Generation) -> bool {
        match feed {
            Feed::Events => self.events_feed.generation() == generation,
            Feed::Relations => self
                .relations_feed
                .as_ref()
                .map_or(false, |s| s.generation() == generation),
        }
    }

    /// Re-resolve the first relation record. Returns whether the
    /// membership changed.
    fn refresh_membership(&mut self) -> bool {
        let resolved = match self.records.snapshot().first() {
            Some(record) => record.resolve(&self.events.snapshot()),
            None => Snapshot::empty(),
        };
        if resolved == self.membership {
            return false;
        }
        self.membership = resolved;
        true
    }

    fn close(&mut self) {
        self.events_feed.unsubscribe();
        if let Some(feed) = self.relations_feed.as_mut() {
            feed.unsubscribe();
        }
        self.tasks.abort_all();
    }
}

struct Actor {
    config: ControllerConfig,
    client: ChangeFeedClient,
    remote: Arc<dyn RemoteStore>,
    relations: RelationStore,
    registry: Arc<ListenerRegistry>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Cloned into feed callbacks.
    sender: mpsc::UnboundedSender<Command>,
    state: watch::Sender<SessionState>,
    events: watch::Sender<Snapshot<Event>>,
    membership: watch::Sender<Snapshot<Event>>,
    session: Option<Session>,
}

impl Actor {
    async fn run(mut self) {
        tracing::debug!("controller started");
        loop {
            let command = tokio::select! {
                command = self.commands.recv() => command,
                Some(joined) = next_task(self.session.as_mut()) => {
                    log_task_exit(joined);
                    continue;
                }
            };

            let Some(command) = command else { break };
            if !self.handle(command).await {
                break;
            }
        }
        self.teardown(Teardown::Shutdown);
        tracing::debug!("controller stopped");
    }

    /// Returns false when the actor should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start { user, reply } => {
                let result = self.start(user).await;
                let _ = reply.send(result);
            }
            Command::Stop { reason, reply } => {
                self.teardown(reason);
                let _ = reply.send(());
            }
            Command::AddListener {
                observer,
                interest,
                reply,
            } => {
                let id = self.registry.add_listener(observer, interest);
                let _ = reply.send(id);
            }
            Command::Session { job, ack } => {
                let _ = ack.send(self.spawn_job(job));
            }
            Command::Delivery { feed, delivery } => self.on_delivery(feed, delivery),
            Command::Shutdown { reply } => {
                self.teardown(Teardown::Shutdown);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                return false;
            }
        }
        true
    }

    async fn start(&mut self, user: Option<UserId>) -> Result<()> {
        if self.session.is_some() {
            self.teardown(Teardown::Restart);
        }
        self.state.send_replace(SessionState::Connecting);
        tracing::debug!(user = ?user, "session connecting");

        let mut events_selector = CollectionSelector::collection(&self.config.events_collection);
        if let Some(field) = &self.config.events_order_by {
            events_selector = events_selector.order_by(field.clone());
        }
        let relations_selector = user.as_ref().map(|user| {
            CollectionSelector::collection(&self.config.relations_collection)
                .filter(FieldFilter::eq(OWNER_FIELD, user.as_str()))
        });

        let opened =
            open_feeds(&self.client, &self.sender, events_selector, relations_selector).await;
        let (events_feed, relations_feed) = match opened {
            Ok(feeds) => feeds,
            Err(e) => {
                // Observers stay registered for the next attempt.
                tracing::warn!(error = %e, "could not open feeds");
                self.state.send_replace(SessionState::Disconnected);
                return Err(e);
            }
        };

        self.session = Some(Session {
            user,
            events_feed,
            relations_feed,
            events: OrderedMirror::new(),
            records: OrderedMirror::new(),
            membership: Snapshot::empty(),
            tasks: JoinSet::new(),
        });
        Ok(())
    }

    fn spawn_job(&mut self, job: SessionJob) -> Result<()> {
        let session = self.session.as_mut().ok_or(ControllerError::NotConnected)?;
        let user = session.user.clone().ok_or(ControllerError::NotAuthenticated)?;
        let ctx = SessionContext {
            user,
            remote: self.remote.clone(),
            relations: self.relations.clone(),
            events_collection: self.config.events_collection.clone(),
            record: session.records.snapshot().first().cloned(),
        };
        session.tasks.spawn(job(ctx));
        Ok(())
    }

    fn on_delivery(&mut self, feed: Feed, delivery: FeedDelivery) {
        let live = self
            .session
            .as_ref()
            .map_or(false, |s| s.is_live(feed, delivery.generation));
        if !live {
            tracing::debug!(
                ?feed,
                generation = delivery.generation.as_u64(),
                "dropping stale delivery"
            );
            return;
        }

        let batch = match delivery.payload {
            FeedPayload::Batch(batch) => batch,
            FeedPayload::Error(error) => {
                tracing::warn!(
                    collection = self.collection(feed),
                    %error,
                    "transient feed error; keeping previous snapshot"
                );
                return;
            }
        };

        let applied = match feed {
            Feed::Events => self.apply_events(batch),
            Feed::Relations => self.apply_relations(batch),
        };
        if let Err(error) = applied {
            self.desync(feed, error);
        }
    }

    fn apply_events(&mut self, batch: DeltaBatch<Document>) -> std::result::Result<(), MirrorError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let outcome = session.events.apply_batch(batch.decode::<Event>())?;
        warn_skipped(&self.config.events_collection, &outcome.skipped);

        let snapshot = session.events.snapshot();
        let membership_changed = session.refresh_membership();
        let membership = session.membership.clone();

        self.events.send_replace(snapshot.clone());
        self.registry.invoke(Notification::Events(snapshot));
        if membership_changed {
            self.publish_membership(membership);
        }

        if *self.state.borrow() == SessionState::Connecting {
            self.state.send_replace(SessionState::Connected);
            tracing::debug!("session connected");
        }
        Ok(())
    }

    fn apply_relations(
        &mut self,
        batch: DeltaBatch<Document>,
    ) -> std::result::Result<(), MirrorError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let outcome = session.records.apply_batch(batch.decode::<RelationRecord>())?;
        warn_skipped(&self.config.relations_collection, &outcome.skipped);

        if session.records.len() > 1 {
            tracing::warn!(
                user = ?session.user,
                count = session.records.len(),
                "multiple relation records for user; using the first"
            );
        }

        session.refresh_membership();
        let membership = session.membership.clone();
        self.publish_membership(membership);
        Ok(())
    }

    fn publish_membership(&self, membership: Snapshot<Event>) {
        self.membership.send_replace(membership.clone());
        self.registry.invoke(Notification::Membership(membership));
    }

    fn desync(&mut self, feed: Feed, error: MirrorError) {
        let collection = self.collection(feed).to_string();
        tracing::error!(%collection, %error, "feed out of sync with mirror; ending session");
        self.registry
            .notify_fault(&SessionFault::Desync { collection, error });
        self.teardown(Teardown::Desync);
    }

    /// Close the session and discard everything mirrored.
    ///
    /// A restart keeps the registered observers and tells them both lists
    /// are now empty. Every other teardown drops the observers too.
    fn teardown(&mut self, reason: Teardown) {
        if let Some(mut session) = self.session.take() {
            session.close();
            tracing::debug!(?reason, "session torn down");
        }

        self.events.send_replace(Snapshot::empty());
        self.membership.send_replace(Snapshot::empty());
        match reason {
            Teardown::Restart => {
                self.registry.invoke(Notification::Events(Snapshot::empty()));
                self.registry
                    .invoke(Notification::Membership(Snapshot::empty()));
            }
            Teardown::Logout | Teardown::Reset | Teardown::Desync | Teardown::Shutdown => {
                self.registry.clear();
            }
        }
        self.state.send_replace(SessionState::Disconnected);
    }

    fn collection(&self, feed: Feed) -> &str {
        match feed {
            Feed::Events => &self.config.events_collection,
            Feed::Relations => &self.config.relations_collection,
        }
    }
}

/// Subscribe the events feed and, for a signed-in user, the relation feed.
///
/// If the second subscription fails the first is dropped, which closes it.
async fn open_feeds(
    client: &ChangeFeedClient,
    sender: &mpsc::UnboundedSender<Command>,
    events: CollectionSelector,
    relations: Option<CollectionSelector>,
) -> Result<(Subscription, Option<Subscription>)> {
    let events_feed = subscribe_feed(client, sender, Feed::Events, events).await?;
    let relations_feed = match relations {
        Some(selector) => Some(subscribe_feed(client, sender, Feed::Relations, selector).await?),
        None => None,
    };
    Ok((events_feed, relations_feed))
}

/// Forward every delivery of a feed to the actor's queue.
async fn subscribe_feed(
    client: &ChangeFeedClient,
    sender: &mpsc::UnboundedSender<Command>,
    feed: Feed,
    selector: CollectionSelector,
) -> Result<Subscription> {
    let sender = sender.clone();
    let subscription = client
        .subscribe(selector, move |delivery| {
            let _ = sender.send(Command::Delivery { feed, delivery });
        })
        .await?;
    Ok(subscription)
}

/// The next finished membership task, or never when there are none.
async fn next_task(session: Option<&mut Session>) -> Option<std::result::Result<(), JoinError>> {
    match session {
        Some(session) if !session.tasks.is_empty() => session.tasks.join_next().await,
        _ => std::future::pending().await,
    }
}

fn log_task_exit(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::warn!(error = %e, "membership task panicked");
        }
    }
}

fn warn_skipped(collection: &str, skipped: &[Skipped]) {
    for skipped in skipped {
        tracing::warn!(
            %collection,
            id = %skipped.id,
            error = %skipped.error,
            "undecodable document kept as placeholder"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;

    #[test]
    fn test_new_outside_runtime_is_initialization_error() {
        let remote = Arc::new(MemoryRemote::new());
        let err = SyncController::in_memory(remote, ControllerConfig::default()).unwrap_err();
        assert!(matches!(err, ControllerError::Initialization(_)));
    }

    #[tokio::test]
    async fn test_membership_ops_need_a_session() {
        let remote = Arc::new(MemoryRemote::new());
        let controller = SyncController::in_memory(remote, ControllerConfig::default()).unwrap();

        let err = controller.join_event(&EventId::new("e1")).await.unwrap_err();
        assert!(matches!(err, ControllerError::NotConnected));
    }

    #[tokio::test]
    async fn test_membership_ops_need_a_user() {
        let remote = Arc::new(MemoryRemote::new());
        let controller = SyncController::in_memory(remote, ControllerConfig::default()).unwrap();
        controller.start(&StaticAuth::anonymous()).await.unwrap();

        let err = controller.join_event(&EventId::new("e1")).await.unwrap_err();
        assert!(matches!(err, ControllerError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_anonymous_session_connects() {
        let remote = Arc::new(MemoryRemote::new());
        let controller = SyncController::in_memory(remote, ControllerConfig::default()).unwrap();
        assert_eq!(controller.state(), SessionState::Disconnected);

        controller.start(&StaticAuth::anonymous()).await.unwrap();
        controller
            .wait_for_state(SessionState::Connected)
            .await
            .unwrap();
        assert!(controller.events().is_empty());
        assert!(controller.membership().is_empty());
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_fail() {
        let remote = Arc::new(MemoryRemote::new());
        let controller = SyncController::in_memory(remote, ControllerConfig::default()).unwrap();
        controller.shutdown().await;

        let err = controller.start(&StaticAuth::anonymous()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Shutdown));
    }
}
