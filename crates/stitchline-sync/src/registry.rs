//! Observer registry with interest filtering.
//!
//! Observers are held weakly and keyed by [`ListenerId`]. Dispatch copies the
//! matching registrants, releases the lock, then calls each one, checking
//! first that it is still registered. An observer may therefore remove
//! itself (or another) from inside a callback.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use stitchline_core::{Event, MirrorError, Snapshot};

/// Which notifications an observer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Changes to the full event list.
    Events,
    /// Changes to the current user's resolved memberships.
    Membership,
    /// Both.
    All,
}

impl Interest {
    fn wants_events(self) -> bool {
        matches!(self, Interest::Events | Interest::All)
    }

    fn wants_membership(self) -> bool {
        matches!(self, Interest::Membership | Interest::All)
    }

    fn wants(self, notification: &Notification) -> bool {
        match notification {
            Notification::Events(_) => self.wants_events(),
            Notification::Membership(_) => self.wants_membership(),
        }
    }
}

/// A change to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Events(Snapshot<Event>),
    Membership(Snapshot<Event>),
}

/// A failure that ended the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionFault {
    /// A feed delivered a delta that does not fit the mirror.
    Desync { collection: String, error: MirrorError },
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFault::Desync { collection, error } => {
                write!(f, "{} feed out of sync: {}", collection, error)
            }
        }
    }
}

/// Receives change notifications.
///
/// All methods default to doing nothing, so an observer only implements
/// what it registered interest in. Callbacks run on the dispatching task
/// and should return quickly.
pub trait Observer: Send + Sync {
    fn on_events_change(&self, _events: &Snapshot<Event>) {}

    fn on_membership_change(&self, _memberships: &Snapshot<Event>) {}

    fn on_session_fault(&self, _fault: &SessionFault) {}
}

/// Registration handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

struct Registrant {
    id: ListenerId,
    observer: Weak<dyn Observer>,
    interest: Interest,
}

#[derive(Default)]
struct RegistryInner {
    registrants: Vec<Registrant>,
    next_id: u64,
    latest_events: Option<Snapshot<Event>>,
    latest_membership: Option<Snapshot<Event>>,
}

/// Multicast dispatch to registered observers.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` and immediately deliver the latest cached
    /// snapshot(s) it is interested in.
    ///
    /// The registry keeps only a weak reference; dropping the last `Arc`
    /// unregisters the observer.
    pub fn add_listener(&self, observer: Arc<dyn Observer>, interest: Interest) -> ListenerId {
        let (id, events, membership) = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = ListenerId(inner.next_id);
            inner.registrants.push(Registrant {
                id,
                observer: Arc::downgrade(&observer),
                interest,
            });
            (
                id,
                inner.latest_events.clone().filter(|_| interest.wants_events()),
                inner
                    .latest_membership
                    .clone()
                    .filter(|_| interest.wants_membership()),
            )
        };

        tracing::debug!(?id, ?interest, "listener added");
        if let Some(events) = events {
            if self.is_registered(id) {
                observer.on_events_change(&events);
            }
        }
        if let Some(membership) = membership {
            if self.is_registered(id) {
                observer.on_membership_change(&membership);
            }
        }
        id
    }

    /// Unregister by identity. Returns whether the observer was registered.
    pub fn remove_listener<O: ?Sized>(&self, observer: &Arc<O>) -> bool {
        let target = Arc::as_ptr(observer).cast::<()>();
        self.remove_where(|r| {
            r.observer
                .upgrade()
                .map_or(false, |o| Arc::as_ptr(&o).cast::<()>() == target)
        })
    }

    /// Unregister by handle. Returns whether the handle was registered.
    pub fn remove_by_id(&self, id: ListenerId) -> bool {
        self.remove_where(|r| r.id == id)
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.lock().registrants.iter().any(|r| r.id == id)
    }

    /// Number of registrants whose observer is still alive.
    pub fn len(&self) -> usize {
        let mut inner = self.lock();
        inner.registrants.retain(|r| r.observer.strong_count() > 0);
        inner.registrants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cached events snapshot, if any has been dispatched.
    pub fn latest_events(&self) -> Option<Snapshot<Event>> {
        self.lock().latest_events.clone()
    }

    /// The cached membership snapshot, if any has been dispatched.
    pub fn latest_membership(&self) -> Option<Snapshot<Event>> {
        self.lock().latest_membership.clone()
    }

    /// Cache `notification` as the latest of its kind and deliver it to
    /// every interested observer.
    pub fn invoke(&self, notification: Notification) {
        let targets = {
            let mut inner = self.lock();
            match &notification {
                Notification::Events(s) => inner.latest_events = Some(s.clone()),
                Notification::Membership(s) => inner.latest_membership = Some(s.clone()),
            }
            inner.collect_targets(|interest| interest.wants(&notification))
        };

        for (id, observer) in targets {
            if !self.is_registered(id) {
                continue;
            }
            match &notification {
                Notification::Events(s) => observer.on_events_change(s),
                Notification::Membership(s) => observer.on_membership_change(s),
            }
        }
    }

    /// Deliver a session fault to every observer regardless of interest.
    pub fn notify_fault(&self, fault: &SessionFault) {
        let targets = self.lock().collect_targets(|_| true);
        for (id, observer) in targets {
            if self.is_registered(id) {
                observer.on_session_fault(fault);
            }
        }
    }

    /// Remove every registrant and the cached snapshots.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.registrants.clear();
        inner.latest_events = None;
        inner.latest_membership = None;
    }

    fn remove_where(&self, pred: impl Fn(&Registrant) -> bool) -> bool {
        let mut inner = self.lock();
        let before = inner.registrants.len();
        inner.registrants.retain(|r| !pred(r));
        let removed = inner.registrants.len() != before;
        if removed {
            tracing::debug!("listener removed");
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RegistryInner {
    /// Upgrade the matching registrants, pruning the dead ones.
    fn collect_targets(
        &mut self,
        wants: impl Fn(Interest) -> bool,
    ) -> Vec<(ListenerId, Arc<dyn Observer>)> {
        let mut targets = Vec::new();
        self.registrants.retain(|r| match r.observer.upgrade() {
            Some(observer) => {
                if wants(r.interest) {
                    targets.push((r.id, observer));
                }
                true
            }
            None => false,
        });
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchline_core::EventId;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Snapshot<Event>>>,
        memberships: Mutex<Vec<Snapshot<Event>>>,
        faults: Mutex<Vec<SessionFault>>,
    }

    impl Observer for Recorder {
        fn on_events_change(&self, events: &Snapshot<Event>) {
            self.events.lock().unwrap().push(events.clone());
        }

        fn on_membership_change(&self, memberships: &Snapshot<Event>) {
            self.memberships.lock().unwrap().push(memberships.clone());
        }

        fn on_session_fault(&self, fault: &SessionFault) {
            self.faults.lock().unwrap().push(fault.clone());
        }
    }

    fn snapshot(ids: &[&str]) -> Snapshot<Event> {
        ids.iter()
            .map(|id| Event {
                id: Some(EventId::new(*id)),
                ..Event::default()
            })
            .collect()
    }

    #[test]
    fn test_interest_filters_dispatch() {
        let registry = ListenerRegistry::new();
        let events_only = Arc::new(Recorder::default());
        let membership_only = Arc::new(Recorder::default());
        registry.add_listener(events_only.clone(), Interest::Events);
        registry.add_listener(membership_only.clone(), Interest::Membership);

        registry.invoke(Notification::Membership(snapshot(&["a"])));

        assert!(events_only.events.lock().unwrap().is_empty());
        assert!(events_only.memberships.lock().unwrap().is_empty());
        assert_eq!(membership_only.memberships.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_late_listener_receives_cached_snapshots() {
        let registry = ListenerRegistry::new();
        let early = Arc::new(Recorder::default());
        registry.add_listener(early.clone(), Interest::All);

        registry.invoke(Notification::Events(snapshot(&["a", "b"])));
        registry.invoke(Notification::Membership(snapshot(&["b"])));

        let late = Arc::new(Recorder::default());
        registry.add_listener(late.clone(), Interest::All);

        let early_events = early.events.lock().unwrap().last().cloned().unwrap();
        let late_events = late.events.lock().unwrap().last().cloned().unwrap();
        assert!(early_events.ptr_eq(&late_events));
        assert_eq!(late.memberships.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_by_identity() {
        let registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        let id = registry.add_listener(recorder.clone(), Interest::All);

        assert!(registry.remove_listener(&recorder));
        assert!(!registry.remove_listener(&recorder));
        assert!(!registry.remove_by_id(id));

        registry.invoke(Notification::Events(snapshot(&["a"])));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dropped_observers_are_pruned() {
        let registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.add_listener(recorder.clone(), Interest::All);
        assert_eq!(registry.len(), 1);

        drop(recorder);
        registry.invoke(Notification::Events(snapshot(&[])));
        assert!(registry.is_empty());
    }

    /// Removes another observer from inside its own callback.
    struct Remover {
        registry: Arc<ListenerRegistry>,
        victim: Mutex<Option<ListenerId>>,
    }

    impl Observer for Remover {
        fn on_events_change(&self, _events: &Snapshot<Event>) {
            if let Some(id) = self.victim.lock().unwrap().take() {
                self.registry.remove_by_id(id);
            }
        }
    }

    #[test]
    fn test_observer_removed_mid_dispatch_is_not_invoked() {
        let registry = Arc::new(ListenerRegistry::new());
        let remover = Arc::new(Remover {
            registry: registry.clone(),
            victim: Mutex::new(None),
        });
        let victim = Arc::new(Recorder::default());

        registry.add_listener(remover.clone(), Interest::Events);
        let victim_id = registry.add_listener(victim.clone(), Interest::Events);
        *remover.victim.lock().unwrap() = Some(victim_id);

        registry.invoke(Notification::Events(snapshot(&["a"])));
        assert!(victim.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_faults_reach_every_observer() {
        let registry = ListenerRegistry::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        registry.add_listener(a.clone(), Interest::Events);
        registry.add_listener(b.clone(), Interest::Membership);

        let fault = SessionFault::Desync {
            collection: "Events".into(),
            error: MirrorError::IndexOutOfRange {
                kind: stitchline_core::DeltaKind::Removed,
                index: 3,
                len: 0,
            },
        };
        registry.notify_fault(&fault);

        assert_eq!(a.faults.lock().unwrap().as_slice(), &[fault.clone()]);
        assert_eq!(b.faults.lock().unwrap().as_slice(), &[fault]);
    }

    #[test]
    fn test_clear_drops_registrants_and_cache() {
        let registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.add_listener(recorder.clone(), Interest::All);
        registry.invoke(Notification::Events(snapshot(&["a"])));

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.latest_events().is_none());
    }
}
