//! Observer / signal bus.
//!
//! Every observable model (an option set, a filter node) owns a [`SignalHub`].
//! Observers register a handler together with a weak reference to themselves;
//! once the observer is dropped its observations are pruned on the next
//! dispatch. Delivery is synchronous and in registration order.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Signal kinds carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SignalKind {
    Ok = 0,
    Connected,
    Released,
    DataChanged,
    StorageChanged,
    IncompatibleData,
    IncompatibleOption,
    IncompatibleContext,
    IncompleteGraph,
    Visited,
    User1 = 20,
    User2,
    User3,
}

impl SignalKind {
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Ok => "ok",
            SignalKind::Connected => "connected",
            SignalKind::Released => "released",
            SignalKind::DataChanged => "data_changed",
            SignalKind::StorageChanged => "storage_changed",
            SignalKind::IncompatibleData => "incompatible_data",
            SignalKind::IncompatibleOption => "incompatible_option",
            SignalKind::IncompatibleContext => "incompatible_context",
            SignalKind::IncompleteGraph => "incomplete_graph",
            SignalKind::Visited => "visited",
            SignalKind::User1 => "user1",
            SignalKind::User2 => "user2",
            SignalKind::User3 => "user3",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One delivery, as seen by a handler.
pub struct SignalEvent<'a> {
    pub kind: SignalKind,
    /// Optional payload supplied by the emitter.
    pub data: Option<&'a dyn Any>,
    /// User data registered with the observation.
    pub user_data: Option<&'a Rc<dyn Any>>,
    /// The live observer.
    pub observer: &'a Rc<dyn Any>,
}

/// Handler signature. Returns `true` when the signal was handled.
pub type SignalHandler = Rc<dyn Fn(&SignalEvent<'_>) -> bool>;

/// Anything that can be registered as an observer.
pub trait AsObserver {
    fn as_observer(&self) -> Weak<dyn Any>;
}

impl<T: Any> AsObserver for Rc<T> {
    fn as_observer(&self) -> Weak<dyn Any> {
        let weak: Weak<T> = Rc::downgrade(self);
        weak
    }
}

impl<T: Any> AsObserver for Weak<T> {
    fn as_observer(&self) -> Weak<dyn Any> {
        self.clone()
    }
}

#[derive(Clone)]
struct Observation {
    id: u64,
    observer: Weak<dyn Any>,
    user_data: Option<Rc<dyn Any>>,
    handler: SignalHandler,
}

impl Observation {
    fn observer_addr(&self) -> *const () {
        self.observer.as_ptr() as *const ()
    }
}

/// Per-model list of observations.
#[derive(Default)]
pub struct SignalHub {
    observations: RefCell<Vec<Observation>>,
    next_id: Cell<u64>,
    blocked: Cell<u32>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `observer`.
    pub fn add(
        &self,
        observer: &impl AsObserver,
        user_data: Option<Rc<dyn Any>>,
        handler: SignalHandler,
    ) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.observations.borrow_mut().push(Observation {
            id,
            observer: observer.as_observer(),
            user_data,
            handler,
        });
    }

    /// Remove the observations of `observer`. With a handler only the
    /// matching observation goes. Returns the number removed.
    pub fn remove(&self, observer: &impl AsObserver, handler: Option<&SignalHandler>) -> usize {
        let addr = observer.as_observer().as_ptr() as *const ();
        let mut observations = self.observations.borrow_mut();
        let before = observations.len();
        observations.retain(|o| {
            let same_observer = o.observer_addr() == addr;
            let same_handler = handler.map_or(true, |h| Rc::ptr_eq(h, &o.handler));
            !(same_observer && same_handler)
        });
        before - observations.len()
    }

    /// Deliver `kind` to every live observer. Returns the handled count.
    ///
    /// Handlers may add or remove observations while the signal is in flight;
    /// an observation removed mid-dispatch is not called.
    pub fn signal(&self, kind: SignalKind, data: Option<&dyn Any>) -> u32 {
        if self.is_blocked() {
            tracing::trace!("Signal {} suppressed", kind);
            return 0;
        }

        let snapshot: Vec<Observation> = self.observations.borrow().clone();
        let mut handled = 0;
        let mut saw_dead = false;

        for observation in snapshot {
            let Some(observer) = observation.observer.upgrade() else {
                saw_dead = true;
                continue;
            };
            let still_registered = self
                .observations
                .borrow()
                .iter()
                .any(|o| o.id == observation.id);
            if !still_registered {
                continue;
            }

            let event = SignalEvent {
                kind,
                data,
                user_data: observation.user_data.as_ref(),
                observer: &observer,
            };
            if (observation.handler)(&event) {
                handled += 1;
            }
        }

        if saw_dead {
            self.prune();
        }
        handled
    }

    /// Whether any live observer is registered.
    pub fn is_observed(&self) -> bool {
        self.observations
            .borrow()
            .iter()
            .any(|o| o.observer.strong_count() > 0)
    }

    pub fn observation_count(&self) -> usize {
        self.observations.borrow().len()
    }

    /// Block delivery until the returned guard is dropped. Guards nest.
    pub fn suppress(&self) -> SignalGuard<'_> {
        self.blocked.set(self.blocked.get() + 1);
        SignalGuard { hub: self }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.get() > 0
    }

    fn prune(&self) {
        self.observations
            .borrow_mut()
            .retain(|o| o.observer.strong_count() > 0);
    }
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub")
            .field("observations", &self.observation_count())
            .field("blocked", &self.blocked.get())
            .finish()
    }
}

/// RAII guard returned by [`SignalHub::suppress`].
#[must_use = "signals are only suppressed while the guard lives"]
pub struct SignalGuard<'a> {
    hub: &'a SignalHub,
}

impl Drop for SignalGuard<'_> {
    fn drop(&mut self) {
        let blocked = self.hub.blocked.get();
        self.hub.blocked.set(blocked.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_handler(counter: Rc<Cell<u32>>) -> SignalHandler {
        Rc::new(move |event: &SignalEvent<'_>| {
            counter.set(counter.get() + 1);
            event.kind == SignalKind::DataChanged
        })
    }

    #[test]
    fn test_signal_reaches_observer() {
        let hub = SignalHub::new();
        let observer = Rc::new(());
        let count = Rc::new(Cell::new(0));
        hub.add(&observer, None, counting_handler(count.clone()));

        assert_eq!(hub.signal(SignalKind::DataChanged, None), 1);
        assert_eq!(hub.signal(SignalKind::Connected, None), 0);
        assert_eq!(count.get(), 2);
        assert!(hub.is_observed());
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let hub = SignalHub::new();
        let count = Rc::new(Cell::new(0));
        {
            let observer = Rc::new(42u8);
            hub.add(&observer, None, counting_handler(count.clone()));
            assert_eq!(hub.observation_count(), 1);
        }
        assert!(!hub.is_observed());
        assert_eq!(hub.signal(SignalKind::DataChanged, None), 0);
        assert_eq!(hub.observation_count(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_suppress_guard_nests() {
        let hub = SignalHub::new();
        let observer = Rc::new(());
        let count = Rc::new(Cell::new(0));
        hub.add(&observer, None, counting_handler(count.clone()));

        {
            let _outer = hub.suppress();
            {
                let _inner = hub.suppress();
                assert_eq!(hub.signal(SignalKind::DataChanged, None), 0);
            }
            assert!(hub.is_blocked());
            assert_eq!(hub.signal(SignalKind::DataChanged, None), 0);
        }
        assert!(!hub.is_blocked());
        assert_eq!(hub.signal(SignalKind::DataChanged, None), 1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_remove_by_observer_and_handler() {
        let hub = SignalHub::new();
        let a = Rc::new(1u32);
        let b = Rc::new(2u32);
        let count = Rc::new(Cell::new(0));
        let first = counting_handler(count.clone());
        let second = counting_handler(count.clone());
        hub.add(&a, None, first.clone());
        hub.add(&a, None, second);
        hub.add(&b, None, counting_handler(count.clone()));

        assert_eq!(hub.remove(&a, Some(&first)), 1);
        assert_eq!(hub.observation_count(), 2);
        assert_eq!(hub.remove(&a, None), 1);
        assert_eq!(hub.observation_count(), 1);
    }

    #[test]
    fn test_user_data_and_payload() {
        let hub = SignalHub::new();
        let observer = Rc::new(());
        let seen = Rc::new(Cell::new(0i64));
        let seen_in = seen.clone();
        let user: Rc<dyn Any> = Rc::new(10i64);
        hub.add(
            &observer,
            Some(user),
            Rc::new(move |event: &SignalEvent<'_>| {
                let base = event
                    .user_data
                    .and_then(|u| u.downcast_ref::<i64>())
                    .copied()
                    .unwrap_or(0);
                let payload = event
                    .data
                    .and_then(|d| d.downcast_ref::<i64>())
                    .copied()
                    .unwrap_or(0);
                seen_in.set(base + payload);
                true
            }),
        );

        hub.signal(SignalKind::User1, Some(&5i64));
        assert_eq!(seen.get(), 15);
    }

    #[test]
    fn test_handler_may_remove_observations_mid_dispatch() {
        let hub = Rc::new(SignalHub::new());
        let a = Rc::new(1u8);
        let b = Rc::new(2u8);
        let count = Rc::new(Cell::new(0));

        let hub_in = Rc::downgrade(&hub);
        let b_in = b.clone();
        hub.add(
            &a,
            None,
            Rc::new(move |_event: &SignalEvent<'_>| {
                if let Some(hub) = hub_in.upgrade() {
                    hub.remove(&b_in, None);
                }
                true
            }),
        );
        hub.add(&b, None, counting_handler(count.clone()));

        assert_eq!(hub.signal(SignalKind::DataChanged, None), 1);
        assert_eq!(count.get(), 0);
        assert_eq!(hub.observation_count(), 1);
    }

    #[test]
    fn test_signal_kind_values() {
        assert_eq!(SignalKind::Ok as u32, 0);
        assert_eq!(SignalKind::User1 as u32, 20);
        assert_eq!(SignalKind::User3 as u32, 22);
        assert_eq!(SignalKind::Released.to_string(), "released");
    }
}
