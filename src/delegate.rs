//! Publish/subscribe callback registry
//!
//! A [`Delegate`] holds an ordered list of subscribers for one kind of event.
//! Producers call [`Delegate::call`] on their own thread; every subscriber runs
//! synchronously on that thread, in registration order. Moving work onto the main
//! loop is the job of [`crate::input::MouseHandler`] or a loop message, never of
//! the delegate itself.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// What happens when a subscriber panics during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// The panic unwinds out of `call`, skipping the remaining subscribers
    #[default]
    Propagate,
    /// The panic is caught and logged, and dispatch continues with the next subscriber
    Isolate,
}

/// Summary of a single dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Subscribers that were invoked
    pub invoked: usize,
    /// Subscribers that panicked (always 0 under [`DispatchPolicy::Propagate`])
    pub failed: usize,
}

struct Subscriber<E> {
    id: u64,
    callback: Callback<E>,
    once: bool,
}

/// Ordered registry of callbacks for events of type `E`
pub struct Delegate<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
    policy: DispatchPolicy,
}

/// A delegate whose event carries no data
pub type Function0Delegate = Delegate<()>;

impl<E> Delegate<E> {
    /// Create an empty delegate with the default [`DispatchPolicy::Propagate`]
    pub fn new() -> Self {
        Self::with_policy(DispatchPolicy::default())
    }

    /// Create an empty delegate with an explicit failure policy
    pub fn with_policy(policy: DispatchPolicy) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            policy,
        }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Append a subscriber that is invoked on every call
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.push(Arc::new(callback), false);
    }

    /// Append a subscriber that is removed after its first invocation
    pub fn register_once<F>(&self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.push(Arc::new(callback), true);
    }

    fn push(&self, callback: Callback<E>, once: bool) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber { id, callback, once });
    }

    /// Take a once-subscriber out of the list. False if another dispatch (or
    /// `clear`) got to it first.
    fn claim(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every subscriber with `event`.
    ///
    /// The subscriber list is snapshotted before any callback runs, so callbacks
    /// may register further subscribers or call this delegate again without
    /// seeing a half-updated list. Subscribers added during dispatch are first
    /// invoked by the next call. A once-subscriber is removed right before it is
    /// invoked: if an earlier subscriber panics under
    /// [`DispatchPolicy::Propagate`], the ones not reached stay registered.
    pub fn call(&self, event: &E) -> DispatchReport {
        let snapshot: Vec<(u64, Callback<E>, bool)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.id, s.callback.clone(), s.once))
            .collect();

        let mut report = DispatchReport::default();
        for (id, callback, once) in snapshot {
            if once && !self.claim(id) {
                continue;
            }
            report.invoked += 1;
            match self.policy {
                DispatchPolicy::Propagate => callback(event),
                DispatchPolicy::Isolate => {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                        report.failed += 1;
                        error!("Delegate subscriber panicked: {}", panic_message(&*payload));
                    }
                }
            }
        }
        report
    }

    /// Remove every subscriber
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }
}

impl Delegate<()> {
    /// Register a zero-argument subscriber
    pub fn register_fn<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(move |_: &()| callback());
    }

    /// Register a zero-argument subscriber that runs once
    pub fn register_once_fn<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register_once(move |_: &()| callback());
    }

    /// Dispatch with no event payload
    pub fn fire(&self) -> DispatchReport {
        self.call(&())
    }
}

impl<E> Default for Delegate<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Delegate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("subscribers", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
