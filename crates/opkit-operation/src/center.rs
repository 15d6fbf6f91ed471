//! Publish-subscribe registry for lifecycle events.
//!
//! A [`NotificationCenter`] is an injectable stand-in for a process-wide
//! notification bus. Any number of parties can subscribe and unsubscribe
//! independently of the operations publishing into it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use crate::events::{LifecycleEvent, LifecycleKind, LifecycleNotifier};

/// Identifies a subscription within its center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A live subscription. Dropping the receiver ends it.
#[derive(Debug)]
pub struct Subscription {
  pub id: SubscriptionId,
  pub receiver: mpsc::UnboundedReceiver<LifecycleEvent>,
}

struct Subscriber {
  id: SubscriptionId,
  kinds: Option<Vec<LifecycleKind>>,
  sender: mpsc::UnboundedSender<LifecycleEvent>,
}

impl Subscriber {
  fn wants(&self, kind: LifecycleKind) -> bool {
    self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
  }
}

/// Broadcasts lifecycle events to every interested subscriber.
///
/// Publishing with no subscribers is a no-op, and events are never replayed
/// to subscribers that register later.
#[derive(Default)]
pub struct NotificationCenter {
  next_id: AtomicU64,
  subscribers: Mutex<Vec<Subscriber>>,
}

impl NotificationCenter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Subscribe to every lifecycle kind.
  pub fn subscribe(&self) -> Subscription {
    self.register(None)
  }

  /// Subscribe to the given lifecycle kinds only.
  pub fn subscribe_to(&self, kinds: impl IntoIterator<Item = LifecycleKind>) -> Subscription {
    self.register(Some(kinds.into_iter().collect()))
  }

  /// Remove a subscription. Returns whether it was registered.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut subscribers = self.subscribers.lock().unwrap();
    let before = subscribers.len();
    subscribers.retain(|s| s.id != id);
    subscribers.len() != before
  }

  /// Number of registered subscriptions.
  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().unwrap().len()
  }

  fn register(&self, kinds: Option<Vec<LifecycleKind>>) -> Subscription {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let (sender, receiver) = mpsc::unbounded_channel();

    self
      .subscribers
      .lock()
      .unwrap()
      .push(Subscriber { id, kinds, sender });

    Subscription { id, receiver }
  }

  /// Send `event` to every interested subscriber.
  ///
  /// The lock is released before any send happens.
  pub fn publish(&self, event: LifecycleEvent) {
    let targets: Vec<_> = {
      let subscribers = self.subscribers.lock().unwrap();
      subscribers
        .iter()
        .filter(|s| s.wants(event.kind))
        .map(|s| (s.id, s.sender.clone()))
        .collect()
    };

    let mut closed = Vec::new();
    for (id, sender) in targets {
      if sender.send(event.clone()).is_err() {
        closed.push(id);
      }
    }

    if !closed.is_empty() {
      trace!(count = closed.len(), "pruning closed subscriptions");
      self
        .subscribers
        .lock()
        .unwrap()
        .retain(|s| !closed.contains(&s.id));
    }
  }
}

impl LifecycleNotifier for NotificationCenter {
  fn notify(&self, event: LifecycleEvent) {
    self.publish(event);
  }
}
