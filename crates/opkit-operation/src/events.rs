//! Lifecycle events and notifiers for observability.
//!
//! Every operation announces four events while it runs. Events are handed to
//! a [`LifecycleNotifier`] so consumers can observe progress, log it, stream
//! it to a UI, or assert on it in tests.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::operation::OperationId;

/// The four lifecycle moments of an operation, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
  WillStart,
  DidStart,
  WillFinish,
  DidFinish,
}

impl LifecycleKind {
  /// All kinds, in the order a single operation emits them.
  pub const ALL: [LifecycleKind; 4] = [
    LifecycleKind::WillStart,
    LifecycleKind::DidStart,
    LifecycleKind::WillFinish,
    LifecycleKind::DidFinish,
  ];

  /// Stable identifier for this kind.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::WillStart => "operation_will_start",
      Self::DidStart => "operation_did_start",
      Self::WillFinish => "operation_will_finish",
      Self::DidFinish => "operation_did_finish",
    }
  }
}

impl fmt::Display for LifecycleKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single lifecycle announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
  pub kind: LifecycleKind,
  /// The operation the event is about.
  pub operation_id: OperationId,
  /// Display name of the operation at the time of emission.
  pub name: String,
  /// Name of the queue running the operation; empty when unnamed or absent.
  pub queue: String,
}

impl LifecycleEvent {
  /// The descriptive payload, keyed by `"name"` and `"queue"`.
  pub fn user_info(&self) -> HashMap<&'static str, String> {
    HashMap::from([("name", self.name.clone()), ("queue", self.queue.clone())])
  }
}

/// Trait for receiving lifecycle events.
///
/// Operations call `notify` for each event they emit. Implementations must not
/// block and must not fail the operation.
pub trait LifecycleNotifier: Send + Sync {
  /// Called when a lifecycle event occurs.
  fn notify(&self, event: LifecycleEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl LifecycleNotifier for NoopNotifier {
  fn notify(&self, _event: LifecycleEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
    Self { sender }
  }
}

impl LifecycleNotifier for ChannelNotifier {
  fn notify(&self, event: LifecycleEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn event(kind: LifecycleKind) -> LifecycleEvent {
    LifecycleEvent {
      kind,
      operation_id: OperationId::new(),
      name: "Doing some work...".to_string(),
      queue: "NotificationTests.Queue".to_string(),
    }
  }

  #[test]
  fn test_user_info_contains_name_and_queue() {
    let info = event(LifecycleKind::WillStart).user_info();
    assert_eq!(info["name"], "Doing some work...");
    assert_eq!(info["queue"], "NotificationTests.Queue");
  }

  #[test]
  fn test_kind_identifiers() {
    let ids: Vec<_> = LifecycleKind::ALL.iter().map(|k| k.as_str()).collect();
    assert_eq!(
      ids,
      vec![
        "operation_will_start",
        "operation_did_start",
        "operation_will_finish",
        "operation_did_finish",
      ]
    );
  }

  #[test]
  fn test_event_serializes_kind_in_snake_case() {
    let json = serde_json::to_value(event(LifecycleKind::DidFinish)).unwrap();
    assert_eq!(json["kind"], "did_finish");
    assert_eq!(json["queue"], "NotificationTests.Queue");
  }

  #[test]
  fn test_channel_notifier_ignores_dropped_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    drop(rx);

    notifier.notify(event(LifecycleKind::WillStart));
  }

  #[test]
  fn test_channel_notifier_forwards() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);

    notifier.notify(event(LifecycleKind::DidStart));

    let received = rx.try_recv().unwrap();
    assert_eq!(received.kind, LifecycleKind::DidStart);
  }
}
