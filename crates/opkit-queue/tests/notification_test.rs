//! Lifecycle notifications observed through a queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use opkit_config::QueueConfig;
use opkit_operation::{
  BlockResultOperation, LifecycleEvent, LifecycleKind, NotificationCenter, Operation,
  OperationError, OperationState, ProducesResult, Subscription,
};
use opkit_queue::{Enqueue, OperationQueue};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

async fn next_event(subscription: &mut Subscription) -> LifecycleEvent {
  timeout(WAIT, subscription.receiver.recv())
    .await
    .expect("timed out waiting for event")
    .expect("notification center dropped")
}

async fn expect_notification(kind: LifecycleKind) {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe_to([kind]);
  let queue = OperationQueue::new(QueueConfig::default(), center.clone()).unwrap();

  let operation = Arc::new(BlockResultOperation::from_value(|| "Hello".to_string()));
  operation.clone().enqueue(&queue).unwrap();

  let event = next_event(&mut subscription).await;
  assert_eq!(event.kind, kind);
  assert_eq!(event.operation_id, operation.id());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_will_start_notification_is_sent() {
  expect_notification(LifecycleKind::WillStart).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_did_start_notification_is_sent() {
  expect_notification(LifecycleKind::DidStart).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_will_finish_notification_is_sent() {
  expect_notification(LifecycleKind::WillFinish).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_did_finish_notification_is_sent() {
  expect_notification(LifecycleKind::DidFinish).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_notification_contains_queue_name() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe();
  let queue =
    OperationQueue::new(QueueConfig::named("NotificationTests.Queue"), center.clone()).unwrap();

  let operation = Arc::new(BlockResultOperation::from_value(|| "Hello".to_string()));
  operation.clone().enqueue(&queue).unwrap();

  for _ in LifecycleKind::ALL {
    let event = next_event(&mut subscription).await;
    assert_eq!(event.queue, "NotificationTests.Queue");
    assert_eq!(event.user_info()["queue"], "NotificationTests.Queue");
  }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unnamed_queue_reports_empty_name() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe_to([LifecycleKind::WillStart]);
  let queue = OperationQueue::new(QueueConfig::default(), center.clone()).unwrap();

  Arc::new(BlockResultOperation::from_value(|| 1))
    .enqueue(&queue)
    .unwrap();

  assert_eq!(next_event(&mut subscription).await.queue, "");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_custom_operation_label_is_sent_in_notification() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription =
    center.subscribe_to([LifecycleKind::WillStart, LifecycleKind::WillFinish]);
  let queue = OperationQueue::new(QueueConfig::default(), center.clone()).unwrap();

  let operation = Arc::new(BlockResultOperation::from_value(|| "Hello".to_string()));
  operation.set_name("Doing some work...");
  operation.clone().enqueue(&queue).unwrap();

  for expected in [LifecycleKind::WillStart, LifecycleKind::WillFinish] {
    let event = next_event(&mut subscription).await;
    assert_eq!(event.kind, expected);
    assert_eq!(event.name, "Doing some work...");
    assert_eq!(event.user_info()["name"], operation.name());
    assert_eq!(event.operation_id, operation.id());
  }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_events_arrive_in_order_without_duplicates() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe();
  let queue = OperationQueue::new(QueueConfig::named("ordered"), center.clone()).unwrap();

  let operation = Arc::new(BlockResultOperation::from_value(|| "Hello".to_string()));
  operation.clone().enqueue(&queue).unwrap();
  queue.wait_until_all_operations_finished().await;

  let mut kinds = Vec::new();
  while let Ok(event) = subscription.receiver.try_recv() {
    kinds.push(event.kind);
  }
  assert_eq!(kinds, LifecycleKind::ALL.to_vec());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_operations_each_emit_full_lifecycle() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe();
  let queue = OperationQueue::new(QueueConfig::default(), center.clone()).unwrap();

  let operations: Vec<_> = (0..8usize)
    .map(|i| Arc::new(BlockResultOperation::from_value(move || i * 2)))
    .collect();
  for operation in &operations {
    operation.clone().enqueue(&queue).unwrap();
  }
  queue.wait_until_all_operations_finished().await;

  let mut events = Vec::new();
  while let Ok(event) = subscription.receiver.try_recv() {
    events.push(event);
  }
  assert_eq!(events.len(), operations.len() * 4);

  for (i, operation) in operations.iter().enumerate() {
    let kinds: Vec<_> = events
      .iter()
      .filter(|e| e.operation_id == operation.id())
      .map(|e| e.kind)
      .collect();
    assert_eq!(kinds, LifecycleKind::ALL.to_vec());
    assert_eq!(operation.output(), Ok(i * 2));
  }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_publishing_without_subscribers_does_not_fail() {
  let center = Arc::new(NotificationCenter::new());
  let queue = OperationQueue::new(QueueConfig::default(), center.clone()).unwrap();

  let first = Arc::new(BlockResultOperation::from_value(|| 1));
  first.clone().enqueue(&queue).unwrap();
  queue.wait_until_all_operations_finished().await;
  assert_eq!(first.output(), Ok(1));

  let mut subscription = center.subscribe();
  assert!(subscription.receiver.try_recv().is_err());

  let second = Arc::new(BlockResultOperation::from_value(|| 2));
  second.clone().enqueue(&queue).unwrap();
  queue.wait_until_all_operations_finished().await;

  let event = subscription.receiver.try_recv().unwrap();
  assert_eq!(event.operation_id, second.id());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_operation_still_finishes() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe_to([LifecycleKind::DidFinish]);
  let queue = OperationQueue::new(QueueConfig::default(), center.clone()).unwrap();

  let operation = Arc::new(BlockResultOperation::<String>::new(|| Err("disk full")));
  operation.clone().enqueue(&queue).unwrap();

  next_event(&mut subscription).await;
  queue.wait_until_all_operations_finished().await;

  assert_eq!(operation.output(), Err(OperationError::failed("disk full")));
  assert_eq!(operation.state(), OperationState::Finished);
  assert!(operation.description().ends_with("state: 2)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancelled_operations_keep_no_result() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription = center.subscribe();
  let config = QueueConfig {
    name: Some("serial".to_string()),
    max_concurrent_operations: Some(1),
  };
  let queue = OperationQueue::new(config, center.clone()).unwrap();

  let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
  let blocker = Arc::new(BlockResultOperation::from_value(move || {
    release_rx.recv().ok();
  }));
  let ran = Arc::new(AtomicUsize::new(0));
  let counter = ran.clone();
  let waiting = Arc::new(BlockResultOperation::from_value(move || {
    counter.fetch_add(1, Ordering::SeqCst);
  }));

  blocker.clone().enqueue(&queue).unwrap();
  let started = next_event(&mut subscription).await;
  assert_eq!(started.operation_id, blocker.id());

  // The blocker holds the only slot, so this one cannot start yet.
  waiting.clone().enqueue(&queue).unwrap();
  assert_eq!(queue.operation_count(), 2);

  queue.cancel_all_operations();
  release_tx.send(()).unwrap();
  queue.wait_until_all_operations_finished().await;

  assert_eq!(ran.load(Ordering::SeqCst), 0);
  assert_eq!(waiting.output(), Err(OperationError::NoResult));
  assert_eq!(waiting.state(), OperationState::Finished);
  assert_eq!(blocker.output(), Ok(()));

  let mut rest = Vec::new();
  while let Ok(event) = subscription.receiver.try_recv() {
    rest.push(event);
  }
  assert!(rest.iter().all(|e| e.operation_id == blocker.id()));
  assert_eq!(rest.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_has_nice_description() {
  let operation = BlockResultOperation::from_value(|| "Hello".to_string());
  operation.set_name("Doing some work...");

  assert_eq!(
    operation.description(),
    "BlockResultOperation<String>(name: 'Doing some work...', state: 0)"
  );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_label_is_sent_for_operation_run_without_queue() {
  let center = Arc::new(NotificationCenter::new());
  let mut subscription =
    center.subscribe_to([LifecycleKind::WillStart, LifecycleKind::WillFinish]);

  let operation = Arc::new(BlockResultOperation::from_value(|| "Hello".to_string()));
  operation.set_name("Doing some work...");
  let handle = operation.clone().enqueue_detached(center.clone()).unwrap();

  for expected in [LifecycleKind::WillStart, LifecycleKind::WillFinish] {
    let event = next_event(&mut subscription).await;
    assert_eq!(event.kind, expected);
    assert_eq!(event.name, "Doing some work...");
    assert_eq!(event.queue, "");
    assert_eq!(event.operation_id, operation.id());
  }

  handle.await.unwrap();
  assert_eq!(operation.output(), Ok("Hello".to_string()));
}
