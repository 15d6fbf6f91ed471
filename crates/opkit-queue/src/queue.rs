//! Named operation queue.
//!
//! The queue owns no threads. Each operation is started inside
//! `tokio::task::spawn_blocking`, so bodies may block freely, and a
//! semaphore caps how many run at once when a limit is configured.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opkit_config::QueueConfig;
use opkit_operation::{ExecutionContext, LifecycleNotifier, Operation, OperationId};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn};

use crate::error::QueueError;

type Pending = Arc<Mutex<HashMap<OperationId, Arc<dyn Operation>>>>;

/// Runs operations and reports its name to them.
///
/// # Usage
///
/// ```ignore
/// let center = Arc::new(NotificationCenter::new());
/// let queue = OperationQueue::new(QueueConfig::named("work"), center.clone())?;
///
/// let operation = Arc::new(BlockResultOperation::from_value(|| "Hello".to_string()));
/// queue.add_operation(operation.clone())?;
///
/// queue.wait_until_all_operations_finished().await;
/// assert_eq!(operation.output()?, "Hello");
/// ```
pub struct OperationQueue {
  name: Option<String>,
  notifier: Arc<dyn LifecycleNotifier>,
  limit: Option<Arc<Semaphore>>,
  handle: Handle,
  tracker: TaskTracker,
  pending: Pending,
}

impl OperationQueue {
  /// Create a queue bound to the current tokio runtime.
  ///
  /// # Arguments
  /// * `config` - Queue name and concurrency limit
  /// * `notifier` - Receives every lifecycle event from operations run here
  pub fn new(
    config: QueueConfig,
    notifier: Arc<dyn LifecycleNotifier>,
  ) -> Result<Self, QueueError> {
    let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
    let limit = config
      .concurrency_limit()
      .map(|permits| Arc::new(Semaphore::new(permits)));

    Ok(Self {
      name: config.name,
      notifier,
      limit,
      handle,
      tracker: TaskTracker::new(),
      pending: Arc::new(Mutex::new(HashMap::new())),
    })
  }

  /// The queue's name, if it has one.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Number of operations added but not yet finished.
  pub fn operation_count(&self) -> usize {
    self.pending.lock().unwrap().len()
  }

  /// Hand an operation to the queue. It starts as soon as a slot is free.
  ///
  /// Can be called from any thread, including from inside a running operation.
  #[instrument(
    name = "queue_add_operation",
    skip_all,
    fields(
      operation_id = %operation.id(),
      queue = self.name().unwrap_or_default(),
    )
  )]
  pub fn add_operation(&self, operation: Arc<dyn Operation>) -> Result<(), QueueError> {
    let id = operation.id();
    if !operation.core().mark_enqueued() {
      warn!(
        operation_id = %id,
        queue = self.name().unwrap_or_default(),
        "rejecting operation that was already enqueued"
      );
      return Err(QueueError::AlreadyEnqueued { id });
    }

    info!(
      operation_id = %id,
      operation_name = %operation.name(),
      queue = self.name().unwrap_or_default(),
      "operation enqueued"
    );

    self
      .pending
      .lock()
      .unwrap()
      .insert(id, operation.clone());

    let ctx = ExecutionContext::new(self.name.clone(), self.notifier.clone());
    let limit = self.limit.clone();
    let pending = self.pending.clone();

    self.tracker.spawn_on(
      async move {
        let _permit = match limit {
          Some(semaphore) => semaphore.acquire_owned().await.ok(),
          None => None,
        };

        let result = tokio::task::spawn_blocking(move || operation.start(&ctx)).await;
        pending.lock().unwrap().remove(&id);

        if let Err(e) = result {
          error!(operation_id = %id, error = %e, "operation worker failed");
        }
      },
      &self.handle,
    );

    Ok(())
  }

  /// Add several operations. Stops at the first one that is rejected.
  pub fn add_operations<I>(&self, operations: I) -> Result<(), QueueError>
  where
    I: IntoIterator<Item = Arc<dyn Operation>>,
  {
    for operation in operations {
      self.add_operation(operation)?;
    }
    Ok(())
  }

  /// Cancel every operation that has not started yet.
  ///
  /// Cancelled operations skip their body and emit no lifecycle events.
  /// Operations already executing run to completion.
  pub fn cancel_all_operations(&self) {
    let pending = self.pending.lock().unwrap();
    info!(
      queue = self.name().unwrap_or_default(),
      count = pending.len(),
      "cancelling all operations"
    );
    for operation in pending.values() {
      operation.cancel();
    }
  }

  /// Wait until every operation added so far has finished.
  pub async fn wait_until_all_operations_finished(&self) {
    self.tracker.close();
    self.tracker.wait().await;
    self.tracker.reopen();
  }
}

/// `operation.enqueue(&queue)` sugar for [`OperationQueue::add_operation`].
pub trait Enqueue {
  fn enqueue(self, queue: &OperationQueue) -> Result<(), QueueError>;

  /// Run the operation without a queue on the current runtime's blocking
  /// pool. Events carry an empty queue name. Await the handle to wait for it.
  fn enqueue_detached(
    self,
    notifier: Arc<dyn LifecycleNotifier>,
  ) -> Result<JoinHandle<()>, QueueError>;
}

impl<O: Operation> Enqueue for Arc<O> {
  fn enqueue(self, queue: &OperationQueue) -> Result<(), QueueError> {
    queue.add_operation(self)
  }

  #[instrument(name = "enqueue_detached", skip_all, fields(operation_id = %self.id()))]
  fn enqueue_detached(
    self,
    notifier: Arc<dyn LifecycleNotifier>,
  ) -> Result<JoinHandle<()>, QueueError> {
    let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
    let id = self.id();
    if !self.core().mark_enqueued() {
      warn!(operation_id = %id, "rejecting operation that was already enqueued");
      return Err(QueueError::AlreadyEnqueued { id });
    }

    info!(operation_id = %id, operation_name = %self.name(), "operation enqueued detached");

    let ctx = ExecutionContext::new(None, notifier);
    Ok(handle.spawn_blocking(move || self.start(&ctx)))
  }
}
