//! Queue errors.

use opkit_operation::OperationId;

/// Errors that can occur when handing operations to a queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
  /// The queue was built outside of a tokio runtime.
  #[error("operation queue requires a tokio runtime")]
  NoRuntime,

  /// The operation was already handed to a queue. Operations run once.
  #[error("operation '{id}' was already enqueued")]
  AlreadyEnqueued { id: OperationId },
}
