//! Operations that wrap a closure and capture its outcome.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, RwLock};

use tracing::{debug, warn};

use crate::error::{OperationError, OperationResult};
use crate::operation::{Operation, OperationCore, ProducesResult};
use crate::type_name::short_type_name;

type Block<T> = Box<dyn FnOnce() -> OperationResult<T> + Send>;

/// Runs a closure once and stores what it produced.
///
/// The output starts as [`OperationError::NoResult`] and is replaced when the
/// operation executes. Errors returned by the closure and panics raised by it
/// are both captured as failures; neither escapes [`Operation::execute`].
///
/// ```
/// use opkit_operation::{BlockResultOperation, ExecutionContext, Operation, ProducesResult};
///
/// let operation = BlockResultOperation::from_value(|| "Hello".to_string());
/// operation.set_name("Doing some work...");
/// assert_eq!(
///   operation.description(),
///   "BlockResultOperation<String>(name: 'Doing some work...', state: 0)"
/// );
///
/// operation.start(&ExecutionContext::detached());
/// assert_eq!(operation.output().unwrap(), "Hello");
/// ```
pub struct BlockResultOperation<T> {
  core: OperationCore,
  block: Mutex<Option<Block<T>>>,
  output: RwLock<OperationResult<T>>,
}

impl<T> BlockResultOperation<T>
where
  T: Send + Sync + 'static,
{
  /// Wrap a closure that returns a plain value.
  pub fn from_value<F>(block: F) -> Self
  where
    F: FnOnce() -> T + Send + 'static,
  {
    Self::with_block(Box::new(move || Ok(block())))
  }

  /// Wrap a fallible closure. Its error is stored as
  /// [`OperationError::Failed`] using the error's `Display` text.
  pub fn new<F, E>(block: F) -> Self
  where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    E: fmt::Display,
  {
    Self::with_block(Box::new(move || {
      block().map_err(|e| OperationError::failed(e.to_string()))
    }))
  }

  /// Wrap a closure that already speaks [`OperationResult`].
  pub fn from_result<F>(block: F) -> Self
  where
    F: FnOnce() -> OperationResult<T> + Send + 'static,
  {
    Self::with_block(Box::new(block))
  }

  fn with_block(block: Block<T>) -> Self {
    Self {
      core: OperationCore::new(),
      block: Mutex::new(Some(block)),
      output: RwLock::new(Err(OperationError::NoResult)),
    }
  }

  /// Builder-style display name.
  pub fn named(self, name: impl Into<String>) -> Self {
    self.core.set_name(name);
    self
  }

  /// Replace the stored outcome.
  pub fn set_output(&self, output: OperationResult<T>) {
    *self.output.write().unwrap() = output;
  }

  /// Whether anything other than the "no result" sentinel is stored.
  pub fn has_output(&self) -> bool {
    !matches!(*self.output.read().unwrap(), Err(OperationError::NoResult))
  }
}

impl<T> Operation for BlockResultOperation<T>
where
  T: Send + Sync + 'static,
{
  fn core(&self) -> &OperationCore {
    &self.core
  }

  fn type_name(&self) -> String {
    format!("BlockResultOperation<{}>", short_type_name::<T>())
  }

  fn execute(&self) {
    let Some(block) = self.block.lock().unwrap().take() else {
      warn!(operation_id = %self.core.id(), "block already consumed");
      return;
    };

    let output = panic::catch_unwind(AssertUnwindSafe(block))
      .unwrap_or_else(|payload| Err(OperationError::panicked(panic_message(&*payload))));

    match &output {
      Ok(_) => debug!(operation_id = %self.core.id(), "block produced a value"),
      Err(e) => warn!(operation_id = %self.core.id(), error = %e, "block failed"),
    }

    self.set_output(output);
  }
}

impl<T> ProducesResult for BlockResultOperation<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Output = T;

  fn output(&self) -> OperationResult<T> {
    self.output.read().unwrap().clone()
  }
}

impl<T> fmt::Display for BlockResultOperation<T>
where
  T: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.description())
  }
}

impl<T> fmt::Debug for BlockResultOperation<T>
where
  T: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BlockResultOperation")
      .field("id", &self.core.id())
      .field("name", &self.core.name())
      .field("state", &self.core.state())
      .finish_non_exhaustive()
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
