//! The base operation type and its lifecycle.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};
use uuid::Uuid;

use crate::error::OperationResult;
use crate::events::{LifecycleEvent, LifecycleKind, LifecycleNotifier, NoopNotifier};
use crate::state::{AtomicState, OperationState};

/// Stable identity of an operation, assigned at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl Default for OperationId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for OperationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// Bookkeeping shared by every operation: identity, display name, state and
/// the cancel/enqueue flags.
#[derive(Debug)]
pub struct OperationCore {
  id: OperationId,
  name: RwLock<String>,
  state: AtomicState,
  started: AtomicBool,
  cancelled: AtomicBool,
  enqueued: AtomicBool,
}

impl OperationCore {
  pub fn new() -> Self {
    Self {
      id: OperationId::new(),
      name: RwLock::new(String::new()),
      state: AtomicState::new(),
      started: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
      enqueued: AtomicBool::new(false),
    }
  }

  pub fn id(&self) -> OperationId {
    self.id
  }

  pub fn name(&self) -> String {
    self.name.read().unwrap().clone()
  }

  pub fn set_name(&self, name: impl Into<String>) {
    *self.name.write().unwrap() = name.into();
  }

  pub fn state(&self) -> OperationState {
    self.state.load()
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  /// Claim the single run of this operation. Only the first caller wins.
  fn claim_start(&self) -> bool {
    !self.started.swap(true, Ordering::AcqRel)
  }

  /// Record that the operation was handed to a queue.
  ///
  /// Returns `false` if it already had been.
  pub fn mark_enqueued(&self) -> bool {
    !self.enqueued.swap(true, Ordering::AcqRel)
  }

  pub fn is_enqueued(&self) -> bool {
    self.enqueued.load(Ordering::Acquire)
  }
}

impl Default for OperationCore {
  fn default() -> Self {
    Self::new()
  }
}

/// What the running queue tells an operation when it starts it.
#[derive(Clone)]
pub struct ExecutionContext {
  /// Name of the queue running the operation, if it has one.
  pub queue_name: Option<String>,
  /// Where lifecycle events go.
  pub notifier: Arc<dyn LifecycleNotifier>,
}

impl ExecutionContext {
  pub fn new(queue_name: Option<String>, notifier: Arc<dyn LifecycleNotifier>) -> Self {
    Self {
      queue_name,
      notifier,
    }
  }

  /// A context with no queue that discards events.
  pub fn detached() -> Self {
    Self::new(None, Arc::new(NoopNotifier))
  }

  fn emit(&self, kind: LifecycleKind, core: &OperationCore) {
    let event = LifecycleEvent {
      kind,
      operation_id: core.id(),
      name: core.name(),
      queue: self.queue_name.clone().unwrap_or_default(),
    };

    debug!(
      operation_id = %event.operation_id,
      operation_name = %event.name,
      queue = %event.queue,
      event = %kind,
      "lifecycle event"
    );

    // A misbehaving observer must not stop the operation.
    if panic::catch_unwind(AssertUnwindSafe(|| self.notifier.notify(event))).is_err() {
      warn!(
        operation_id = %core.id(),
        event = %kind,
        "lifecycle notifier panicked"
      );
    }
  }
}

impl fmt::Debug for ExecutionContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutionContext")
      .field("queue_name", &self.queue_name)
      .finish_non_exhaustive()
  }
}

/// A unit of work with identity, a display name and an observable lifecycle.
///
/// Implementors supply [`core`](Operation::core), a
/// [`type_name`](Operation::type_name) for descriptions, and the body in
/// [`execute`](Operation::execute). Queues drive the lifecycle through
/// [`start`](Operation::start).
pub trait Operation: Send + Sync + 'static {
  fn core(&self) -> &OperationCore;

  /// Type name shown in [`description`](Operation::description).
  fn type_name(&self) -> String;

  /// The operation's body. Runs synchronously on the calling thread.
  fn execute(&self);

  fn id(&self) -> OperationId {
    self.core().id()
  }

  fn name(&self) -> String {
    self.core().name()
  }

  fn set_name(&self, name: &str) {
    self.core().set_name(name);
  }

  fn state(&self) -> OperationState {
    self.core().state()
  }

  fn is_cancelled(&self) -> bool {
    self.core().is_cancelled()
  }

  /// Request cancellation. Has no effect once the operation has started.
  fn cancel(&self) {
    self.core().cancel();
  }

  /// `<TypeName>(name: '<name>', state: <code>)`
  fn description(&self) -> String {
    format!(
      "{}(name: '{}', state: {})",
      self.type_name(),
      self.name(),
      self.state().code()
    )
  }

  /// Run the operation once, announcing its lifecycle through `ctx`.
  ///
  /// Events are emitted in the order will-start, did-start, will-finish,
  /// did-finish, with the body running between did-start and will-finish.
  /// A cancelled operation is marked finished without running or emitting
  /// anything. A panicking notifier is logged and otherwise ignored. Starting an operation that already left `NotStarted` does
  /// nothing.
  fn start(&self, ctx: &ExecutionContext) {
    let core = self.core();
    let span = info_span!(
      "operation_start",
      operation_id = %core.id(),
      operation_name = %core.name(),
      queue = ctx.queue_name.as_deref().unwrap_or_default(),
    );
    let _enter = span.enter();

    if !core.claim_start() {
      warn!(
        operation_id = %core.id(),
        state = %core.state(),
        "operation already started, ignoring"
      );
      return;
    }

    if core.is_cancelled() {
      debug!(operation_id = %core.id(), "operation cancelled before start");
      core.state.store(OperationState::Finished);
      return;
    }

    ctx.emit(LifecycleKind::WillStart, core);
    core.state.store(OperationState::Executing);
    ctx.emit(LifecycleKind::DidStart, core);

    self.execute();

    ctx.emit(LifecycleKind::WillFinish, core);
    core.state.store(OperationState::Finished);
    ctx.emit(LifecycleKind::DidFinish, core);
  }
}

/// An operation whose outcome downstream consumers can read.
pub trait ProducesResult: Operation {
  type Output;

  /// The current outcome. `Err(OperationError::NoResult)` until the
  /// operation has run.
  ///
  /// [`OperationError::NoResult`]: crate::OperationError::NoResult
  fn output(&self) -> OperationResult<Self::Output>;
}
