//! Operation lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Where an operation is in its lifecycle.
///
/// `NotStarted -> Executing -> Finished`. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OperationState {
  NotStarted = 0,
  Executing = 1,
  Finished = 2,
}

impl OperationState {
  /// Numeric code used in descriptions.
  pub fn code(self) -> u8 {
    self as u8
  }

  fn from_code(code: u8) -> Self {
    match code {
      0 => Self::NotStarted,
      1 => Self::Executing,
      _ => Self::Finished,
    }
  }
}

impl fmt::Display for OperationState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Self::NotStarted => "not started",
      Self::Executing => "executing",
      Self::Finished => "finished",
    };
    f.write_str(label)
  }
}

/// Atomic cell holding an [`OperationState`].
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
  pub(crate) fn new() -> Self {
    Self(AtomicU8::new(OperationState::NotStarted.code()))
  }

  pub(crate) fn load(&self) -> OperationState {
    OperationState::from_code(self.0.load(Ordering::Acquire))
  }

  pub(crate) fn store(&self, state: OperationState) {
    self.0.store(state.code(), Ordering::Release);
  }
}
