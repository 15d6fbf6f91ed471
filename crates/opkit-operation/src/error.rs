//! Operation outcome errors.

/// Failure side of an operation's result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
  /// The operation has not produced an outcome, either because it never ran
  /// or because it was cancelled before its body executed.
  #[error("no result")]
  NoResult,

  /// The wrapped computation returned an error.
  #[error("operation failed: {message}")]
  Failed { message: String },

  /// The wrapped computation panicked.
  #[error("operation panicked: {message}")]
  Panicked { message: String },
}

impl OperationError {
  /// Create a failure from anything displayable.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  pub fn panicked(message: impl Into<String>) -> Self {
    Self::Panicked {
      message: message.into(),
    }
  }

  /// Whether this is the "no result" sentinel.
  pub fn is_no_result(&self) -> bool {
    matches!(self, Self::NoResult)
  }
}

/// Outcome of an operation.
pub type OperationResult<T> = Result<T, OperationError>;
