use serde::{Deserialize, Serialize};

/// Configuration for an operation queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
  /// Name reported to running operations. Unnamed queues report an empty string.
  pub name: Option<String>,

  /// Upper bound on operations executing at once. `None` or `0` means unlimited.
  pub max_concurrent_operations: Option<usize>,
}

impl QueueConfig {
  /// Configuration for a named queue with no concurrency limit.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      max_concurrent_operations: None,
    }
  }

  /// Parse a configuration from a JSON document.
  pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// The effective concurrency limit, with `0` folded into unlimited.
  pub fn concurrency_limit(&self) -> Option<usize> {
    self.max_concurrent_operations.filter(|limit| *limit > 0)
  }
}
