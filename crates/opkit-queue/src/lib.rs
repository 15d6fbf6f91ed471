//! Operation queue for opkit.
//!
//! A thin adapter over the tokio runtime: it hands operations to the
//! blocking pool, tells each one the queue's name, forwards cancellation and
//! lets callers wait for completion. Scheduling itself is tokio's job.

mod error;
mod queue;

pub use error::QueueError;
pub use queue::{Enqueue, OperationQueue};
