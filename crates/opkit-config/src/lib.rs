//! Opkit Config
//!
//! Serializable configuration types for opkit queues. These describe how a
//! queue is named and how many operations it may run at once, before the
//! queue itself is constructed.
//!
//! Configuration can be loaded from JSON files (via the CLI with
//! `--config=queue.json`) or built directly in code.

mod queue;

pub use queue::QueueConfig;
