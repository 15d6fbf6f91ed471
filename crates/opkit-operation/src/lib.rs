//! Operations with typed results and observable lifecycles.
//!
//! This crate provides the pieces an operation queue needs to run work and
//! report on it, without scheduling anything itself.
//!
//! # Architecture
//!
//! ```text
//! Operation (trait)
//! ├── core() -> OperationCore        identity, name, state, cancel flag
//! ├── execute()                      the body
//! └── start(ctx)                     will-start, did-start, execute,
//!                                    will-finish, did-finish
//!
//! BlockResultOperation<T>
//! └── output() -> OperationResult<T> NoResult until executed
//!
//! LifecycleNotifier (trait)
//! ├── NoopNotifier
//! ├── ChannelNotifier
//! └── NotificationCenter             subscribe / unsubscribe / publish
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use opkit_operation::{
//!   BlockResultOperation, ExecutionContext, LifecycleKind, NotificationCenter, Operation,
//!   ProducesResult,
//! };
//!
//! let center = Arc::new(NotificationCenter::new());
//! let mut subscription = center.subscribe_to([LifecycleKind::DidFinish]);
//!
//! let operation = BlockResultOperation::from_value(|| 40 + 2).named("answer");
//! operation.start(&ExecutionContext::new(Some("main".to_string()), center.clone()));
//!
//! assert_eq!(operation.output(), Ok(42));
//! assert_eq!(subscription.receiver.try_recv().unwrap().queue, "main");
//! ```

mod block;
mod center;
mod error;
mod events;
mod operation;
mod state;
mod type_name;

pub use block::BlockResultOperation;
pub use center::{NotificationCenter, Subscription, SubscriptionId};
pub use error::{OperationError, OperationResult};
pub use events::{ChannelNotifier, LifecycleEvent, LifecycleKind, LifecycleNotifier, NoopNotifier};
pub use operation::{ExecutionContext, Operation, OperationCore, OperationId, ProducesResult};
pub use state::OperationState;
pub use type_name::short_type_name;
