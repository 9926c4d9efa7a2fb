//! rebroker-state: instance and operation bookkeeping for the broker.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for provisioned service instances and the asynchronous operations
//! that created or removed them.
//!
//! # Architecture
//!
//! The engine only sees two role traits, [`InstanceStore`] and
//! [`OperationStore`]. [`StateStore`] implements both on top of redb: domain
//! types are JSON-serialized into `&[u8]` value columns, and operations are keyed
//! by the `(instance_id, operation_id)` tuple so an instance's history is one
//! key range.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod traits;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use traits::{InstanceStore, OperationStore};
pub use types::*;
