//! Entity instances, attachment state and lifecycle hooks.
//!
//! # Responsibility
//! - Track which repository owns an entity and enforce single ownership.
//! - Run attach/load/detach/remove/clone transitions through an ordered
//!   observer chain.
//!
//! # Invariants
//! - Entities are created unattached or attached by hydration (`on_load`).
//! - Detach and post-remove hooks always leave the entity unattached.

pub mod attachment;
pub mod instance;
pub mod lifecycle;
pub mod value;

pub use attachment::{InvalidStateError, RepositorySlot};
pub use instance::{EntityRef, WeakEntityRef};
pub use lifecycle::{EventRecorder, LifecycleEvent, LifecycleObserver, LogObserver, ObserverChain};
pub use value::{EntityId, EventArgs, Value};
