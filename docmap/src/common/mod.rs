//! Common types and utilities shared across the mapper core.

mod value;

pub use value::Value;

use parking_lot::RwLock;
use std::sync::Arc;

/// A thread-safe shared mutable value.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value in an [Atomic] container.
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

/// Event type key used by the lifecycle event bus.
pub(crate) const DOCMAP_EVENT: &str = "docmap_event";
