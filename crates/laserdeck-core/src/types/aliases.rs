//! Type aliases for the shared-state shapes used across LaserDeck.
//!
//! Channels, the store and the upload manager all share state between tokio
//! tasks. These aliases give the `Arc<lock>` shapes one name each so the same
//! pattern reads the same way in every crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use laserdeck_core::types::*;
//!
//! let slot: ThreadSafe<Option<u64>> = thread_safe(None);
//! *slot.lock() = Some(3);
//! ```

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper for cross-task sharing.
///
/// Uses `parking_lot::Mutex`; never hold the guard across an `.await`.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe reader-writer lock wrapper for read-heavy state.
///
/// The state store is read on every redraw and written once per push.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// A thread-safe reader-writer hash map.
pub type ThreadSafeRwMap<K, V> = Arc<RwLock<HashMap<K, V>>>;

/// A callback that receives a single parameter.
pub type DataCallback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Create a new thread-safe value.
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new thread-safe read-write value.
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}

/// Create a new empty thread-safe read-write map.
pub fn thread_safe_rw_map<K, V>() -> ThreadSafeRwMap<K, V> {
    Arc::new(RwLock::new(HashMap::new()))
}
