//! Shared type aliases.
//!
//! - [`aliases`]: `Arc<Mutex<T>>` / `Arc<RwLock<T>>` shapes and callback types

pub mod aliases;

pub use aliases::*;
