//! # Event Bus Module
//!
//! Publish/subscribe hub between the channels and the front end:
//! - The state channel publishes connection events and store updates
//! - The dispatcher and upload manager publish outcomes, notices and page actions
//! - Front ends subscribe with a filter, or poll a broadcast receiver
//!
//! ## Usage
//!
//! ```rust,ignore
//! use laserdeck_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(EventBus::new());
//! let id = bus.subscribe(EventFilter::only(EventCategory::Notice), |event| {
//!     if let AppEvent::Notice(notice) = event {
//!         eprintln!("{}", notice.message);
//!     }
//! });
//! bus.publish(AppEvent::error_notice("Command failed"));
//! bus.unsubscribe(id);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
