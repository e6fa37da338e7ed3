//! waka-agent - background activity agent for the WakaTime collector.
//!
//! Observes which application/window the user is interacting with,
//! classifies it into a semantic activity record, throttles
//! insignificant changes, and forwards heartbeats to `wakatime-cli`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          waka-agent                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────┐  ┌──────────┐  ┌─────────────┐  │
//! │  │ Observer  │─▶│ Classify │─▶│ Throttle │─▶│  Dispatch   │  │
//! │  │ (per-OS)  │  │  (pure)  │  │ (120 s)  │  │ (wakatime-  │  │
//! │  └───────────┘  └──────────┘  └──────────┘  │    cli)     │  │
//! │        ▲                                    └──────┬──────┘  │
//! │  ┌───────────┐                              ┌──────▼──────┐  │
//! │  │ Key hook  │ (re-query on key-down)       │ Status +    │  │
//! │  │ (per-OS)  │                              │ Updater     │  │
//! │  └───────────┘                              └─────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is best-effort: at most one heartbeat per throttle window,
//! with the next sample acting as the retry. No activity history is
//! persisted here; the collector owns durable storage.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod hook;
pub mod observer;
pub mod status;
pub mod throttle;
pub mod updater;
pub mod watcher;

// Re-export key types at crate root for convenience
pub use catalog::{AllowAllFilter, AppCatalog, AppMetadata, JsonAppCatalog, UrlFilter};
pub use classify::{classify, ActivityRecord, Category};
pub use config::{EntityPreference, Settings};
pub use dispatch::{HeartbeatDispatcher, StatusCache};
pub use observer::{platform_observer, WindowObserver, WindowSnapshot};
pub use status::{IconState, StatusChannel, StatusEvent};
pub use throttle::{HeartbeatThrottle, HEARTBEAT_INTERVAL_SECS};
pub use updater::{NullFeed, UpdateCoordinator, UpdateFeed};
pub use watcher::ActivityWatcher;

/// Agent version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
