//! Global key-down listener.
//!
//! Not a window observer: some platforms fire no window-change event
//! when only the document or browser tab inside a focused window
//! changes, so the watcher uses each key press as a cue to re-query the
//! active window. Only the fact that a key went down is captured, never
//! which key.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod noop;

#[cfg(target_os = "macos")]
pub use macos::{KeyHookError, MacosKeyHook};

/// Platform-agnostic key hook type alias.
#[cfg(target_os = "macos")]
pub type KeyHook = MacosKeyHook;

#[cfg(not(target_os = "macos"))]
pub use noop::{KeyHookError, NoopKeyHook};

/// Platform-agnostic key hook type alias.
#[cfg(not(target_os = "macos"))]
pub type KeyHook = NoopKeyHook;

use chrono::{DateTime, Utc};

/// A single key-down observation. Carries timing only.
#[derive(Debug, Clone)]
pub struct KeyPress {
    pub timestamp: DateTime<Utc>,
}

impl KeyPress {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }
}
