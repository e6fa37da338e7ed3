//! Foreground-window observation.
//!
//! Each platform gets one implementation of [`WindowObserver`], selected
//! once at startup by [`platform_observer`]:
//!
//! - Windows: native event subscription (`SetWinEventHook`), the OS
//!   pushes foreground changes to us.
//! - Linux: polling over `xdotool`/`xprop` on a 1 second timer thread,
//!   with change detection so subscribers only hear about transitions.
//! - macOS: CoreGraphics window-list queries with a change-detect
//!   thread; in-window document changes are covered by the key hook
//!   (see [`crate::hook`]), which is not an observer implementation.
//!
//! Subscriptions deliver *changes only*, never every tick.

pub mod types;

#[cfg(target_os = "linux")]
pub mod polling;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub mod noop;

pub use types::{ProcessInfo, WindowSnapshot};

/// Handle returned by [`WindowObserver::subscribe`].
pub type SubscriptionId = i64;

/// Sentinel subscription id meaning "observation unavailable on this
/// host" (e.g. the polling utilities are not installed). The callback
/// will never be invoked.
pub const SUBSCRIPTION_UNAVAILABLE: SubscriptionId = -1;

/// Callback invoked with the new foreground window on every change.
pub type WindowCallback = Box<dyn Fn(WindowSnapshot) + Send + Sync + 'static>;

/// Source of "current foreground window" snapshots.
pub trait WindowObserver: Send {
    /// Point-in-time query for the foreground window.
    fn active_window(&self) -> Option<WindowSnapshot>;

    /// Enumerate currently open windows.
    fn open_windows(&self) -> Vec<WindowSnapshot>;

    /// Register a callback for foreground-window *changes*.
    ///
    /// Returns [`SUBSCRIPTION_UNAVAILABLE`] when the platform facility
    /// is missing; the callback is then never invoked.
    fn subscribe(&mut self, callback: WindowCallback) -> SubscriptionId;

    /// Cancel a subscription. After this returns, the callback is not
    /// invoked again. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Construct the observer for the current platform.
pub fn platform_observer() -> Box<dyn WindowObserver> {
    #[cfg(target_os = "linux")]
    {
        Box::new(polling::X11PollingObserver::new())
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacosObserver::new())
    }
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WinEventObserver::new())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Box::new(noop::NoopObserver::new())
    }
}
