//! Fallback observer for unsupported targets.
//!
//! Exists so the crate compiles everywhere; it never produces a
//! snapshot and subscriptions report "unavailable".

use crate::observer::types::WindowSnapshot;
use crate::observer::{
    SubscriptionId, WindowCallback, WindowObserver, SUBSCRIPTION_UNAVAILABLE,
};

/// Observer that never observes anything.
pub struct NoopObserver;

impl NoopObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowObserver for NoopObserver {
    fn active_window(&self) -> Option<WindowSnapshot> {
        None
    }

    fn open_windows(&self) -> Vec<WindowSnapshot> {
        Vec::new()
    }

    fn subscribe(&mut self, _callback: WindowCallback) -> SubscriptionId {
        SUBSCRIPTION_UNAVAILABLE
    }

    fn unsubscribe(&mut self, _id: SubscriptionId) {}
}
