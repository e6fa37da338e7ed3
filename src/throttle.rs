//! Heartbeat throttling.
//!
//! A stateful gate deciding whether a new activity sample is different
//! enough from the last reported one to become a heartbeat. Suppression
//! is keyed on monitoring state, not delivery success: the caller
//! records an approval BEFORE attempting dispatch, so a failing
//! collector does not cause a retry storm on the next identical sample.

use chrono::{DateTime, Duration, Utc};

use crate::classify::Category;

/// Minimum interval between heartbeats for an unchanged entity/category
/// when the sample is not a write event.
pub const HEARTBEAT_INTERVAL_SECS: i64 = 120;

/// Single-owner throttle state. One instance per process, mutated only
/// by [`HeartbeatThrottle::record`].
#[derive(Debug, Default)]
pub struct HeartbeatThrottle {
    last_entity: Option<String>,
    last_category: Option<Category>,
    last_heartbeat_at: Option<DateTime<Utc>>,
}

impl HeartbeatThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a heartbeat should fire for this sample.
    ///
    /// Emits when any of: the sample is a write, the category changed,
    /// the (non-empty) entity changed, or the throttle window elapsed.
    pub fn should_emit(
        &self,
        entity: &str,
        timestamp: DateTime<Utc>,
        is_write: bool,
        category: Option<Category>,
    ) -> bool {
        if is_write {
            return true;
        }
        if category != self.last_category {
            return true;
        }
        if !entity.is_empty() && self.last_entity.as_deref() != Some(entity) {
            return true;
        }
        match self.last_heartbeat_at {
            Some(last) => timestamp - last > Duration::seconds(HEARTBEAT_INTERVAL_SECS),
            None => true,
        }
    }

    /// Record an approved sample. Called before dispatch is attempted.
    /// The stored timestamp never moves backwards.
    pub fn record(&mut self, entity: &str, timestamp: DateTime<Utc>, category: Option<Category>) {
        self.last_entity = Some(entity.to_string());
        self.last_category = category;
        self.last_heartbeat_at = Some(match self.last_heartbeat_at {
            Some(last) if last > timestamp => last,
            _ => timestamp,
        });
    }

    /// Timestamp of the last recorded heartbeat.
    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed(at: DateTime<Utc>) -> HeartbeatThrottle {
        let mut throttle = HeartbeatThrottle::new();
        throttle.record("src/main.rs", at, Some(Category::Coding));
        throttle
    }

    #[test]
    fn test_unchanged_sample_within_window_is_suppressed() {
        let t0 = Utc::now();
        let throttle = primed(t0);
        for offset in [1, 30, 119] {
            assert!(!throttle.should_emit(
                "src/main.rs",
                t0 + Duration::seconds(offset),
                false,
                Some(Category::Coding),
            ));
        }
    }

    #[test]
    fn test_write_always_emits() {
        let t0 = Utc::now();
        let throttle = primed(t0);
        assert!(throttle.should_emit("src/main.rs", t0, true, Some(Category::Coding)));
        assert!(throttle.should_emit("", t0, true, None));
    }

    #[test]
    fn test_entity_change_emits() {
        let t0 = Utc::now();
        let throttle = primed(t0);
        assert!(throttle.should_emit("src/lib.rs", t0, false, Some(Category::Coding)));
        // An empty entity is not a change signal.
        assert!(!throttle.should_emit("", t0, false, Some(Category::Coding)));
    }

    #[test]
    fn test_category_change_emits() {
        let t0 = Utc::now();
        let throttle = primed(t0);
        assert!(throttle.should_emit("src/main.rs", t0, false, Some(Category::Browsing)));
        assert!(throttle.should_emit("src/main.rs", t0, false, None));
    }

    #[test]
    fn test_window_expiry_emits() {
        let t0 = Utc::now();
        let throttle = primed(t0);
        assert!(!throttle.should_emit(
            "src/main.rs",
            t0 + Duration::seconds(HEARTBEAT_INTERVAL_SECS),
            false,
            Some(Category::Coding),
        ));
        assert!(throttle.should_emit(
            "src/main.rs",
            t0 + Duration::seconds(HEARTBEAT_INTERVAL_SECS + 1),
            false,
            Some(Category::Coding),
        ));
    }

    #[test]
    fn test_first_sample_always_emits() {
        let throttle = HeartbeatThrottle::new();
        // Fresh state has no category, so even a None-category sample
        // emits via the timestamp rule.
        assert!(throttle.should_emit("anything", Utc::now(), false, None));
    }

    #[test]
    fn test_recorded_timestamp_is_monotonic() {
        let t0 = Utc::now();
        let mut throttle = HeartbeatThrottle::new();
        throttle.record("a", t0, None);
        throttle.record("b", t0 - Duration::seconds(30), None);
        assert_eq!(throttle.last_heartbeat_at(), Some(t0));
    }
}
