//! Update scheduling policy.
//!
//! The actual update feed (check, download, install) is an external
//! collaborator behind [`UpdateFeed`]; this module owns only the
//! scheduling state: a 600 second floor between checks and a 7 day
//! per-version cooldown so the same update never nags twice in a row.
//! Feed errors are logged by the feed owner and never reach this state
//! machine as anything fatal.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// Minimum interval between feed checks.
pub const UPDATE_CHECK_INTERVAL_SECS: i64 = 600;

/// Per-version cooldown before the same update is acted on again.
pub const PROMPT_SUPPRESSION_SECS: i64 = 604_800; // 7 days

/// External update-feed client.
pub trait UpdateFeed: Send {
    /// Ask the feed to check for updates and notify via the coordinator
    /// callbacks when something happens.
    fn check(&mut self);
    /// Begin downloading the given version.
    fn download(&mut self, version: &str);
    /// Install the downloaded version and restart.
    fn install_and_restart(&mut self, version: &str);
}

/// Scheduling state. Single-owner, process-lifetime.
#[derive(Debug, Default)]
struct UpdateState {
    last_checked_at: Option<DateTime<Utc>>,
    /// Version whose download was last started, with its timestamp.
    last_download_version: Option<String>,
    last_download_at: Option<DateTime<Utc>>,
    /// Version whose install was last triggered, with its timestamp.
    last_prompted_version: Option<String>,
    last_prompted_at: Option<DateTime<Utc>>,
}

/// Periodic update policy over an external feed.
pub struct UpdateCoordinator {
    feed: Box<dyn UpdateFeed>,
    auto_update_enabled: bool,
    dev_build: bool,
    state: UpdateState,
}

impl UpdateCoordinator {
    pub fn new(feed: Box<dyn UpdateFeed>, auto_update_enabled: bool) -> Self {
        Self::with_dev_build(feed, auto_update_enabled, cfg!(debug_assertions))
    }

    /// Like [`UpdateCoordinator::new`] with the dev-build gate explicit.
    pub fn with_dev_build(
        feed: Box<dyn UpdateFeed>,
        auto_update_enabled: bool,
        dev_build: bool,
    ) -> Self {
        Self {
            feed,
            auto_update_enabled,
            dev_build,
            state: UpdateState::default(),
        }
    }

    /// Ask the feed to check, unless auto-update is off, this is a dev
    /// build, or a check ran within the last 600 seconds.
    pub fn check_for_updates(&mut self, now: DateTime<Utc>) {
        if !self.auto_update_enabled || self.dev_build {
            return;
        }
        if let Some(last) = self.state.last_checked_at {
            if now - last < Duration::seconds(UPDATE_CHECK_INTERVAL_SECS) {
                return;
            }
        }
        self.state.last_checked_at = Some(now);
        self.feed.check();
    }

    /// Feed reported an update is available.
    pub fn on_update_available(&mut self, version: &str, now: DateTime<Utc>) {
        if self.within_cooldown(
            version,
            self.state.last_download_version.as_deref(),
            self.state.last_download_at,
            now,
        ) || self.within_cooldown(
            version,
            self.state.last_prompted_version.as_deref(),
            self.state.last_prompted_at,
            now,
        ) {
            debug!(version, "update available; suppressed by cooldown");
            return;
        }
        info!(version, "update available; starting download");
        self.state.last_download_version = Some(version.to_string());
        self.state.last_download_at = Some(now);
        self.feed.download(version);
    }

    /// Feed reported the download finished.
    pub fn on_update_downloaded(&mut self, version: &str, now: DateTime<Utc>) {
        if self.within_cooldown(
            version,
            self.state.last_prompted_version.as_deref(),
            self.state.last_prompted_at,
            now,
        ) {
            debug!(version, "update downloaded; install suppressed by cooldown");
            return;
        }
        info!(version, "update downloaded; installing");
        self.state.last_prompted_version = Some(version.to_string());
        self.state.last_prompted_at = Some(now);
        self.feed.install_and_restart(version);
    }

    fn within_cooldown(
        &self,
        version: &str,
        recorded_version: Option<&str>,
        recorded_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match (recorded_version, recorded_at) {
            (Some(v), Some(at)) => {
                v == version && now - at < Duration::seconds(PROMPT_SUPPRESSION_SECS)
            }
            _ => false,
        }
    }
}

/// Feed that does nothing; used where updates are irrelevant.
pub struct NullFeed;

impl UpdateFeed for NullFeed {
    fn check(&mut self) {}
    fn download(&mut self, _version: &str) {}
    fn install_and_restart(&mut self, _version: &str) {}
}

#[cfg(test)]
pub(crate) fn no_op_coordinator() -> UpdateCoordinator {
    UpdateCoordinator::with_dev_build(Box::new(NullFeed), false, false)
}
