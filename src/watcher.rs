//! Activity watcher: the pipeline between observation and dispatch.
//!
//! Two producers feed one channel: window-change callbacks from the
//! platform observer, and key-down cues from the global hook (which
//! force a fresh `active_window` query, catching document/tab changes
//! that fire no window event). A single consumer task runs
//! classify → throttle → dispatch, so the throttle, status cache and
//! update state all have exactly one writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::catalog::{AppCatalog, UrlFilter};
use crate::classify;
use crate::config::Settings;
use crate::dispatch::HeartbeatDispatcher;
use crate::hook::KeyHook;
use crate::observer::{WindowObserver, WindowSnapshot, SUBSCRIPTION_UNAVAILABLE};
use crate::throttle::HeartbeatThrottle;
use crate::updater::UpdateCoordinator;

/// One unit of work for the pipeline.
enum Sample {
    /// The observer saw the foreground window change.
    Window(WindowSnapshot),
    /// A key went down somewhere; re-query the foreground window.
    KeyTrigger,
}

/// Owns the full observation-to-heartbeat pipeline.
pub struct ActivityWatcher {
    observer: Box<dyn WindowObserver>,
    hook: KeyHook,
    catalog: Arc<dyn AppCatalog>,
    filter: Arc<dyn UrlFilter>,
    settings: Settings,
    throttle: HeartbeatThrottle,
    dispatcher: HeartbeatDispatcher,
    updater: UpdateCoordinator,
}

impl ActivityWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        observer: Box<dyn WindowObserver>,
        hook: KeyHook,
        catalog: Arc<dyn AppCatalog>,
        filter: Arc<dyn UrlFilter>,
        settings: Settings,
        dispatcher: HeartbeatDispatcher,
        updater: UpdateCoordinator,
    ) -> Self {
        Self {
            observer,
            hook,
            catalog,
            filter,
            settings,
            throttle: HeartbeatThrottle::new(),
            dispatcher,
            updater,
        }
    }

    /// Run the pipeline until `shutdown` flips to true.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let (sample_tx, mut sample_rx) = mpsc::channel::<Sample>(256);

        let window_tx = sample_tx.clone();
        let subscription = self.observer.subscribe(Box::new(move |snapshot| {
            // Sampling is human-input-bound; if the channel is full the
            // next change will carry the fresh state anyway.
            let _ = window_tx.try_send(Sample::Window(snapshot));
        }));
        if subscription == SUBSCRIPTION_UNAVAILABLE {
            warn!("window-change events unavailable; relying on key-triggered sampling only");
        }

        if let Err(e) = self.hook.start() {
            warn!(error = %e, "key hook unavailable; relying on window events only");
        }
        let bridge_stop = Arc::new(AtomicBool::new(false));
        let bridge = spawn_hook_bridge(
            self.hook.receiver().clone(),
            sample_tx.clone(),
            bridge_stop.clone(),
        );
        drop(sample_tx);

        info!("activity watcher running");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                sample = sample_rx.recv() => {
                    let Some(sample) = sample else { break };
                    let snapshot = match sample {
                        Sample::Window(snapshot) => Some(snapshot),
                        Sample::KeyTrigger => self.observer.active_window(),
                    };
                    if let Some(snapshot) = snapshot {
                        self.process(snapshot, false).await;
                    }
                }
            }
        }

        info!("activity watcher stopping");
        bridge_stop.store(true, Ordering::SeqCst);
        self.hook.stop();
        if subscription != SUBSCRIPTION_UNAVAILABLE {
            self.observer.unsubscribe(subscription);
        }
        let _ = bridge.await;
    }

    /// Run one snapshot through classify → throttle → dispatch.
    async fn process(&mut self, snapshot: WindowSnapshot, is_write: bool) {
        // Samples that could never be reported must not disturb
        // throttle state, so these checks run before the throttle is
        // consulted.
        if snapshot.app_name().is_empty() {
            return;
        }
        if !self.catalog.is_monitored(snapshot.catalog_key()) {
            debug!(app = snapshot.app_name(), "app not monitored");
            return;
        }
        let metadata = self.catalog.get_app(snapshot.catalog_key());
        if let Some(meta) = &metadata {
            if self.catalog.is_excluded(meta) {
                return;
            }
        }

        let Some(record) = classify::classify(
            &snapshot,
            metadata.as_ref(),
            self.settings.entity_preference,
            self.filter.as_ref(),
        ) else {
            return;
        };

        let now = Utc::now();
        if !self
            .throttle
            .should_emit(&record.entity, now, is_write, record.category)
        {
            return;
        }
        // Recorded before dispatch: a failing collector must not turn
        // the next identical sample into a retry.
        self.throttle.record(&record.entity, now, record.category);

        self.dispatcher
            .dispatch(
                &record,
                metadata.as_ref(),
                snapshot.app_name(),
                is_write,
                &mut self.updater,
            )
            .await;
    }

    #[cfg(test)]
    pub(crate) fn throttle(&self) -> &HeartbeatThrottle {
        &self.throttle
    }

    #[cfg(test)]
    pub(crate) async fn process_for_test(&mut self, snapshot: WindowSnapshot, is_write: bool) {
        self.process(snapshot, is_write).await;
    }
}

/// Forward key-down events from the hook's crossbeam channel into the
/// async sample channel.
fn spawn_hook_bridge(
    hook_rx: crossbeam_channel::Receiver<crate::hook::KeyPress>,
    sample_tx: mpsc::Sender<Sample>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::SeqCst) {
            match hook_rx.recv_timeout(Duration::from_millis(200)) {
                Ok(_press) => {
                    let _ = sample_tx.try_send(Sample::KeyTrigger);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AllowAllFilter, AppMetadata};
    use crate::observer::{ProcessInfo, SubscriptionId, WindowCallback};
    use crate::status::StatusChannel;
    use crate::updater::no_op_coordinator;
    use std::path::{Path, PathBuf};

    struct FakeObserver;

    impl WindowObserver for FakeObserver {
        fn active_window(&self) -> Option<WindowSnapshot> {
            None
        }
        fn open_windows(&self) -> Vec<WindowSnapshot> {
            Vec::new()
        }
        fn subscribe(&mut self, _callback: WindowCallback) -> SubscriptionId {
            1
        }
        fn unsubscribe(&mut self, _id: SubscriptionId) {}
    }

    struct FakeCatalog {
        monitored: bool,
    }

    impl AppCatalog for FakeCatalog {
        fn get_app(&self, path: &Path) -> Option<AppMetadata> {
            let exec = path.file_name()?.to_str()?;
            (exec == "figma").then(|| AppMetadata {
                id: "figma".to_string(),
                name: "Figma".to_string(),
                version: Some("1.0".to_string()),
                is_browser: false,
                is_default_enabled: true,
                is_electron: true,
            })
        }
        fn is_monitored(&self, _path: &Path) -> bool {
            self.monitored
        }
        fn is_excluded(&self, _app: &AppMetadata) -> bool {
            false
        }
    }

    fn watcher(monitored: bool) -> ActivityWatcher {
        let settings = Settings {
            cli_path: Some(PathBuf::from("/nonexistent/waka-agent-test-cli")),
            status_bar_enabled: false,
            auto_update_enabled: false,
            ..Settings::default()
        };
        let (status, receiver) = StatusChannel::new();
        // Keep the receiver alive for the watcher's lifetime.
        std::mem::forget(receiver);
        let dispatcher = HeartbeatDispatcher::new(settings.clone(), status);
        ActivityWatcher::new(
            Box::new(FakeObserver),
            KeyHook::new(),
            Arc::new(FakeCatalog { monitored }),
            Arc::new(AllowAllFilter),
            settings,
            dispatcher,
            no_op_coordinator(),
        )
    }

    fn snapshot(title: &str, app: &str) -> WindowSnapshot {
        WindowSnapshot {
            id: 7,
            title: title.to_string(),
            url: None,
            process: ProcessInfo {
                pid: 99,
                path: PathBuf::from(format!("/usr/bin/{app}")),
                name: app.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_unmonitored_app_leaves_throttle_untouched() {
        let mut watcher = watcher(false);
        watcher
            .process_for_test(snapshot("Homepage Design - Figma", "figma"), false)
            .await;
        assert!(watcher.throttle().last_heartbeat_at().is_none());
    }

    #[tokio::test]
    async fn test_nameless_window_leaves_throttle_untouched() {
        let mut watcher = watcher(true);
        let mut snap = snapshot("anything", "app");
        snap.process.name = String::new();
        watcher.process_for_test(snap, false).await;
        assert!(watcher.throttle().last_heartbeat_at().is_none());
    }

    #[tokio::test]
    async fn test_approved_sample_records_before_dispatch_outcome() {
        // The collector binary does not exist, yet the throttle state
        // advances: suppression is monitoring-based, not delivery-based.
        let mut watcher = watcher(true);
        watcher
            .process_for_test(snapshot("Homepage Design - Figma", "figma"), false)
            .await;
        assert!(watcher.throttle().last_heartbeat_at().is_some());

        // The identical sample right after is coalesced.
        let before = watcher.throttle().last_heartbeat_at();
        watcher
            .process_for_test(snapshot("Homepage Design - Figma", "figma"), false)
            .await;
        assert_eq!(watcher.throttle().last_heartbeat_at(), before);
    }

    #[tokio::test]
    async fn test_pathless_snapshot_is_looked_up_by_display_name() {
        // Platforms that cannot resolve the executable path still get
        // catalog hits through the display name, so their samples are
        // not silently dropped at the monitoring gate.
        let mut watcher = watcher(true);
        let mut snap = snapshot("Homepage Design - Figma", "figma");
        snap.process.path = PathBuf::new();
        watcher.process_for_test(snap, false).await;
        assert!(watcher.throttle().last_heartbeat_at().is_some());
    }

    #[tokio::test]
    async fn test_placeholder_title_never_reaches_throttle() {
        let mut watcher = watcher(true);
        watcher
            .process_for_test(snapshot("Untitled - Figma", "figma"), false)
            .await;
        assert!(watcher.throttle().last_heartbeat_at().is_none());
    }
}
