//! Heartbeat dispatch to the collector binary.
//!
//! Serializes an approved [`ActivityRecord`] into a `wakatime-cli`
//! invocation, interprets the outcome, and keeps the status side
//! channel and the cached "today" summary up to date. Errors here are
//! terminal only to the one invocation; the next sample is the retry.
//!
//! The collector has no structured exit contract beyond zero = success,
//! so failures are classified by substring matching on its output.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use tokio::process::Command;
use tracing::{debug, error};

use crate::catalog::AppMetadata;
use crate::classify::ActivityRecord;
use crate::config::Settings;
use crate::status::{IconState, StatusChannel};
use crate::updater::UpdateCoordinator;

/// Minimum age before the "today" summary is fetched again.
pub const STATUS_REFRESH_INTERVAL_SECS: i64 = 120;

/// Collector entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    App,
    File,
    Url,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::App => "app",
            EntityType::File => "file",
            EntityType::Url => "url",
        }
    }
}

/// Failure classification for collector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The collector binary was not found (ENOENT).
    BinaryMissing,
    /// The collector was blocked, typically by security software (EPERM).
    Blocked,
    Other,
}

/// Classify a failure by the only contract we have: substrings.
pub fn interpret_failure(text: &str) -> FailureKind {
    if text.contains("ENOENT") {
        FailureKind::BinaryMissing
    } else if text.contains("EPERM") {
        FailureKind::Blocked
    } else {
        FailureKind::Other
    }
}

/// Compose the plugin-identity string sent with every invocation:
/// `{app}/{version} {os}-wakatime/{agent version}`. The app segment is
/// stripped to printable ASCII.
pub fn plugin_string(app_name: &str, app_version: &str) -> String {
    let app = sanitize(&format!("{app_name}/{app_version}"));
    format!(
        "{app} {}-wakatime/{}",
        std::env::consts::OS,
        crate::VERSION
    )
}

fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| (' '..='~').contains(c))
        .collect()
}

/// Cached "today" summary, refreshed at most every
/// [`STATUS_REFRESH_INTERVAL_SECS`].
#[derive(Debug, Default)]
pub struct StatusCache {
    summary: Option<String>,
    fetched_at: Option<DateTime<Utc>>,
}

impl StatusCache {
    /// The cached text, if it is still fresh at `now`.
    fn fresh_summary(&self, now: DateTime<Utc>) -> Option<&str> {
        let fetched_at = self.fetched_at?;
        if now - fetched_at < Duration::seconds(STATUS_REFRESH_INTERVAL_SECS) {
            self.summary.as_deref()
        } else {
            None
        }
    }

    fn store(&mut self, summary: String, now: DateTime<Utc>) {
        self.summary = Some(summary);
        self.fetched_at = Some(now);
    }
}

/// Forwards approved records to the collector binary.
pub struct HeartbeatDispatcher {
    cli_path: PathBuf,
    settings: Settings,
    status: StatusChannel,
    cache: StatusCache,
    /// Plugin identity used for summary queries, where no foreground
    /// app is involved.
    agent_plugin: String,
}

impl HeartbeatDispatcher {
    pub fn new(settings: Settings, status: StatusChannel) -> Self {
        Self {
            cli_path: settings.resolve_cli_path(),
            settings,
            status,
            cache: StatusCache::default(),
            agent_plugin: plugin_string("waka-agent", crate::VERSION),
        }
    }

    /// Ordered argv for one heartbeat. Pure; exercised directly by
    /// tests.
    pub fn build_args(
        record: &ActivityRecord,
        entity_type: EntityType,
        is_write: bool,
        plugin: &str,
    ) -> Vec<String> {
        let mut args = vec![
            "--entity".to_string(),
            record.entity.clone(),
            "--entity-type".to_string(),
            entity_type.as_str().to_string(),
            "--category".to_string(),
            record
                .category
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "coding".to_string()),
            "--plugin".to_string(),
            plugin.to_string(),
        ];
        if let Some(project) = &record.project {
            args.push("--project".to_string());
            args.push(project.clone());
        }
        if is_write {
            args.push("--write".to_string());
        }
        if let Some(language) = &record.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }
        args
    }

    /// Send one heartbeat and run the post-dispatch side effects
    /// (summary refresh, update check). Never returns an error; every
    /// failure mode is handled locally.
    pub async fn dispatch(
        &mut self,
        record: &ActivityRecord,
        metadata: Option<&AppMetadata>,
        fallback_app_name: &str,
        is_write: bool,
        updater: &mut UpdateCoordinator,
    ) {
        let entity_type = if metadata.map(|m| m.is_browser).unwrap_or(false) {
            EntityType::Url
        } else {
            EntityType::App
        };
        let plugin = match metadata {
            Some(meta) => plugin_string(&meta.name, meta.version.as_deref().unwrap_or("unknown")),
            None => plugin_string(fallback_app_name, "unknown"),
        };
        let args = Self::build_args(record, entity_type, is_write, &plugin);

        debug!(entity = %record.entity, ?entity_type, "sending heartbeat");
        match Command::new(&self.cli_path).args(&args).output().await {
            Ok(output) if output.status.success() => {
                // Diagnostic only; users never see the success-path output.
                let stdout = String::from_utf8_lossy(&output.stdout);
                if !stdout.trim().is_empty() {
                    debug!(output = %stdout.trim(), "collector output");
                }
                self.status.set_icon(IconState::Normal);
            }
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
                if text.trim().is_empty() {
                    text = String::from_utf8_lossy(&output.stdout).into_owned();
                }
                if text.trim().is_empty() {
                    text = format!("wakatime-cli exited with {}", output.status);
                }
                self.handle_failure(text.trim());
            }
            Err(e) => {
                // Spawn failure, distinct from a non-zero exit. Caught
                // here; the substring check below decides whether any
                // remediation hint applies.
                error!(error = %e, cli = %self.cli_path.display(), "failed to spawn collector");
                self.handle_failure(&e.to_string());
            }
        }

        self.refresh_today().await;
        updater.check_for_updates(Utc::now());
    }

    /// React to a failed invocation: one-shot alert with the raw error
    /// text, plus an alarm icon and a remediation hint when the text
    /// points at a missing or blocked binary.
    pub fn handle_failure(&mut self, text: &str) {
        error!(output = %text, "collector invocation failed");
        self.status.alert("waka-agent", text);

        match interpret_failure(text) {
            FailureKind::BinaryMissing => {
                self.status.set_icon(IconState::Alarm);
                self.status.alert(
                    "wakatime-cli not found",
                    format!(
                        "Could not run {}. Install wakatime-cli or point cli_path at it.",
                        self.cli_path.display()
                    ),
                );
            }
            FailureKind::Blocked => {
                self.status.set_icon(IconState::Alarm);
                self.status.alert(
                    "wakatime-cli blocked",
                    "wakatime-cli was prevented from running, likely by antivirus or \
                     security software. Add an exception for it.",
                );
            }
            FailureKind::Other => {}
        }
    }

    /// Refresh the "today" status-bar text.
    ///
    /// Disabled status bar clears the text without spawning anything; a
    /// fresh cache is reused; fetch failures keep the stale text and
    /// are only logged.
    pub async fn refresh_today(&mut self) {
        if !self.settings.status_bar_enabled {
            self.status.set_text("");
            return;
        }

        let now = Utc::now();
        if let Some(summary) = self.cache.fresh_summary(now) {
            self.status.set_text(summary);
            return;
        }

        let args = [
            "--today",
            "--today-hide-categories",
            "true",
            "--plugin",
            &self.agent_plugin,
        ];
        match Command::new(&self.cli_path).args(args).output().await {
            Ok(output) if output.status.success() => {
                let summary = String::from_utf8_lossy(&output.stdout).trim().to_string();
                self.cache.store(summary.clone(), now);
                self.status.set_text(summary);
            }
            Ok(output) => {
                error!(
                    code = ?output.status.code(),
                    "today summary query failed; keeping previous text"
                );
            }
            Err(e) => {
                error!(error = %e, "today summary query could not run; keeping previous text");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use crate::status::StatusEvent;
    use crate::updater::no_op_coordinator;

    fn record() -> ActivityRecord {
        ActivityRecord {
            entity: "Homepage Design".to_string(),
            category: Some(Category::Designing),
            language: Some("Image (svg)".to_string()),
            project: Some("widgets".to_string()),
        }
    }

    #[test]
    fn test_build_args_full() {
        let args =
            HeartbeatDispatcher::build_args(&record(), EntityType::App, true, "Figma/1.0 plugin");
        assert_eq!(
            args,
            vec![
                "--entity",
                "Homepage Design",
                "--entity-type",
                "app",
                "--category",
                "designing",
                "--plugin",
                "Figma/1.0 plugin",
                "--project",
                "widgets",
                "--write",
                "--language",
                "Image (svg)",
            ]
        );
    }

    #[test]
    fn test_build_args_category_defaults_to_coding() {
        let record = ActivityRecord {
            entity: "thing".to_string(),
            category: None,
            language: None,
            project: None,
        };
        let args = HeartbeatDispatcher::build_args(&record, EntityType::Url, false, "p");
        let category_pos = args.iter().position(|a| a == "--category").unwrap();
        assert_eq!(args[category_pos + 1], "coding");
        assert!(!args.contains(&"--write".to_string()));
        assert!(!args.contains(&"--project".to_string()));
        assert!(!args.contains(&"--language".to_string()));
    }

    #[test]
    fn test_plugin_string_strips_non_printable_ascii() {
        let plugin = plugin_string("Caf\u{e9}\u{7f}App", "1.0\n");
        let (app_segment, _) = plugin.split_once(' ').unwrap();
        assert_eq!(app_segment, "CafApp/1.0");
        assert!(plugin.contains("-wakatime/"));
    }

    #[test]
    fn test_interpret_failure_substrings() {
        assert_eq!(
            interpret_failure("spawn wakatime-cli ENOENT"),
            FailureKind::BinaryMissing
        );
        assert_eq!(interpret_failure("EPERM: blocked"), FailureKind::Blocked);
        assert_eq!(
            interpret_failure("exit status 102"),
            FailureKind::Other
        );
    }

    #[test]
    fn test_status_cache_freshness() {
        let now = Utc::now();
        let mut cache = StatusCache::default();
        assert!(cache.fresh_summary(now).is_none());

        cache.store("1 hr 5 mins".to_string(), now);
        assert_eq!(
            cache.fresh_summary(now + Duration::seconds(60)),
            Some("1 hr 5 mins")
        );
        assert!(cache
            .fresh_summary(now + Duration::seconds(STATUS_REFRESH_INTERVAL_SECS))
            .is_none());
    }

    #[test]
    fn test_enoent_failure_raises_alarm_and_remediation() {
        let (channel, receiver) = StatusChannel::new();
        let mut dispatcher = HeartbeatDispatcher::new(Settings::default(), channel);
        dispatcher.handle_failure("spawn ENOENT: no such binary");

        let events: Vec<StatusEvent> = receiver.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, StatusEvent::Icon(IconState::Alarm))));
        // Raw error alert plus remediation alert.
        let alerts = events
            .iter()
            .filter(|e| matches!(e, StatusEvent::Alert { .. }))
            .count();
        assert_eq!(alerts, 2);
    }

    #[test]
    fn test_other_failure_does_not_touch_icon() {
        let (channel, receiver) = StatusChannel::new();
        let mut dispatcher = HeartbeatDispatcher::new(Settings::default(), channel);
        dispatcher.handle_failure("api error 500");

        let events: Vec<StatusEvent> = receiver.try_iter().collect();
        assert!(!events.iter().any(|e| matches!(e, StatusEvent::Icon(_))));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, StatusEvent::Alert { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_refresh_today_disabled_clears_text() {
        let settings = Settings {
            status_bar_enabled: false,
            ..Settings::default()
        };
        let (channel, receiver) = StatusChannel::new();
        let mut dispatcher = HeartbeatDispatcher::new(settings, channel);
        dispatcher.refresh_today().await;
        assert_eq!(receiver.recv().unwrap(), StatusEvent::Text(String::new()));
    }

    #[tokio::test]
    async fn test_dispatch_with_missing_binary_never_panics() {
        let settings = Settings {
            cli_path: Some(PathBuf::from("/nonexistent/waka-agent-test-cli")),
            status_bar_enabled: false,
            auto_update_enabled: false,
            ..Settings::default()
        };
        let (channel, receiver) = StatusChannel::new();
        let mut dispatcher = HeartbeatDispatcher::new(settings, channel);
        let mut updater = no_op_coordinator();
        dispatcher
            .dispatch(&record(), None, "Figma", false, &mut updater)
            .await;
        // The spawn failure surfaced as an alert rather than a panic.
        let events: Vec<StatusEvent> = receiver.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, StatusEvent::Alert { .. })));
    }
}
