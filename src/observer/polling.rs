//! Polling window observer for X11 hosts.
//!
//! X11 has no portable push notification for foreground changes that we
//! can reach without a display connection, so this variant shells out to
//! two inspection utilities on a fixed 1 second timer:
//!
//! - `xdotool getactivewindow` resolves the active window handle
//! - `xprop -id <handle>` resolves its PID, title, class and GTK app id
//!
//! Both tools emit unversioned, human-oriented text; parsing is
//! defensive and any failure means "no snapshot this tick", never a
//! fatal error. Tool presence is probed once at construction and cached;
//! when either tool is missing, `subscribe` returns
//! [`SUBSCRIPTION_UNAVAILABLE`] and never invokes the callback.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::observer::types::{ProcessInfo, WindowSnapshot};
use crate::observer::{
    SubscriptionId, WindowCallback, WindowObserver, SUBSCRIPTION_UNAVAILABLE,
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

// xprop output is an external, unversioned contract. Each property is
// matched independently so a single malformed line cannot poison the
// rest of the snapshot.
static RE_PID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_NET_WM_PID\(CARDINAL\)\s*=\s*(?P<pid>\d+)").unwrap());
static RE_NET_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"_NET_WM_NAME\(UTF8_STRING\)\s*=\s*"(?P<title>.*)""#).unwrap());
static RE_WM_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^WM_NAME\((?:STRING|UTF8_STRING|COMPOUND_TEXT)\)\s*=\s*"(?P<title>.*)""#)
        .unwrap()
});
static RE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"WM_CLASS\(STRING\)\s*=\s*"(?P<instance>[^"]*)",\s*"(?P<class>[^"]*)""#).unwrap()
});
static RE_GTK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"_GTK_APPLICATION_ID\(UTF8_STRING\)\s*=\s*"(?P<id>[^"]*)""#).unwrap());

/// Window attributes parsed out of `xprop` output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct WindowProps {
    pid: Option<u32>,
    title: Option<String>,
    wm_class: Option<String>,
    gtk_app_id: Option<String>,
}

fn parse_window_props(output: &str) -> WindowProps {
    let pid = RE_PID
        .captures(output)
        .and_then(|c| c.name("pid"))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    // _NET_WM_NAME is UTF-8 and preferred; WM_NAME is the legacy fallback.
    let title = RE_NET_NAME
        .captures(output)
        .or_else(|| RE_WM_NAME.captures(output))
        .and_then(|c| c.name("title"))
        .map(|m| m.as_str().to_string());

    let wm_class = RE_CLASS
        .captures(output)
        .and_then(|c| c.name("class"))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty());

    let gtk_app_id = RE_GTK_ID
        .captures(output)
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty());

    WindowProps {
        pid,
        title,
        wm_class,
        gtk_app_id,
    }
}

/// Pick the display name for a window.
///
/// Documented precedence: window class, then GTK application id, then
/// the executable base name, then the raw title as a last resort.
fn display_name(props: &WindowProps, exec_name: &str) -> String {
    if let Some(class) = &props.wm_class {
        return class.clone();
    }
    if let Some(gtk_id) = &props.gtk_app_id {
        return gtk_id.clone();
    }
    if !exec_name.is_empty() {
        return exec_name.to_string();
    }
    props.title.clone().unwrap_or_default()
}

/// Resolved paths of the external inspection utilities, plus whether the
/// probe succeeded. Probed once at construction.
#[derive(Debug, Clone)]
struct Tools {
    xdotool: String,
    xprop: String,
    available: bool,
}

impl Tools {
    fn probe(xdotool: &str, xprop: &str) -> Self {
        let available = probe_command(xdotool, "--version") && probe_command(xprop, "-version");
        if !available {
            warn!(xdotool, xprop, "window inspection utilities missing; polling disabled");
        }
        Tools {
            xdotool: xdotool.to_string(),
            xprop: xprop.to_string(),
            available,
        }
    }
}

fn probe_command(cmd: &str, version_arg: &str) -> bool {
    Command::new(cmd)
        .arg(version_arg)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

struct Subscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Polling-based [`WindowObserver`] for X11.
pub struct X11PollingObserver {
    tools: Tools,
    next_id: SubscriptionId,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl X11PollingObserver {
    pub fn new() -> Self {
        Self::with_commands("xdotool", "xprop")
    }

    /// Build an observer that shells out to the given commands. Used by
    /// tests to simulate hosts without the utilities installed.
    pub fn with_commands(xdotool: &str, xprop: &str) -> Self {
        Self {
            tools: Tools::probe(xdotool, xprop),
            next_id: 1,
            subscriptions: HashMap::new(),
        }
    }

    /// Whether both inspection utilities were found on this host.
    pub fn is_available(&self) -> bool {
        self.tools.available
    }
}

impl Default for X11PollingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowObserver for X11PollingObserver {
    fn active_window(&self) -> Option<WindowSnapshot> {
        if !self.tools.available {
            return None;
        }
        query_active_window(&self.tools)
    }

    fn open_windows(&self) -> Vec<WindowSnapshot> {
        if !self.tools.available {
            return Vec::new();
        }
        let output = match run_capture(&self.tools.xdotool, &["search", "--onlyvisible", "--name", ""]) {
            Some(out) => out,
            None => return Vec::new(),
        };
        output
            .lines()
            .filter_map(|line| line.trim().parse::<u64>().ok())
            .filter_map(|id| query_window(&self.tools, id))
            .collect()
    }

    fn subscribe(&mut self, callback: WindowCallback) -> SubscriptionId {
        if !self.tools.available {
            return SUBSCRIPTION_UNAVAILABLE;
        }

        let id = self.next_id;
        self.next_id += 1;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let tools = self.tools.clone();

        let handle = thread::spawn(move || {
            let mut last_window_id: Option<u64> = None;
            while !stop_flag.load(Ordering::SeqCst) {
                if let Some(snapshot) = query_active_window(&tools) {
                    if last_window_id != Some(snapshot.id) {
                        last_window_id = Some(snapshot.id);
                        if !stop_flag.load(Ordering::SeqCst) {
                            callback(snapshot);
                        }
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
        });

        self.subscriptions.insert(
            id,
            Subscription {
                stop,
                handle: Some(handle),
            },
        );
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some(mut sub) = self.subscriptions.remove(&id) {
            sub.stop.store(true, Ordering::SeqCst);
            if let Some(handle) = sub.handle.take() {
                // Join so no tick can fire after this returns.
                let _ = handle.join();
            }
        }
    }
}

impl Drop for X11PollingObserver {
    fn drop(&mut self) {
        let ids: Vec<SubscriptionId> = self.subscriptions.keys().copied().collect();
        for id in ids {
            self.unsubscribe(id);
        }
    }
}

fn run_capture(cmd: &str, args: &[&str]) -> Option<String> {
    match Command::new(cmd).args(args).output() {
        Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
        Ok(out) => {
            debug!(cmd, code = ?out.status.code(), "inspection utility returned non-zero");
            None
        }
        Err(e) => {
            debug!(cmd, error = %e, "failed to run inspection utility");
            None
        }
    }
}

fn query_active_window(tools: &Tools) -> Option<WindowSnapshot> {
    let raw = run_capture(&tools.xdotool, &["getactivewindow"])?;
    let window_id = match raw.trim().parse::<u64>() {
        Ok(id) => id,
        Err(_) => {
            debug!(output = raw.trim(), "unparseable active window handle");
            return None;
        }
    };
    query_window(tools, window_id)
}

fn query_window(tools: &Tools, window_id: u64) -> Option<WindowSnapshot> {
    let id_arg = window_id.to_string();
    let output = run_capture(
        &tools.xprop,
        &[
            "-id",
            &id_arg,
            "_NET_WM_PID",
            "_NET_WM_NAME",
            "WM_NAME",
            "WM_CLASS",
            "_GTK_APPLICATION_ID",
        ],
    )?;

    let props = parse_window_props(&output);
    let pid = props.pid.unwrap_or(0);
    let path = resolve_exec_path(pid).unwrap_or_default();
    let exec_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let name = display_name(&props, &exec_name);

    Some(WindowSnapshot {
        id: window_id,
        title: props.title.unwrap_or_default(),
        url: None,
        process: ProcessInfo { pid, path, name },
    })
}

/// Resolve the owning process's executable through procfs.
fn resolve_exec_path(pid: u32) -> Option<PathBuf> {
    if pid == 0 {
        return None;
    }
    std::fs::read_link(format!("/proc/{pid}/exe")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const XPROP_OUTPUT: &str = concat!(
        "_NET_WM_PID(CARDINAL) = 4242\n",
        "_NET_WM_NAME(UTF8_STRING) = \"main.rs - repo - Code\"\n",
        "WM_NAME(STRING) = \"legacy title\"\n",
        "WM_CLASS(STRING) = \"code\", \"Code\"\n",
        "_GTK_APPLICATION_ID(UTF8_STRING) = \"com.visualstudio.code\"\n",
    );

    #[test]
    fn test_parse_full_xprop_output() {
        let props = parse_window_props(XPROP_OUTPUT);
        assert_eq!(props.pid, Some(4242));
        assert_eq!(props.title.as_deref(), Some("main.rs - repo - Code"));
        assert_eq!(props.wm_class.as_deref(), Some("Code"));
        assert_eq!(props.gtk_app_id.as_deref(), Some("com.visualstudio.code"));
    }

    #[test]
    fn test_parse_falls_back_to_wm_name() {
        let out = "WM_NAME(STRING) = \"plain title\"\n_NET_WM_PID(CARDINAL) = 7\n";
        let props = parse_window_props(out);
        assert_eq!(props.title.as_deref(), Some("plain title"));
        assert_eq!(props.pid, Some(7));
    }

    #[test]
    fn test_parse_garbage_yields_empty_props() {
        let props = parse_window_props("no properties here\n");
        assert_eq!(props, WindowProps::default());
    }

    #[test]
    fn test_parse_property_not_found_lines() {
        // xprop prints this shape when a property is absent.
        let out = concat!(
            "_NET_WM_PID:  not found.\n",
            "WM_CLASS(STRING) = \"firefox\", \"Firefox\"\n",
        );
        let props = parse_window_props(out);
        assert_eq!(props.pid, None);
        assert_eq!(props.wm_class.as_deref(), Some("Firefox"));
    }

    #[test]
    fn test_display_name_precedence() {
        let mut props = WindowProps {
            pid: None,
            title: Some("raw title".to_string()),
            wm_class: Some("Firefox".to_string()),
            gtk_app_id: Some("org.mozilla.firefox".to_string()),
        };
        assert_eq!(display_name(&props, "firefox-bin"), "Firefox");

        props.wm_class = None;
        assert_eq!(display_name(&props, "firefox-bin"), "org.mozilla.firefox");

        props.gtk_app_id = None;
        assert_eq!(display_name(&props, "firefox-bin"), "firefox-bin");

        assert_eq!(display_name(&props, ""), "raw title");
    }

    #[test]
    fn test_subscribe_unavailable_returns_sentinel() {
        let mut observer =
            X11PollingObserver::with_commands("waka-agent-missing-tool", "waka-agent-missing-tool");
        assert!(!observer.is_available());

        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let id = observer.subscribe(Box::new(|_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(id, SUBSCRIPTION_UNAVAILABLE);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        assert!(observer.active_window().is_none());
        assert!(observer.open_windows().is_empty());
    }

    #[test]
    fn test_unsubscribe_unknown_id_is_ignored() {
        let mut observer =
            X11PollingObserver::with_commands("waka-agent-missing-tool", "waka-agent-missing-tool");
        observer.unsubscribe(99);
        observer.unsubscribe(SUBSCRIPTION_UNAVAILABLE);
    }
}
