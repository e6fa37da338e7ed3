//! macOS window observer backed by the CoreGraphics window list.
//!
//! `active_window`/`open_windows` are on-demand queries over
//! `CGWindowListCopyWindowInfo`. Subscriptions run a background
//! change-detect thread; document/tab changes inside an already-focused
//! window are covered by the key hook, not by this observer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::array::CFArray;
use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};

use crate::observer::types::{ProcessInfo, WindowSnapshot};
use crate::observer::{SubscriptionId, WindowCallback, WindowObserver};

const CHANGE_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Subscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// CoreGraphics-based [`WindowObserver`] for macOS.
pub struct MacosObserver {
    next_id: SubscriptionId,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl MacosObserver {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            subscriptions: HashMap::new(),
        }
    }
}

impl Default for MacosObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowObserver for MacosObserver {
    fn active_window(&self) -> Option<WindowSnapshot> {
        // The window list is ordered front to back; the first layer-0
        // window is the foreground one.
        list_windows().into_iter().next()
    }

    fn open_windows(&self) -> Vec<WindowSnapshot> {
        list_windows()
    }

    fn subscribe(&mut self, callback: WindowCallback) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let mut last_window_id: Option<u64> = None;
            while !stop_flag.load(Ordering::SeqCst) {
                if let Some(snapshot) = list_windows().into_iter().next() {
                    if last_window_id != Some(snapshot.id) {
                        last_window_id = Some(snapshot.id);
                        if !stop_flag.load(Ordering::SeqCst) {
                            callback(snapshot);
                        }
                    }
                }
                thread::sleep(CHANGE_POLL_INTERVAL);
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
                let _ = handle.join();
            }
        }
    }
}

impl Drop for MacosObserver {
    fn drop(&mut self) {
        let ids: Vec<SubscriptionId> = self.subscriptions.keys().copied().collect();
        for id in ids {
            self.unsubscribe(id);
        }
    }
}

fn list_windows() -> Vec<WindowSnapshot> {
    let info: CFArray<CFType> = match copy_window_info(
        kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements,
        kCGNullWindowID,
    ) {
        Some(info) => unsafe { CFArray::wrap_under_get_rule(info.as_concrete_TypeRef()) },
        None => return Vec::new(),
    };

    let mut windows = Vec::new();
    for item in info.iter() {
        let dict = match item.downcast::<CFDictionary>() {
            Some(d) => d,
            None => continue,
        };
        // Layer 0 windows are normal application windows.
        if dict_number(&dict, "kCGWindowLayer").unwrap_or(-1) != 0 {
            continue;
        }
        let id = match dict_number(&dict, "kCGWindowNumber") {
            Some(n) if n >= 0 => n as u64,
            _ => continue,
        };
        let pid = dict_number(&dict, "kCGWindowOwnerPID").unwrap_or(0).max(0) as u32;
        let title = dict_string(&dict, "kCGWindowName").unwrap_or_default();
        let name = dict_string(&dict, "kCGWindowOwnerName").unwrap_or_default();

        windows.push(WindowSnapshot {
            id,
            title,
            url: None,
            process: ProcessInfo {
                pid,
                path: resolve_exec_path(pid).unwrap_or_default(),
                name,
            },
        });
    }
    windows
}

fn dict_number(dict: &CFDictionary, key: &str) -> Option<i64> {
    let key = CFString::new(key);
    let value = dict.find(key.as_CFTypeRef().cast())?;
    let number = unsafe { CFNumber::wrap_under_get_rule((*value).cast()) };
    number.to_i64()
}

fn dict_string(dict: &CFDictionary, key: &str) -> Option<String> {
    let key = CFString::new(key);
    let value = dict.find(key.as_CFTypeRef().cast())?;
    let string = unsafe { CFString::wrap_under_get_rule((*value).cast()) };
    Some(string.to_string())
}

/// Resolve the owning process's executable by asking `ps`. The window
/// list exposes the owner name but not the binary path, and there is no
/// procfs here.
fn resolve_exec_path(pid: u32) -> Option<PathBuf> {
    if pid == 0 {
        return None;
    }
    let output = std::process::Command::new("ps")
        .args(["-o", "comm=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
