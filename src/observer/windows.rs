//! Native-event window observer for Windows.
//!
//! Wraps `SetWinEventHook(EVENT_SYSTEM_FOREGROUND, ..)`: the OS pushes
//! foreground changes to us, no polling involved. The subscription id is
//! the opaque hook handle returned by the facility, as-is.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use once_cell::sync::Lazy;
use tracing::warn;
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, TRUE, WPARAM};
use windows::Win32::System::ProcessStatus::GetModuleFileNameExW;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, EnumWindows, GetForegroundWindow, GetMessageW, GetWindowTextW,
    GetWindowThreadProcessId, IsWindowVisible, PostThreadMessageW, TranslateMessage,
    EVENT_SYSTEM_FOREGROUND, MSG, WINEVENT_OUTOFCONTEXT, WINEVENT_SKIPOWNPROCESS, WM_QUIT,
};

use crate::observer::types::{ProcessInfo, WindowSnapshot};
use crate::observer::{
    SubscriptionId, WindowCallback, WindowObserver, SUBSCRIPTION_UNAVAILABLE,
};

// The WinEvent callback is a bare extern "system" fn, so subscriptions
// are routed through a process-global registry keyed by hook handle.
static CALLBACKS: Lazy<Mutex<HashMap<isize, WindowCallback>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct Subscription {
    hook: isize,
    thread_id: u32,
}

/// Event-subscribed [`WindowObserver`] for Windows.
pub struct WinEventObserver {
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl WinEventObserver {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
        }
    }
}

impl Default for WinEventObserver {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "system" fn win_event_proc(
    hook: HWINEVENTHOOK,
    _event: u32,
    hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _thread: u32,
    _time: u32,
) {
    if let Some(snapshot) = snapshot_for(hwnd) {
        if let Ok(callbacks) = CALLBACKS.lock() {
            if let Some(callback) = callbacks.get(&(hook.0 as isize)) {
                callback(snapshot);
            }
        }
    }
}

impl WindowObserver for WinEventObserver {
    fn active_window(&self) -> Option<WindowSnapshot> {
        let hwnd = unsafe { GetForegroundWindow() };
        snapshot_for(hwnd)
    }

    fn open_windows(&self) -> Vec<WindowSnapshot> {
        let mut windows: Vec<WindowSnapshot> = Vec::new();
        unsafe {
            let _ = EnumWindows(
                Some(enum_windows_proc),
                LPARAM(&mut windows as *mut Vec<WindowSnapshot> as isize),
            );
        }
        windows
    }

    fn subscribe(&mut self, callback: WindowCallback) -> SubscriptionId {
        let (tx, rx) = crossbeam_channel::bounded::<Option<(isize, u32)>>(1);

        // The hook must live on a thread that pumps messages.
        thread::spawn(move || {
            let hook = unsafe {
                SetWinEventHook(
                    EVENT_SYSTEM_FOREGROUND,
                    EVENT_SYSTEM_FOREGROUND,
                    None,
                    Some(win_event_proc),
                    0,
                    0,
                    WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
                )
            };
            if hook.is_invalid() {
                let _ = tx.send(None);
                return;
            }
            let thread_id = unsafe { windows::Win32::System::Threading::GetCurrentThreadId() };
            let _ = tx.send(Some((hook.0 as isize, thread_id)));

            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
                let _ = UnhookWinEvent(hook);
            }
        });

        match rx.recv() {
            Ok(Some((hook, thread_id))) => {
                if let Ok(mut callbacks) = CALLBACKS.lock() {
                    callbacks.insert(hook, callback);
                }
                self.subscriptions.insert(hook as SubscriptionId, Subscription { hook, thread_id });
                hook as SubscriptionId
            }
            _ => {
                warn!("SetWinEventHook failed; foreground events unavailable");
                SUBSCRIPTION_UNAVAILABLE
            }
        }
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some(sub) = self.subscriptions.remove(&id) {
            if let Ok(mut callbacks) = CALLBACKS.lock() {
                callbacks.remove(&sub.hook);
            }
            unsafe {
                let _ = PostThreadMessageW(sub.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
    }
}

impl Drop for WinEventObserver {
    fn drop(&mut self) {
        let ids: Vec<SubscriptionId> = self.subscriptions.keys().copied().collect();
        for id in ids {
            self.unsubscribe(id);
        }
    }
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<WindowSnapshot>);
    if IsWindowVisible(hwnd).as_bool() {
        if let Some(snapshot) = snapshot_for(hwnd) {
            // Invisible shells and message-only windows carry no title.
            if !snapshot.title.is_empty() {
                windows.push(snapshot);
            }
        }
    }
    TRUE
}

fn snapshot_for(hwnd: HWND) -> Option<WindowSnapshot> {
    if hwnd.0.is_null() {
        return None;
    }

    let mut title_buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut title_buf) } as usize;
    let title = String::from_utf16_lossy(&title_buf[..len]);

    let mut pid: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };

    let path = resolve_exec_path(pid).unwrap_or_default();
    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Some(WindowSnapshot {
        id: hwnd.0 as usize as u64,
        title,
        url: None,
        process: ProcessInfo { pid, path, name },
    })
}

fn resolve_exec_path(pid: u32) -> Option<PathBuf> {
    if pid == 0 {
        return None;
    }
    let handle =
        unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) }.ok()?;
    let mut buf = [0u16; 1024];
    let len = unsafe { GetModuleFileNameExW(handle, None, &mut buf) } as usize;
    unsafe {
        let _ = CloseHandle(handle);
    }
    if len == 0 {
        return None;
    }
    Some(PathBuf::from(String::from_utf16_lossy(&buf[..len])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_windows_enumerates_titled_windows() {
        let observer = WinEventObserver::new();
        for snapshot in observer.open_windows() {
            assert_ne!(snapshot.id, 0);
            assert!(!snapshot.title.is_empty());
        }
    }
}
