//! macOS key-down hook using a CGEvent tap.
//!
//! Installs a listen-only event tap for `KeyDown` on a background
//! thread and forwards one [`KeyPress`] per press over a bounded
//! channel. Requires the Input Monitoring permission. No key codes or
//! characters are ever read off the event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult,
};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::hook::KeyPress;

/// Errors that can occur while installing the key hook.
#[derive(Debug)]
pub enum KeyHookError {
    AlreadyRunning,
    PermissionDenied,
    TapCreationFailed,
    RunLoopSourceFailed,
}

impl std::fmt::Display for KeyHookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyHookError::AlreadyRunning => write!(f, "key hook is already running"),
            KeyHookError::PermissionDenied => {
                write!(f, "Input Monitoring permission not granted")
            }
            KeyHookError::TapCreationFailed => write!(f, "failed to create CGEvent tap"),
            KeyHookError::RunLoopSourceFailed => write!(f, "failed to create run loop source"),
        }
    }
}

impl std::error::Error for KeyHookError {}

/// Global key-down listener for macOS.
pub struct MacosKeyHook {
    sender: Sender<KeyPress>,
    receiver: Receiver<KeyPress>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacosKeyHook {
    pub fn new() -> Self {
        // Bounded so a stalled consumer cannot grow memory unboundedly.
        let (sender, receiver) = bounded(1024);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start listening on a background thread.
    pub fn start(&mut self) -> Result<(), KeyHookError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(KeyHookError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone()) {
                tracing::warn!(error = %e, "key hook event loop failed");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop listening and join the background thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receiver for key-down events.
    pub fn receiver(&self) -> &Receiver<KeyPress> {
        &self.receiver
    }
}

impl Default for MacosKeyHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MacosKeyHook {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_event_loop(sender: Sender<KeyPress>, running: Arc<AtomicBool>) -> Result<(), KeyHookError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        move |_proxy, event_type, _event| {
            if matches!(event_type, CGEventType::KeyDown) {
                // Drop rather than block when the channel is full.
                let _ = sender.try_send(KeyPress::now());
            }
            CallbackResult::Keep
        },
    )
    .map_err(|_| KeyHookError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| KeyHookError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}
