//! No-op key hook for platforms where keystroke-driven sampling is not
//! needed (window-change events or polling already cover focus and tab
//! transitions there).

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::hook::KeyPress;

/// Errors that can occur while installing the key hook.
#[derive(Debug)]
pub enum KeyHookError {
    AlreadyRunning,
}

impl std::fmt::Display for KeyHookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyHookError::AlreadyRunning => write!(f, "key hook is already running"),
        }
    }
}

impl std::error::Error for KeyHookError {}

/// A key hook that never emits events.
pub struct NoopKeyHook {
    _sender: Sender<KeyPress>,
    receiver: Receiver<KeyPress>,
    running: bool,
}

impl NoopKeyHook {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1024);
        Self {
            _sender: sender,
            receiver,
            running: false,
        }
    }

    pub fn start(&mut self) -> Result<(), KeyHookError> {
        if self.running {
            return Err(KeyHookError::AlreadyRunning);
        }
        self.running = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Receiver for key-down events (never delivers on this platform).
    pub fn receiver(&self) -> &Receiver<KeyPress> {
        &self.receiver
    }
}

impl Default for NoopKeyHook {
    fn default() -> Self {
        Self::new()
    }
}
