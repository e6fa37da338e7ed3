//! Snapshot types produced by the window observers.
//!
//! A snapshot is a point-in-time description of the foreground window.
//! It is produced by an observer and consumed, never mutated, by the
//! classifier.

use std::path::{Path, PathBuf};

/// Metadata about the process that owns a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Process id of the window owner.
    pub pid: u32,
    /// Full path to the owning executable, when it could be resolved.
    pub path: PathBuf,
    /// Human-readable application name (window class, app id, or
    /// executable name depending on what the platform exposes).
    pub name: String,
}

impl ProcessInfo {
    /// Base name of the executable, without any directory components.
    pub fn exec_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// A point-in-time description of a window.
///
/// `id` is stable for the lifetime of the window and is what the polling
/// observer compares to detect focus changes. `url` is only populated by
/// observers that can see browser navigation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Platform window handle (X11 window id, HWND value, CGWindowID).
    pub id: u64,
    /// Window title, possibly empty.
    pub title: String,
    /// Navigable URL for browser windows, when available.
    pub url: Option<String>,
    /// Owning process metadata.
    pub process: ProcessInfo,
}

impl WindowSnapshot {
    /// Executable path of the owning process.
    pub fn path(&self) -> &Path {
        &self.process.path
    }

    /// Key for app-catalog lookups: the executable path when it was
    /// resolved, otherwise the display name. Catalogs match on the
    /// final path component, so a bare name still hits entries that
    /// list it. Some platforms cannot resolve the path for every
    /// window.
    pub fn catalog_key(&self) -> &Path {
        if self.process.path.as_os_str().is_empty() {
            Path::new(&self.process.name)
        } else {
            &self.process.path
        }
    }

    /// Display name of the owning application.
    pub fn app_name(&self) -> &str {
        &self.process.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WindowSnapshot {
        WindowSnapshot {
            id: 42,
            title: "main.rs - repo".to_string(),
            url: None,
            process: ProcessInfo {
                pid: 1234,
                path: PathBuf::from("/usr/bin/code"),
                name: "Code".to_string(),
            },
        }
    }

    #[test]
    fn test_exec_name_is_base_name() {
        let snap = snapshot();
        assert_eq!(snap.process.exec_name(), "code");
    }

    #[test]
    fn test_catalog_key_prefers_path() {
        let snap = snapshot();
        assert_eq!(snap.catalog_key(), Path::new("/usr/bin/code"));
    }

    #[test]
    fn test_catalog_key_falls_back_to_display_name() {
        let mut snap = snapshot();
        snap.process.path = PathBuf::new();
        snap.process.name = "Google Chrome".to_string();
        assert_eq!(snap.catalog_key(), Path::new("Google Chrome"));
        assert_eq!(
            snap.catalog_key().file_name(),
            Some(std::ffi::OsStr::new("Google Chrome"))
        );
    }

    #[test]
    fn test_exec_name_empty_path() {
        let info = ProcessInfo {
            pid: 1,
            path: PathBuf::new(),
            name: String::new(),
        };
        assert_eq!(info.exec_name(), "");
    }
}
