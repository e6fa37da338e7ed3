//! App-catalog collaborator interface.
//!
//! The catalog knows which applications exist, which are browsers, and
//! which the user has enabled for monitoring. The pipeline only consumes
//! this interface; metadata is read-only input to classification. A
//! small JSON-backed implementation is provided so the binary runs
//! standalone.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Metadata for a recognized application, looked up by executable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Stable catalog id used as the key for category/language tables.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Installed version, when known.
    pub version: Option<String>,
    /// Whether the app is a web browser (entity becomes the URL).
    #[serde(default)]
    pub is_browser: bool,
    /// Whether monitoring defaults to on for this app.
    #[serde(default)]
    pub is_default_enabled: bool,
    /// Whether the app ships as an Electron bundle.
    #[serde(default)]
    pub is_electron: bool,
}

/// Lookup interface consumed by the pipeline.
pub trait AppCatalog: Send + Sync {
    /// Metadata for the app owning `path`, if recognized.
    fn get_app(&self, path: &Path) -> Option<AppMetadata>;

    /// Whether the user currently has monitoring enabled for `path`.
    fn is_monitored(&self, path: &Path) -> bool;

    /// Whether the app is excluded from monitoring outright.
    fn is_excluded(&self, app: &AppMetadata) -> bool;
}

/// Allow/deny filter applied to browser URLs before they become
/// entities. Rendering of filter rules is external; the pipeline only
/// asks yes/no.
pub trait UrlFilter: Send + Sync {
    fn is_allowed(&self, url: &str) -> bool;
}

/// Filter that allows every URL.
pub struct AllowAllFilter;

impl UrlFilter for AllowAllFilter {
    fn is_allowed(&self, _url: &str) -> bool {
        true
    }
}

/// Catalog entry as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    app: AppMetadata,
    /// Executable base names that map to this app.
    exec_names: Vec<String>,
}

/// JSON-file-backed [`AppCatalog`].
///
/// Apps are matched by the final component of the lookup key, which is
/// the executable base name or, for pathless snapshots, the window's
/// display name. Per-app monitoring
/// overrides come from the settings file; unknown apps are monitored
/// only when explicitly enabled.
pub struct JsonAppCatalog {
    by_exec_name: HashMap<String, AppMetadata>,
    monitored_overrides: HashMap<String, bool>,
    excluded_ids: Vec<String>,
}

impl JsonAppCatalog {
    /// Load the catalog from `path`, falling back to an empty catalog
    /// when the file is missing or malformed.
    pub fn load(path: &Path, monitored_overrides: HashMap<String, bool>) -> Self {
        let entries: Vec<CatalogEntry> = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "malformed app catalog");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        Self::from_entries(entries, monitored_overrides)
    }

    fn from_entries(
        entries: Vec<CatalogEntry>,
        monitored_overrides: HashMap<String, bool>,
    ) -> Self {
        let mut by_exec_name = HashMap::new();
        for entry in entries {
            for exec in &entry.exec_names {
                by_exec_name.insert(exec.to_lowercase(), entry.app.clone());
            }
        }
        Self {
            by_exec_name,
            monitored_overrides,
            excluded_ids: Vec::new(),
        }
    }

    /// Default catalog location next to the settings file.
    pub fn default_path() -> PathBuf {
        crate::config::config_dir().join("apps.json")
    }

    fn exec_name(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase()
    }
}

impl AppCatalog for JsonAppCatalog {
    fn get_app(&self, path: &Path) -> Option<AppMetadata> {
        self.by_exec_name.get(&Self::exec_name(path)).cloned()
    }

    fn is_monitored(&self, path: &Path) -> bool {
        let app = self.get_app(path);
        let key = app
            .as_ref()
            .map(|a| a.id.clone())
            .unwrap_or_else(|| Self::exec_name(path));
        if let Some(&enabled) = self.monitored_overrides.get(&key) {
            return enabled;
        }
        app.map(|a| a.is_default_enabled).unwrap_or(false)
    }

    fn is_excluded(&self, app: &AppMetadata) -> bool {
        self.excluded_ids.iter().any(|id| id == &app.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> JsonAppCatalog {
        let entries = vec![
            CatalogEntry {
                app: AppMetadata {
                    id: "chrome".to_string(),
                    name: "Google Chrome".to_string(),
                    version: Some("126.0".to_string()),
                    is_browser: true,
                    is_default_enabled: true,
                    is_electron: false,
                },
                exec_names: vec![
                    "chrome".to_string(),
                    "google-chrome".to_string(),
                    "google chrome".to_string(),
                ],
            },
            CatalogEntry {
                app: AppMetadata {
                    id: "figma".to_string(),
                    name: "Figma".to_string(),
                    version: None,
                    is_browser: false,
                    is_default_enabled: false,
                    is_electron: true,
                },
                exec_names: vec!["figma".to_string()],
            },
        ];
        let mut overrides = HashMap::new();
        overrides.insert("figma".to_string(), true);
        JsonAppCatalog::from_entries(entries, overrides)
    }

    #[test]
    fn test_lookup_by_exec_name() {
        let catalog = catalog();
        let app = catalog.get_app(Path::new("/opt/google/chrome/google-chrome"));
        assert_eq!(app.map(|a| a.id), Some("chrome".to_string()));
        assert!(catalog.get_app(Path::new("/usr/bin/unknown")).is_none());
    }

    #[test]
    fn test_lookup_by_display_name_key() {
        // Snapshots without a resolved executable path use the display
        // name as the lookup key; entries list those names alongside
        // executable names.
        let catalog = catalog();
        let app = catalog.get_app(Path::new("Google Chrome"));
        assert_eq!(app.map(|a| a.id), Some("chrome".to_string()));
        assert!(catalog.is_monitored(Path::new("Google Chrome")));
    }

    #[test]
    fn test_monitoring_defaults_and_overrides() {
        let catalog = catalog();
        // Default-enabled app without an override.
        assert!(catalog.is_monitored(Path::new("/usr/bin/chrome")));
        // Default-off app with an explicit enable.
        assert!(catalog.is_monitored(Path::new("/usr/bin/figma")));
        // Unknown app: monitored only when explicitly enabled.
        assert!(!catalog.is_monitored(Path::new("/usr/bin/unknown")));
    }
}
