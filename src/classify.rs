//! Activity classification.
//!
//! A pure mapping from a window snapshot (plus optional catalog
//! metadata) to a semantic activity record: what entity, what category,
//! what language, what project. No side effects, no state; every
//! metadata lookup tolerates absence.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{AppMetadata, UrlFilter};
use crate::config::EntityPreference;
use crate::observer::WindowSnapshot;

/// Fixed activity categories understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Browsing,
    Communicating,
    Coding,
    Debugging,
    WritingDocs,
    Designing,
    Meeting,
}

impl Category {
    /// Collector wire name for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Browsing => "browsing",
            Category::Communicating => "communicating",
            Category::Coding => "coding",
            Category::Debugging => "debugging",
            Category::WritingDocs => "writing docs",
            Category::Designing => "designing",
            Category::Meeting => "meeting",
        }
    }
}

/// A semantic activity record derived from one snapshot. Ephemeral;
/// never persisted by this core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    /// What the user is acting on: file path, URL, domain, or document
    /// title. Never empty.
    pub entity: String,
    pub category: Option<Category>,
    pub language: Option<String>,
    pub project: Option<String>,
}

/// Catalog ids whose entity detection is explicitly unsupported
/// (document/design/camera-canvas tools whose windows carry no usable
/// entity).
const ENTITY_UNSUPPORTED: &[&str] = &["canva", "obs", "preview"];

/// Catalog ids whose titles are semantically meaningless and must never
/// become entities (browsers, notes apps, IDE, terminal-class apps).
const TITLE_BLOCKED: &[&str] = &[
    "chrome",
    "firefox",
    "safari",
    "edge",
    "brave",
    "arc",
    "notes",
    "vscode",
    "intellij",
    "terminal",
    "iterm2",
    "hyper",
    "alacritty",
];

/// Apps whose title leads with the document name before " - ", with the
/// app's own default window title acting as a placeholder that must not
/// be reported. Placeholder comparison is case-sensitive and exact.
const SPLIT_TITLE_APPS: &[(&str, &str)] = &[
    ("figma", "Untitled"),
    ("terminus", "Terminus"),
    ("postman", "Untitled Request"),
];

/// Classify one snapshot. Returns `None` when the sample carries no
/// reportable entity.
pub fn classify(
    snapshot: &WindowSnapshot,
    metadata: Option<&AppMetadata>,
    preference: EntityPreference,
    filter: &dyn UrlFilter,
) -> Option<ActivityRecord> {
    let entity = entity(snapshot, metadata, preference, filter)?;
    if entity.is_empty() {
        return None;
    }
    Some(ActivityRecord {
        entity,
        category: metadata.and_then(|m| category(&m.id)),
        language: metadata.and_then(|m| language(&m.id)),
        project: snapshot.url.as_deref().and_then(project),
    })
}

/// Category for a catalog id, or `None` for unknown apps.
pub fn category(catalog_id: &str) -> Option<Category> {
    let category = match catalog_id {
        "chrome" | "firefox" | "safari" | "edge" | "brave" | "arc" => Category::Browsing,
        "slack" | "discord" | "teams" | "whatsapp" | "telegram" => Category::Communicating,
        "vscode" | "intellij" | "sublime" | "xcode" | "terminal" | "iterm2" => Category::Coding,
        "postman" | "insomnia" => Category::Debugging,
        "notion" | "obsidian" | "evernote" | "microsoft-word" => Category::WritingDocs,
        "figma" | "sketch" | "canva" | "adobe-xd" => Category::Designing,
        "zoom" | "webex" | "skype" | "google-meet" => Category::Meeting,
        _ => return None,
    };
    Some(category)
}

/// Language hint for a catalog id, or `None`.
pub fn language(catalog_id: &str) -> Option<String> {
    let language = match catalog_id {
        "postman" | "insomnia" => "HTTP Request",
        "figma" | "canva" => "Image (svg)",
        "sketch" => "Image (sketch)",
        _ => return None,
    };
    Some(language.to_string())
}

// Code-hosting "owner/repo" shapes plus CI providers that nest the
// hosting provider inside the path. First match wins; the capture is
// the repository name.
static PROJECT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^https?://(?:www\.)?github\.com/[^/]+/([^/?#]+)",
        r"^https?://(?:www\.)?gitlab\.com/[^/]+/([^/?#]+)",
        r"^https?://(?:www\.)?bitbucket\.org/[^/]+/([^/?#]+)",
        r"^https?://app\.circleci\.com/pipelines/(?:github|gitlab|bitbucket)/[^/]+/([^/?#]+)",
        r"^https?://(?:app\.)?travis-ci\.com/(?:github|gitlab|bitbucket)/[^/]+/([^/?#]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static project pattern"))
    .collect()
});

/// Project name extracted from a URL, or `None` when no pattern matches.
pub fn project(url: &str) -> Option<String> {
    for pattern in PROJECT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

fn entity(
    snapshot: &WindowSnapshot,
    metadata: Option<&AppMetadata>,
    preference: EntityPreference,
    filter: &dyn UrlFilter,
) -> Option<String> {
    if metadata.map(|m| m.is_browser).unwrap_or(false) {
        // Browsers report the URL or nothing; titles are never a
        // fallback for them.
        let url = snapshot.url.as_deref()?;
        if !filter.is_allowed(url) {
            return None;
        }
        return match preference {
            EntityPreference::FullUrl => Some(url.to_string()),
            EntityPreference::Domain => domain(url),
        };
    }

    if let Some(meta) = metadata {
        if ENTITY_UNSUPPORTED.contains(&meta.id.as_str()) {
            return None;
        }
    }

    title(snapshot, metadata)
}

fn title(snapshot: &WindowSnapshot, metadata: Option<&AppMetadata>) -> Option<String> {
    if let Some(meta) = metadata {
        if TITLE_BLOCKED.contains(&meta.id.as_str()) {
            return None;
        }
        if let Some((_, placeholder)) = SPLIT_TITLE_APPS
            .iter()
            .find(|(id, _)| *id == meta.id.as_str())
        {
            let leading = leading_segment(&snapshot.title);
            if leading.is_empty() || leading == *placeholder {
                return None;
            }
            return Some(leading.to_string());
        }
    }

    if snapshot.title.is_empty() {
        let name = snapshot.app_name();
        if name.is_empty() {
            return None;
        }
        return Some(name.to_string());
    }

    let leading = leading_segment(&snapshot.title);
    if leading.is_empty() {
        return None;
    }
    Some(leading.to_string())
}

/// Segment before the FIRST " - " occurrence (not the last).
fn leading_segment(title: &str) -> &str {
    match title.split_once(" - ") {
        Some((leading, _)) => leading,
        None => title,
    }
}

/// Host of a URL: leading "www." stripped, port kept only when it is
/// not the scheme default.
fn domain(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (host, Some(port))
        }
        _ => (authority, None),
    };

    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return None;
    }

    let default_port = match scheme {
        "http" => Some("80"),
        "https" => Some("443"),
        _ => None,
    };
    match port {
        Some(port) if default_port != Some(port) => Some(format!("{host}:{port}")),
        _ => Some(host.to_string()),
    }
}
