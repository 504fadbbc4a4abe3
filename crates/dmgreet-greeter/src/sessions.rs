//! Installed session catalog.
//!
//! Scans the desktop-entry directories for session files once and caches
//! the result. Each `*.desktop` file becomes one selectable session keyed
//! by its file stem.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::keyfile::KeyFile;

const SESSION_DIRS: &[&str] = &["/usr/share/xsessions", "/usr/share/wayland-sessions"];

/// One installed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Stable key passed to session start; the desktop file's stem.
    pub key: String,
    pub name: String,
    pub comment: Option<String>,
}

/// Lazily-scanned list of installed sessions.
#[derive(Debug, Default)]
pub struct SessionCatalog {
    dirs: Vec<PathBuf>,
    sessions: Option<Vec<Session>>,
}

impl SessionCatalog {
    pub fn new() -> Self {
        Self {
            dirs: SESSION_DIRS.iter().map(PathBuf::from).collect(),
            sessions: None,
        }
    }

    /// Catalog over a non-default directory set (tests, prefixes).
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs, sessions: None }
    }

    /// All selectable sessions, scanning on first call.
    pub fn sessions(&mut self) -> &[Session] {
        if self.sessions.is_none() {
            let mut found = Vec::new();
            for dir in &self.dirs {
                scan_dir(dir, &mut found);
            }
            found.sort_by(|a, b| a.key.cmp(&b.key));
            debug!(count = found.len(), "scanned installed sessions");
            self.sessions = Some(found);
        }
        self.sessions.as_deref().unwrap_or_default()
    }

    pub fn session_by_key(&mut self, key: &str) -> Option<Session> {
        self.sessions().iter().find(|s| s.key == key).cloned()
    }
}

fn scan_dir(dir: &Path, out: &mut Vec<Session>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), %err, "skipping session directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
            continue;
        }
        if let Some(session) = load_session(&path) {
            // First directory wins on duplicate keys.
            if !out.iter().any(|s| s.key == session.key) {
                out.push(session);
            }
        }
    }
}

fn load_session(path: &Path) -> Option<Session> {
    let keyfile = match KeyFile::load(path) {
        Ok(kf) => kf,
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable session file");
            return None;
        }
    };

    if keyfile.get_bool("Desktop Entry", "NoDisplay") {
        return None;
    }

    let key = path.file_stem()?.to_str()?.to_string();
    let name = match keyfile.get("Desktop Entry", "Name") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            warn!(path = %path.display(), "session file has no Name");
            return None;
        }
    };

    Some(Session {
        key,
        name,
        comment: keyfile
            .get("Desktop Entry", "Comment")
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    })
}
