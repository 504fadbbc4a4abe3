//! User directory synchronization.
//!
//! Reconciles the system account database against a cached snapshot,
//! emitting ordered add/change/remove notifications. The cached list is
//! shared by handle with the UI layer: updates happen in place so handles
//! held across a resync stay valid and observe the new field values.
//!
//! Baseline rule: the very first load establishes the snapshot silently;
//! only subsequent reloads (triggered by the account-database watch)
//! produce notifications.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::keyfile::KeyFile;

/// Default account database.
const PASSWD_FILE: &str = "/etc/passwd";
/// Greeter-visible account filter configuration.
const USER_CONFIG_FILE: &str = "/etc/lightdm/users.conf";

// =============================================================================
// User records
// =============================================================================

/// Observable fields of one loggable account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Account name; the identity key, never changes for a given handle.
    pub name: String,
    /// Human name from the first GECOS field, when present.
    pub real_name: Option<String>,
    pub home_directory: PathBuf,
    /// `file://` URI of the account's avatar image, when one exists.
    pub avatar_uri: Option<String>,
    pub logged_in: bool,
}

impl User {
    /// Name shown in user choosers: real name, falling back to the
    /// account name.
    pub fn display_name(&self) -> &str {
        self.real_name.as_deref().unwrap_or(&self.name)
    }
}

/// Shared, identity-preserving reference to a user record.
///
/// Cloning the handle shares the record; a directory resync updates the
/// record in place, so every clone observes the change.
#[derive(Debug, Clone)]
pub struct UserHandle(Arc<RwLock<User>>);

impl UserHandle {
    fn new(user: User) -> Self {
        Self(Arc::new(RwLock::new(user)))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, User> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn real_name(&self) -> Option<String> {
        self.read().real_name.clone()
    }

    pub fn display_name(&self) -> String {
        self.read().display_name().to_string()
    }

    pub fn home_directory(&self) -> PathBuf {
        self.read().home_directory.clone()
    }

    pub fn avatar_uri(&self) -> Option<String> {
        self.read().avatar_uri.clone()
    }

    pub fn logged_in(&self) -> bool {
        self.read().logged_in
    }

    /// Replace the record's mutable fields. Returns true if anything
    /// observable changed. The name is the identity and is untouched.
    fn update(&self, fresh: &User) -> bool {
        let mut current = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let changed = current.real_name != fresh.real_name
            || current.home_directory != fresh.home_directory
            || current.avatar_uri != fresh.avatar_uri
            || current.logged_in != fresh.logged_in;
        if changed {
            current.real_name = fresh.real_name.clone();
            current.home_directory = fresh.home_directory.clone();
            current.avatar_uri = fresh.avatar_uri.clone();
            current.logged_in = fresh.logged_in;
        }
        changed
    }
}

/// One notification produced by a directory resync.
#[derive(Debug, Clone)]
pub enum UserChange {
    Added(UserHandle),
    Changed(UserHandle),
    Removed(UserHandle),
}

// =============================================================================
// Filter configuration
// =============================================================================

/// Account visibility filter from users.conf.
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub minimum_uid: u32,
    pub hidden_users: Vec<String>,
    pub hidden_shells: Vec<String>,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            minimum_uid: 500,
            hidden_users: split_list("nobody nobody4 noaccess"),
            hidden_shells: split_list("/bin/false /usr/sbin/nologin"),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl UserFilter {
    /// Load from a users.conf key file, falling back to defaults on any
    /// read failure (a missing file is the common case, not an error).
    pub fn from_config(path: &Path) -> Self {
        let defaults = Self::default();
        let keyfile = match KeyFile::load(path) {
            Ok(kf) => kf,
            Err(err) => {
                debug!(path = %path.display(), %err, "using default user filters");
                return defaults;
            }
        };

        Self {
            minimum_uid: keyfile
                .get_integer("UserAccounts", "minimum-uid")
                .map(|v| v.max(0) as u32)
                .unwrap_or(defaults.minimum_uid),
            hidden_users: keyfile
                .get("UserAccounts", "hidden-users")
                .map(split_list)
                .unwrap_or(defaults.hidden_users),
            hidden_shells: keyfile
                .get("UserAccounts", "hidden-shells")
                .map(split_list)
                .unwrap_or(defaults.hidden_shells),
        }
    }

    fn hides(&self, name: &str, uid: u32, shell: &str) -> bool {
        uid < self.minimum_uid
            || self.hidden_shells.iter().any(|s| s == shell)
            || self.hidden_users.iter().any(|u| u == name)
    }
}

// =============================================================================
// Account database parsing
// =============================================================================

fn parse_passwd(path: &Path, filter: &UserFilter) -> Vec<User> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read account database");
            return Vec::new();
        }
    };

    let mut users = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // name:passwd:uid:gid:gecos:home:shell
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            continue;
        }
        let name = fields[0];
        let uid: u32 = match fields[2].parse() {
            Ok(uid) => uid,
            Err(_) => continue,
        };
        let gecos = fields[4];
        let home = fields[5];
        let shell = fields[6];

        if filter.hides(name, uid, shell) {
            continue;
        }

        let real_name = match gecos.split(',').next() {
            Some(first) if !first.is_empty() => Some(first.to_string()),
            _ => None,
        };

        users.push(User {
            name: name.to_string(),
            real_name,
            home_directory: PathBuf::from(home),
            avatar_uri: avatar_for_home(Path::new(home)),
            logged_in: false,
        });
    }
    users
}

/// Resolve the account avatar: `.face`, then `.face.icon`, first hit wins.
fn avatar_for_home(home: &Path) -> Option<String> {
    for candidate in [".face", ".face.icon"] {
        let path = home.join(candidate);
        if path.exists() {
            return Some(format!("file://{}", path.display()));
        }
    }
    None
}

// =============================================================================
// Directory
// =============================================================================

/// Cached, change-notified view of loggable accounts.
pub struct UserDirectory {
    passwd_path: PathBuf,
    config_path: PathBuf,
    users: Vec<UserHandle>,
    loaded: bool,
    watcher: Option<RecommendedWatcher>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::with_paths(PASSWD_FILE, USER_CONFIG_FILE)
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("passwd_path", &self.passwd_path)
            .field("users", &self.users.len())
            .field("loaded", &self.loaded)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory over non-default database/config paths (tests, chroots).
    pub fn with_paths(passwd: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            passwd_path: passwd.into(),
            config_path: config.into(),
            users: Vec::new(),
            loaded: false,
            watcher: None,
        }
    }

    /// The current user list, loading the baseline on first access.
    /// Sorted by display name; read-only to callers.
    pub fn users(&mut self) -> &[UserHandle] {
        self.ensure_loaded();
        &self.users
    }

    pub fn user_by_name(&mut self, name: &str) -> Option<UserHandle> {
        self.ensure_loaded();
        self.users.iter().find(|u| u.read().name == name).cloned()
    }

    pub fn len(&mut self) -> usize {
        self.ensure_loaded();
        self.users.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    fn ensure_loaded(&mut self) {
        if !self.loaded {
            let silent = self.reload();
            debug_assert!(silent.is_empty());
        }
    }

    /// Reload the account database and diff against the cached snapshot.
    ///
    /// Returns the notifications to deliver, ordered additions first
    /// (display-name order), then changes (same order), then removals
    /// (prior-list order). Additions and changes come before removals so
    /// consumers never see an account vanish that was simultaneously
    /// re-added under another identity. The first call is the baseline
    /// and returns nothing.
    pub fn reload(&mut self) -> Vec<UserChange> {
        let filter = UserFilter::from_config(&self.config_path);
        let fresh = parse_passwd(&self.passwd_path, &filter);
        let first_load = !self.loaded;

        let mut next: Vec<UserHandle> = Vec::with_capacity(fresh.len());
        let mut added: Vec<UserHandle> = Vec::new();
        let mut changed: Vec<UserHandle> = Vec::new();

        for candidate in fresh {
            match self
                .users
                .iter()
                .find(|u| u.read().name == candidate.name)
            {
                Some(existing) => {
                    if existing.update(&candidate) {
                        changed.push(existing.clone());
                    }
                    next.push(existing.clone());
                }
                None => {
                    let handle = UserHandle::new(candidate);
                    if !first_load {
                        added.push(handle.clone());
                    }
                    next.push(handle);
                }
            }
        }

        sort_by_display_name(&mut next);
        sort_by_display_name(&mut added);
        sort_by_display_name(&mut changed);

        // Prior-list order for removals.
        let removed: Vec<UserHandle> = self
            .users
            .iter()
            .filter(|old| {
                let name = old.read().name.clone();
                !next.iter().any(|n| n.read().name == name)
            })
            .cloned()
            .collect();

        self.users = next;
        self.loaded = true;

        let mut changes = Vec::with_capacity(added.len() + changed.len() + removed.len());
        for user in added {
            debug!(user = %user.name(), "user added");
            changes.push(UserChange::Added(user));
        }
        for user in changed {
            debug!(user = %user.name(), "user changed");
            changes.push(UserChange::Changed(user));
        }
        for user in removed {
            debug!(user = %user.name(), "user removed");
            changes.push(UserChange::Removed(user));
        }
        changes
    }

    /// Install the account-database watch.
    ///
    /// One watch per process lifetime; repeated calls return a fresh
    /// receiver but do not reinstall. Each change event yields one unit
    /// on the channel; the embedding loop reacts by calling
    /// [`UserDirectory::reload`].
    pub fn install_watch(&mut self) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.watcher.is_some() {
            warn!("account database watch already installed");
            return rx;
        }

        let watcher = RecommendedWatcher::new(
            move |event: notify::Result<notify::Event>| {
                if event.is_ok() {
                    let _ = tx.send(());
                }
            },
            notify::Config::default(),
        );

        match watcher {
            Ok(mut watcher) => {
                if let Err(err) = watcher.watch(&self.passwd_path, RecursiveMode::NonRecursive) {
                    warn!(path = %self.passwd_path.display(), %err,
                        "failed to watch account database");
                } else {
                    self.watcher = Some(watcher);
                }
            }
            Err(err) => warn!(%err, "failed to create account database watcher"),
        }
        rx
    }
}

fn sort_by_display_name(users: &mut [UserHandle]) {
    users.sort_by(|a, b| a.display_name().cmp(&b.display_name()));
}

// =============================================================================
// Tests
// =============================================================================
