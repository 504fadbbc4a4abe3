//! Server-supplied configuration hints.
//!
//! Hints arrive once, as name/value pairs trailing the CONNECTED
//! handshake, and are read-only afterward. There is no re-negotiation:
//! a second CONNECTED would be a daemon bug and its hints are ignored.

use std::collections::HashMap;

use tracing::warn;

/// Read-only hint store populated from the CONNECTED handshake.
#[derive(Debug, Default)]
pub struct Hints {
    map: HashMap<String, String>,
    populated: bool,
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from the handshake pairs. Only the first call has effect.
    pub(crate) fn populate(&mut self, pairs: Vec<(String, String)>) {
        if self.populated {
            warn!("ignoring repeated hint population; hints are immutable after connect");
            return;
        }
        for (name, value) in pairs {
            self.map.insert(name, value);
        }
        self.populated = true;
    }

    /// Raw hint value, if the daemon supplied one.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// String hint; missing keys read as "".
    pub fn string(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Boolean hint; true only for the exact lowercase literal "true".
    pub fn boolean(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }

    /// Non-negative integer hint; parse failures and negatives read as 0.
    pub fn integer(&self, name: &str) -> u32 {
        match self.get(name) {
            Some(value) => value.parse::<i64>().unwrap_or(0).clamp(0, u32::MAX as i64) as u32,
            None => 0,
        }
    }

    // =========================================================================
    // Known hints
    // =========================================================================

    /// Session to preselect in the session chooser.
    pub fn default_session(&self) -> &str {
        self.string("default-session")
    }

    /// True when the available user list should not be shown.
    pub fn hide_users(&self) -> bool {
        self.boolean("hide-users")
    }

    /// True when the daemon offers a guest session.
    pub fn has_guest_account(&self) -> bool {
        self.boolean("has-guest-account")
    }

    /// User to preselect, if any.
    pub fn select_user(&self) -> &str {
        self.string("select-user")
    }

    /// True when the guest account should be preselected.
    pub fn select_guest(&self) -> bool {
        self.boolean("select-guest")
    }

    /// User the autologin timer logs in.
    pub fn autologin_user(&self) -> &str {
        self.string("autologin-user")
    }

    /// True when the autologin timer logs into the guest account.
    pub fn autologin_guest(&self) -> bool {
        self.boolean("autologin-guest")
    }

    /// Seconds before the autologin timer fires, 0 for no timer.
    pub fn autologin_timeout(&self) -> u32 {
        self.integer("autologin-timeout")
    }
}

// =============================================================================
// Tests
// =============================================================================
