//! Minimal desktop-style key-file reader.
//!
//! Covers the subset both users.conf and desktop entries need: `[Group]`
//! headers, `key=value` lines, `#`/`;` comments. Localized keys like
//! `Name[fr]` are stored under their full key and ignored by plain
//! lookups. Nothing here escapes or writes.

use std::collections::HashMap;
use std::path::Path;

use dmgreet_core::error::{Error, Result};

#[derive(Debug, Default)]
pub struct KeyFile {
    groups: HashMap<String, HashMap<String, String>>,
}

impl KeyFile {
    /// Load and parse a key file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse key-file text. Malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut groups: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_string();
                groups.entry(current.clone()).or_default();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                groups
                    .entry(current.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { groups }
    }

    /// Raw string value for `key` in `group`.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups.get(group)?.get(key).map(String::as_str)
    }

    /// Integer value, `None` when absent or unparseable.
    pub fn get_integer(&self, group: &str, key: &str) -> Option<i64> {
        self.get(group, key)?.parse().ok()
    }

    /// Boolean value; only the literal "true" is true.
    pub fn get_bool(&self, group: &str, key: &str) -> bool {
        self.get(group, key) == Some("true")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# users.conf sample
[UserAccounts]
minimum-uid=1000
hidden-users=nobody sync
; trailing comment
hidden-shells=/bin/false

[Other]
minimum-uid=9
";

    #[test]
    fn parses_groups_and_keys() {
        let kf = KeyFile::parse(SAMPLE);
        assert_eq!(kf.get("UserAccounts", "minimum-uid"), Some("1000"));
        assert_eq!(kf.get("UserAccounts", "hidden-users"), Some("nobody sync"));
        assert_eq!(kf.get("Other", "minimum-uid"), Some("9"));
        assert_eq!(kf.get("UserAccounts", "absent"), None);
        assert_eq!(kf.get("NoSuchGroup", "minimum-uid"), None);
    }

    #[test]
    fn integer_and_bool_helpers() {
        let kf = KeyFile::parse("[G]\nn=42\nbad=x\nflag=true\noff=True\n");
        assert_eq!(kf.get_integer("G", "n"), Some(42));
        assert_eq!(kf.get_integer("G", "bad"), None);
        assert!(kf.get_bool("G", "flag"));
        assert!(!kf.get_bool("G", "off"));
    }

    #[test]
    fn values_may_contain_equals() {
        let kf = KeyFile::parse("[G]\nexec=cmd --opt=1\n");
        assert_eq!(kf.get("G", "exec"), Some("cmd --opt=1"));
    }

    #[test]
    fn keys_before_any_group_are_reachable_under_empty_group() {
        let kf = KeyFile::parse("stray=1\n[G]\nk=2\n");
        assert_eq!(kf.get("", "stray"), Some("1"));
    }
}
