//! Language and keyboard layout catalogs.
//!
//! Both are scanned once and cached. Languages come from `locale -a`;
//! layouts from the evdev rules registry shipped with the X keyboard
//! configuration database.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

const EVDEV_RULES_FILE: &str = "/usr/share/X11/xkb/rules/evdev.lst";

// =============================================================================
// Languages
// =============================================================================

/// One installed locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    /// Locale code, e.g. `en_US.utf8`.
    pub code: String,
}

impl Language {
    /// The territory-free language part of the code (`en` from `en_US.utf8`).
    pub fn language(&self) -> &str {
        let end = self
            .code
            .find(|c| c == '_' || c == '.' || c == '@')
            .unwrap_or(self.code.len());
        &self.code[..end]
    }

    /// The territory part, when the code carries one (`US` from `en_US.utf8`).
    pub fn territory(&self) -> Option<&str> {
        let start = self.code.find('_')? + 1;
        let rest = &self.code[start..];
        let end = rest.find(|c| c == '.' || c == '@').unwrap_or(rest.len());
        if end == 0 {
            None
        } else {
            Some(&rest[..end])
        }
    }
}

/// Lazily-enumerated installed locales.
#[derive(Debug, Default)]
pub struct LanguageCatalog {
    languages: Option<Vec<Language>>,
}

impl LanguageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All installed locales, enumerating on first call.
    pub fn languages(&mut self) -> &[Language] {
        if self.languages.is_none() {
            let output = Command::new("locale").arg("-a").output();
            let languages = match output {
                Ok(output) => parse_locale_output(&output.stdout),
                Err(err) => {
                    warn!(%err, "failed to enumerate locales");
                    Vec::new()
                }
            };
            debug!(count = languages.len(), "enumerated installed locales");
            self.languages = Some(languages);
        }
        self.languages.as_deref().unwrap_or_default()
    }
}

fn parse_locale_output(stdout: &[u8]) -> Vec<Language> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "C" && *line != "POSIX")
        .filter(|line| !line.starts_with("C."))
        .map(|line| Language { code: line.to_string() })
        .collect()
}

// =============================================================================
// Keyboard layouts
// =============================================================================

/// One selectable keyboard layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Layout name as configured, e.g. `us`.
    pub name: String,
    /// Human description, e.g. `English (US)`.
    pub description: String,
}

impl Layout {
    /// Short label for constrained UI. Same as the name.
    pub fn short_description(&self) -> &str {
        &self.name
    }
}

/// Lazily-parsed keyboard layout registry.
#[derive(Debug)]
pub struct LayoutCatalog {
    rules_path: PathBuf,
    layouts: Option<Vec<Layout>>,
}

impl Default for LayoutCatalog {
    fn default() -> Self {
        Self::with_path(EVDEV_RULES_FILE)
    }
}

impl LayoutCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            rules_path: path.into(),
            layouts: None,
        }
    }

    /// All registered layouts, parsing the rules file on first call.
    pub fn layouts(&mut self) -> &[Layout] {
        if self.layouts.is_none() {
            let layouts = match std::fs::read_to_string(&self.rules_path) {
                Ok(text) => parse_layout_rules(&text),
                Err(err) => {
                    warn!(path = %self.rules_path.display(), %err,
                        "failed to read keyboard layout registry");
                    Vec::new()
                }
            };
            debug!(count = layouts.len(), "parsed keyboard layouts");
            self.layouts = Some(layouts);
        }
        self.layouts.as_deref().unwrap_or_default()
    }

    pub fn layout_by_name(&mut self, name: &str) -> Option<Layout> {
        self.layouts().iter().find(|l| l.name == name).cloned()
    }
}

/// Parse the `! layout` section of an xkb rules listing.
///
/// Section lines are `  name  description`; a subsequent `!` header ends
/// the section.
fn parse_layout_rules(text: &str) -> Vec<Layout> {
    let mut layouts = Vec::new();
    let mut in_section = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('!') {
            in_section = trimmed == "! layout";
            continue;
        }
        if !in_section || trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let name = match parts.next() {
            Some(name) => name,
            None => continue,
        };
        let description = parts.next().map(str::trim).unwrap_or(name);
        layouts.push(Layout {
            name: name.to_string(),
            description: description.to_string(),
        });
    }
    layouts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn locale_output_parses_and_filters() {
        let stdout = b"C\nC.utf8\nPOSIX\nen_US.utf8\nde_DE.utf8\n\n";
        let langs = parse_locale_output(stdout);
        let codes: Vec<&str> = langs.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["en_US.utf8", "de_DE.utf8"]);
    }

    #[test]
    fn language_code_splits_into_parts() {
        let lang = Language { code: "en_US.utf8".into() };
        assert_eq!(lang.language(), "en");
        assert_eq!(lang.territory(), Some("US"));

        let bare = Language { code: "fr".into() };
        assert_eq!(bare.language(), "fr");
        assert_eq!(bare.territory(), None);
    }

    const RULES: &str = "\
! model
  pc105           Generic 105-key PC

! layout
  us              English (US)
  de              German
  fr              French

! variant
  intl            us: English (US, intl.)
";

    #[test]
    fn layout_section_parses() {
        let layouts = parse_layout_rules(RULES);
        assert_eq!(layouts.len(), 3);
        assert_eq!(layouts[0].name, "us");
        assert_eq!(layouts[0].description, "English (US)");
        assert_eq!(layouts[0].short_description(), "us");
        assert_eq!(layouts[2].name, "fr");
    }

    #[test]
    fn catalog_reads_rules_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evdev.lst");
        std::fs::write(&path, RULES).unwrap();

        let mut catalog = LayoutCatalog::with_path(path);
        assert_eq!(catalog.layouts().len(), 3);
        assert_eq!(catalog.layout_by_name("de").unwrap().description, "German");
    }

    #[test]
    fn missing_rules_file_yields_empty_catalog() {
        let mut catalog = LayoutCatalog::with_path("/no/such/rules.lst");
        assert!(catalog.layouts().is_empty());
    }
}
