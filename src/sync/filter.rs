use std::path::Path;

use regex::RegexSet;

use crate::error::ConfigError;

/// Decides which paths under a plugin root are worth syncing.
///
/// Ignore patterns are matched against every component of the relative
/// path, so `node_modules` excludes the whole subtree. Extensions are
/// matched against the file name only.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    include: RegexSet,
    ignore: RegexSet,
}

impl WatchFilter {
    pub fn new<E, I>(extensions: &[E], ignore_patterns: &[I]) -> Result<Self, ConfigError>
    where
        E: AsRef<str>,
        I: AsRef<str>,
    {
        let include = RegexSet::new(extensions.iter().map(|ext| {
            format!(
                r"^.+\.{}$",
                regex::escape(ext.as_ref().trim_start_matches("*.").trim_start_matches('.'))
            )
        }))
        .map_err(|e| ConfigError::InvalidValue {
            key: "watch_extensions".to_string(),
            message: e.to_string(),
        })?;

        let ignore = RegexSet::new(ignore_patterns.iter().map(|p| glob_to_regex(p.as_ref())))
            .map_err(|e| ConfigError::InvalidValue {
                key: "ignore_patterns".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { include, ignore })
    }

    /// `rel` is relative to the plugin root.
    pub fn matches(&self, rel: &Path) -> bool {
        if self.is_ignored(rel) {
            return false;
        }

        rel.file_name()
            .is_some_and(|name| self.include.is_match(&name.to_string_lossy()))
    }
}

impl WatchFilter {
    /// True when any component of `rel` matches an ignore pattern. The
    /// extension allowlist is not consulted.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        rel.components()
            .any(|c| self.ignore.is_match(&c.as_os_str().to_string_lossy()))
    }
}

/// Translate a single-component glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
