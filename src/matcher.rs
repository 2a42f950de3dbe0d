/*!
 * Exclusion rules and path matching
 */

use std::fmt;
use std::path::{Component, Path};

use glob_match::glob_match;
use serde::{Deserialize, Serialize};

/// How a rule pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Literal comparison against the final path segment
    ExactName,
    /// Glob pattern (`*`, `**`, `?`, `[..]`, `{a,b}`)
    Glob,
}

/// A single exclusion rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// The pattern text
    pub pattern: String,
    /// Interpretation of the pattern
    pub kind: RuleKind,
}

impl Rule {
    /// Create an exact-name rule
    pub fn name(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: RuleKind::ExactName,
        }
    }

    /// Create a glob rule
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: RuleKind::Glob,
        }
    }

    /// Parse a rule from user input.
    ///
    /// `name:` and `glob:` prefixes force a kind; otherwise any glob
    /// metacharacter makes the rule a glob.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix("name:") {
            return Self::name(rest);
        }
        if let Some(rest) = input.strip_prefix("glob:") {
            return Self::glob(rest);
        }
        if input.contains(['*', '?', '[', '{']) || input.contains('/') {
            Self::glob(input)
        } else {
            Self::name(input)
        }
    }

    /// Check whether this rule matches a path (relative to the scan root)
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = final_segment(path) else {
            return false;
        };

        match self.kind {
            RuleKind::ExactName => fold(&self.pattern) == fold(&name),
            RuleKind::Glob => {
                let relative = slash_path(path);
                let pattern = fold(&self.pattern);
                if is_malformed_glob(&pattern) {
                    return pattern == fold(&name) || pattern == fold(&relative);
                }
                glob_match(&pattern, &fold(&name)) || glob_match(&pattern, &fold(&relative))
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RuleKind::ExactName => write!(f, "name:{}", self.pattern),
            RuleKind::Glob => write!(f, "glob:{}", self.pattern),
        }
    }
}

/// Returns true if any rule matches the path. Rule order is irrelevant.
pub fn should_exclude(path: &Path, rules: &[Rule]) -> bool {
    rules.iter().any(|rule| rule.matches(path))
}

/// All rules matching the path, in rule order (for diagnostics)
pub fn matching_rules<'a>(path: &Path, rules: &'a [Rule]) -> Vec<&'a Rule> {
    rules.iter().filter(|rule| rule.matches(path)).collect()
}

/// Render a relative path with `/` separators, ignoring `.` components
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn final_segment(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Unbalanced brackets or braces; glob-match would silently misbehave on these
fn is_malformed_glob(pattern: &str) -> bool {
    let mut square = 0i32;
    let mut curly = 0i32;
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => square += 1,
            ']' => square -= 1,
            '{' => curly += 1,
            '}' => curly -= 1,
            _ => {}
        }
        if square < 0 || curly < 0 || square > 1 {
            return true;
        }
    }
    square != 0 || curly != 0
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn fold(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn fold(s: &str) -> String {
    s.to_string()
}
