//! Best-effort source transformations applied to included files
//!
//! Every transformation works on a lexical view of the text (see [`lexer`])
//! selected by a [`Language`] hint. Nothing here is fatal: an unknown
//! language leaves the text untouched and a lexer failure returns the
//! original text together with the reason.

pub mod comments;
pub mod docstrings;
pub mod functions;
pub mod language;
pub mod lexer;

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use language::{BlockStyle, Language, LexicalRules};

use crate::error::TransformError;

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Transform flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Remove comments
    pub strip_comments: bool,
    /// Remove docstrings
    pub strip_docstrings: bool,
    /// Keep only signatures (and docstrings) of functions
    pub strip_function_bodies: bool,
    /// Names of functions/methods to remove entirely
    pub removed_functions: BTreeSet<String>,
    /// Collapse runs of blank lines into one
    pub collapse_blank_lines: bool,
}

impl TransformOptions {
    /// True when no transformation would run
    pub fn is_noop(&self) -> bool {
        !self.strip_comments
            && !self.strip_docstrings
            && !self.strip_function_bodies
            && self.removed_functions.is_empty()
            && !self.collapse_blank_lines
    }
}

/// What a transformation removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalKind {
    Comment,
    Docstring,
    Function(String),
    FunctionBody(String),
}

impl fmt::Display for RemovalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comment => write!(f, "comment"),
            Self::Docstring => write!(f, "docstring"),
            Self::Function(name) => write!(f, "function `{name}`"),
            Self::FunctionBody(name) => write!(f, "body of `{name}`"),
        }
    }
}

/// A single removal, with the line it started on at the time it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub kind: RemovalKind,
    pub line: usize,
}

/// Output of [`transform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Transformed text (the original text on fallback)
    pub text: String,
    /// Everything removed, in the order the passes ran
    pub removed: Vec<Removal>,
    /// Why the transformation fell back to the original text
    pub fallback: Option<TransformError>,
}

impl TransformResult {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            removed: Vec::new(),
            fallback: None,
        }
    }
}

/// A byte-range replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn remove(range: Range<usize>) -> Self {
        Self {
            range,
            replacement: String::new(),
        }
    }
}

/// Apply non-overlapping edits; overlapping ones after the first are dropped
pub(crate) fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.range.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.range.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..edit.range.start]);
        out.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Apply the requested transformations to `text`.
///
/// Passes run in order: named function removal, body stripping, docstring
/// stripping, comment stripping, blank line collapsing.
pub fn transform(
    text: &str,
    language: Option<Language>,
    options: &TransformOptions,
) -> TransformResult {
    let Some(language) = language else {
        return TransformResult::unchanged(text);
    };
    if options.is_noop() {
        return TransformResult::unchanged(text);
    }

    match run_passes(text, &language.rules(), options) {
        Ok((text, removed)) => TransformResult {
            text,
            removed,
            fallback: None,
        },
        Err(err) => {
            log::debug!("transform fell back to original text: {}", err);
            TransformResult {
                text: text.to_string(),
                removed: Vec::new(),
                fallback: Some(err),
            }
        }
    }
}

fn run_passes(
    text: &str,
    rules: &LexicalRules,
    options: &TransformOptions,
) -> Result<(String, Vec<Removal>), TransformError> {
    let mut current = text.to_string();
    let mut removed = Vec::new();

    if !options.removed_functions.is_empty() {
        let (next, mut r) = functions::remove_functions(&current, rules, &options.removed_functions)?;
        current = next;
        removed.append(&mut r);
    }
    if options.strip_function_bodies {
        let (next, mut r) = functions::strip_function_bodies(&current, rules)?;
        current = next;
        removed.append(&mut r);
    }
    if options.strip_docstrings {
        let (next, mut r) = docstrings::strip_docstrings(&current, rules)?;
        current = next;
        removed.append(&mut r);
    }
    if options.strip_comments {
        let (next, mut r) = comments::strip_comments(&current, rules)?;
        current = next;
        removed.append(&mut r);
    }
    if options.collapse_blank_lines {
        current = BLANK_RUNS.replace_all(&current, "\n\n").into_owned();
    }

    Ok((current, removed))
}
