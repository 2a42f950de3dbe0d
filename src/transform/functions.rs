//! Locating function definitions, removing them or reducing them to skeletons

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::docstrings::{docstring_after, header_colon, leading_whitespace};
use super::language::{BlockStyle, LexicalRules};
use super::lexer::{is_ident_byte, line_end, line_of, line_start, Lexed, SegmentKind};
use super::{apply_edits, Edit, Removal, RemovalKind};
use crate::error::TransformError;

static PY_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)").expect("valid def regex")
});

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("valid identifier regex"));

/// Words that are followed by `(` without being definitions
const CONTROL_WORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "sizeof", "new", "else", "case",
    "throw", "await", "yield", "typeof", "delete", "in", "of", "do", "match", "with",
    "using", "lock", "foreach", "when", "elif",
];

/// A located function definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Definition {
    pub name: String,
    /// First byte of the first decorator line, or of the signature line
    pub start: usize,
    /// Body span to replace when producing a skeleton
    pub body: std::ops::Range<usize>,
    /// One past the end of the definition (including its newline)
    pub end: usize,
    /// Indentation of the signature line
    pub indent: String,
    /// Whether the body starts on its own line (indent languages)
    pub block_body: bool,
}

/// Remove every definition whose name is in `names`.
pub fn remove_functions(
    text: &str,
    rules: &LexicalRules,
    names: &BTreeSet<String>,
) -> Result<(String, Vec<Removal>), TransformError> {
    if names.is_empty() || rules.block_style == BlockStyle::Unsupported {
        return Ok((text.to_string(), Vec::new()));
    }

    let lexed = Lexed::new(text, rules)?;
    let defs = outermost(find_definitions(&lexed, rules, Some(names))?);

    let removed = defs
        .iter()
        .map(|def| Removal {
            kind: RemovalKind::Function(def.name.clone()),
            line: line_of(text, def.start),
        })
        .collect();
    let edits = defs
        .into_iter()
        .map(|def| Edit::remove(def.start..def.end))
        .collect();

    Ok((apply_edits(text, edits), removed))
}

/// Replace every outermost function body with a placeholder, keeping
/// signatures and (for indent languages) docstrings.
pub fn strip_function_bodies(
    text: &str,
    rules: &LexicalRules,
) -> Result<(String, Vec<Removal>), TransformError> {
    if rules.block_style == BlockStyle::Unsupported {
        return Ok((text.to_string(), Vec::new()));
    }

    let lexed = Lexed::new(text, rules)?;
    let defs = outermost(find_definitions(&lexed, rules, None)?);
    let mut edits = Vec::new();
    let mut removed = Vec::new();

    for def in defs {
        let replacement = match rules.block_style {
            BlockStyle::Indent if def.block_body => {
                let body = &text[def.body.clone()];
                let body_indent = body
                    .lines()
                    .find(|l| !l.trim().is_empty())
                    .map(leading_whitespace)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}    ", def.indent));
                let kept = docstring_after(&lexed, def.body.start, true)
                    .filter(|doc| doc.line_start >= def.body.start && doc.line_end <= def.body.end)
                    .map(|doc| text[doc.line_start..doc.line_end].to_string())
                    .unwrap_or_default();
                let newline = if body.ends_with('\n') { "\n" } else { "" };
                format!("{kept}{body_indent}{}{newline}", rules.body_placeholder)
            }
            BlockStyle::Indent => format!(" {}", rules.body_placeholder),
            _ => format!(" {} ", rules.body_placeholder),
        };
        if text[def.body.clone()] == replacement {
            continue;
        }
        removed.push(Removal {
            kind: RemovalKind::FunctionBody(def.name.clone()),
            line: line_of(text, def.start),
        });
        edits.push(Edit {
            range: def.body,
            replacement,
        });
    }

    Ok((apply_edits(text, edits), removed))
}

/// Locate definitions, optionally restricted to a set of names
pub(crate) fn find_definitions(
    lexed: &Lexed<'_>,
    rules: &LexicalRules,
    names: Option<&BTreeSet<String>>,
) -> Result<Vec<Definition>, TransformError> {
    match rules.block_style {
        BlockStyle::Indent => indent_definitions(lexed, rules, names),
        BlockStyle::Braces => brace_definitions(lexed, rules, names),
        BlockStyle::Unsupported => Ok(Vec::new()),
    }
}

/// Keep only definitions not nested in an earlier kept one
fn outermost(mut defs: Vec<Definition>) -> Vec<Definition> {
    defs.sort_by_key(|d| d.start);
    let mut kept: Vec<Definition> = Vec::new();
    for def in defs {
        if kept.last().map_or(true, |last| def.start >= last.end) {
            kept.push(def);
        }
    }
    kept
}

fn indent_definitions(
    lexed: &Lexed<'_>,
    rules: &LexicalRules,
    names: Option<&BTreeSet<String>>,
) -> Result<Vec<Definition>, TransformError> {
    let text = lexed.text;
    let mut defs = Vec::new();

    for caps in PY_DEF.captures_iter(text) {
        let (Some(header), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if !lexed.is_code(header.start()) {
            continue;
        }
        if names.is_some_and(|set| !set.contains(name.as_str())) {
            continue;
        }
        let indent = caps.get(1).map_or("", |m| m.as_str());
        let colon = header_colon(lexed, header.end())
            .ok_or(TransformError::Unbalanced(line_of(text, header.start())))?;
        let colon_line_end = line_end(text, colon);

        let inline_body = text[colon + 1..colon_line_end]
            .char_indices()
            .any(|(off, c)| !c.is_whitespace() && lexed.is_code(colon + 1 + off));

        let (body, end, block_body) = if inline_body {
            let body_end = if text[..colon_line_end].ends_with('\n') {
                colon_line_end - 1
            } else {
                colon_line_end
            };
            (colon + 1..body_end, colon_line_end, false)
        } else {
            let body_end = block_end(lexed, colon_line_end, indent.len());
            if body_end == colon_line_end {
                return Err(TransformError::Unbalanced(line_of(text, header.start())));
            }
            (colon_line_end..body_end, body_end, true)
        };

        defs.push(Definition {
            name: name.as_str().to_string(),
            start: decorated_start(lexed, rules, header.start(), indent),
            body,
            end,
            indent: indent.to_string(),
            block_body,
        });
    }

    Ok(defs)
}

/// End of the indented block starting at `from` (one past its last line)
fn block_end(lexed: &Lexed<'_>, from: usize, indent: usize) -> usize {
    let text = lexed.text;
    let mut pos = from;
    let mut last_end = from;
    let mut group_until: Option<usize> = None;

    while pos < text.len() {
        let end = line_end(text, pos);
        let line = &text[pos..end];
        let ws = leading_whitespace(line).len();
        let first = pos + ws;

        if lexed.mask[pos] == SegmentKind::Str || group_until.is_some_and(|close| pos <= close) {
            // continuation of a multi-line string or bracket group opened in the body
            last_end = end;
        } else if line.trim().is_empty() || lexed.mask.get(first) == Some(&SegmentKind::Comment) {
            // blank and comment lines only belong to the block if code follows
        } else if ws > indent {
            last_end = end;
        } else {
            break;
        }
        if last_end == end {
            group_until = group_until.max(open_group_end(lexed, pos, end));
        }
        pos = end;
    }

    last_end
}

/// Furthest closing bracket of a group opened in `start..end` and closed after it
fn open_group_end(lexed: &Lexed<'_>, start: usize, end: usize) -> Option<usize> {
    let bytes = lexed.bytes();
    (start..end)
        .filter(|&i| lexed.is_code(i) && matches!(bytes[i], b'(' | b'[' | b'{'))
        .filter_map(|i| lexed.matching_close(i))
        .filter(|&close| close >= end)
        .max()
}

fn brace_definitions(
    lexed: &Lexed<'_>,
    rules: &LexicalRules,
    names: Option<&BTreeSet<String>>,
) -> Result<Vec<Definition>, TransformError> {
    let text = lexed.text;
    let bytes = lexed.bytes();
    let mut defs = Vec::new();

    for ident in IDENT.find_iter(text) {
        let (start, name) = (ident.start(), ident.as_str());
        if !lexed.is_code(start) || (start > 0 && is_ident_byte(bytes[start - 1])) {
            continue;
        }
        if names.is_some_and(|set| !set.contains(name)) {
            continue;
        }
        if rules.function_keywords.contains(&name) || CONTROL_WORDS.contains(&name) {
            continue;
        }

        let Some(open_paren) = parameter_list(lexed, ident.end()) else {
            continue;
        };
        let sig_line = line_start(text, start);
        if !is_definition_site(text, rules, sig_line, start) {
            continue;
        }
        let Some(close_paren) = lexed.matching_close(open_paren) else {
            continue;
        };
        let Some(open_brace) = body_open(lexed, close_paren + 1) else {
            continue;
        };
        let close_brace = lexed
            .matching_close(open_brace)
            .ok_or(TransformError::Unbalanced(line_of(text, start)))?;

        let after = line_end(text, close_brace + 1);
        let trailing = &text[close_brace + 1..after];
        let end = if trailing.trim().is_empty() {
            after
        } else {
            close_brace + 1
        };
        let indent = leading_whitespace(&text[sig_line..]).to_string();

        defs.push(Definition {
            name: name.to_string(),
            start: decorated_start(lexed, rules, sig_line, &indent),
            body: open_brace + 1..close_brace,
            end,
            indent,
            block_body: false,
        });
    }

    Ok(defs)
}

/// Position of the `(` opening a parameter list right after a name,
/// allowing a generic parameter list in between
fn parameter_list(lexed: &Lexed<'_>, from: usize) -> Option<usize> {
    let bytes = lexed.bytes();
    let mut i = skip_spaces(bytes, from);
    if bytes.get(i) == Some(&b'<') {
        i = skip_spaces(bytes, lexed.matching_close(i)? + 1);
    }
    (bytes.get(i) == Some(&b'(') && lexed.is_code(i)).then_some(i)
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Whether the code before a name on its line introduces a definition
fn is_definition_site(text: &str, rules: &LexicalRules, line: usize, name: usize) -> bool {
    let prefix = &text[line..name];

    let keyword = rules.function_keywords.iter().find_map(|kw| {
        prefix
            .match_indices(kw)
            .filter(|(at, _)| {
                let before = prefix[..*at].bytes().last();
                let after = prefix[at + kw.len()..].bytes().next();
                before.map_or(true, |b| !is_ident_byte(b)) && after.map_or(true, |b| !is_ident_byte(b))
            })
            .last()
            .map(|(at, _)| at + kw.len())
    });
    if let Some(after_kw) = keyword {
        let between = &prefix[after_kw..];
        return !between.contains(['{', '}', ';', '='])
            && between.matches('(').count() == between.matches(')').count();
    }

    if !rules.keywordless_functions {
        return false;
    }
    let trimmed = prefix.trim_end();
    if trimmed.trim().is_empty() {
        return true;
    }
    let Some(prev) = trimmed.bytes().last() else {
        return true;
    };
    if !(is_ident_byte(prev) || matches!(prev, b'*' | b'&' | b'>' | b']' | b':' | b'~')) {
        return false;
    }
    let prev_word = trimmed
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .next()
        .unwrap_or_default();
    !CONTROL_WORDS.contains(&prev_word)
        && !trimmed.contains(['=', '(', ',', '.', ';', '!', '?', '+', '|'])
}

/// First `{` after a parameter list, if no `;` or `}` comes before it
fn body_open(lexed: &Lexed<'_>, from: usize) -> Option<usize> {
    for (i, &b) in lexed.bytes().iter().enumerate().skip(from) {
        if !lexed.is_code(i) {
            continue;
        }
        match b {
            b'{' => return Some(i),
            b';' | b'}' => return None,
            _ => {}
        }
    }
    None
}

/// Extend a definition upwards over decorator/attribute lines at the same
/// indent. A decorator may span several lines inside a bracket group.
fn decorated_start(lexed: &Lexed<'_>, rules: &LexicalRules, sig_line: usize, indent: &str) -> usize {
    let text = lexed.text;
    let mut start = sig_line;
    while start > 0 {
        let mut prev = line_start(text, start - 1);
        if let Some(open) = closing_group(lexed, prev, start).and_then(|c| lexed.matching_open(c)) {
            prev = line_start(text, open);
        }
        let line = &text[prev..start];
        let body = line.trim_end();
        let decorated = body.starts_with(indent)
            && lexed.is_code(prev + leading_whitespace(line).len())
            && rules
                .decorators
                .iter()
                .any(|d| body[indent.len()..].starts_with(d));
        if !decorated {
            break;
        }
        start = prev;
    }
    start
}

/// Last code byte of `start..end` when it closes a `)` or `]` group
fn closing_group(lexed: &Lexed<'_>, start: usize, end: usize) -> Option<usize> {
    let bytes = lexed.bytes();
    let last = (start..end)
        .rev()
        .find(|&i| lexed.is_code(i) && !bytes[i].is_ascii_whitespace())?;
    matches!(bytes[last], b')' | b']').then_some(last)
}
