//! Docstring stripping for languages with first-statement documentation strings

use once_cell::sync::Lazy;
use regex::Regex;

use super::language::LexicalRules;
use super::lexer::{line_end, line_of, line_start, Lexed, SegmentKind};
use super::{apply_edits, Edit, Removal, RemovalKind};
use crate::error::TransformError;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)(?:async[ \t]+)?(?:def|class)[ \t]+[A-Za-z_]\w*")
        .expect("valid header regex")
});

/// A string statement found in docstring position
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Docstring {
    /// First byte of the line holding the literal
    pub line_start: usize,
    /// One past the newline ending the literal's last line
    pub line_end: usize,
}

/// Remove module, class and function docstrings.
pub fn strip_docstrings(
    text: &str,
    rules: &LexicalRules,
) -> Result<(String, Vec<Removal>), TransformError> {
    if !rules.docstrings {
        return Ok((text.to_string(), Vec::new()));
    }

    let lexed = Lexed::new(text, rules)?;
    let mut edits = Vec::new();
    let mut removed = Vec::new();

    if let Some(doc) = docstring_after(&lexed, 0, true) {
        removed.push(Removal {
            kind: RemovalKind::Docstring,
            line: line_of(text, doc.line_start),
        });
        edits.push(Edit::remove(doc.line_start..doc.line_end));
    }

    for caps in HEADER.captures_iter(text) {
        let Some(header) = caps.get(0) else { continue };
        if !lexed.is_code(header.start()) {
            continue;
        }
        let indent = caps.get(1).map_or(0, |m| m.as_str().len());
        let colon = header_colon(&lexed, header.end())
            .ok_or(TransformError::Unbalanced(line_of(text, header.start())))?;

        let Some(doc) = docstring_after(&lexed, colon + 1, false) else {
            continue;
        };
        removed.push(Removal {
            kind: RemovalKind::Docstring,
            line: line_of(text, doc.line_start),
        });

        let replacement = if body_empty_after(&lexed, doc.line_end, indent) {
            let doc_indent = leading_whitespace(&text[doc.line_start..]);
            let newline = if text[..doc.line_end].ends_with('\n') { "\n" } else { "" };
            format!("{doc_indent}pass{newline}")
        } else {
            String::new()
        };
        edits.push(Edit {
            range: doc.line_start..doc.line_end,
            replacement,
        });
    }

    Ok((apply_edits(text, edits), removed))
}

/// Position of the `:` closing a `def`/`class` header, skipping brackets,
/// strings and comments
pub(crate) fn header_colon(lexed: &Lexed<'_>, from: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, &b) in lexed.bytes().iter().enumerate().skip(from) {
        if !lexed.is_code(i) {
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Find a string statement that is the first statement after `from`.
///
/// For headers the literal must start on a later line than the colon;
/// `at_module_start` lifts that requirement.
pub(crate) fn docstring_after(
    lexed: &Lexed<'_>,
    from: usize,
    at_module_start: bool,
) -> Option<Docstring> {
    let text = lexed.text;
    let bytes = lexed.bytes();
    let mut saw_newline = at_module_start;
    let mut i = from;

    while i < bytes.len() {
        match lexed.mask[i] {
            SegmentKind::Comment => i += 1,
            SegmentKind::Str => break,
            SegmentKind::Code => {
                let b = bytes[i];
                if b == b'\n' {
                    saw_newline = true;
                } else if !b.is_ascii_whitespace() {
                    break;
                }
                i += 1;
            }
        }
    }
    if i >= bytes.len() || !saw_newline {
        return None;
    }

    let start = if lexed.mask[i] == SegmentKind::Str {
        i
    } else if matches!(bytes[i], b'r' | b'R' | b'u' | b'U')
        && lexed.mask.get(i + 1) == Some(&SegmentKind::Str)
    {
        i + 1
    } else {
        return None;
    };
    let literal = lexed.string_at(start)?;

    // The literal must be a statement on its own
    let mut j = literal.range.end;
    while j < bytes.len() && bytes[j] != b'\n' {
        let blank = lexed.mask[j] == SegmentKind::Comment || bytes[j].is_ascii_whitespace();
        if !blank {
            return None;
        }
        j += 1;
    }

    Some(Docstring {
        line_start: line_start(text, i),
        line_end: line_end(text, literal.range.end),
    })
}

/// True when nothing but blank or comment lines remain in the block
/// before a line indented at most `indent`
fn body_empty_after(lexed: &Lexed<'_>, from: usize, indent: usize) -> bool {
    let text = lexed.text;
    let mut pos = from;
    while pos < text.len() {
        let end = line_end(text, pos);
        let line = &text[pos..end];
        let ws = leading_whitespace(line).len();
        let first = pos + ws;
        let blank = line.trim().is_empty() || lexed.mask.get(first) == Some(&SegmentKind::Comment);
        if !blank {
            return ws <= indent;
        }
        pos = end;
    }
    true
}

pub(crate) fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}
