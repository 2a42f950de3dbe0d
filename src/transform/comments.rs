//! Comment stripping

use super::language::LexicalRules;
use super::lexer::{line_of, Lexed, SegmentKind};
use super::{Removal, RemovalKind};
use crate::error::TransformError;

#[derive(Default)]
struct Line {
    text: String,
    had_comment: bool,
    /// The line break ending this line sits inside a string literal
    ends_in_string: bool,
}

/// Remove every comment span. Lines left blank by the removal are dropped,
/// lines keeping code lose their trailing whitespace unless a string
/// literal runs past their end.
pub fn strip_comments(
    text: &str,
    rules: &LexicalRules,
) -> Result<(String, Vec<Removal>), TransformError> {
    let lexed = Lexed::new(text, rules)?;
    let mut removed = Vec::new();
    let mut lines = vec![Line::default()];

    for segment in &lexed.segments {
        let span = &text[segment.range.clone()];
        if segment.kind == SegmentKind::Comment {
            removed.push(Removal {
                kind: RemovalKind::Comment,
                line: line_of(text, segment.range.start),
            });
            for ch in span.chars() {
                if ch == '\n' {
                    if let Some(line) = lines.last_mut() {
                        line.had_comment = true;
                    }
                    lines.push(Line {
                        text: String::new(),
                        had_comment: true,
                        ends_in_string: false,
                    });
                }
            }
            if let Some(line) = lines.last_mut() {
                line.had_comment = true;
            }
            continue;
        }

        let in_string = segment.kind == SegmentKind::Str;
        for ch in span.chars() {
            if ch == '\n' {
                if let Some(line) = lines.last_mut() {
                    line.ends_in_string = in_string;
                }
                lines.push(Line::default());
            } else if let Some(line) = lines.last_mut() {
                line.text.push(ch);
            }
        }
    }

    if removed.is_empty() {
        return Ok((text.to_string(), removed));
    }

    let kept: Vec<&str> = lines
        .iter()
        .filter_map(|line| {
            if !line.had_comment || line.ends_in_string {
                Some(line.text.as_str())
            } else if line.text.trim().is_empty() {
                None
            } else {
                Some(line.text.trim_end())
            }
        })
        .collect();

    Ok((kept.join("\n"), removed))
}
