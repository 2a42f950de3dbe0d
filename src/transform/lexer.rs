//! Minimal lexer separating code, comments and string literals

use std::ops::Range;

use super::language::LexicalRules;
use crate::error::TransformError;

/// Kind of a lexical segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    Comment,
    Str,
}

/// A contiguous byte range of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub range: Range<usize>,
}

/// Lexed view of a source text
#[derive(Debug)]
pub struct Lexed<'a> {
    pub text: &'a str,
    pub segments: Vec<Segment>,
    /// Segment kind for every byte of `text`
    pub mask: Vec<SegmentKind>,
}

impl<'a> Lexed<'a> {
    pub fn new(text: &'a str, rules: &LexicalRules) -> Result<Self, TransformError> {
        let segments = lex(text, rules)?;
        let mut mask = vec![SegmentKind::Code; text.len()];
        for seg in &segments {
            if seg.kind != SegmentKind::Code {
                mask[seg.range.clone()].fill(seg.kind);
            }
        }
        Ok(Self {
            text,
            segments,
            mask,
        })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    pub fn is_code(&self, pos: usize) -> bool {
        self.mask.get(pos) == Some(&SegmentKind::Code)
    }

    /// The string segment starting exactly at `pos`
    pub fn string_at(&self, pos: usize) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.kind == SegmentKind::Str && s.range.start == pos)
    }

    /// Position of the delimiter closing the bracket at `open`, skipping
    /// strings and comments
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let bytes = self.bytes();
        let (open_b, close_b) = match bytes.get(open)? {
            b'(' => (b'(', b')'),
            b'[' => (b'[', b']'),
            b'{' => (b'{', b'}'),
            b'<' => (b'<', b'>'),
            _ => return None,
        };
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(open) {
            if !self.is_code(i) {
                continue;
            }
            if b == open_b {
                depth += 1;
            } else if b == close_b {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Position of the bracket opened by the delimiter at `close`
    pub fn matching_open(&self, close: usize) -> Option<usize> {
        let bytes = self.bytes();
        let (open_b, close_b) = match bytes.get(close)? {
            b')' => (b'(', b')'),
            b']' => (b'[', b']'),
            b'}' => (b'{', b'}'),
            _ => return None,
        };
        let mut depth = 0usize;
        for i in (0..=close).rev() {
            if !self.is_code(i) {
                continue;
            }
            if bytes[i] == close_b {
                depth += 1;
            } else if bytes[i] == open_b {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }
}

/// Split `text` into code, comment and string segments
pub fn lex(text: &str, rules: &LexicalRules) -> Result<Vec<Segment>, TransformError> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < len {
        let rest = &bytes[i..];

        if let Some((open, close)) = rules.block_comment {
            if rest.starts_with(open.as_bytes()) {
                flush(&mut segments, code_start, i);
                let start = i;
                i += open.len();
                let mut depth = 1;
                loop {
                    if i >= len {
                        return Err(TransformError::UnterminatedComment(line_of(text, start)));
                    }
                    if rules.nested_blocks && bytes[i..].starts_with(open.as_bytes()) {
                        depth += 1;
                        i += open.len();
                    } else if bytes[i..].starts_with(close.as_bytes()) {
                        depth -= 1;
                        i += close.len();
                        if depth == 0 {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
                segments.push(Segment {
                    kind: SegmentKind::Comment,
                    range: start..i,
                });
                code_start = i;
                continue;
            }
        }

        let at_word_start =
            !rules.comment_at_word_start || i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_word_start
            && rules
                .line_comments
                .iter()
                .any(|marker| rest.starts_with(marker.as_bytes()))
        {
            flush(&mut segments, code_start, i);
            let mut end = bytes[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(len, |p| i + p);
            if end > i && bytes[end - 1] == b'\r' {
                end -= 1;
            }
            segments.push(Segment {
                kind: SegmentKind::Comment,
                range: i..end,
            });
            i = end;
            code_start = i;
            continue;
        }

        if rules.hash_raw_strings && bytes[i] == b'r' && (i == 0 || !is_ident_byte(bytes[i - 1])) {
            let hashes = bytes[i + 1..].iter().take_while(|&&b| b == b'#').count();
            if bytes.get(i + 1 + hashes) == Some(&b'"') {
                flush(&mut segments, code_start, i);
                let start = i;
                let mut terminator = vec![b'"'];
                terminator.extend(std::iter::repeat(b'#').take(hashes));
                let body = i + 2 + hashes;
                let end = find(&bytes[body..], &terminator)
                    .map(|p| body + p + terminator.len())
                    .ok_or(TransformError::UnterminatedString(line_of(text, start)))?;
                segments.push(Segment {
                    kind: SegmentKind::Str,
                    range: start..end,
                });
                i = end;
                code_start = i;
                continue;
            }
        }

        if let Some(quote) = rules
            .raw_quotes
            .iter()
            .find(|q| rest.starts_with(q.as_bytes()))
        {
            flush(&mut segments, code_start, i);
            let start = i;
            let body = i + quote.len();
            let end = find(&bytes[body..], quote.as_bytes())
                .map(|p| body + p + quote.len())
                .ok_or(TransformError::UnterminatedString(line_of(text, start)))?;
            segments.push(Segment {
                kind: SegmentKind::Str,
                range: start..end,
            });
            i = end;
            code_start = i;
            continue;
        }

        if let Some(quote) = rules.quotes.iter().find(|q| rest.starts_with(q.as_bytes())) {
            if *quote == "'" && rules.char_literal_heuristic && !looks_like_char(text, i) {
                i += 1;
                continue;
            }
            flush(&mut segments, code_start, i);
            let start = i;
            let multiline = rules.multiline_quotes.contains(quote);
            i += quote.len();
            loop {
                if i >= len {
                    if multiline {
                        return Err(TransformError::UnterminatedString(line_of(text, start)));
                    }
                    break;
                }
                if bytes[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes[i..].starts_with(quote.as_bytes()) {
                    i += quote.len();
                    break;
                }
                if bytes[i] == b'\n' && !multiline {
                    break;
                }
                i += 1;
            }
            i = i.min(len);
            segments.push(Segment {
                kind: SegmentKind::Str,
                range: start..i,
            });
            code_start = i;
            continue;
        }

        i += 1;
    }

    flush(&mut segments, code_start, len);
    Ok(segments)
}

fn flush(segments: &mut Vec<Segment>, from: usize, to: usize) {
    if to > from {
        segments.push(Segment {
            kind: SegmentKind::Code,
            range: from..to,
        });
    }
}

/// 1-based line number of a byte offset
pub fn line_of(text: &str, pos: usize) -> usize {
    text.as_bytes()[..pos.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Offset of the first byte of the line containing `pos`
pub fn line_start(text: &str, pos: usize) -> usize {
    text.as_bytes()[..pos.min(text.len())]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1)
}

/// Offset just past the newline ending the line containing `pos` (or text end)
pub fn line_end(text: &str, pos: usize) -> usize {
    text.as_bytes()[pos.min(text.len())..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(text.len(), |p| pos + p + 1)
}

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `'a'` or `'\n'` rather than a lifetime such as `'a`
fn looks_like_char(text: &str, pos: usize) -> bool {
    let bytes = text.as_bytes();
    match bytes.get(pos + 1) {
        Some(b'\\') => true,
        Some(_) => match text[pos + 1..].chars().next() {
            Some(c) => bytes.get(pos + 1 + c.len_utf8()) == Some(&b'\''),
            None => false,
        },
        None => false,
    }
}
