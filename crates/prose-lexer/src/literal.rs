//! String and discretion literals.
//!
//! Both are recognized by logos callbacks that scan ahead for the closing
//! delimiter. Decoding (escapes, `{name}` interpolation) happens right there,
//! with spans that only carry byte offsets; the layout pass fills in line and
//! column afterwards.

use crate::span::{LineIndex, Span};
use crate::{LexErrorKind, TokenKind};
use smol_str::SmolStr;

/// A decoded string literal.
#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    /// The literal exactly as written, quotes included.
    pub raw: SmolStr,
    /// Decoded text. Interpolations are kept as `{name}`.
    pub value: SmolStr,
    pub segments: Vec<StringSegment>,
    pub escapes: Vec<EscapeSequence>,
    /// `"""..."""` form.
    pub triple: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringSegment {
    Text(SmolStr),
    Interpolation { name: SmolStr, span: Span },
}

/// A backslash escape found inside a string literal.
#[derive(Debug, Clone, PartialEq)]
pub struct EscapeSequence {
    pub span: Span,
    /// The escape as written, e.g. `\n`.
    pub sequence: SmolStr,
    /// `None` for an unknown escape; the text is then kept verbatim.
    pub decoded: Option<char>,
}

impl StringLiteral {
    /// Names interpolated into this string, in order of appearance.
    pub fn interpolations(&self) -> impl Iterator<Item = (&SmolStr, Span)> {
        self.segments.iter().filter_map(|segment| match segment {
            StringSegment::Interpolation { name, span } => Some((name, *span)),
            StringSegment::Text(_) => None,
        })
    }

    pub fn invalid_escapes(&self) -> impl Iterator<Item = &EscapeSequence> {
        self.escapes.iter().filter(|e| e.decoded.is_none())
    }

    /// Build a single-line literal from plain text, escaping as needed.
    pub fn from_text(text: &str) -> Self {
        let mut raw = String::with_capacity(text.len() + 2);
        raw.push('"');
        for ch in text.chars() {
            match ch {
                '"' => raw.push_str("\\\""),
                '\\' => raw.push_str("\\\\"),
                '\n' => raw.push_str("\\n"),
                '\t' => raw.push_str("\\t"),
                '{' => raw.push_str("\\{"),
                '}' => raw.push_str("\\}"),
                other => raw.push(other),
            }
        }
        raw.push('"');
        decode_string(&raw, 0, false)
    }

    pub(crate) fn locate(&mut self, index: &LineIndex<'_>) {
        for segment in &mut self.segments {
            if let StringSegment::Interpolation { span, .. } = segment {
                index.locate(span);
            }
        }
        for escape in &mut self.escapes {
            index.locate(&mut escape.span);
        }
    }
}

/// A `**...**` or `***...***` natural-language span.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretionLiteral {
    /// Inner text, verbatim.
    pub text: SmolStr,
    /// Written with triple asterisks.
    pub multiline: bool,
    /// The literal exactly as written, markers included.
    pub raw: SmolStr,
}

/// Decode the body of a string literal. `raw` includes the quotes and
/// `base` is the byte offset of `raw` in the source.
pub(crate) fn decode_string(raw: &str, base: usize, triple: bool) -> StringLiteral {
    let quote_len = if triple { 3 } else { 1 };
    let body = raw
        .get(quote_len..raw.len().saturating_sub(quote_len))
        .unwrap_or("");
    let body_base = base + quote_len;

    let mut value = String::with_capacity(body.len());
    let mut text = String::new();
    let mut segments = Vec::new();
    let mut escapes = Vec::new();

    let mut chars = body.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                let Some((_, next)) = chars.next() else {
                    text.push('\\');
                    value.push('\\');
                    break;
                };
                let decoded = match next {
                    'n' => Some('\n'),
                    't' => Some('\t'),
                    '"' => Some('"'),
                    '\\' => Some('\\'),
                    '{' => Some('{'),
                    '}' => Some('}'),
                    _ => None,
                };
                let end = i + 1 + next.len_utf8();
                escapes.push(EscapeSequence {
                    span: Span::from_offsets(body_base + i, body_base + end),
                    sequence: SmolStr::new(&body[i..end]),
                    decoded,
                });
                match decoded {
                    Some(c) => {
                        text.push(c);
                        value.push(c);
                    }
                    None => {
                        text.push('\\');
                        text.push(next);
                        value.push('\\');
                        value.push(next);
                    }
                }
            }
            '{' => match interpolation_name(&body[i + 1..]) {
                Some(name) => {
                    if !text.is_empty() {
                        segments.push(StringSegment::Text(SmolStr::new(&text)));
                        text.clear();
                    }
                    let end = i + name.len() + 2;
                    segments.push(StringSegment::Interpolation {
                        name: SmolStr::new(name),
                        span: Span::from_offsets(body_base + i, body_base + end),
                    });
                    value.push('{');
                    value.push_str(name);
                    value.push('}');
                    // skip name and closing brace
                    for _ in 0..name.chars().count() + 1 {
                        chars.next();
                    }
                }
                None => {
                    text.push('{');
                    value.push('{');
                }
            },
            other => {
                text.push(other);
                value.push(other);
            }
        }
    }
    if !text.is_empty() {
        segments.push(StringSegment::Text(SmolStr::new(&text)));
    }

    StringLiteral {
        raw: SmolStr::new(raw),
        value: SmolStr::new(&value),
        segments,
        escapes,
        triple,
    }
}

/// `rest` starts right after a `{`. Returns the identifier if the text is
/// `ident}`.
fn interpolation_name(rest: &str) -> Option<&str> {
    let close = rest.find('}')?;
    let name = &rest[..close];
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Some(name)
    } else {
        None
    }
}

pub(crate) fn lex_string(
    lex: &mut logos::Lexer<TokenKind>,
) -> Result<Box<StringLiteral>, LexErrorKind> {
    let remainder = lex.remainder();
    let mut escaped = false;
    for (i, ch) in remainder.char_indices() {
        match ch {
            '\n' | '\r' => {
                lex.bump(i);
                return Err(LexErrorKind::UnterminatedString);
            }
            '\\' if !escaped => escaped = true,
            '"' if !escaped => {
                lex.bump(i + 1);
                let start = lex.span().start;
                return Ok(Box::new(decode_string(lex.slice(), start, false)));
            }
            _ => escaped = false,
        }
    }
    lex.bump(remainder.len());
    Err(LexErrorKind::UnterminatedString)
}

pub(crate) fn lex_triple_string(
    lex: &mut logos::Lexer<TokenKind>,
) -> Result<Box<StringLiteral>, LexErrorKind> {
    let remainder = lex.remainder();
    let bytes = remainder.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' if remainder[i..].starts_with("\"\"\"") => {
                lex.bump(i + 3);
                let start = lex.span().start;
                return Ok(Box::new(decode_string(lex.slice(), start, true)));
            }
            _ => i += 1,
        }
    }
    lex.bump(remainder.len());
    Err(LexErrorKind::UnterminatedString)
}

/// Scan for a closing run of exactly `arity` asterisks. Runs of any other
/// length are content, so `**a***` is not closed.
fn lex_discretion(
    lex: &mut logos::Lexer<TokenKind>,
    arity: usize,
) -> Result<DiscretionLiteral, LexErrorKind> {
    let remainder = lex.remainder();
    let bytes = remainder.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' if arity == 2 => break,
            b'*' => {
                let run = bytes[i..].iter().take_while(|b| **b == b'*').count();
                if run == arity {
                    let text = &remainder[..i];
                    lex.bump(i + run);
                    return Ok(DiscretionLiteral {
                        text: SmolStr::new(text),
                        multiline: arity == 3,
                        raw: SmolStr::new(lex.slice()),
                    });
                }
                i += run;
            }
            _ => i += 1,
        }
    }
    let consumed = if arity == 2 {
        remainder.find('\n').unwrap_or(remainder.len())
    } else {
        remainder.len()
    };
    lex.bump(consumed);
    Err(LexErrorKind::UnterminatedDiscretion)
}

pub(crate) fn lex_inline_discretion(
    lex: &mut logos::Lexer<TokenKind>,
) -> Result<DiscretionLiteral, LexErrorKind> {
    lex_discretion(lex, 2)
}

pub(crate) fn lex_multiline_discretion(
    lex: &mut logos::Lexer<TokenKind>,
) -> Result<DiscretionLiteral, LexErrorKind> {
    lex_discretion(lex, 3)
}
