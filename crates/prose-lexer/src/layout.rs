//! Off-side rule.
//!
//! Consumes raw tokens in source order and produces the final stream with
//! `Newline`, `Indent` and `Dedent` inserted. Blank and comment-only lines are
//! invisible to the indentation stack; the comments on such lines are held
//! back and emitted after the structural tokens of the next code line, so the
//! stream is not strictly ordered by offset around comments.

use crate::span::{LineIndex, Span};
use crate::{LexError, Token, TokenKind};
use smol_str::SmolStr;
use tracing::trace;

pub(crate) struct Layout<'a> {
    source: &'a str,
    index: &'a LineIndex<'a>,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    /// Open indentation widths; the bottom entry is always 0.
    indents: Vec<u32>,
    /// Bracket nesting. Newlines are ignored while positive.
    depth: u32,
    line_has_content: bool,
    pending_newline: Option<Span>,
    held_comments: Vec<Token>,
}

impl<'a> Layout<'a> {
    pub(crate) fn new(source: &'a str, index: &'a LineIndex<'a>) -> Self {
        Self {
            source,
            index,
            tokens: Vec::new(),
            errors: Vec::new(),
            indents: vec![0],
            depth: 0,
            line_has_content: false,
            pending_newline: None,
            held_comments: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, error: LexError) {
        self.errors.push(error);
    }

    pub(crate) fn newline(&mut self, span: Span) {
        if self.depth > 0 || !self.line_has_content {
            return;
        }
        self.pending_newline = Some(span);
        self.line_has_content = false;
    }

    pub(crate) fn comment(&mut self, text: SmolStr, span: Span) {
        let token = Token::new(TokenKind::Comment(text), span);
        if self.line_has_content || self.depth > 0 {
            self.tokens.push(token);
        } else {
            self.held_comments.push(token);
        }
    }

    pub(crate) fn token(&mut self, kind: TokenKind, span: Span) {
        if self.depth == 0 && !self.line_has_content {
            self.start_line(&kind, span);
        }
        self.line_has_content = true;
        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.depth = self.depth.saturating_sub(1)
            }
            _ => {}
        }
        self.tokens.push(Token::new(kind, span));
    }

    /// Called on the first token of every logical line.
    fn start_line(&mut self, kind: &TokenKind, span: Span) {
        let line_start = self
            .index
            .line_start(span.start.line)
            .unwrap_or(span.start.offset);
        let prefix = self.source.get(line_start..span.start.offset).unwrap_or("");
        // a tab-indented line stays at the current level
        let width = match prefix.find('\t') {
            Some(tab) => {
                self.errors.push(LexError::TabIndentation {
                    span: self.index.span(line_start + tab..line_start + tab + 1),
                });
                self.top()
            }
            None => prefix.chars().count() as u32,
        };

        // `| op:` on its own line continues the previous logical line
        if matches!(kind, TokenKind::Pipe) && self.pending_newline.is_some() {
            trace!(line = span.start.line, width, "continuation line");
            self.pending_newline = None;
            self.flush_comments();
            self.dedent_to(width, span);
            return;
        }

        if let Some(newline) = self.pending_newline.take() {
            self.tokens.push(Token::new(TokenKind::Newline, newline));
        }

        let top = self.top();
        if width > top {
            self.indents.push(width);
            self.tokens.push(Token::new(
                TokenKind::Indent,
                self.index.span(line_start..span.start.offset),
            ));
        } else if width < top {
            self.dedent_to(width, span);
            if self.top() != width {
                self.errors.push(LexError::InconsistentDedent {
                    span: self.index.span(line_start..span.start.offset),
                });
            }
        }
        self.flush_comments();
    }

    fn top(&self) -> u32 {
        self.indents.last().copied().unwrap_or(0)
    }

    fn dedent_to(&mut self, width: u32, at: Span) {
        while self.indents.len() > 1 && self.top() > width {
            self.indents.pop();
            self.tokens
                .push(Token::new(TokenKind::Dedent, Span::point(at.start)));
        }
    }

    fn flush_comments(&mut self) {
        self.tokens.append(&mut self.held_comments);
    }

    pub(crate) fn finish(mut self) -> (Vec<Token>, Vec<LexError>) {
        let end = Span::point(self.index.position(self.source.len()));
        if let Some(newline) = self.pending_newline.take() {
            self.tokens.push(Token::new(TokenKind::Newline, newline));
        } else if self.line_has_content {
            // last line without a trailing line break
            self.tokens.push(Token::new(TokenKind::Newline, end));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push(Token::new(TokenKind::Dedent, end));
        }
        self.flush_comments();
        self.tokens.push(Token::new(TokenKind::Eof, end));
        (self.tokens, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Lexer, LexError, TokenKind};
    use pretty_assertions::assert_eq;

    /// Token kinds rendered compactly for layout assertions.
    fn layout(source: &str) -> Vec<String> {
        let (tokens, _) = Lexer::new(source).tokenize();
        tokens
            .into_iter()
            .map(|t| match t.kind {
                TokenKind::Newline => "NL".to_string(),
                TokenKind::Indent => "INDENT".to_string(),
                TokenKind::Dedent => "DEDENT".to_string(),
                TokenKind::Eof => "EOF".to_string(),
                TokenKind::Identifier(name) => name.to_string(),
                TokenKind::String(s) => s.raw.to_string(),
                TokenKind::Comment(text) => text.to_string(),
                other => other.keyword_text().map(String::from).unwrap_or_else(|| {
                    other.to_string().trim_matches('\'').to_string()
                }),
            })
            .collect()
    }

    #[test]
    fn test_single_line() {
        assert_eq!(layout("session \"a\""), vec!["session", "\"a\"", "NL", "EOF"]);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(layout(""), vec!["EOF"]);
        assert_eq!(layout("\n\n   \n"), vec!["EOF"]);
    }

    #[test]
    fn test_indent_and_dedent() {
        let source = "parallel:\n  session \"a\"\n  session \"b\"\nsession \"c\"\n";
        assert_eq!(
            layout(source),
            vec![
                "parallel", ":", "NL", "INDENT", "session", "\"a\"", "NL", "session", "\"b\"",
                "NL", "DEDENT", "session", "\"c\"", "NL", "EOF",
            ]
        );
    }

    #[test]
    fn test_dedents_at_end_of_input() {
        let source = "do:\n  repeat 2:\n    session \"x\"";
        let tokens = layout(source);
        assert_eq!(
            &tokens[tokens.len() - 4..],
            &["NL", "DEDENT", "DEDENT", "EOF"]
        );
    }

    #[test]
    fn test_blank_lines_ignored() {
        let source = "do:\n\n  session \"a\"\n\n\n  session \"b\"\n";
        assert_eq!(
            layout(source),
            vec![
                "do", ":", "NL", "INDENT", "session", "\"a\"", "NL", "session", "\"b\"", "NL",
                "DEDENT", "EOF",
            ]
        );
    }

    #[test]
    fn test_comment_only_line_held_until_next_line() {
        let source = "do:\n  # first\n  session \"a\" # trailing\n";
        assert_eq!(
            layout(source),
            vec![
                "do", ":", "NL", "INDENT", "# first", "session", "\"a\"", "# trailing", "NL",
                "DEDENT", "EOF",
            ]
        );
    }

    #[test]
    fn test_comment_at_end_of_block_lands_after_dedent() {
        let source = "do:\n  session \"a\"\n# done";
        assert_eq!(
            layout(source),
            vec!["do", ":", "NL", "INDENT", "session", "\"a\"", "NL", "DEDENT", "# done", "EOF"]
        );
    }

    #[test]
    fn test_brackets_join_lines() {
        let source = "let xs = [\n  a,\n    b\n]\nsession \"s\"";
        assert_eq!(
            layout(source),
            vec![
                "let", "xs", "=", "[", "a", ",", "b", "]", "NL", "session", "\"s\"", "NL", "EOF",
            ]
        );
    }

    #[test]
    fn test_pipe_continuation_lines() {
        let source = "let r = items\n  | map:\n    session \"a\"\n  | filter:\n    session \"b\"\n";
        assert_eq!(
            layout(source),
            vec![
                "let", "r", "=", "items", "|", "map", ":", "NL", "INDENT", "session", "\"a\"",
                "DEDENT", "|", "filter", ":", "NL", "INDENT", "session", "\"b\"", "NL", "DEDENT",
                "EOF",
            ]
        );
    }

    #[test]
    fn test_tab_indentation_rejected() {
        let (tokens, errors) = Lexer::new("do:\n\tsession \"a\"").tokenize();
        assert_eq!(errors.len(), 1);
        let LexError::TabIndentation { span } = &errors[0] else {
            panic!("expected tab error, got {:?}", errors[0]);
        };
        assert_eq!(span.start.line, 2);
        assert_eq!(span.start.column, 0);
        // the tab-indented line stays at the enclosing level
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Indent));
    }

    #[test]
    fn test_tab_on_first_line_opens_no_block() {
        let (_, errors) = Lexer::new("\tsession \"a\"\nsession \"b\"").tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::TabIndentation { .. }));
        assert_eq!(
            layout("\tsession \"a\"\nsession \"b\""),
            vec!["session", "\"a\"", "NL", "session", "\"b\"", "NL", "EOF"]
        );
    }

    #[test]
    fn test_inconsistent_dedent() {
        let (tokens, errors) = Lexer::new("do:\n    session \"a\"\n  session \"b\"").tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::InconsistentDedent { .. }));
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
    }

    #[test]
    fn test_newline_span_points_at_line_break() {
        let (tokens, _) = Lexer::new("session \"a\"\nsession \"b\"").tokenize();
        let newline = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Newline)
            .unwrap();
        assert_eq!(newline.span.start.offset, 11);
        assert_eq!(newline.span.start.line, 1);
    }
}
