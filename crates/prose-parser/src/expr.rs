//! Values, pipe chains and context specifications.

use crate::{ParseError, ParseResult, Parser};
use prose_ast::*;
use prose_lexer::TokenKind;

impl Parser {
    /// `primary ['|' op]*`
    pub(crate) fn parse_value(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        let value = self.parse_primary()?;
        if self.allow_pipe && self.check(&TokenKind::Pipe) {
            return Ok(Expr::Pipe(Box::new(self.parse_pipe_tail(value, start)?)));
        }
        Ok(value)
    }

    pub(crate) fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.current_kind() {
            TokenKind::Session => Ok(Expr::Session(Box::new(self.parse_session()?))),
            TokenKind::Do => self.parse_do(),
            TokenKind::String(_) => Ok(Expr::String(self.expect_string("a string")?)),
            TokenKind::Number(n) => {
                let n = n.clone();
                let span = self.advance().span;
                Ok(Expr::Number(Spanned::new(n, span)))
            }
            TokenKind::Identifier(_) => Ok(Expr::Ident(self.expect_ident("a name")?)),
            TokenKind::Discretion(_) => Ok(Expr::Discretion(self.expect_discretion("a discretion")?)),
            TokenKind::LBracket => {
                let start = self.advance().span;
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    items.push(self.parse_value()?);
                    if self.eat(&TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::Array(ArrayLiteral {
                    items,
                    span: self.span_from(start),
                }))
            }
            TokenKind::LBrace => {
                let start = self.advance().span;
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.expect_ident("an object key")?;
                    let value = if self.eat(&TokenKind::Colon).is_some() {
                        Some(self.parse_value()?)
                    } else {
                        None
                    };
                    entries.push(ObjectEntry { key, value });
                    if self.eat(&TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(Expr::Object(ObjectLiteral {
                    entries,
                    span: self.span_from(start),
                }))
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// Parse `('|' op)+` after `input`. Operations chain left to right into a
    /// single expression.
    pub(crate) fn parse_pipe_tail(&mut self, input: Expr, start: Span) -> ParseResult<PipeExpression> {
        let mut operations = Vec::new();
        while self.check(&TokenKind::Pipe) {
            operations.push(self.parse_pipe_operation()?);
        }
        Ok(PipeExpression {
            input: Box::new(input),
            operations,
            span: self.span_from(start),
        })
    }

    fn parse_pipe_operation(&mut self) -> ParseResult<PipeOperation> {
        let start = self.expect(TokenKind::Pipe)?.span;
        let name = self.expect_ident("'map', 'filter', 'reduce' or 'pmap'")?;
        let operator = PipeOperator::parse(&name.node).ok_or_else(|| ParseError::UnexpectedToken {
            expected: "'map', 'filter', 'reduce' or 'pmap'".into(),
            found: format!("identifier '{}'", name.node),
            span: name.span,
        })?;

        let mut item_var = None;
        let mut acc_var = None;
        if operator == PipeOperator::Reduce {
            self.expect(TokenKind::LParen)?;
            acc_var = Some(self.expect_ident("an accumulator name")?);
            self.expect(TokenKind::Comma)?;
            item_var = Some(self.expect_ident("an item name")?);
            self.expect(TokenKind::RParen)?;
        } else if self.eat(&TokenKind::LParen).is_some() {
            item_var = Some(self.expect_ident("an item name")?);
            self.expect(TokenKind::RParen)?;
        }

        self.expect(TokenKind::Colon)?;
        let body = if self.at_indented_block() {
            self.parse_block_body("pipe operation", false)?
        } else {
            self.parse_inline_body()?
        };
        Ok(PipeOperation {
            operator: Spanned::new(operator, name.span),
            item_var,
            acc_var,
            body,
            span: self.span_from(start),
        })
    }

    /// A single statement on the same line as its `:`. A following `|`
    /// belongs to the enclosing chain.
    fn parse_inline_body(&mut self) -> ParseResult<Vec<Statement>> {
        if matches!(
            self.current_kind(),
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof
        ) {
            return Err(ParseError::ExpectedIndentedBlock {
                construct: "pipe operation",
                span: Span::point(self.last_end),
            });
        }
        let allow_pipe = std::mem::replace(&mut self.allow_pipe, false);
        let mut body = Vec::new();
        let result = self.parse_statement(&mut body);
        self.allow_pipe = allow_pipe;
        result.map(|()| body)
    }

    /// `name`, `[a, b]`, `{a, b}`; an empty list or object is `Empty`.
    pub(crate) fn parse_context_spec(&mut self) -> ParseResult<ContextSpec> {
        let (close, object) = match self.current_kind() {
            TokenKind::Identifier(_) => {
                return Ok(ContextSpec::Single(self.expect_ident("a variable name")?))
            }
            TokenKind::LBracket => (TokenKind::RBracket, false),
            TokenKind::LBrace => (TokenKind::RBrace, true),
            _ => return Err(self.unexpected("a variable name, '[' or '{'")),
        };
        self.advance();
        let mut names = Vec::new();
        while !self.check(&close) {
            names.push(self.expect_ident("a variable name")?);
            if self.eat(&TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(close)?;
        Ok(match (names.is_empty(), object) {
            (true, _) => ContextSpec::Empty,
            (false, false) => ContextSpec::List(names),
            (false, true) => ContextSpec::Object(names),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;
    use pretty_assertions::assert_eq;
    use prose_ast::*;

    fn pipe(stmt: &Statement) -> &PipeExpression {
        match stmt {
            Statement::Pipe(p) => p,
            Statement::Let(Binding {
                value: Expr::Pipe(p),
                ..
            }) => p,
            other => panic!("expected pipe, got {:?}", other),
        }
    }

    fn operators(p: &PipeExpression) -> Vec<PipeOperator> {
        p.operations.iter().map(|op| op.operator.node).collect()
    }

    #[test]
    fn test_inline_pipe_chain() {
        // scenario: two chained operations stay in one expression, in order
        let output = parse("session \"A\" | map: session \"B\" | filter: session \"C\"");
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(output.program.statements.len(), 1);
        let p = pipe(&output.program.statements[0]);
        assert!(matches!(*p.input, Expr::Session(_)));
        assert_eq!(operators(p), vec![PipeOperator::Map, PipeOperator::Filter]);
        assert_eq!(p.operations[0].body.len(), 1);
        assert_eq!(p.operations[1].body.len(), 1);
    }

    #[test]
    fn test_multiline_pipe_chain() {
        let source = "let results = items\n  | map(topic):\n    session \"Research {topic}\"\n  | reduce(summary, next):\n    session \"Merge\"\nsession \"done\"";
        let output = parse(source);
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(output.program.statements.len(), 2);
        let p = pipe(&output.program.statements[0]);
        assert_eq!(operators(p), vec![PipeOperator::Map, PipeOperator::Reduce]);
        assert_eq!(p.operations[0].item_name(), "topic");
        assert_eq!(p.operations[1].acc_name(), "summary");
        assert_eq!(p.operations[1].item_name(), "next");
    }

    #[test]
    fn test_pipe_default_item_name() {
        let output = parse("items | pmap: session \"x\"");
        let p = pipe(&output.program.statements[0]);
        assert!(p.operations[0].item_var.is_none());
        assert_eq!(p.operations[0].item_name(), "item");
    }

    #[test]
    fn test_unknown_pipe_operator() {
        let output = parse("items | sort: session \"x\"");
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn test_value_without_pipe_is_not_a_statement() {
        let output = parse("\"just a string\"");
        assert_eq!(output.errors.len(), 1);
        assert!(output.program.statements.is_empty());
    }

    #[test]
    fn test_let_with_do_and_discretion() {
        let output = parse("let a = do:\n  session \"x\"\nlet b = **a judgement**\nlet c = do helper(a)");
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        let values: Vec<_> = output
            .program
            .statements
            .iter()
            .map(|s| match s {
                Statement::Let(b) => &b.value,
                other => panic!("expected let, got {:?}", other),
            })
            .collect();
        assert!(matches!(values[0], Expr::Do(_)));
        assert!(matches!(values[1], Expr::Discretion(_)));
        assert!(matches!(values[2], Expr::Invoke(_)));
    }
}
