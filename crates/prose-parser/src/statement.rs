//! Statements and control-flow blocks.

use crate::{ParseError, ParseResult, Parser};
use prose_ast::*;
use prose_lexer::TokenKind;

impl Parser {
    /// Parse one statement into `out`. An arrow sequence produces more than
    /// one statement. The statement terminator is left to the caller.
    pub(crate) fn parse_statement(&mut self, out: &mut Vec<Statement>) -> ParseResult<()> {
        let stmt = match self.current_kind() {
            TokenKind::Comment(text) => {
                let comment = Comment {
                    text: text.clone(),
                    span: self.current_span(),
                };
                self.advance();
                Statement::Comment(comment)
            }
            TokenKind::Import => Statement::Import(self.parse_import()?),
            TokenKind::Agent => Statement::Agent(self.parse_agent()?),
            TokenKind::Block => Statement::Block(self.parse_block_definition()?),
            TokenKind::Session => return self.parse_session_sequence(out),
            TokenKind::Let => Statement::Let(self.parse_binding(TokenKind::Let)?),
            TokenKind::Const => Statement::Const(self.parse_binding(TokenKind::Const)?),
            TokenKind::Do => self.parse_do_statement()?,
            TokenKind::Parallel => self.parse_parallel()?,
            TokenKind::Repeat => Statement::Repeat(self.parse_repeat()?),
            TokenKind::For => Statement::ForEach(self.parse_for_each(None)?),
            TokenKind::Loop => Statement::Loop(self.parse_loop()?),
            TokenKind::Try => Statement::Try(self.parse_try()?),
            TokenKind::Throw => Statement::Throw(self.parse_throw()?),
            TokenKind::Choice => Statement::Choice(self.parse_choice()?),
            TokenKind::If => Statement::If(self.parse_if()?),
            TokenKind::Identifier(name) => {
                let name = name.clone();
                match self.peek_kind() {
                    TokenKind::Eq => Statement::Reassignment(self.parse_reassignment()?),
                    TokenKind::Colon => {
                        return Err(ParseError::StrayProperty {
                            name,
                            span: self.current_span(),
                        })
                    }
                    _ => self.parse_expression_statement()?,
                }
            }
            TokenKind::String(_)
            | TokenKind::Number(_)
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Discretion(_) => self.parse_expression_statement()?,
            _ => return Err(self.unexpected("a statement")),
        };
        out.push(stmt);
        Ok(())
    }

    /// A value is only a statement when a pipe chain follows it.
    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current_span();
        let input = self.parse_primary()?;
        if !(self.allow_pipe && self.check(&TokenKind::Pipe)) {
            return Err(ParseError::UnexpectedToken {
                expected: "a statement".into(),
                found: describe_expr(&input).into(),
                span: input.span(),
            });
        }
        Ok(Statement::Pipe(self.parse_pipe_tail(input, start)?))
    }

    fn parse_import(&mut self) -> ParseResult<ImportStatement> {
        let start = self.expect(TokenKind::Import)?.span;
        let skill = self.expect_string("a skill name string")?;
        let from_kw = self.expect(TokenKind::From)?.span;
        let source = self.expect_string("a source string")?;
        Ok(ImportStatement {
            skill,
            source,
            from_kw,
            span: self.span_from(start),
        })
    }

    fn parse_block_definition(&mut self) -> ParseResult<BlockDefinition> {
        let start = self.expect(TokenKind::Block)?.span;
        let name = self.expect_ident("a block name")?;
        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen).is_some() {
            while !self.check(&TokenKind::RParen) {
                params.push(self.expect_ident("a parameter name")?);
                if self.eat(&TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        let body = self.parse_block("block definition")?;
        Ok(BlockDefinition {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_binding(&mut self, keyword: TokenKind) -> ParseResult<Binding> {
        let start = self.expect(keyword)?.span;
        let name = self.expect_ident("a variable name")?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_value()?;
        Ok(Binding {
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_reassignment(&mut self) -> ParseResult<Reassignment> {
        let name = self.expect_ident("a variable name")?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_value()?;
        Ok(Reassignment {
            span: self.span_from(name.span),
            name,
            value,
        })
    }

    /// `do name(args)` or `do:` with a body.
    fn parse_do_statement(&mut self) -> ParseResult<Statement> {
        match self.parse_do()? {
            Expr::Do(block) => Ok(Statement::Do(*block)),
            Expr::Invoke(invocation) => Ok(Statement::Invoke(invocation)),
            other => Err(ParseError::UnexpectedToken {
                expected: "a do block".into(),
                found: describe_expr(&other).into(),
                span: other.span(),
            }),
        }
    }

    pub(crate) fn parse_do(&mut self) -> ParseResult<Expr> {
        let start = self.expect(TokenKind::Do)?.span;
        if self.check(&TokenKind::Colon) {
            let body = self.parse_block("do block")?;
            return Ok(Expr::Do(Box::new(DoBlock {
                body,
                span: self.span_from(start),
            })));
        }
        let name = self.expect_ident("a block name or ':'")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::LParen).is_some() {
            while !self.check(&TokenKind::RParen) {
                args.push(self.parse_value()?);
                if self.eat(&TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        Ok(Expr::Invoke(BlockInvocation {
            name,
            args,
            span: self.span_from(start),
        }))
    }

    fn parse_parallel(&mut self) -> ParseResult<Statement> {
        let start = self.expect(TokenKind::Parallel)?.span;
        if self.check(&TokenKind::For) {
            return Ok(Statement::ForEach(self.parse_for_each(Some(start))?));
        }

        let mut block = ParallelBlock {
            join: None,
            on_fail: None,
            count: None,
            keys: Vec::new(),
            body: Vec::new(),
            span: start,
        };
        if self.check(&TokenKind::LParen) {
            for Modifier { key, value, span } in self.parse_modifiers()? {
                match (key, value) {
                    (None, ModifierValue::String(s)) if block.join.is_none() => {
                        block.join = Some(Spanned::new(s.value, s.span));
                    }
                    (None, value) => {
                        return Err(ParseError::UnknownModifier {
                            construct: "parallel",
                            name: value.text(),
                            span,
                        })
                    }
                    (Some(key), ModifierValue::String(s)) if key.node == "on-fail" => {
                        block.on_fail = Some(Spanned::new(s.value, s.span));
                        block.keys.push(key);
                    }
                    (Some(key), ModifierValue::Number(n)) if key.node == "count" => {
                        block.count = Some(crate::number_to_count(&n.node, n.span)?);
                        block.keys.push(key);
                    }
                    (Some(key), _) if key.node == "on-fail" || key.node == "count" => {
                        let expected = if key.node == "count" {
                            "a whole number"
                        } else {
                            "a quoted failure policy"
                        };
                        return Err(ParseError::InvalidPropertyValue {
                            key: key.node,
                            expected,
                            span,
                        });
                    }
                    (Some(key), _) => {
                        return Err(ParseError::UnknownModifier {
                            construct: "parallel",
                            name: key.node,
                            span: key.span,
                        })
                    }
                }
            }
        }
        self.expect(TokenKind::Colon)?;
        // an empty parallel body is reported by the validator
        block.body = self.parse_block_body("parallel block", true)?;
        block.span = self.span_from(start);
        Ok(Statement::Parallel(block))
    }

    fn parse_repeat(&mut self) -> ParseResult<RepeatBlock> {
        let start = self.expect(TokenKind::Repeat)?.span;
        let count = self.expect_count("a repeat count")?;
        let index_var = self.parse_as_binding()?;
        let body = self.parse_block("repeat block")?;
        Ok(RepeatBlock {
            count,
            index_var,
            body,
            span: self.span_from(start),
        })
    }

    /// `for item[, index] in collection:`; `parallel` is already consumed
    /// when `parallel_kw` is set.
    fn parse_for_each(&mut self, parallel_kw: Option<Span>) -> ParseResult<ForEachBlock> {
        let for_kw = self.expect(TokenKind::For)?.span;
        let start = parallel_kw.unwrap_or(for_kw);
        let item_var = self.expect_ident("a loop variable")?;
        let index_var = if self.eat(&TokenKind::Comma).is_some() {
            Some(self.expect_ident("an index variable")?)
        } else {
            None
        };
        let in_kw = self.expect(TokenKind::In)?.span;
        let collection = self.parse_primary()?;
        let body = self.parse_block("for-each block")?;
        Ok(ForEachBlock {
            item_var,
            index_var,
            collection,
            parallel: parallel_kw.is_some(),
            for_kw,
            in_kw,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_loop(&mut self) -> ParseResult<LoopBlock> {
        let start = self.expect(TokenKind::Loop)?.span;
        let condition = match self.current_kind() {
            TokenKind::Until | TokenKind::While => {
                let kind = if self.check(&TokenKind::Until) {
                    LoopConditionKind::Until
                } else {
                    LoopConditionKind::While
                };
                let keyword = self.advance().span;
                let discretion = self.expect_discretion("a **condition**")?;
                Some(LoopCondition {
                    kind,
                    keyword,
                    discretion,
                })
            }
            _ => None,
        };
        let index_var = self.parse_as_binding()?;

        let mut max_iterations = None;
        let mut keys = Vec::new();
        if self.check(&TokenKind::LParen) {
            for Modifier { key, value, span } in self.parse_modifiers()? {
                match (key, value) {
                    (Some(key), ModifierValue::Number(n)) if key.node == "max" => {
                        max_iterations = Some(crate::number_to_count(&n.node, n.span)?);
                        keys.push(key);
                    }
                    (Some(key), _) if key.node == "max" => {
                        return Err(ParseError::InvalidPropertyValue {
                            key: key.node,
                            expected: "a whole number",
                            span,
                        })
                    }
                    (key, value) => {
                        return Err(ParseError::UnknownModifier {
                            construct: "loop",
                            name: key.map(|k| k.node).unwrap_or_else(|| value.text()),
                            span,
                        })
                    }
                }
            }
        }

        let body = self.parse_block("loop block")?;
        Ok(LoopBlock {
            condition,
            max_iterations,
            index_var,
            keys,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_as_binding(&mut self) -> ParseResult<Option<AsBinding>> {
        let Some(as_token) = self.eat(&TokenKind::As) else {
            return Ok(None);
        };
        let name = self.expect_ident("a variable name after 'as'")?;
        Ok(Some(AsBinding {
            as_kw: as_token.span,
            name,
        }))
    }

    fn parse_try(&mut self) -> ParseResult<TryBlock> {
        let start = self.expect(TokenKind::Try)?.span;
        let body = self.parse_block("try block")?;

        let mut catch = None;
        if self.check_past_comments(&TokenKind::Catch) {
            self.skip_comments();
            let catch_start = self.advance().span;
            let error_var = self.parse_as_binding()?;
            let body = self.parse_block("catch clause")?;
            catch = Some(CatchClause {
                error_var,
                body,
                span: self.span_from(catch_start),
            });
        }

        let mut finally = None;
        if self.check_past_comments(&TokenKind::Finally) {
            self.skip_comments();
            let finally_start = self.advance().span;
            let body = self.parse_block("finally clause")?;
            finally = Some(FinallyClause {
                body,
                span: self.span_from(finally_start),
            });
        }

        if catch.is_none() && finally.is_none() {
            self.report(ParseError::MissingHandler { span: start });
        }
        Ok(TryBlock {
            body,
            catch,
            finally,
            span: self.span_from(start),
        })
    }

    fn parse_throw(&mut self) -> ParseResult<ThrowStatement> {
        let start = self.expect(TokenKind::Throw)?.span;
        let message = match self.current_kind() {
            TokenKind::String(_) => Some(self.expect_string("a message")?),
            _ => None,
        };
        Ok(ThrowStatement {
            message,
            span: self.span_from(start),
        })
    }

    fn parse_choice(&mut self) -> ParseResult<ChoiceBlock> {
        let start = self.expect(TokenKind::Choice)?.span;
        let criteria = self.expect_discretion("a **criteria**")?;
        self.expect(TokenKind::Colon)?;
        if !(self.check(&TokenKind::Newline) && matches!(self.peek_kind(), TokenKind::Indent)) {
            return Err(ParseError::ExpectedIndentedBlock {
                construct: "choice block",
                span: Span::point(self.last_end),
            });
        }
        self.advance();
        self.advance();

        let mut options = Vec::new();
        loop {
            self.skip_newlines();
            self.skip_comments();
            match self.current_kind() {
                TokenKind::Dedent | TokenKind::Eof => break,
                TokenKind::Option => match self.parse_choice_option() {
                    Ok(option) => options.push(option),
                    Err(error) => {
                        self.report(error);
                        self.synchronize();
                    }
                },
                _ => {
                    let error = self.unexpected("'option'");
                    self.report(error);
                    self.synchronize();
                }
            }
        }
        self.expect(TokenKind::Dedent)?;

        if options.is_empty() {
            return Err(ParseError::UnexpectedToken {
                expected: "at least one 'option'".into(),
                found: "an empty choice block".into(),
                span: start,
            });
        }
        Ok(ChoiceBlock {
            criteria,
            options,
            span: self.span_from(start),
        })
    }

    fn parse_choice_option(&mut self) -> ParseResult<ChoiceOption> {
        let start = self.expect(TokenKind::Option)?.span;
        let label = self.expect_string("an option label")?;
        let body = self.parse_block("choice option")?;
        Ok(ChoiceOption {
            label,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_if(&mut self) -> ParseResult<IfElseBlock> {
        let start = self.current_span();
        let mut branches = vec![self.parse_conditional_branch(TokenKind::If)?];
        while self.check_past_comments(&TokenKind::Elif) {
            self.skip_comments();
            branches.push(self.parse_conditional_branch(TokenKind::Elif)?);
        }
        let mut else_branch = None;
        if self.check_past_comments(&TokenKind::Else) {
            self.skip_comments();
            let else_start = self.advance().span;
            let body = self.parse_block("else clause")?;
            else_branch = Some(ElseClause {
                body,
                span: self.span_from(else_start),
            });
        }
        Ok(IfElseBlock {
            branches,
            else_branch,
            span: self.span_from(start),
        })
    }

    fn parse_conditional_branch(&mut self, keyword: TokenKind) -> ParseResult<ConditionalBranch> {
        let keyword = self.expect(keyword)?.span;
        let condition = self.expect_discretion("a **condition**")?;
        let body = self.parse_block("if block")?;
        Ok(ConditionalBranch {
            keyword,
            condition,
            body,
            span: self.span_from(keyword),
        })
    }
}

fn describe_expr(expr: &Expr) -> &'static str {
    match expr {
        Expr::Session(_) => "a session",
        Expr::Pipe(_) => "a pipe expression",
        Expr::Do(_) => "a do block",
        Expr::Invoke(_) => "a block invocation",
        Expr::String(_) => "a string",
        Expr::Number(_) => "a number",
        Expr::Ident(_) => "an identifier",
        Expr::Array(_) => "an array",
        Expr::Object(_) => "an object",
        Expr::Discretion(_) => "a discretion",
    }
}

/// One entry of a parenthesised modifier list.
pub(crate) struct Modifier {
    pub key: Option<Ident>,
    pub value: ModifierValue,
    pub span: Span,
}

pub(crate) enum ModifierValue {
    String(StringLit),
    Number(Spanned<SmolStr>),
}

impl ModifierValue {
    pub fn text(&self) -> SmolStr {
        match self {
            ModifierValue::String(s) => s.value.clone(),
            ModifierValue::Number(n) => n.node.clone(),
        }
    }
}
