//! Sessions, agent definitions, property blocks and modifier lists.

use crate::statement::{Modifier, ModifierValue};
use crate::{ParseError, ParseResult, Parser};
use prose_ast::*;
use prose_lexer::TokenKind;

impl Parser {
    /// `session ... [-> session ...]* [| op ...]`
    pub(crate) fn parse_session_sequence(&mut self, out: &mut Vec<Statement>) -> ParseResult<()> {
        loop {
            let start = self.current_span();
            let mut session = self.parse_session()?;
            if let Some(arrow) = self.eat(&TokenKind::Arrow) {
                session.arrow = Some(arrow.span);
                out.push(Statement::Session(session));
                if !self.check(&TokenKind::Session) {
                    return Err(self.unexpected("'session' after '->'"));
                }
                continue;
            }
            if self.allow_pipe && self.check(&TokenKind::Pipe) {
                let input = Expr::Session(Box::new(session));
                out.push(Statement::Pipe(self.parse_pipe_tail(input, start)?));
            } else {
                out.push(Statement::Session(session));
            }
            return Ok(());
        }
    }

    /// `session [name] ["prompt"] [(modifiers)] [: agent | : { props } | : props-block]`
    pub(crate) fn parse_session(&mut self) -> ParseResult<SessionStatement> {
        let start = self.expect(TokenKind::Session)?.span;
        let mut session = SessionStatement::default();

        if matches!(self.current_kind(), TokenKind::Identifier(_)) {
            session.name = Some(self.expect_ident("a session name")?);
        }
        if matches!(self.current_kind(), TokenKind::String(_)) {
            session.prompt = Some(self.expect_string("a prompt")?);
        }
        if self.check(&TokenKind::LParen) {
            for modifier in self.parse_modifiers()? {
                self.apply_session_modifier(&mut session, modifier)?;
            }
        }

        if self.eat(&TokenKind::Colon).is_some() {
            match self.current_kind() {
                TokenKind::Identifier(_) => {
                    session.agent = Some(self.expect_ident("an agent name")?);
                    if self.at_indented_block() {
                        for property in self.parse_property_block()? {
                            self.apply_session_property(&mut session, property)?;
                        }
                    }
                }
                TokenKind::LBrace => {
                    for property in self.parse_inline_properties()? {
                        self.apply_session_property(&mut session, property)?;
                    }
                }
                _ if self.at_indented_block() => {
                    for property in self.parse_property_block()? {
                        self.apply_session_property(&mut session, property)?;
                    }
                }
                _ => {
                    return Err(ParseError::ExpectedIndentedBlock {
                        construct: "session",
                        span: Span::point(self.last_end),
                    })
                }
            }
        }

        session.span = self.span_from(start);
        Ok(session)
    }

    fn apply_session_modifier(
        &mut self,
        session: &mut SessionStatement,
        Modifier { key, value, span }: Modifier,
    ) -> ParseResult<()> {
        let Some(key) = key else {
            return Err(ParseError::UnknownModifier {
                construct: "session",
                name: value.text(),
                span,
            });
        };
        match (key.node.as_str(), value) {
            ("retry", ModifierValue::Number(n)) => {
                set_once(&mut session.retry, &key, crate::number_to_count(&n.node, n.span)?)?;
            }
            ("backoff", ModifierValue::String(s)) => {
                set_once(&mut session.backoff, &key, Spanned::new(s.value, s.span))?;
            }
            ("retry", _) => return Err(invalid(&key, "a whole number", span)),
            ("backoff", _) => return Err(invalid(&key, "a quoted backoff strategy", span)),
            _ => {
                return Err(ParseError::UnknownModifier {
                    construct: "session",
                    name: key.node.clone(),
                    span: key.span,
                })
            }
        }
        session.keys.push(key);
        Ok(())
    }

    fn apply_session_property(
        &mut self,
        session: &mut SessionStatement,
        property: Property,
    ) -> ParseResult<()> {
        let key = property.key.clone();
        match (key.node.as_str(), property.value) {
            ("agent", PropertyValue::Expr(Expr::Ident(agent))) => {
                set_once(&mut session.agent, &key, agent)?
            }
            ("agent", _) => return Err(invalid(&key, "an agent name", property.span)),
            ("model", PropertyValue::Expr(value)) => {
                let model = model_name(value).ok_or_else(|| invalid(&key, "a model name", property.span))?;
                set_once(&mut session.model, &key, model)?
            }
            ("prompt", PropertyValue::Expr(Expr::String(prompt))) => {
                set_once(&mut session.prompt, &key, prompt)?
            }
            ("prompt", _) => return Err(invalid(&key, "a string", property.span)),
            ("skills", PropertyValue::Expr(value)) => {
                let skills =
                    skill_list(value).ok_or_else(|| invalid(&key, "an array of skill names", property.span))?;
                set_once(&mut session.skills, &key, skills)?
            }
            ("context", PropertyValue::Context(context)) => {
                if !session.context.is_implicit() {
                    return Err(ParseError::DuplicateProperty {
                        key: key.node.clone(),
                        span: key.span,
                    });
                }
                session.context = context;
            }
            ("retry", PropertyValue::Expr(Expr::Number(n))) => {
                set_once(&mut session.retry, &key, crate::number_to_count(&n.node, n.span)?)?
            }
            ("retry", _) => return Err(invalid(&key, "a whole number", property.span)),
            ("backoff", PropertyValue::Expr(Expr::String(s))) => {
                set_once(&mut session.backoff, &key, Spanned::new(s.value, s.span))?
            }
            ("backoff", _) => return Err(invalid(&key, "a quoted backoff strategy", property.span)),
            (_, value) => {
                session.properties.push(Property {
                    key: property.key,
                    value,
                    span: property.span,
                });
                return Ok(());
            }
        }
        session.keys.push(key);
        Ok(())
    }

    /// `agent name:` followed by an indented property block.
    pub(crate) fn parse_agent(&mut self) -> ParseResult<AgentDefinition> {
        let start = self.expect(TokenKind::Agent)?.span;
        let name = self.expect_ident("an agent name")?;
        self.expect(TokenKind::Colon)?;
        if !self.at_indented_block() {
            return Err(ParseError::ExpectedIndentedBlock {
                construct: "agent definition",
                span: Span::point(self.last_end),
            });
        }

        let mut agent = AgentDefinition {
            name,
            model: None,
            prompt: None,
            skills: Vec::new(),
            permissions: None,
            properties: Vec::new(),
            keys: Vec::new(),
            span: start,
        };
        for property in self.parse_property_block()? {
            let key = property.key.clone();
            match (key.node.as_str(), property.value) {
                ("model", PropertyValue::Expr(value)) => {
                    let model =
                        model_name(value).ok_or_else(|| invalid(&key, "a model name", property.span))?;
                    set_once(&mut agent.model, &key, model)?
                }
                ("prompt", PropertyValue::Expr(Expr::String(prompt))) => {
                    set_once(&mut agent.prompt, &key, prompt)?
                }
                ("prompt", _) => return Err(invalid(&key, "a string", property.span)),
                ("skills", PropertyValue::Expr(value)) => {
                    if agent.keys.iter().any(|k| k.node == "skills") {
                        return Err(ParseError::DuplicateProperty {
                            key: key.node.clone(),
                            span: key.span,
                        });
                    }
                    agent.skills = skill_list(value)
                        .ok_or_else(|| invalid(&key, "an array of skill names", property.span))?;
                }
                ("permissions", PropertyValue::Nested(children)) => {
                    set_once(&mut agent.permissions, &key, children)?
                }
                ("permissions", _) => {
                    return Err(invalid(&key, "an indented block of permissions", property.span))
                }
                (_, value) => {
                    agent.properties.push(Property {
                        key: property.key,
                        value,
                        span: property.span,
                    });
                    continue;
                }
            }
            agent.keys.push(key);
        }
        agent.span = self.span_from(start);
        Ok(agent)
    }

    pub(crate) fn at_indented_block(&self) -> bool {
        self.check(&TokenKind::Newline) && matches!(self.peek_kind(), TokenKind::Indent)
    }

    /// `NL Indent (key: value NL)+ Dedent`
    fn parse_property_block(&mut self) -> ParseResult<Vec<Property>> {
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut properties = Vec::new();
        loop {
            self.skip_newlines();
            self.skip_comments();
            match self.current_kind() {
                TokenKind::Dedent | TokenKind::Eof => break,
                _ => {}
            }
            match self.parse_property() {
                Ok(property) => {
                    properties.push(property);
                    if let Err(error) = self.end_statement() {
                        self.report(error);
                        self.synchronize();
                    }
                }
                Err(error) => {
                    self.report(error);
                    self.synchronize();
                }
            }
        }
        self.expect(TokenKind::Dedent)?;
        Ok(properties)
    }

    /// `{ key: value, ... }` on one logical line.
    fn parse_inline_properties(&mut self) -> ParseResult<Vec<Property>> {
        self.expect(TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            properties.push(self.parse_property()?);
            if self.eat(&TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(properties)
    }

    fn parse_property(&mut self) -> ParseResult<Property> {
        let key = self.expect_property_key()?;
        self.expect(TokenKind::Colon)?;
        let value = if key.node == "context" {
            PropertyValue::Context(self.parse_context_spec()?)
        } else if self.at_indented_block() {
            PropertyValue::Nested(self.parse_property_block()?)
        } else {
            PropertyValue::Expr(self.parse_value()?)
        };
        Ok(Property {
            span: self.span_from(key.span),
            key,
            value,
        })
    }

    /// A property name. Keywords are plain names here, so `agent:` works.
    fn expect_property_key(&mut self) -> ParseResult<Ident> {
        match self.current_kind().keyword_text() {
            Some(word) if matches!(self.peek_kind(), TokenKind::Colon) => {
                let span = self.advance().span;
                Ok(Ident::new(SmolStr::from(word), span))
            }
            _ => self.expect_ident("a property name"),
        }
    }

    /// `( "positional" | key: "string" | key: number , ... )`
    pub(crate) fn parse_modifiers(&mut self) -> ParseResult<Vec<Modifier>> {
        self.expect(TokenKind::LParen)?;
        let mut modifiers = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let start = self.current_span();
            let key = match self.current_kind() {
                TokenKind::Identifier(word) => {
                    if !matches!(self.peek_kind(), TokenKind::Colon) {
                        return Err(ParseError::BareModifierValue {
                            word: word.clone(),
                            span: start,
                        });
                    }
                    let key = self.expect_ident("a modifier name")?;
                    self.advance();
                    Some(key)
                }
                _ => None,
            };
            let value = match self.current_kind() {
                TokenKind::String(_) => ModifierValue::String(self.expect_string("a value")?),
                TokenKind::Number(n) => {
                    let n = n.clone();
                    let span = self.advance().span;
                    ModifierValue::Number(Spanned::new(n, span))
                }
                TokenKind::Identifier(word) => {
                    return Err(ParseError::BareModifierValue {
                        word: word.clone(),
                        span: self.current_span(),
                    })
                }
                _ => return Err(self.unexpected("a quoted string or a number")),
            };
            modifiers.push(Modifier {
                key,
                value,
                span: self.span_from(start),
            });
            if self.eat(&TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(modifiers)
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &Ident, value: T) -> ParseResult<()> {
    if slot.is_some() {
        return Err(ParseError::DuplicateProperty {
            key: key.node.clone(),
            span: key.span,
        });
    }
    *slot = Some(value);
    Ok(())
}

fn invalid(key: &Ident, expected: &'static str, span: Span) -> ParseError {
    ParseError::InvalidPropertyValue {
        key: key.node.clone(),
        expected,
        span,
    }
}

/// `model: sonnet` or `model: "sonnet"`
fn model_name(value: Expr) -> Option<Ident> {
    match value {
        Expr::Ident(ident) => Some(ident),
        Expr::String(s) => Some(Ident::new(s.value, s.span)),
        _ => None,
    }
}

/// `skills: ["a", "b"]`
fn skill_list(value: Expr) -> Option<Vec<Ident>> {
    let Expr::Array(array) = value else {
        return None;
    };
    array
        .items
        .into_iter()
        .map(|item| match item {
            Expr::String(s) => Some(Ident::new(s.value, s.span)),
            _ => None,
        })
        .collect()
}
