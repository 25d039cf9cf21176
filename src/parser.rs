//! Recursive-descent parser with one token of lookahead.
//!
//! Headers of `if`/`while`/`for` are cut out of the token stream up to the
//! first `:` outside any bracket and parsed by a separate parser instance, so
//! a condition can never swallow the colon that starts its suite.

use crate::ast::{BinaryOperator, Block, Expression, Param, Program, Statement};
use crate::token::{Span, Token, TokenKind};

pub mod error;

pub use error::{ParseError, ParseResult};

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if !matches!(tokens.last(), Some(token) if token.kind == TokenKind::EOF) {
            let span = tokens.last().map(|token| token.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, span));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.current().kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Def => self.parse_function_def(),
            TokenKind::Class => self.parse_class_def(),
            TokenKind::Try => self.parse_try(),
            _ => {
                let statement = self.parse_simple_statement()?;
                self.expect_line_end()?;
                Ok(statement)
            }
        }
    }

    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        match self.current().kind {
            TokenKind::Print => {
                self.advance();
                let args = self.parse_arguments()?;
                Ok(Statement::Print(args))
            }
            TokenKind::Return => {
                self.advance();
                if self.at_line_end() {
                    Ok(Statement::Return(None))
                } else {
                    Ok(Statement::Return(Some(self.parse_expression()?)))
                }
            }
            TokenKind::Break => {
                self.advance();
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Statement::Continue)
            }
            TokenKind::Pass => {
                self.advance();
                Ok(Statement::Pass)
            }
            TokenKind::Raise => {
                self.advance();
                Ok(Statement::Raise(self.parse_expression()?))
            }
            TokenKind::Nonlocal => {
                self.advance();
                let mut names = vec![self.expect_identifier()?];
                while self.eat(TokenKind::Comma) {
                    names.push(self.expect_identifier()?);
                }
                Ok(Statement::Nonlocal(names))
            }
            TokenKind::Import => {
                self.advance();
                Ok(Statement::Import(self.expect_identifier()?))
            }
            _ => self.parse_assignment_or_expression(),
        }
    }

    fn parse_assignment_or_expression(&mut self) -> ParseResult<Statement> {
        let target_span = self.current().span;
        let expr = self.parse_expression()?;
        if !self.eat(TokenKind::Equal) {
            return Ok(Statement::Expr(expr));
        }
        let value = self.parse_expression()?;
        match expr {
            Expression::Identifier(name) => Ok(Statement::Assign { name, value }),
            Expression::Attribute { object, name } => Ok(Statement::AttributeAssign {
                object: *object,
                name,
                value,
            }),
            Expression::Index { object, index } => Ok(Statement::IndexAssign {
                object: *object,
                index: *index,
                value,
            }),
            _ => Err(ParseError::InvalidAssignmentTarget {
                line: target_span.line,
                column: target_span.column,
            }),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        // Called on `if` and, for chained branches, on `elif`.
        self.advance();
        let condition = self.parse_header()?;
        let then_body = self.parse_suite()?;
        let else_body = match self.current().kind {
            TokenKind::Elif => Some(Block::from(vec![self.parse_if()?])),
            TokenKind::Else => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                Some(self.parse_suite()?)
            }
            _ => None,
        };
        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::While)?;
        let condition = self.parse_header()?;
        let body = self.parse_suite()?;
        Ok(Statement::While { condition, body })
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::For)?;
        let target = self.expect_identifier()?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_header()?;
        let body = self.parse_suite()?;
        Ok(Statement::For {
            target,
            iterable,
            body,
        })
    }

    fn parse_function_def(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Def)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let Span { line, column } = self.current().span;
                let param = self.expect_identifier()?;
                if params.iter().any(|existing| existing.name == param) {
                    return Err(ParseError::DuplicateParameter {
                        name: param,
                        line,
                        column,
                    });
                }
                let annotation = if self.eat(TokenKind::Colon) {
                    Some(self.expect_type_name()?)
                } else {
                    None
                };
                params.push(Param {
                    name: param,
                    annotation,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Statement::FunctionDef { name, params, body })
    }

    fn parse_class_def(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Class)?;
        let name = self.expect_identifier()?;
        let mut base = None;
        if self.eat(TokenKind::LParen) {
            if !self.check(TokenKind::RParen) {
                base = Some(self.expect_identifier()?);
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Statement::ClassDef { name, base, body })
    }

    fn parse_try(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Try)?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;
        self.expect(TokenKind::Except)?;
        self.expect(TokenKind::Colon)?;
        let handler = self.parse_suite()?;
        Ok(Statement::Try { body, handler })
    }

    /// Parses the statements after a header's `:`, either inline or as an
    /// indented block.
    fn parse_suite(&mut self) -> ParseResult<Block> {
        if !self.eat(TokenKind::Newline) {
            let statement = self.parse_simple_statement()?;
            self.expect_line_end()?;
            return Ok(Block::from(vec![statement]));
        }
        self.expect(TokenKind::Indent)?;
        let mut body = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.check(TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent)?;
        Ok(Block::from(body))
    }

    /// Cuts the tokens up to the first top-level `:` on this line and parses
    /// them as a standalone expression. Leaves the parser on the `:` consumed.
    fn parse_header(&mut self) -> ParseResult<Expression> {
        let mut depth = 0usize;
        let mut end = self.position;
        loop {
            let token = self.tokens[end];
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                }
                TokenKind::Colon if depth == 0 => break,
                TokenKind::Newline | TokenKind::EOF => {
                    return Err(unexpected(":", &token));
                }
                _ => {}
            }
            end += 1;
        }

        let mut header = self.tokens[self.position..end].to_vec();
        header.push(Token::new(TokenKind::EOF, self.tokens[end].span));
        let mut parser = Parser::new(header);
        let condition = parser.parse_expression()?;
        if !parser.check(TokenKind::EOF) {
            return Err(parser.error(":"));
        }

        self.position = end + 1;
        Ok(condition)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        match self.current().kind {
            TokenKind::Plus => {
                self.advance();
                self.parse_unary()
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(binary(Expression::Integer(-1), BinaryOperator::Mul, operand))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let name = self.expect_identifier()?;
                expr = if self.check(TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    Expression::MethodCall {
                        object: Box::new(expr),
                        method: name,
                        args,
                    }
                } else {
                    Expression::Attribute {
                        object: Box::new(expr),
                        name,
                    }
                };
            } else if self.eat(TokenKind::LBracket) {
                expr = self.parse_subscript(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parses `[index]` or `[start:stop:step]` after the opening bracket.
    fn parse_subscript(&mut self, object: Expression) -> ParseResult<Expression> {
        let start = if self.check(TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        if let Some(index) = &start
            && self.eat(TokenKind::RBracket)
        {
            return Ok(Expression::Index {
                object: Box::new(object),
                index: index.clone(),
            });
        }

        self.expect(TokenKind::Colon)?;
        let stop = if self.check(TokenKind::Colon) || self.check(TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let step = if self.eat(TokenKind::Colon) && !self.check(TokenKind::RBracket) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect(TokenKind::RBracket)?;
        Ok(Expression::Slice {
            object: Box::new(object),
            start,
            stop,
            step,
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = *self.current();
        match token.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Expression::Integer(value))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expression::String(value.to_string()))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Boolean(false))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expression::None)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    return Ok(Expression::Call {
                        name: name.to_string(),
                        args,
                    });
                }
                Ok(Expression::Identifier(name.to_string()))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    elements.push(self.parse_expression()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expression::List(elements))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(TokenKind::RBrace) {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(Expression::Dict(entries))
            }
            _ => Err(self.error("expression")),
        }
    }

    /// Parses a parenthesised, comma separated argument list.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_expression()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn consume_newlines(&mut self) -> bool {
        let mut consumed = false;
        while self.eat(TokenKind::Newline) {
            consumed = true;
        }
        consumed
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Newline | TokenKind::EOF)
    }

    fn expect_line_end(&mut self) -> ParseResult<()> {
        if self.eat(TokenKind::Newline) || self.check(TokenKind::EOF) {
            Ok(())
        } else {
            Err(self.error("newline"))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current().kind {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.error("identifier"))
        }
    }

    /// Annotation names may also be the `None` keyword.
    fn expect_type_name(&mut self) -> ParseResult<String> {
        if self.eat(TokenKind::None) {
            return Ok("None".to_string());
        }
        self.expect_identifier()
    }

    fn expect(&mut self, kind: TokenKind<'_>) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(kind.describe()))
        }
    }

    fn eat(&mut self, kind: TokenKind<'_>) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind<'_>) -> bool {
        self.current().kind == kind
    }

    fn current(&self) -> &Token<'a> {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        unexpected(expected, self.current())
    }
}

fn unexpected(expected: &str, found: &Token<'_>) -> ParseError {
    let Span { line, column } = found.span;
    ParseError::UnexpectedToken {
        expected: expected.to_string(),
        found: found.kind.to_string(),
        line,
        column,
    }
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(input: &str) -> ParseResult<Program> {
        parse_tokens(tokenize(input).expect("tokenize failed"))
    }

    fn int(value: i64) -> Expression {
        Expression::Integer(value)
    }

    fn identifier(name: &str) -> Expression {
        Expression::Identifier(name.to_string())
    }

    fn single_expression(input: &str) -> Expression {
        let program = parse(input).expect("parse failed");
        match program.statements.as_slice() {
            [Statement::Print(args)] => args[0].clone(),
            [Statement::Expr(expr)] => expr.clone(),
            other => panic!("unexpected statements {other:?}"),
        }
    }

    #[test]
    fn parses_simple_program() {
        let input = indoc! {"
            def fn(n: int, m):
                n = n + 4
                print(n)
            fn(1, 2)
        "};
        let program = parse(input).expect("parse failed");

        let expected = Program {
            statements: vec![
                Statement::FunctionDef {
                    name: "fn".to_string(),
                    params: vec![Param::annotated("n", "int"), Param::new("m")],
                    body: Block::from(vec![
                        Statement::Assign {
                            name: "n".to_string(),
                            value: binary(identifier("n"), BinaryOperator::Add, int(4)),
                        },
                        Statement::Print(vec![identifier("n")]),
                    ]),
                },
                Statement::Expr(Expression::Call {
                    name: "fn".to_string(),
                    args: vec![int(1), int(2)],
                }),
            ],
        };

        assert_eq!(program, expected);
    }

    #[test]
    fn respects_precedence_and_left_associativity() {
        assert_eq!(
            single_expression("print(1 + 2 * 3)"),
            binary(
                int(1),
                BinaryOperator::Add,
                binary(int(2), BinaryOperator::Mul, int(3))
            )
        );
        assert_eq!(
            single_expression("10 - 3 - 2"),
            binary(
                binary(int(10), BinaryOperator::Sub, int(3)),
                BinaryOperator::Sub,
                int(2)
            )
        );
        assert_eq!(
            single_expression("a < b == c"),
            binary(
                binary(identifier("a"), BinaryOperator::Less, identifier("b")),
                BinaryOperator::Equal,
                identifier("c")
            )
        );
    }

    #[test]
    fn desugars_unary_minus_into_multiplication() {
        assert_eq!(
            single_expression("print(-7 / 2)"),
            binary(
                binary(int(-1), BinaryOperator::Mul, int(7)),
                BinaryOperator::Div,
                int(2)
            )
        );
        assert_eq!(single_expression("+x"), identifier("x"));
    }

    #[test]
    fn parses_postfix_chains() {
        let expr = single_expression("a.b.c(1)[2][1:3]");
        let expected = Expression::Slice {
            object: Box::new(Expression::Index {
                object: Box::new(Expression::MethodCall {
                    object: Box::new(Expression::Attribute {
                        object: Box::new(identifier("a")),
                        name: "b".to_string(),
                    }),
                    method: "c".to_string(),
                    args: vec![int(1)],
                }),
                index: Box::new(int(2)),
            }),
            start: Some(Box::new(int(1))),
            stop: Some(Box::new(int(3))),
            step: None,
        };
        assert_eq!(expr, expected);

        let expr = single_expression("xs[::-1]");
        assert_eq!(
            expr,
            Expression::Slice {
                object: Box::new(identifier("xs")),
                start: None,
                stop: None,
                step: Some(Box::new(binary(int(-1), BinaryOperator::Mul, int(1)))),
            }
        );
    }

    #[test]
    fn classifies_assignment_targets() {
        let program = parse(indoc! {"
            x = 1
            obj.field = 2
            items[0] = 3
            x == 1
        "})
        .expect("parse failed");
        assert!(matches!(program.statements[0], Statement::Assign { .. }));
        assert!(matches!(
            program.statements[1],
            Statement::AttributeAssign { .. }
        ));
        assert!(matches!(program.statements[2], Statement::IndexAssign { .. }));
        assert!(matches!(program.statements[3], Statement::Expr(_)));
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        let err = parse("f(1) = 2\n").expect_err("expected failure");
        assert_eq!(err, ParseError::InvalidAssignmentTarget { line: 1, column: 0 });
    }

    #[test]
    fn rejects_duplicate_parameters() {
        let err = parse("def f(a, a):\n    return a\n").expect_err("expected failure");
        assert_eq!(
            err,
            ParseError::DuplicateParameter {
                name: "a".to_string(),
                line: 1,
                column: 9,
            }
        );
        assert!(parse("def f(a, b: int):\n    return a\n").is_ok());
    }

    #[test]
    fn parses_inline_and_block_suites() {
        let program = parse(indoc! {"
            try: raise 1
            except: print(\"caught\")
            while x < 3:
                x = x + 1
                if x == 2: continue
        "})
        .expect("parse failed");
        assert_eq!(
            program.statements[0],
            Statement::Try {
                body: Block::from(vec![Statement::Raise(int(1))]),
                handler: Block::from(vec![Statement::Print(vec![Expression::String(
                    "caught".to_string()
                )])]),
            }
        );
        let Statement::While { body, .. } = &program.statements[1] else {
            panic!("expected while");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn header_colon_inside_brackets_does_not_end_the_header() {
        let program = parse("for x in {1: 2}.keys(): print(x)\n").expect("parse failed");
        let Statement::For { iterable, .. } = &program.statements[0] else {
            panic!("expected for");
        };
        assert!(matches!(iterable, Expression::MethodCall { method, .. } if method == "keys"));
    }

    #[test]
    fn parses_elif_chain_as_nested_else() {
        let program = parse(indoc! {"
            if a:
                print(1)
            elif b:
                print(2)
            else:
                print(3)
        "})
        .expect("parse failed");
        let Statement::If {
            else_body: Some(else_body),
            ..
        } = &program.statements[0]
        else {
            panic!("expected if with else");
        };
        assert!(matches!(
            &else_body[0],
            Statement::If {
                else_body: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn parses_class_nonlocal_and_import() {
        let program = parse(indoc! {"
            import helpers
            class Derived(Base):
                count = 0
                def bump(self):
                    nonlocal a, b
        "})
        .expect("parse failed");
        assert_eq!(program.statements[0], Statement::Import("helpers".to_string()));
        let Statement::ClassDef { name, base, body } = &program.statements[1] else {
            panic!("expected class");
        };
        assert_eq!(name, "Derived");
        assert_eq!(base.as_deref(), Some("Base"));
        let Statement::FunctionDef { body: method, .. } = &body[1] else {
            panic!("expected method");
        };
        assert_eq!(
            method[0],
            Statement::Nonlocal(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn reports_expected_and_found_token() {
        let err = parse("while x < 3\n    x = 1\n").expect_err("expected failure");
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: ":".to_string(),
                found: "newline".to_string(),
                line: 1,
                column: 11,
            }
        );

        let err = parse("def f(:\n").expect_err("expected failure");
        assert!(err.to_string().contains("Expected identifier, found ':'"));
    }
}
