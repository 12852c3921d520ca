use std::mem;
use std::rc::Rc;

use log::debug;
use lox_common::error::{Error, ErrorS, SyntaxError};
use lox_common::stack;

use crate::ast::{
    Expr, ExprAssign, ExprCall, ExprGet, ExprGrouping, ExprInfix, ExprLiteral, ExprLogical,
    ExprPrefix, ExprS, ExprSet, ExprSuper, ExprThis, ExprVar, OpInfix, OpLogical, OpPrefix,
    Program, Span, Spanned, Stmt, StmtBlock, StmtClass, StmtExpr, StmtFun, StmtIf, StmtPrint,
    StmtReturn, StmtS, StmtVar, StmtWhile, Var,
};
use crate::lexer::{Token, TokenKind};

/// Maximum number of arguments in a call, and of parameters in a declaration.
pub const MAX_ARGS: usize = 255;

type ParseResult<T> = Result<T, ErrorS>;

/// Recursive-descent parser with panic-mode recovery.
///
/// A failed declaration is dropped from the output; the parser then skips to
/// the next statement boundary and keeps going, so one pass reports every
/// independent syntax error.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ErrorS>,
}

impl Parser {
    /// `tokens` must end with [`TokenKind::Eof`], as produced by the scanner.
    pub fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })));
        Self { tokens, current: 0, errors: Vec::new() }
    }

    pub fn parse(mut self) -> (Program, Vec<ErrorS>) {
        let mut program = Program::default();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                program.stmts.push(stmt);
            }
        }
        debug!("parsed {} statements, {} errors", program.stmts.len(), self.errors.len());
        (program, self.errors)
    }

    fn declaration(&mut self) -> Option<StmtS> {
        let result = if self.eat(&TokenKind::Class) {
            self.class_decl()
        } else if self.eat(&TokenKind::Fun) {
            let start = self.previous().span.clone();
            self.function().map(|fun| (Stmt::Fun(Rc::new(fun)), start.to(&self.previous().span)))
        } else if self.eat(&TokenKind::Var) {
            self.var_decl()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                self.errors.push(err);
                self.synchronize();
                None
            }
        }
    }

    fn class_decl(&mut self) -> ParseResult<StmtS> {
        let start = self.previous().span.clone();
        let name = self.expect_ident(|found| SyntaxError::ExpectedIdentifier { found })?;

        let super_ = if self.eat(&TokenKind::Less) {
            let (super_name, span) =
                self.expect_ident(|found| SyntaxError::ExpectedIdentifier { found })?;
            Some((Expr::Var(ExprVar { var: Var::new(super_name) }), span))
        } else {
            None
        };

        self.expect(&TokenKind::LtBrace, |found| SyntaxError::ExpectedLtBrace { found })?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RtBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function()?));
        }
        self.expect(&TokenKind::RtBrace, |found| SyntaxError::ExpectedRtBrace { found })?;

        let span = start.to(&self.previous().span);
        Ok((Stmt::Class(StmtClass { name, super_, methods }), span))
    }

    fn function(&mut self) -> ParseResult<StmtFun> {
        let name = self.expect_ident(|found| SyntaxError::ExpectedIdentifier { found })?;

        self.expect(&TokenKind::LtParen, |found| SyntaxError::ExpectedLtParen { found })?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RtParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let err = SyntaxError::TooManyParameters { max: MAX_ARGS };
                    self.errors.push(self.error_at_current(err));
                }
                params.push(self.expect_ident(|found| SyntaxError::ExpectedIdentifier { found })?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RtParen, |found| SyntaxError::ExpectedRtParen { found })?;

        self.expect(&TokenKind::LtBrace, |found| SyntaxError::ExpectedLtBrace { found })?;
        let body = self.block()?;
        Ok(StmtFun { name, params, body })
    }

    fn var_decl(&mut self) -> ParseResult<StmtS> {
        let start = self.previous().span.clone();
        let name = self.expect_ident(|found| SyntaxError::ExpectedVariableName { found })?;
        let value = if self.eat(&TokenKind::Equal) { Some(self.expression()?) } else { None };
        self.expect_semicolon()?;

        let span = start.to(&self.previous().span);
        Ok((Stmt::Var(StmtVar { name, value }), span))
    }

    fn statement(&mut self) -> ParseResult<StmtS> {
        stack::ensure_sufficient_stack(|| self.statement_inner())
    }

    fn statement_inner(&mut self) -> ParseResult<StmtS> {
        let start = self.peek().span.clone();
        if self.eat(&TokenKind::For) {
            return self.for_stmt(start);
        }

        let stmt = if self.eat(&TokenKind::If) {
            self.if_stmt()?
        } else if self.eat(&TokenKind::Print) {
            let value = self.expression()?;
            self.expect_semicolon()?;
            Stmt::Print(StmtPrint { value })
        } else if self.eat(&TokenKind::Return) {
            let value =
                if self.check(&TokenKind::Semicolon) { None } else { Some(self.expression()?) };
            self.expect_semicolon()?;
            Stmt::Return(StmtReturn { value })
        } else if self.eat(&TokenKind::While) {
            self.expect(&TokenKind::LtParen, |found| SyntaxError::ExpectedLtParen { found })?;
            let cond = self.expression()?;
            self.expect(&TokenKind::RtParen, |found| SyntaxError::ExpectedRtParen { found })?;
            let body = self.statement()?;
            Stmt::While(Box::new(StmtWhile { cond, body }))
        } else if self.eat(&TokenKind::LtBrace) {
            Stmt::Block(StmtBlock { stmts: self.block()? })
        } else {
            let value = self.expression()?;
            self.expect_semicolon()?;
            Stmt::Expr(StmtExpr { value })
        };

        let span = start.to(&self.previous().span);
        Ok((stmt, span))
    }

    fn if_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::LtParen, |found| SyntaxError::ExpectedLtParen { found })?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RtParen, |found| SyntaxError::ExpectedRtParen { found })?;

        let then = self.statement()?;
        let else_ = if self.eat(&TokenKind::Else) { Some(self.statement()?) } else { None };
        Ok(Stmt::If(Box::new(StmtIf { cond, then, else_ })))
    }

    /// Desugars `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_stmt(&mut self, start: Span) -> ParseResult<StmtS> {
        self.expect(&TokenKind::LtParen, |found| SyntaxError::ExpectedLtParen { found })?;

        let init = if self.eat(&TokenKind::Semicolon) {
            None
        } else if self.eat(&TokenKind::Var) {
            Some(self.var_decl()?)
        } else {
            let value = self.expression()?;
            self.expect_semicolon()?;
            let span = value.1.to(&self.previous().span);
            Some((Stmt::Expr(StmtExpr { value }), span))
        };

        let cond = if self.check(&TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.expect_semicolon()?;

        let incr = if self.check(&TokenKind::RtParen) { None } else { Some(self.expression()?) };
        self.expect(&TokenKind::RtParen, |found| SyntaxError::ExpectedRtParen { found })?;

        let mut body = self.statement()?;
        let span = start.to(&self.previous().span);

        if let Some(incr) = incr {
            let incr_span = incr.1.clone();
            let incr = (Stmt::Expr(StmtExpr { value: incr }), incr_span);
            body = (Stmt::Block(StmtBlock { stmts: vec![body, incr] }), span.clone());
        }

        let cond = cond.unwrap_or_else(|| (Expr::Literal(ExprLiteral::Bool(true)), span.clone()));
        body = (Stmt::While(Box::new(StmtWhile { cond, body })), span.clone());

        if let Some(init) = init {
            body = (Stmt::Block(StmtBlock { stmts: vec![init, body] }), span);
        }
        Ok(body)
    }

    /// Parses declarations up to and including the closing brace.
    fn block(&mut self) -> ParseResult<Vec<StmtS>> {
        stack::ensure_sufficient_stack(|| self.block_inner())
    }

    fn block_inner(&mut self) -> ParseResult<Vec<StmtS>> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RtBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.expect(&TokenKind::RtBrace, |found| SyntaxError::ExpectedRtBrace { found })?;
        Ok(stmts)
    }

    fn expression(&mut self) -> ParseResult<ExprS> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<ExprS> {
        stack::ensure_sufficient_stack(|| self.assignment_inner())
    }

    fn assignment_inner(&mut self) -> ParseResult<ExprS> {
        let (expr, span) = self.logic_or()?;
        if !self.eat(&TokenKind::Equal) {
            return Ok((expr, span));
        }

        let equals = self.previous().span.clone();
        let value = self.assignment()?;
        let assign_span = span.to(&value.1);
        match expr {
            Expr::Var(ExprVar { var }) => {
                Ok((Expr::Assign(Box::new(ExprAssign { var, value })), assign_span))
            }
            Expr::Get(get) => {
                let ExprGet { object, name } = *get;
                Ok((Expr::Set(Box::new(ExprSet { object, name, value })), assign_span))
            }
            expr => {
                let error = Error::SyntaxError(SyntaxError::InvalidAssignmentTarget);
                self.errors.push((error, equals));
                Ok((expr, span))
            }
        }
    }

    fn logic_or(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.logic_and()?;
        while self.eat(&TokenKind::Or) {
            let rt = self.logic_and()?;
            let span = expr.1.to(&rt.1);
            let logical = ExprLogical { lt: expr, op: OpLogical::Or, rt };
            expr = (Expr::Logical(Box::new(logical)), span);
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.equality()?;
        while self.eat(&TokenKind::And) {
            let rt = self.equality()?;
            let span = expr.1.to(&rt.1);
            let logical = ExprLogical { lt: expr, op: OpLogical::And, rt };
            expr = (Expr::Logical(Box::new(logical)), span);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::BangEqual => OpInfix::NotEqual,
                TokenKind::EqualEqual => OpInfix::Equal,
                _ => return Ok(expr),
            };
            self.advance();
            let rt = self.comparison()?;
            expr = infix(expr, op, rt);
        }
    }

    fn comparison(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Greater => OpInfix::Greater,
                TokenKind::GreaterEqual => OpInfix::GreaterEqual,
                TokenKind::Less => OpInfix::Less,
                TokenKind::LessEqual => OpInfix::LessEqual,
                _ => return Ok(expr),
            };
            self.advance();
            let rt = self.term()?;
            expr = infix(expr, op, rt);
        }
    }

    fn term(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Minus => OpInfix::Subtract,
                TokenKind::Plus => OpInfix::Add,
                _ => return Ok(expr),
            };
            self.advance();
            let rt = self.factor()?;
            expr = infix(expr, op, rt);
        }
    }

    fn factor(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Slash => OpInfix::Divide,
                TokenKind::Asterisk => OpInfix::Multiply,
                _ => return Ok(expr),
            };
            self.advance();
            let rt = self.unary()?;
            expr = infix(expr, op, rt);
        }
    }

    fn unary(&mut self) -> ParseResult<ExprS> {
        stack::ensure_sufficient_stack(|| self.unary_inner())
    }

    fn unary_inner(&mut self) -> ParseResult<ExprS> {
        let op = match self.peek().kind {
            TokenKind::Bang => OpPrefix::Not,
            TokenKind::Minus => OpPrefix::Negate,
            _ => return self.call(),
        };
        let start = self.advance().span.clone();
        let rt = self.unary()?;
        let span = start.to(&rt.1);
        Ok((Expr::Prefix(Box::new(ExprPrefix { op, rt })), span))
    }

    fn call(&mut self) -> ParseResult<ExprS> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::LtParen) {
                expr = self.finish_call(expr)?;
            } else if self.eat(&TokenKind::Dot) {
                let name = self.expect_ident(|found| SyntaxError::ExpectedIdentifier { found })?;
                let span = expr.1.to(&name.1);
                expr = (Expr::Get(Box::new(ExprGet { object: expr, name })), span);
            } else {
                return Ok(expr);
            }
        }
    }

    fn finish_call(&mut self, callee: ExprS) -> ParseResult<ExprS> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RtParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    let err = SyntaxError::TooManyArguments { max: MAX_ARGS };
                    self.errors.push(self.error_at_current(err));
                }
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let paren =
            self.expect(&TokenKind::RtParen, |found| SyntaxError::ExpectedRtParen { found })?.span;

        let span = callee.1.to(&paren);
        Ok((Expr::Call(Box::new(ExprCall { callee, args, paren })), span))
    }

    fn primary(&mut self) -> ParseResult<ExprS> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::False => Expr::Literal(ExprLiteral::Bool(false)),
            TokenKind::True => Expr::Literal(ExprLiteral::Bool(true)),
            TokenKind::Nil => Expr::Literal(ExprLiteral::Nil),
            TokenKind::Number(number) => Expr::Literal(ExprLiteral::Number(number)),
            TokenKind::String(string) => Expr::Literal(ExprLiteral::String(string)),
            TokenKind::This => Expr::This(ExprThis { var: Var::new("this") }),
            TokenKind::Identifier(name) => Expr::Var(ExprVar { var: Var::new(name) }),
            TokenKind::Super => {
                self.advance();
                self.expect(&TokenKind::Dot, |found| SyntaxError::ExpectedDot { found })?;
                let name = self.expect_ident(|found| SyntaxError::ExpectedIdentifier { found })?;
                let span = token.span.to(&name.1);
                return Ok((Expr::Super(ExprSuper { var: Var::new("super"), name }), span));
            }
            TokenKind::LtParen => {
                self.advance();
                let value = self.expression()?;
                self.expect(&TokenKind::RtParen, |found| SyntaxError::UnclosedParen { found })?;
                let span = token.span.to(&self.previous().span);
                return Ok((Expr::Grouping(Box::new(ExprGrouping { value })), span));
            }
            kind => {
                let found = kind.to_string();
                return Err(self.error_at_current(SyntaxError::ExpectedExpression { found }));
            }
        };
        self.advance();
        Ok((expr, token.span))
    }

    /// Discards tokens until the start of something that looks like a new
    /// statement.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn expect(
        &mut self,
        kind: &TokenKind,
        err: impl FnOnce(String) -> SyntaxError,
    ) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            let found = self.peek().kind.to_string();
            Err(self.error_at_current(err(found)))
        }
    }

    fn expect_ident(
        &mut self,
        err: impl FnOnce(String) -> SyntaxError,
    ) -> ParseResult<Spanned<String>> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Identifier(name) => {
                let ident = (name.clone(), token.span.clone());
                self.advance();
                Ok(ident)
            }
            kind => {
                let found = kind.to_string();
                Err(self.error_at_current(err(found)))
            }
        }
    }

    fn expect_semicolon(&mut self) -> ParseResult<Token> {
        self.expect(&TokenKind::Semicolon, |found| SyntaxError::ExpectedSemicolon { found })
    }

    fn error_at_current(&self, err: SyntaxError) -> ErrorS {
        (Error::SyntaxError(err), self.peek().span.clone())
    }

    /// Consumes the current token if it has the given kind.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        let matched = self.check(kind);
        if matched {
            self.advance();
        }
        matched
    }

    /// Compares kinds only, ignoring any literal payload.
    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(&self.peek().kind) == mem::discriminant(kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}

fn infix(lt: ExprS, op: OpInfix, rt: ExprS) -> ExprS {
    let span = lt.1.to(&rt.1);
    (Expr::Infix(Box::new(ExprInfix { lt, op, rt })), span)
}
