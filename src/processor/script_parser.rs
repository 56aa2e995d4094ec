//! Parser that consumes the lexer and builds a `Script` AST.
//!
//! Errors never abort the parse: each one is recorded as a diagnostic, the
//! parser skips to the next statement boundary and carries on, so a single
//! compile reports every syntax error it can find.
//
//  Grammar (informal):
//
//      script     ::= stmt* EOF
//      stmt       ::= 'var' IDENT '=' expr ';'
//                   | 'if' '(' expr ')' body ('else' body)?
//                   | 'while' '(' expr ')' body
//                   | 'foreach' '(' 'var' IDENT 'in' expr ')' body
//                   | 'throw' expr ';'
//                   | '{' stmt* '}'
//                   | expr ';'
//      body       ::= '{' stmt* '}' | stmt
//      expr       ::= or (('=' | '+=' | '-=') expr)?
//      or         ::= and ('||' and)*
//      and        ::= equality ('&&' equality)*
//      equality   ::= compare (('==' | '!=') compare)*
//      compare    ::= additive (('<' | '<=' | '>' | '>=') additive)*
//      additive   ::= term (('+' | '-') term)*
//      term       ::= unary (('*' | '/' | '%') unary)*
//      unary      ::= ('!' | '-') unary | postfix
//      postfix    ::= primary ('.' IDENT | '(' args ')' | '[' expr ']')*
//      primary    ::= INT | STR | 'true' | 'false' | 'null' | IDENT
//                   | '(' expr ')' | '[' args ']'

use super::ast::*;
use super::lexer::{Spanned, Token, tokenize};
use crate::model::{Diagnostic, Span};

type PResult<T> = Result<T, Diagnostic>;

/// Deepest syntax tree the parser builds. Each nested statement, bracket,
/// prefix operator, chained binary operator and postfix access is a level.
pub const MAX_NESTING: usize = 64;

const RESERVED: &[&str] = &[
    "var", "if", "else", "while", "foreach", "in", "throw", "true", "false", "null",
];

/// Parses a full script. The returned AST only holds the statements that
/// parsed cleanly; every problem is in the diagnostics list.
pub fn parse_script(src: &str) -> (Script, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = tokenize(src);
    let mut p = Parser::new(tokens);
    let body = p.parse();
    diagnostics.append(&mut p.diagnostics);
    diagnostics.sort_by_key(|d| d.span.offset);
    (Script { body }, diagnostics)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: usize,
    /// Set once `MAX_NESTING` is exceeded; the rest of the script is skipped.
    too_deep: bool,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
            too_deep: false,
        }
    }

    fn parse(&mut self) -> Vec<Stmt> {
        let mut res = Vec::<Stmt>::new();
        while !self.at_eof() {
            if self.check(&Token::RBrace) {
                let tok = self.advance();
                self.diagnostics.push(Diagnostic::error(
                    "SG1002",
                    tok.span,
                    "unexpected `}`: no block is open here",
                ));
                continue;
            }
            if let Some(stmt) = self.statement_or_recover() {
                res.push(stmt);
            }
        }
        res
    }

    // ── token helpers ────────────────────────────────────────────────

    fn peek(&self) -> &Spanned {
        // `tokenize` always ends the stream with `Eof`.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let tok = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().token == Token::Eof
    }

    fn check(&self, token: &Token) -> bool {
        &self.peek().token == token
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().token, Token::Ident(id) if id == keyword)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, what: &str) -> Diagnostic {
        let tok = self.peek();
        let code = if what == "`}`" && tok.token == Token::Eof {
            "SG1513"
        } else {
            "SG1002"
        };
        Diagnostic::error(
            code,
            tok.span,
            format!("expected {what}, found {}", tok.token.describe()),
        )
    }

    fn expect(&mut self, token: Token) -> PResult<Span> {
        if self.check(&token) {
            Ok(self.advance().span)
        } else {
            Err(self.expected(&token.describe()))
        }
    }

    /// Opens one nesting level. Past `MAX_NESTING` this records a single
    /// `SG8078`, jumps to end of input and fails.
    fn enter(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            let diag = Diagnostic::error(
                "SG8078",
                self.peek().span,
                "expression is too long or too complex to compile",
            );
            if !self.too_deep {
                self.too_deep = true;
                self.diagnostics.push(diag.clone());
            }
            self.pos = self.tokens.len() - 1;
            return Err(diag);
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: fn(&mut Self) -> PResult<T>) -> PResult<T> {
        self.enter()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<Span> {
        if self.check_keyword(keyword) {
            Ok(self.advance().span)
        } else {
            Err(self.expected(&format!("`{keyword}`")))
        }
    }

    fn expect_name(&mut self) -> PResult<(String, Span)> {
        match self.peek().token.clone() {
            Token::Ident(id) if !RESERVED.contains(&id.as_str()) => {
                let span = self.advance().span;
                Ok((id, span))
            }
            _ => Err(self.expected("an identifier")),
        }
    }

    /// Skips to just past the next `;`, or up to the next `}` or end of
    /// script, whichever comes first.
    fn synchronize(&mut self, start: usize) {
        if self.pos == start && !self.at_eof() && !self.check(&Token::RBrace) {
            self.advance();
        }
        while !self.at_eof() {
            if self.eat(&Token::Semicolon) || self.check(&Token::RBrace) {
                return;
            }
            self.advance();
        }
    }

    // ── statements ───────────────────────────────────────────────────

    fn statement_or_recover(&mut self) -> Option<Stmt> {
        let start = self.pos;
        match self.statement() {
            Ok(stmt) => Some(stmt),
            Err(diag) => {
                // Already reported, and everything after it was skipped.
                if !self.too_deep {
                    self.diagnostics.push(diag);
                }
                self.synchronize(start);
                None
            }
        }
    }

    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement_kind)
    }

    fn statement_kind(&mut self) -> PResult<Stmt> {
        let span = self.peek().span;
        let keyword = match &self.peek().token {
            Token::Ident(id) => id.clone(),
            Token::LBrace => {
                let body = self.block()?;
                return Ok(Stmt {
                    kind: StmtKind::Block(body),
                    span,
                });
            }
            _ => String::new(),
        };

        let kind = match keyword.as_str() {
            "var" => self.parse_var()?,
            "if" => self.parse_if()?,
            "while" => self.parse_while()?,
            "foreach" => self.parse_foreach()?,
            "throw" => {
                self.advance();
                let value = self.expression()?;
                self.expect(Token::Semicolon)?;
                StmtKind::Throw(value)
            }
            "else" => return Err(self.expected("a statement")),
            _ => {
                let expr = self.expression()?;
                self.expect(Token::Semicolon)?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, span })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) && !self.at_eof() {
            if let Some(stmt) = self.statement_or_recover() {
                body.push(stmt);
            }
        }
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn body(&mut self) -> PResult<Vec<Stmt>> {
        if self.check(&Token::LBrace) {
            self.block()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn parse_var(&mut self) -> PResult<StmtKind> {
        self.advance();
        let (name, _) = self.expect_name()?;
        self.expect(Token::Assign)?;
        let init = self.expression()?;
        self.expect(Token::Semicolon)?;
        Ok(StmtKind::Var { name, init })
    }

    fn parenthesized(&mut self) -> PResult<Expr> {
        self.expect(Token::LParen)?;
        let expr = self.expression()?;
        self.expect(Token::RParen)?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> PResult<StmtKind> {
        self.advance();
        let condition = self.parenthesized()?;
        let then_branch = self.body()?;
        let else_branch = if self.check_keyword("else") {
            self.advance();
            Some(self.body()?)
        } else {
            None
        };
        Ok(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> PResult<StmtKind> {
        self.advance();
        let condition = self.parenthesized()?;
        let body = self.body()?;
        Ok(StmtKind::While { condition, body })
    }

    fn parse_foreach(&mut self) -> PResult<StmtKind> {
        self.advance();
        self.expect(Token::LParen)?;
        self.expect_keyword("var")?;
        let (binding, _) = self.expect_name()?;
        self.expect_keyword("in")?;
        let items = self.expression()?;
        self.expect(Token::RParen)?;
        let body = self.body()?;
        Ok(StmtKind::Foreach {
            binding,
            items,
            body,
        })
    }

    // ── expressions ──────────────────────────────────────────────────

    fn expression(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let target = self.logic_or()?;
        let op = match self.peek().token {
            Token::Assign => AssignOp::Set,
            Token::PlusAssign => AssignOp::Add,
            Token::MinusAssign => AssignOp::Sub,
            _ => return Ok(target),
        };
        let span = self.advance().span;
        let value = self.expression()?;
        Ok(Expr {
            kind: ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        })
    }

    /// A left-associative chain deepens the tree by one level per operator.
    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> PResult<Expr>,
        ops: &[(Token, BinOp)],
    ) -> PResult<Expr> {
        let base = self.depth;
        let result = self.binary_chain(next, ops);
        self.depth = base;
        result
    }

    fn binary_chain(
        &mut self,
        next: fn(&mut Self) -> PResult<Expr>,
        ops: &[(Token, BinOp)],
    ) -> PResult<Expr> {
        let mut lhs = next(self)?;
        loop {
            let Some(op) = ops
                .iter()
                .find(|(tok, _)| self.check(tok))
                .map(|(_, op)| *op)
            else {
                return Ok(lhs);
            };
            self.enter()?;
            let span = self.advance().span;
            let rhs = next(self)?;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }
    }

    fn logic_or(&mut self) -> PResult<Expr> {
        self.binary_level(Self::logic_and, &[(Token::OrOr, BinOp::Or)])
    }

    fn logic_and(&mut self) -> PResult<Expr> {
        self.binary_level(Self::equality, &[(Token::AndAnd, BinOp::And)])
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary_level(
            Self::comparison,
            &[(Token::EqEq, BinOp::Eq), (Token::NotEq, BinOp::Ne)],
        )
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.binary_level(
            Self::additive,
            &[
                (Token::Lt, BinOp::Lt),
                (Token::Le, BinOp::Le),
                (Token::Gt, BinOp::Gt),
                (Token::Ge, BinOp::Ge),
            ],
        )
    }

    fn additive(&mut self) -> PResult<Expr> {
        self.binary_level(
            Self::term,
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
        )
    }

    fn term(&mut self) -> PResult<Expr> {
        self.binary_level(
            Self::unary,
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::Percent, BinOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek().token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        let span = self.advance().span;
        let operand = self.nested(Self::unary)?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let result = self.postfix_chain();
        self.depth = base;
        result
    }

    fn postfix_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if !matches!(self.peek().token, Token::Dot | Token::LParen | Token::LBracket) {
                return Ok(expr);
            }
            self.enter()?;
            if self.eat(&Token::Dot) {
                let (name, span) = self.expect_name()?;
                expr = Expr {
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        name,
                    },
                    span,
                };
            } else if self.check(&Token::LParen) {
                self.advance();
                let args = self.arguments(Token::RParen)?;
                let span = expr.span;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else if self.check(&Token::LBracket) {
                let span = self.advance().span;
                let index = self.expression()?;
                self.expect(Token::RBracket)?;
                expr = Expr {
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to and including `close`; the
    /// opening token is already consumed.
    fn arguments(&mut self, close: Token) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&close) {
                return Ok(args);
            }
            if !self.eat(&Token::Comma) {
                return Err(self.expected(&format!("`,` or {}", close.describe())));
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let Spanned { token, span } = self.peek().clone();
        let kind = match token {
            Token::Int(n) => ExprKind::Int(n),
            Token::Str(s) => ExprKind::Str(s),
            Token::Ident(id) => match id.as_str() {
                "true" => ExprKind::Bool(true),
                "false" => ExprKind::Bool(false),
                "null" => ExprKind::Null,
                kw if RESERVED.contains(&kw) => {
                    return Err(Diagnostic::error(
                        "SG1002",
                        span,
                        format!("invalid expression term `{kw}`"),
                    ));
                }
                _ => ExprKind::Name(id),
            },
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                let items = self.arguments(Token::RBracket)?;
                return Ok(Expr {
                    kind: ExprKind::List(items),
                    span,
                });
            }
            _ => return Err(self.expected("an expression")),
        };
        self.advance();
        Ok(Expr { kind, span })
    }
}
