//! Recursive descent parser for Carlos
//!
//! Parses a token stream into an untyped parse tree.

use super::ast::*;
use crate::errors::{CarlosError, CarlosResult, SourceSpan};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// The parser for Carlos source code
pub struct Parser<'src> {
    /// The source code (kept for error messages)
    _source: &'src str,
    /// Tokens from the lexer
    tokens: Vec<Token>,
    /// Current position in the token stream
    pos: usize,
}

impl<'src> Parser<'src> {
    /// Create a new parser for the given source code
    pub fn new(source: &'src str) -> Self {
        let lexer = Lexer::new(source);
        let tokens = lexer.tokenize();
        Self {
            _source: source,
            tokens,
            pos: 0,
        }
    }

    /// Parse the source code into a program
    pub fn parse(mut self) -> CarlosResult<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    // ==================== Helpers ====================

    /// Check if we've reached EOF
    fn is_at_end(&self) -> bool {
        self.peek().kind.is_eof()
    }

    /// Peek at the current token
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("tokens should have at least EOF"))
    }

    /// Get the current token's span
    fn current_span(&self) -> SourceSpan {
        self.peek().span
    }

    /// Advance and return the previous token
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    /// Get the previous token
    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    /// Check if current token matches
    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    /// Check if current token is a keyword
    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(k) if *k == kw)
    }

    /// Fail on a lexer error token, otherwise do nothing
    fn bail_on_error_token(&self) -> CarlosResult<()> {
        if let TokenKind::Error(message) = &self.peek().kind {
            return Err(CarlosError::lexer(message.clone(), self.current_span()));
        }
        Ok(())
    }

    /// Consume a token if it matches, otherwise error
    fn expect(&mut self, kind: &TokenKind, msg: &str) -> CarlosResult<&Token> {
        self.bail_on_error_token()?;
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(CarlosError::parser(
                format!("{}, found {}", msg, self.peek().kind),
                self.current_span(),
            ))
        }
    }

    /// Consume a keyword if it matches, otherwise error
    fn expect_keyword(&mut self, kw: Keyword, msg: &str) -> CarlosResult<SourceSpan> {
        self.bail_on_error_token()?;
        if self.check_keyword(kw) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(CarlosError::parser(
                format!("{}, found {}", msg, self.peek().kind),
                self.current_span(),
            ))
        }
    }

    /// Consume token if it matches
    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume keyword if it matches
    fn match_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Parse an identifier
    fn parse_ident(&mut self) -> CarlosResult<Ident> {
        self.bail_on_error_token()?;
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let span = self.current_span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(CarlosError::parser(
                format!("expected identifier, found {}", self.peek().kind),
                self.current_span(),
            )),
        }
    }

    // ==================== Statements ====================

    fn parse_statement(&mut self) -> CarlosResult<Stmt> {
        let start = self.current_span();
        self.bail_on_error_token()?;

        let kind = if self.check_keyword(Keyword::Let) || self.check_keyword(Keyword::Const) {
            self.parse_var_decl()?
        } else if self.check_keyword(Keyword::Struct) {
            self.parse_type_decl()?
        } else if self.check_keyword(Keyword::Function) {
            self.parse_fun_decl()?
        } else if self.match_keyword(Keyword::Break) {
            self.expect(&TokenKind::Semicolon, "expected ';' after 'break'")?;
            StmtKind::Break
        } else if self.match_keyword(Keyword::Return) {
            let value = if !self.check(&TokenKind::Semicolon) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(&TokenKind::Semicolon, "expected ';' after return")?;
            StmtKind::Return(value)
        } else if self.check_keyword(Keyword::If) {
            self.parse_if_stmt()?
        } else if self.check_keyword(Keyword::While) {
            self.parse_while_stmt()?
        } else if self.check_keyword(Keyword::Repeat) {
            self.parse_repeat_stmt()?
        } else if self.check_keyword(Keyword::For) {
            self.parse_for_stmt()?
        } else {
            self.parse_expr_led_stmt()?
        };

        let span = start.merge(self.previous().span);
        Ok(Stmt { kind, span })
    }

    fn parse_var_decl(&mut self) -> CarlosResult<StmtKind> {
        let constant = self.check_keyword(Keyword::Const);
        self.advance(); // let or const
        let name = self.parse_ident()?;
        self.expect(&TokenKind::Eq, "expected '=' in variable declaration")?;
        let initializer = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon, "expected ';' after declaration")?;

        Ok(StmtKind::VarDecl {
            constant,
            name,
            initializer,
        })
    }

    fn parse_type_decl(&mut self) -> CarlosResult<StmtKind> {
        self.expect_keyword(Keyword::Struct, "expected 'struct'")?;
        let name = self.parse_ident()?;
        self.expect(&TokenKind::LBrace, "expected '{' after struct name")?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let start = self.current_span();
            let field_name = self.parse_ident()?;
            self.expect(&TokenKind::Colon, "expected ':' after field name")?;
            let ty = self.parse_type()?;
            let span = start.merge(self.previous().span);
            fields.push(FieldDecl {
                name: field_name,
                ty,
                span,
            });

            // Comma between fields is optional
            if !self.check(&TokenKind::RBrace) {
                self.match_token(&TokenKind::Comma);
            }
        }

        self.expect(&TokenKind::RBrace, "expected '}' after struct fields")?;

        Ok(StmtKind::TypeDecl { name, fields })
    }

    fn parse_fun_decl(&mut self) -> CarlosResult<StmtKind> {
        self.expect_keyword(Keyword::Function, "expected 'function'")?;
        let name = self.parse_ident()?;

        self.expect(&TokenKind::LParen, "expected '(' after function name")?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::RParen, "expected ')' after parameters")?;

        let return_type = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(StmtKind::FunDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_params(&mut self) -> CarlosResult<Vec<Param>> {
        let mut params = Vec::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                let start = self.current_span();
                let name = self.parse_ident()?;
                self.expect(&TokenKind::Colon, "expected ':' after parameter name")?;
                let ty = self.parse_type()?;
                let span = start.merge(self.previous().span);
                params.push(Param { name, ty, span });

                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(params)
    }

    fn parse_if_stmt(&mut self) -> CarlosResult<StmtKind> {
        self.expect_keyword(Keyword::If, "expected 'if'")?;
        let test = self.parse_expr()?;
        let consequent = self.parse_block()?;

        let alternate = if self.match_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                let start = self.current_span();
                let nested = self.parse_if_stmt()?;
                let span = start.merge(self.previous().span);
                ElseBranch::If(Box::new(Stmt { kind: nested, span }))
            } else {
                ElseBranch::Block(self.parse_block()?)
            }
        } else {
            ElseBranch::None
        };

        Ok(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_while_stmt(&mut self) -> CarlosResult<StmtKind> {
        self.expect_keyword(Keyword::While, "expected 'while'")?;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;

        Ok(StmtKind::While { test, body })
    }

    fn parse_repeat_stmt(&mut self) -> CarlosResult<StmtKind> {
        self.expect_keyword(Keyword::Repeat, "expected 'repeat'")?;
        let count = self.parse_expr()?;
        let body = self.parse_block()?;

        Ok(StmtKind::Repeat { count, body })
    }

    fn parse_for_stmt(&mut self) -> CarlosResult<StmtKind> {
        self.expect_keyword(Keyword::For, "expected 'for'")?;
        let iterator = self.parse_ident()?;
        self.expect_keyword(Keyword::In, "expected 'in' after loop variable")?;

        let first = self.parse_expr()?;

        let op = if self.match_token(&TokenKind::HalfOpenRange) {
            Some(RangeOp::HalfOpen)
        } else if self.match_token(&TokenKind::ClosedRange) {
            Some(RangeOp::Closed)
        } else {
            None
        };

        if let Some(op) = op {
            let high = self.parse_expr()?;
            let body = self.parse_block()?;
            Ok(StmtKind::ForRange {
                iterator,
                low: first,
                op,
                high,
                body,
            })
        } else {
            let body = self.parse_block()?;
            Ok(StmtKind::ForEach {
                iterator,
                collection: first,
                body,
            })
        }
    }

    /// Parse a statement that begins with an expression: assignment,
    /// increment, decrement, or a call statement
    fn parse_expr_led_stmt(&mut self) -> CarlosResult<StmtKind> {
        let expr = self.parse_expr()?;

        if self.match_token(&TokenKind::Eq) {
            self.check_target(&expr, "assignment")?;
            let source = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon, "expected ';' after assignment")?;
            return Ok(StmtKind::Assignment {
                target: expr,
                source,
            });
        }

        if self.match_token(&TokenKind::PlusPlus) {
            self.check_target(&expr, "increment")?;
            self.expect(&TokenKind::Semicolon, "expected ';' after '++'")?;
            return Ok(StmtKind::Increment { target: expr });
        }

        if self.match_token(&TokenKind::MinusMinus) {
            self.check_target(&expr, "decrement")?;
            self.expect(&TokenKind::Semicolon, "expected ';' after '--'")?;
            return Ok(StmtKind::Decrement { target: expr });
        }

        self.expect(&TokenKind::Semicolon, "expected ';' after statement")?;

        if !matches!(expr.kind, ExprKind::Call { .. }) {
            return Err(CarlosError::parser(
                "only call expressions can be used as statements",
                expr.span,
            ));
        }

        Ok(StmtKind::Call(expr))
    }

    /// Assignment, increment, and decrement targets must be identifiers,
    /// subscripts, or member accesses
    fn check_target(&self, expr: &Expr, what: &str) -> CarlosResult<()> {
        match expr.kind {
            ExprKind::Id(_) | ExprKind::Subscript { .. } | ExprKind::Member { .. } => Ok(()),
            _ => Err(CarlosError::parser(
                format!("invalid {} target", what),
                expr.span,
            )),
        }
    }

    fn parse_block(&mut self) -> CarlosResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, "expected '{'")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RBrace, "expected '}'")?;

        Ok(statements)
    }

    // ==================== Types ====================

    fn parse_type(&mut self) -> CarlosResult<TypeExpr> {
        let start = self.current_span();
        self.bail_on_error_token()?;

        let mut ty = if self.match_token(&TokenKind::LBracket) {
            // Array type: [T]
            let element = self.parse_type()?;
            self.expect(&TokenKind::RBracket, "expected ']' after array element type")?;
            let span = start.merge(self.previous().span);
            TypeExpr {
                kind: TypeExprKind::Array(Box::new(element)),
                span,
            }
        } else if self.match_token(&TokenKind::LParen) {
            // Function type: (T1,...,Tn)->R
            let mut param_types = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    param_types.push(self.parse_type()?);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RParen, "expected ')' after parameter types")?;
            self.expect(&TokenKind::Arrow, "expected '->' in function type")?;
            let return_type = Box::new(self.parse_type()?);
            let span = start.merge(self.previous().span);
            TypeExpr {
                kind: TypeExprKind::Function {
                    param_types,
                    return_type,
                },
                span,
            }
        } else {
            // Named type: primitive or struct name, resolved during analysis
            let name = self.parse_ident()?;
            let span = name.span;
            TypeExpr {
                kind: TypeExprKind::Named(name),
                span,
            }
        };

        // Optional suffixes: T?, T??, ...
        while self.match_token(&TokenKind::Question) {
            let span = start.merge(self.previous().span);
            ty = TypeExpr {
                kind: TypeExprKind::Optional(Box::new(ty)),
                span,
            };
        }

        Ok(ty)
    }

    // ==================== Expressions ====================

    fn parse_expr(&mut self) -> CarlosResult<Expr> {
        // Conditional has the lowest precedence: test ? consequent : alternate
        let test = self.parse_binary_expr(1)?;

        if self.match_token(&TokenKind::Question) {
            let consequent = self.parse_binary_expr(1)?;
            self.expect(&TokenKind::Colon, "expected ':' in conditional expression")?;
            let alternate = self.parse_expr()?; // right-associative

            let span = test.span.merge(alternate.span);
            return Ok(Expr {
                kind: ExprKind::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                span,
            });
        }

        Ok(test)
    }

    /// Operator precedence (higher binds tighter)
    fn precedence(op: BinaryOp) -> u8 {
        match op {
            BinaryOp::UnwrapElse => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::BitOr => 4,
            BinaryOp::BitXor => 5,
            BinaryOp::BitAnd => 6,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 7,
            BinaryOp::Shl | BinaryOp::Shr => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
            BinaryOp::Pow => 11,
        }
    }

    fn binary_op_at(&self) -> Option<BinaryOp> {
        match &self.peek().kind {
            TokenKind::QuestionQuestion => Some(BinaryOp::UnwrapElse),
            TokenKind::PipePipe => Some(BinaryOp::Or),
            TokenKind::AmpAmp => Some(BinaryOp::And),
            TokenKind::Pipe => Some(BinaryOp::BitOr),
            TokenKind::Caret => Some(BinaryOp::BitXor),
            TokenKind::Amp => Some(BinaryOp::BitAnd),
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::BangEq => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::Ge),
            TokenKind::LtLt => Some(BinaryOp::Shl),
            TokenKind::GtGt => Some(BinaryOp::Shr),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            TokenKind::StarStar => Some(BinaryOp::Pow),
            _ => None,
        }
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> CarlosResult<Expr> {
        let mut left = self.parse_unary_expr()?;

        loop {
            let Some(op) = self.binary_op_at() else { break };

            let prec = Self::precedence(op);
            if prec < min_prec {
                break;
            }

            self.advance();

            // `**` is right-associative; everything else is left-associative
            let next_min = if op == BinaryOp::Pow { prec } else { prec + 1 };
            let right = self.parse_binary_expr(next_min)?;

            // Comparisons do not associate: a < b < c is a syntax error
            if prec == 7 {
                if let Some(next) = self.binary_op_at() {
                    if Self::precedence(next) == 7 {
                        return Err(CarlosError::parser(
                            "comparison operators do not associate",
                            self.current_span(),
                        ));
                    }
                }
            }

            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> CarlosResult<Expr> {
        let start = self.current_span();

        let op = match &self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Hash => Some(UnaryOp::Len),
            TokenKind::Keyword(Keyword::Some) => Some(UnaryOp::Some),
            TokenKind::Keyword(Keyword::Random) => Some(UnaryOp::Random),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary_expr()?;
            let span = start.merge(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }

        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> CarlosResult<Expr> {
        let mut expr = self.parse_primary_expr()?;

        loop {
            if self.match_token(&TokenKind::LBracket) {
                // Subscript: expr[index]
                let index = self.parse_expr()?;
                self.expect(&TokenKind::RBracket, "expected ']' after subscript")?;
                let span = expr.span.merge(self.previous().span);
                expr = Expr {
                    kind: ExprKind::Subscript {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            } else if self.match_token(&TokenKind::Dot) {
                let field = self.parse_ident()?;
                let span = expr.span.merge(field.span);
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        field,
                        optional_chain: false,
                    },
                    span,
                };
            } else if self.match_token(&TokenKind::QuestionDot) {
                let field = self.parse_ident()?;
                let span = expr.span.merge(field.span);
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        field,
                        optional_chain: true,
                    },
                    span,
                };
            } else if self.match_token(&TokenKind::LParen) {
                // Call: expr(args)
                let args = self.parse_args()?;
                self.expect(&TokenKind::RParen, "expected ')' after arguments")?;
                let span = expr.span.merge(self.previous().span);
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> CarlosResult<Vec<Expr>> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> CarlosResult<Expr> {
        let start = self.current_span();
        self.bail_on_error_token()?;

        if let TokenKind::Integer(n) = &self.peek().kind {
            let n = *n;
            self.advance();
            return Ok(Expr {
                kind: ExprKind::Integer(n),
                span: self.previous().span,
            });
        }

        if let TokenKind::Float(x) = &self.peek().kind {
            let x = *x;
            self.advance();
            return Ok(Expr {
                kind: ExprKind::Float(x),
                span: self.previous().span,
            });
        }

        if let TokenKind::String(s) = &self.peek().kind {
            let s = s.clone();
            self.advance();
            return Ok(Expr {
                kind: ExprKind::String(s),
                span: self.previous().span,
            });
        }

        if self.match_keyword(Keyword::True) {
            return Ok(Expr {
                kind: ExprKind::Bool(true),
                span: self.previous().span,
            });
        }
        if self.match_keyword(Keyword::False) {
            return Ok(Expr {
                kind: ExprKind::Bool(false),
                span: self.previous().span,
            });
        }

        // Empty optional: no T
        if self.match_keyword(Keyword::No) {
            let ty = self.parse_type()?;
            let span = start.merge(self.previous().span);
            return Ok(Expr {
                kind: ExprKind::EmptyOptional(ty),
                span,
            });
        }

        // Parenthesized expression (grouping only, no node)
        if self.match_token(&TokenKind::LParen) {
            let inner = self.parse_expr()?;
            self.expect(&TokenKind::RParen, "expected ')'")?;
            return Ok(inner);
        }

        // Array literal or empty array: [e1,...,en] or [](of T)
        if self.match_token(&TokenKind::LBracket) {
            if self.match_token(&TokenKind::RBracket) {
                // [](of T); a bare [] has no element type and is rejected
                self.expect(&TokenKind::LParen, "expected '(of T)' after '[]'")?;
                self.expect_keyword(Keyword::Of, "expected 'of' in empty array expression")?;
                let ty = self.parse_type()?;
                self.expect(&TokenKind::RParen, "expected ')' after element type")?;
                let span = start.merge(self.previous().span);
                return Ok(Expr {
                    kind: ExprKind::EmptyArray(ty),
                    span,
                });
            }

            let mut elements = vec![self.parse_expr()?];
            while self.match_token(&TokenKind::Comma) {
                elements.push(self.parse_expr()?);
            }
            self.expect(&TokenKind::RBracket, "expected ']' after array elements")?;
            let span = start.merge(self.previous().span);
            return Ok(Expr {
                kind: ExprKind::ArrayLit(elements),
                span,
            });
        }

        if let TokenKind::Ident(_) = &self.peek().kind {
            let name = self.parse_ident()?;
            return Ok(Expr {
                span: name.span,
                kind: ExprKind::Id(name),
            });
        }

        Err(CarlosError::parser(
            format!("expected expression, found {}", self.peek().kind),
            self.current_span(),
        ))
    }
}
