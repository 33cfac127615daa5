//! Recursive-descent parser for Vague source text (spec.md §4.2).
//!
//! Newline tokens are stripped before parsing begins; they exist only so
//! the lexer can report accurate line numbers. The parser runs in batch
//! mode: on a syntax error it records a [`ParseError`] and synchronizes to
//! the next statement-starter token (or past a closing brace) rather than
//! aborting, so one source can yield several diagnostics in one pass
//! (spec.md §8 property 4).

use crate::ast::*;
use crate::error::ParseError;
use crate::pratt::{infix_binding_power, prefix_binding_power, POSTFIX_BINDING_POWER};
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .collect();
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Parses a full program, recovering from errors at statement
    /// boundaries and returning every diagnostic collected along the way.
    pub fn parse_program(mut self) -> (Program, Vec<ParseError>) {
        let mut statements = Vec::new();
        while !self.at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        (Program { statements }, self.errors)
    }

    // === token stream plumbing ===

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(ParseError::expected(kind, found.kind, found.span))
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        if self.check(&TokenKind::Identifier) {
            Ok(self.advance().lexeme)
        } else {
            let found = self.peek().clone();
            Err(ParseError::expected(
                TokenKind::Identifier,
                found.kind,
                found.span,
            ))
        }
    }

    /// Synchronizes after an error: advances to the next statement-starter
    /// token or past a closing brace (spec.md §4.2).
    fn synchronize(&mut self) {
        while !self.at_end() {
            if self.peek_kind().starts_statement() {
                return;
            }
            if self.check(&TokenKind::RightBrace) {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    // === statements ===

    fn parse_statement(&mut self) -> PResult<Statement> {
        match self.peek_kind() {
            TokenKind::Import => self.parse_import().map(Statement::Import),
            TokenKind::Let => self.parse_let().map(Statement::Let),
            TokenKind::Schema => self.parse_schema().map(Statement::Schema),
            TokenKind::Context => self.parse_context_def().map(Statement::Context),
            TokenKind::Distribution => self.parse_distribution_def().map(Statement::Distribution),
            TokenKind::Dataset => self.parse_dataset().map(Statement::Dataset),
            _ => {
                let found = self.peek().clone();
                Err(ParseError::new(
                    format!("expected a statement, found {}", found.kind),
                    found.kind,
                    found.span,
                ))
            }
        }
    }

    fn parse_import(&mut self) -> PResult<ImportStmt> {
        let start = self.expect(TokenKind::Import)?.span;
        let mut names = vec![self.expect_identifier()?];
        while self.matches(&TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(TokenKind::From)?;
        let path_tok = self.expect(TokenKind::String)?;
        Ok(ImportStmt {
            names,
            path: path_tok.lexeme.clone(),
            span: start.merge(&path_tok.span),
        })
    }

    fn parse_let(&mut self) -> PResult<LetStmt> {
        let start = self.expect(TokenKind::Let)?.span;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Equal)?;
        let value = self.parse_expr()?;
        Ok(LetStmt {
            name,
            span: start.merge(&self.previous_span()),
            value,
        })
    }

    fn previous_span(&self) -> crate::span::Span {
        self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].span
    }

    /// `affects Ctx(args)` or `with Ctx(args)`.
    fn parse_context_application(&mut self, keyword: TokenKind) -> PResult<ContextApplication> {
        let start = self.expect(keyword)?.span;
        let name = self.expect_identifier()?;
        let mut args = Vec::new();
        if self.matches(&TokenKind::LeftParen) {
            if !self.check(&TokenKind::RightParen) {
                args.push(self.parse_expr()?);
                while self.matches(&TokenKind::Comma) {
                    args.push(self.parse_expr()?);
                }
            }
            self.expect(TokenKind::RightParen)?;
        }
        Ok(ContextApplication {
            name,
            args,
            span: start.merge(&self.previous_span()),
        })
    }

    fn parse_schema(&mut self) -> PResult<SchemaDef> {
        let start = self.expect(TokenKind::Schema)?.span;
        let name = self.expect_identifier()?;
        let base = if self.matches(&TokenKind::From) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let mut contexts = Vec::new();
        while self.check(&TokenKind::Affects) {
            contexts.push(self.parse_context_application(TokenKind::Affects)?);
        }
        self.expect(TokenKind::LeftBrace)?;

        let mut fields = Vec::new();
        let mut assumes = Vec::new();
        let mut constraints = Vec::new();
        let mut then = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            if self.check(&TokenKind::Assume) {
                assumes.push(self.parse_assume_clause()?);
            } else if self.check(&TokenKind::Constraints) {
                constraints.extend(self.parse_constraints_block()?);
            } else if self.check(&TokenKind::Then) {
                then.extend(self.parse_then_block()?);
            } else {
                fields.push(self.parse_field_def()?);
                self.matches(&TokenKind::Comma);
            }
        }
        let end = self.expect(TokenKind::RightBrace)?.span;

        Ok(SchemaDef {
            name,
            base,
            contexts,
            fields,
            assumes,
            constraints,
            then,
            span: start.merge(&end),
        })
    }

    fn parse_assume_clause(&mut self) -> PResult<AssumeClause> {
        let start = self.expect(TokenKind::Assume)?.span;
        let condition = if self.matches(&TokenKind::If) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace)?;
        let mut exprs = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            exprs.push(self.parse_expr()?);
            self.matches(&TokenKind::Comma);
        }
        let end = self.expect(TokenKind::RightBrace)?.span;
        Ok(AssumeClause {
            condition,
            exprs,
            span: start.merge(&end),
        })
    }

    fn parse_constraints_block(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::Constraints)?;
        self.expect(TokenKind::LeftBrace)?;
        let mut exprs = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            exprs.push(self.parse_expr()?);
            self.matches(&TokenKind::Comma);
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(exprs)
    }

    fn parse_then_block(&mut self) -> PResult<Vec<Mutation>> {
        self.expect(TokenKind::Then)?;
        self.expect(TokenKind::LeftBrace)?;
        let mut mutations = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            mutations.push(self.parse_mutation()?);
            self.matches(&TokenKind::Comma);
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(mutations)
    }

    fn parse_mutation(&mut self) -> PResult<Mutation> {
        let target = self.parse_postfix_primary()?;
        let start = self.previous_span();
        let op = if self.matches(&TokenKind::Equal) {
            MutationOp::Assign
        } else if self.matches(&TokenKind::PlusEq) {
            MutationOp::AddAssign
        } else {
            let found = self.peek().clone();
            return Err(ParseError::new(
                format!("expected '=' or '+=' in mutation, found {}", found.kind),
                found.kind,
                found.span,
            ));
        };
        let value = self.parse_expr()?;
        Ok(Mutation {
            target,
            op,
            value,
            span: start.merge(&self.previous_span()),
        })
    }

    /// `(private)? name (?|??)* ':' type modifiers*`
    fn parse_field_def(&mut self) -> PResult<FieldDef> {
        let start_tok = self.peek().clone();
        let mut flags = FieldFlags::default();
        if self.matches(&TokenKind::Private) {
            flags.private = true;
        }
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_field_type()?;
        if matches!(ty, FieldType::Expression(_)) {
            flags.computed = true;
        }
        if let FieldType::Generator { name: gen_name, .. } = &ty {
            if gen_name == "unique" {
                flags.unique = true;
            }
        }

        let mut when = None;
        let mut distribution = None;
        let mut where_clauses = Vec::new();
        loop {
            if self.matches(&TokenKind::DoubleQuestion) {
                flags.optional = true;
            } else if self.matches(&TokenKind::Question) {
                flags.nullable = true;
            } else if self.matches(&TokenKind::When) {
                when = Some(self.parse_expr()?);
            } else if self.matches(&TokenKind::Tilde) {
                distribution = Some(self.parse_expr()?);
            } else if self.matches(&TokenKind::Where) {
                where_clauses.push(self.parse_expr()?);
            } else {
                break;
            }
        }

        Ok(FieldDef {
            name,
            ty,
            flags,
            when,
            distribution,
            where_clauses,
            span: start_tok.span.merge(&self.previous_span()),
        })
    }

    fn parse_primitive_type(&mut self) -> Option<PrimitiveType> {
        let prim = match self.peek_kind() {
            TokenKind::Int => PrimitiveType::Int,
            TokenKind::Decimal => PrimitiveType::Decimal,
            TokenKind::Date => PrimitiveType::Date,
            TokenKind::Identifier if self.peek().lexeme == "string" => PrimitiveType::String,
            TokenKind::Identifier if self.peek().lexeme == "boolean" => PrimitiveType::Boolean,
            _ => return None,
        };
        self.advance();
        Some(prim)
    }

    fn parse_field_type(&mut self) -> PResult<FieldType> {
        if self.matches(&TokenKind::Equal) {
            return Ok(FieldType::Expression(Box::new(self.parse_expr()?)));
        }

        if let Some(base) = self.parse_primitive_type() {
            if self.matches(&TokenKind::In) {
                let min_start = self.parse_additive()?;
                self.expect(TokenKind::DotDot)?;
                let max_end = self.parse_additive()?;
                return Ok(FieldType::Range {
                    base,
                    min: Some(Box::new(min_start)),
                    max: Some(Box::new(max_end)),
                });
            }
            return Ok(FieldType::Primitive(base));
        }

        // Everything else starts with an expression; decide what kind of
        // field type it is from what follows.
        let first = self.parse_expr_no_pipe()?;

        if self.matches(&TokenKind::Of) {
            let element = self.expect_identifier()?;
            let per_parent = if self.matches(&TokenKind::Per) {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            return Ok(FieldType::Collection {
                cardinality: Box::new(first),
                element,
                per_parent,
            });
        }

        if self.check(&TokenKind::Colon) || self.check(&TokenKind::Pipe) {
            let mut options = Vec::new();
            if self.matches(&TokenKind::Colon) {
                let value = self.parse_expr_no_pipe()?;
                options.push(WeightedOption {
                    weight: Some(first),
                    value,
                });
            } else {
                options.push(WeightedOption {
                    weight: None,
                    value: first,
                });
            }
            while self.matches(&TokenKind::Pipe) {
                let next = self.parse_expr_no_pipe()?;
                if self.matches(&TokenKind::Colon) {
                    let value = self.parse_expr_no_pipe()?;
                    options.push(WeightedOption {
                        weight: Some(next),
                        value,
                    });
                } else {
                    options.push(WeightedOption {
                        weight: None,
                        value: next,
                    });
                }
            }
            return Ok(FieldType::Superposition(options));
        }

        match first {
            Expr::Call { callee, args } => Ok(FieldType::Generator { name: callee, args }),
            Expr::Identifier(name) => Ok(FieldType::Reference(name)),
            Expr::QualifiedName(parts) => Ok(FieldType::Reference(parts.join("."))),
            other => Ok(FieldType::Expression(Box::new(other))),
        }
    }

    // === contexts, distributions, datasets ===

    fn parse_context_def(&mut self) -> PResult<ContextDef> {
        let start = self.expect(TokenKind::Context)?.span;
        let name = self.expect_identifier()?;
        let mut params = Vec::new();
        if self.matches(&TokenKind::LeftParen) {
            if !self.check(&TokenKind::RightParen) {
                params.push(self.expect_identifier()?);
                while self.matches(&TokenKind::Comma) {
                    params.push(self.expect_identifier()?);
                }
            }
            self.expect(TokenKind::RightParen)?;
        }
        self.expect(TokenKind::LeftBrace)?;
        let mut bindings = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            bindings.push(self.parse_let()?);
            self.matches(&TokenKind::Comma);
        }
        let end = self.expect(TokenKind::RightBrace)?.span;
        Ok(ContextDef {
            name,
            params,
            bindings,
            span: start.merge(&end),
        })
    }

    fn parse_distribution_def(&mut self) -> PResult<DistributionDef> {
        let start = self.expect(TokenKind::Distribution)?.span;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LeftBrace)?;
        let mut buckets = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            let value = self.parse_expr_no_pipe()?;
            let option = if self.matches(&TokenKind::Colon) {
                let weight = value;
                let value = self.parse_expr_no_pipe()?;
                WeightedOption {
                    weight: Some(weight),
                    value,
                }
            } else {
                WeightedOption {
                    weight: None,
                    value,
                }
            };
            buckets.push(option);
            if !self.matches(&TokenKind::Pipe) {
                self.matches(&TokenKind::Comma);
            }
        }
        let end = self.expect(TokenKind::RightBrace)?.span;
        Ok(DistributionDef {
            name,
            buckets,
            span: start.merge(&end),
        })
    }

    fn parse_dataset(&mut self) -> PResult<DatasetDef> {
        let start = self.expect(TokenKind::Dataset)?.span;
        let name = self.expect_identifier()?;
        let violating = self.matches(&TokenKind::Violating);
        let mut contexts = Vec::new();
        while self.check(&TokenKind::With) {
            contexts.push(self.parse_context_application(TokenKind::With)?);
        }
        self.expect(TokenKind::LeftBrace)?;
        let mut collections = Vec::new();
        let mut validate = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            if self.check(&TokenKind::Validate) {
                validate.extend(self.parse_validate_block()?);
            } else {
                collections.push(self.parse_collection_def()?);
                self.matches(&TokenKind::Comma);
            }
        }
        let end = self.expect(TokenKind::RightBrace)?.span;
        Ok(DatasetDef {
            name,
            violating,
            contexts,
            collections,
            validate,
            span: start.merge(&end),
        })
    }

    fn parse_validate_block(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::Validate)?;
        self.expect(TokenKind::LeftBrace)?;
        let mut exprs = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            exprs.push(self.parse_expr()?);
            self.matches(&TokenKind::Comma);
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(exprs)
    }

    /// `name: cardinality of Schema (per parent)? (with Ctx(args))* { overrides }?`
    fn parse_collection_def(&mut self) -> PResult<CollectionDef> {
        let start_tok = self.peek().clone();
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let cardinality = self.parse_expr_no_pipe()?;
        self.expect(TokenKind::Of)?;
        let schema = self.expect_identifier()?;
        let per_parent = if self.matches(&TokenKind::Per) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let mut contexts = Vec::new();
        while self.check(&TokenKind::With) {
            contexts.push(self.parse_context_application(TokenKind::With)?);
        }
        let mut field_overrides = Vec::new();
        if self.matches(&TokenKind::LeftBrace) {
            while !self.check(&TokenKind::RightBrace) && !self.at_end() {
                let field_name = self.expect_identifier()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expr()?;
                field_overrides.push((field_name, value));
                self.matches(&TokenKind::Comma);
            }
            self.expect(TokenKind::RightBrace)?;
        }
        Ok(CollectionDef {
            name,
            cardinality,
            per_parent,
            schema,
            contexts,
            field_overrides,
            span: start_tok.span.merge(&self.previous_span()),
        })
    }

    // === expressions ===

    /// Entry point: the ternary is the loosest-binding construct.
    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_ternary(false)
    }

    /// Parses an expression but treats a bare top-level `|` as the end of
    /// the expression rather than a superposition-combinator, so callers
    /// that build their own weighted-option chains (field types,
    /// distributions) can reuse the full precedence table underneath.
    fn parse_expr_no_pipe(&mut self) -> PResult<Expr> {
        self.parse_ternary(true)
    }

    fn parse_ternary(&mut self, no_pipe: bool) -> PResult<Expr> {
        let cond = self.parse_binary(0, no_pipe)?;
        if self.matches(&TokenKind::Question) {
            let then_branch = self.parse_ternary(no_pipe)?;
            self.expect(TokenKind::Colon)?;
            let else_branch = self.parse_ternary(no_pipe)?;
            return Ok(Expr::Ternary {
                condition: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, min_bp: u8, no_pipe: bool) -> PResult<Expr> {
        let mut left = self.parse_unary(no_pipe)?;
        loop {
            if no_pipe && self.check(&TokenKind::Pipe) {
                break;
            }
            let kind = self.peek_kind().clone();
            let Some((l_bp, r_bp)) = infix_binding_power(&kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let right = self.parse_binary(r_bp, no_pipe)?;
            left = match kind {
                TokenKind::And => Expr::Logical {
                    left: Box::new(left),
                    op: LogicalOp::And,
                    right: Box::new(right),
                },
                TokenKind::Or => Expr::Logical {
                    left: Box::new(left),
                    op: LogicalOp::Or,
                    right: Box::new(right),
                },
                TokenKind::Pipe => {
                    let mut options = match left {
                        Expr::Superposition(opts) => opts,
                        other => vec![option_from(other)],
                    };
                    options.push(option_from(right));
                    Expr::Superposition(options)
                }
                TokenKind::DotDot => Expr::Range {
                    min: Box::new(left),
                    max: Box::new(right),
                },
                other => Expr::Binary {
                    left: Box::new(left),
                    op: binary_op_for(&other),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self, no_pipe: bool) -> PResult<Expr> {
        let kind = self.peek_kind().clone();
        if let Some(_bp) = prefix_binding_power(&kind) {
            self.advance();
            let operand = self.parse_unary(no_pipe)?;
            return Ok(match kind {
                TokenKind::Not => Expr::Not(Box::new(operand)),
                TokenKind::Minus => Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                _ => unreachable!(),
            });
        }
        self.parse_postfix_primary()
    }

    fn parse_postfix_primary(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let field = self.expect_identifier()?;
                expr = append_qualified(expr, field);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Number => {
                self.advance();
                if tok.lexeme.contains('.') {
                    let v: f64 = tok.lexeme.parse().unwrap_or(0.0);
                    Ok(Expr::Literal(Literal::Decimal(v)))
                } else {
                    let v: i64 = tok.lexeme.parse().unwrap_or(0);
                    Ok(Expr::Literal(Literal::Int(v)))
                }
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(Literal::String(tok.lexeme.clone())))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Identifier => {
                self.advance();
                let parts: Vec<String> = tok.lexeme.split('.').map(str::to_string).collect();
                if self.check(&TokenKind::LeftParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RightParen) {
                        args.push(self.parse_expr()?);
                        while self.matches(&TokenKind::Comma) {
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(TokenKind::RightParen)?;
                    Ok(Expr::Call {
                        callee: tok.lexeme.clone(),
                        args,
                    })
                } else if parts.len() > 1 {
                    Ok(Expr::QualifiedName(parts))
                } else {
                    Ok(Expr::Identifier(tok.lexeme.clone()))
                }
            }
            // `unique(key, expr)` as a plain expression — outside field-type
            // position `unique` lexes as a keyword, not an identifier, so it
            // needs its own call-syntax branch here rather than falling
            // through the `Identifier` case below.
            TokenKind::Unique => {
                self.advance();
                self.expect(TokenKind::LeftParen)?;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RightParen) {
                    args.push(self.parse_expr()?);
                    while self.matches(&TokenKind::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(TokenKind::RightParen)?;
                Ok(Expr::Call {
                    callee: "unique".to_string(),
                    args,
                })
            }
            // A primitive-type keyword used as a value expression only makes
            // sense as `base in min..max` (e.g. `unique`'s lazily-evaluated
            // second argument); see `Expr::TypedRange`.
            TokenKind::Int | TokenKind::Decimal | TokenKind::Date => {
                let base = match tok.kind {
                    TokenKind::Int => PrimitiveType::Int,
                    TokenKind::Decimal => PrimitiveType::Decimal,
                    TokenKind::Date => PrimitiveType::Date,
                    _ => unreachable!(),
                };
                self.advance();
                self.expect(TokenKind::In)?;
                let min = self.parse_additive()?;
                self.expect(TokenKind::DotDot)?;
                let max = self.parse_additive()?;
                Ok(Expr::TypedRange {
                    base,
                    min: Box::new(min),
                    max: Box::new(max),
                })
            }
            TokenKind::Caret => {
                self.advance();
                let first = self.expect_identifier()?;
                let mut parts = vec![first];
                while self.matches(&TokenKind::Dot) {
                    parts.push(self.expect_identifier()?);
                }
                Ok(Expr::ParentReference(parts))
            }
            // `.field` shorthand inside a predicate: the element under
            // consideration is already `current`, so this is equivalent
            // to a plain identifier reference (spec.md §4.6 predicates).
            TokenKind::Dot => {
                self.advance();
                let first = self.expect_identifier()?;
                let mut parts = vec![first];
                while self.matches(&TokenKind::Dot) {
                    parts.push(self.expect_identifier()?);
                }
                if parts.len() > 1 {
                    Ok(Expr::QualifiedName(parts))
                } else {
                    Ok(Expr::Identifier(parts.remove(0)))
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RightBracket) {
                    items.push(self.parse_expr()?);
                    while self.matches(&TokenKind::Comma) {
                        items.push(self.parse_expr()?);
                    }
                }
                self.expect(TokenKind::RightBracket)?;
                Ok(Expr::List(items))
            }
            TokenKind::Any => {
                self.advance();
                self.expect(TokenKind::Of)?;
                let collection = self.expect_identifier()?;
                let predicate = if self.matches(&TokenKind::Where) {
                    Some(Box::new(self.parse_expr()?))
                } else {
                    None
                };
                Ok(Expr::AnyOf {
                    collection,
                    predicate,
                })
            }
            TokenKind::Match => {
                self.advance();
                let scrutinee = Box::new(self.parse_expr()?);
                self.expect(TokenKind::LeftBrace)?;
                let mut arms = Vec::new();
                while !self.check(&TokenKind::RightBrace) && !self.at_end() {
                    let pattern = if self.check(&TokenKind::Identifier) && self.peek().lexeme == "_" {
                        self.advance();
                        Pattern::Wildcard
                    } else {
                        Pattern::Value(self.parse_expr()?)
                    };
                    self.expect(TokenKind::FatArrow)?;
                    let result = self.parse_expr()?;
                    arms.push(MatchArm { pattern, result });
                    self.matches(&TokenKind::Comma);
                }
                self.expect(TokenKind::RightBrace)?;
                Ok(Expr::Match { scrutinee, arms })
            }
            other => Err(ParseError::new(
                format!("unexpected token {other} in expression"),
                other.clone(),
                tok.span,
            )),
        }
    }

    // intentionally no `parse_additive` state kept between calls; exposed
    // as a small helper so range bounds in field types reuse the same
    // precedence rules as general expressions.
    fn parse_additive(&mut self) -> PResult<Expr> {
        self.parse_binary(11, true)
    }
}

fn option_from(expr: Expr) -> WeightedOption {
    match expr {
        Expr::Superposition(mut opts) if opts.len() == 1 => opts.remove(0),
        other => WeightedOption {
            weight: None,
            value: other,
        },
    }
}

fn append_qualified(expr: Expr, field: String) -> Expr {
    match expr {
        Expr::Identifier(name) => Expr::QualifiedName(vec![name, field]),
        Expr::QualifiedName(mut parts) => {
            parts.push(field);
            Expr::QualifiedName(parts)
        }
        Expr::ParentReference(mut parts) => {
            parts.push(field);
            Expr::ParentReference(parts)
        }
        // Dot access only has defined semantics on an identifier, a
        // qualified name, or a parent reference; anything else just
        // drops the field access rather than synthesizing a bogus name.
        other => other,
    }
}

fn binary_op_for(kind: &TokenKind) -> BinaryOp {
    match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::Ne => BinaryOp::Ne,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Ge => BinaryOp::Ge,
        other => unreachable!("{other:?} is not a binary operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> (Program, Vec<ParseError>) {
        let (tokens, lex_errors) = Lexer::new(source).tokenize();
        assert!(lex_errors.is_empty(), "{lex_errors:?}");
        Parser::new(tokens).parse_program()
    }

    #[test]
    fn parses_minimal_schema() {
        let (program, errors) = parse("schema S { x: int }");
        assert!(errors.is_empty());
        assert_eq!(program.statements.len(), 1);
        let Statement::Schema(s) = &program.statements[0] else {
            panic!("expected schema");
        };
        assert_eq!(s.name, "S");
        assert_eq!(s.fields.len(), 1);
        assert_eq!(s.fields[0].ty, FieldType::Primitive(PrimitiveType::Int));
    }

    #[test]
    fn parses_range_field_with_assume_and_dataset() {
        let (program, errors) = parse(
            "schema S { x: int in 1..10, assume { x > 100 } } dataset D { items: 1 of S }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn parses_s1_scenario_exactly() {
        let (program, errors) =
            parse("schema S { x: int in 1..10, assume x > 100 } dataset D { items: 1 of S }");
        assert!(errors.is_empty(), "{errors:?}");
        let Statement::Schema(s) = &program.statements[0] else {
            panic!()
        };
        assert_eq!(s.assumes.len(), 1);
        assert_eq!(s.assumes[0].exprs.len(), 1);
    }

    #[test]
    fn parses_superposition_field() {
        let (program, errors) = parse(r#"schema A { s: 0.8: "active" | 0.2: "inactive" }"#);
        assert!(errors.is_empty(), "{errors:?}");
        let Statement::Schema(s) = &program.statements[0] else {
            panic!()
        };
        let FieldType::Superposition(opts) = &s.fields[0].ty else {
            panic!("expected superposition, got {:?}", s.fields[0].ty);
        };
        assert_eq!(opts.len(), 2);
        assert!(opts[0].weight.is_some());
    }

    #[test]
    fn parses_unique_field() {
        let (program, errors) = parse(r#"schema U { id: unique("u.id", int in 1..5) }"#);
        assert!(errors.is_empty(), "{errors:?}");
        let Statement::Schema(s) = &program.statements[0] else {
            panic!()
        };
        assert!(s.fields[0].flags.unique);
    }

    #[test]
    fn parses_computed_field_with_sum_aggregate() {
        let (program, errors) = parse(
            "schema Inv { amount: decimal in 100..1000, total: = sum(lines.amount), lines: 3 of Line }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let Statement::Schema(s) = &program.statements[0] else {
            panic!()
        };
        let total = s.fields.iter().find(|f| f.name == "total").unwrap();
        assert_eq!(total.tier(), 3);
        let lines = s.fields.iter().find(|f| f.name == "lines").unwrap();
        assert_eq!(lines.tier(), 2);
        let amount = s.fields.iter().find(|f| f.name == "amount").unwrap();
        assert_eq!(amount.tier(), 1);
    }

    #[test]
    fn recovers_from_multiple_isolated_errors() {
        let source = "schema A { x: } schema B { y: int } schema C { z: }";
        let (program, errors) = parse(source);
        assert!(errors.len() >= 2, "{errors:?}");
        assert!(program
            .statements
            .iter()
            .any(|s| matches!(s, Statement::Schema(s) if s.name == "B")));
    }

    #[test]
    fn parses_any_of_with_where() {
        let (program, errors) = parse(
            "schema S { x: any of items where .amount > 0 } dataset D { items: 1 of Item }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let Statement::Schema(s) = &program.statements[0] else {
            panic!()
        };
        assert!(matches!(s.fields[0].ty, FieldType::Expression(_)));
    }

    #[test]
    fn parses_match_expression_with_wildcard() {
        let (program, errors) = parse(
            "schema S { label: = match status { \"a\" => \"active\", _ => \"unknown\" } }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let Statement::Schema(s) = &program.statements[0] else {
            panic!()
        };
        let FieldType::Expression(e) = &s.fields[0].ty else {
            panic!()
        };
        let Expr::Match { arms, .. } = e.as_ref() else {
            panic!()
        };
        assert_eq!(arms.len(), 2);
        assert_eq!(arms[1].pattern, Pattern::Wildcard);
    }

    #[test]
    fn parses_then_block_mutations() {
        let (program, errors) = parse(
            "schema S { x: int, y: int } schema S2 { x: int } dataset D { items: 1 of S } ",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let _ = program;
        let (program2, errors2) =
            parse("schema S { x: int then { x += 1, y = 2 } }");
        assert!(errors2.is_empty(), "{errors2:?}");
        let Statement::Schema(s) = &program2.statements[0] else {
            panic!()
        };
        assert_eq!(s.then.len(), 2);
        assert_eq!(s.then[0].op, MutationOp::AddAssign);
        assert_eq!(s.then[1].op, MutationOp::Assign);
    }
}
