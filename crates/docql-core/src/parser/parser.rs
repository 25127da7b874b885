//! Grammar driver: turns statement text into a `Command` tree.

use std::rc::Rc;

use super::error::ParseError;
use super::pratt::{
    infix_binding_power, prefix_binding_power, token_to_binary_op, token_to_unary_op,
};
use crate::ast::{
    BinaryOp, Command, CompoundOp, DataSrc, Direction, Expr, ExprItem, FlattenArg, Query,
    SimpleQuery, UnaryOp,
};
use crate::json::{Json, JsonValue, StructElem};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// Statement parser.
///
/// Parses at most one `;`-terminated statement per [`Parser::parse_one`]
/// call and reports the byte offset of the first unconsumed character.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parses one statement.
    ///
    /// Returns the command (or `None` for an input of only whitespace and
    /// comments) and the byte offset just past the terminating `;` (or the
    /// end of input when the final statement omits it).
    pub fn parse_one(&mut self) -> Result<(Option<Command>, usize), ParseError> {
        if self.current.is_eof() {
            return Ok((None, self.current.span.end));
        }
        let cmd = self.parse_command()?;
        match &self.current.kind {
            TokenKind::Semicolon | TokenKind::Eof => Ok((Some(cmd), self.current.span.end)),
            other => Err(ParseError::unexpected(";", other, self.current.span)),
        }
    }

    /// Parses a single statement, requiring nothing but a terminator after
    /// it.
    pub fn parse_statement(&mut self) -> Result<Command, ParseError> {
        let (cmd, _) = self.parse_one()?;
        cmd.ok_or_else(|| {
            ParseError::unexpected("a statement", &TokenKind::Eof, self.current.span)
        })
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::Select) => Ok(Command::Select(self.parse_query()?)),
            TokenKind::Keyword(Keyword::Create) => self.parse_create(),
            TokenKind::Keyword(Keyword::Drop) => self.parse_drop(),
            TokenKind::Keyword(Keyword::Insert) => self.parse_insert(),
            TokenKind::Keyword(Keyword::Delete) => self.parse_delete(),
            TokenKind::Keyword(Keyword::Update) => self.parse_update(),
            TokenKind::Keyword(Keyword::Begin) => {
                self.advance();
                Ok(Command::Begin)
            }
            TokenKind::Keyword(Keyword::Commit) => {
                self.advance();
                Ok(Command::Commit)
            }
            TokenKind::Keyword(Keyword::Rollback) => {
                self.advance();
                Ok(Command::Rollback)
            }
            TokenKind::Keyword(Keyword::Pragma) => self.parse_pragma(),
            other => Err(ParseError::unexpected(
                "a statement",
                other,
                self.current.span,
            )),
        }
    }

    fn parse_create(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Collection)?;
        let if_not_exists = if self.check_keyword(Keyword::If) {
            self.advance();
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };
        let name = self.expect_identifier()?;
        Ok(Command::CreateCollection {
            name,
            if_not_exists,
        })
    }

    fn parse_drop(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Drop)?;
        self.expect_keyword(Keyword::Collection)?;
        let if_exists = if self.check_keyword(Keyword::If) {
            self.advance();
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };
        let name = self.expect_identifier()?;
        Ok(Command::DropCollection { name, if_exists })
    }

    fn parse_insert(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let collection = self.expect_identifier()?;
        if self.check_keyword(Keyword::Value) {
            self.advance();
            let value = self.parse_expression(0)?;
            Ok(Command::Insert {
                collection,
                value: Some(value),
                query: None,
            })
        } else if self.check_keyword(Keyword::Select) {
            let query = self.parse_query()?;
            Ok(Command::Insert {
                collection,
                value: None,
                query: Some(query),
            })
        } else {
            Err(ParseError::unexpected(
                "VALUE or SELECT",
                &self.current.kind,
                self.current.span,
            ))
        }
    }

    fn parse_delete(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let collection = self.expect_identifier()?;
        let where_clause = self.parse_optional_where()?;
        Ok(Command::Delete {
            collection,
            where_clause,
        })
    }

    fn parse_update(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Update)?;
        let collection = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;
        let mut assignments = Vec::new();
        loop {
            let lvalue = self.parse_lvalue()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expression(0)?;
            assignments.push((lvalue, value));
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        let where_clause = self.parse_optional_where()?;
        let upsert = if self.check_keyword(Keyword::Else) {
            self.advance();
            self.expect_keyword(Keyword::Insert)?;
            Some(self.parse_expression(0)?)
        } else {
            None
        };
        Ok(Command::Update {
            collection,
            assignments,
            where_clause,
            upsert,
        })
    }

    /// Parses a SET target: an identifier followed by `.label` and `[expr]`
    /// steps.
    fn parse_lvalue(&mut self) -> Result<Expr, ParseError> {
        let name = self.expect_identifier()?;
        let mut lvalue = Expr::Ident(name);
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let label = self.expect_identifier()?;
                lvalue = Expr::Dot {
                    base: Box::new(lvalue),
                    label,
                };
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let key = self.parse_expression(0)?;
                self.expect(&TokenKind::RightBracket)?;
                lvalue = Expr::Index {
                    base: Box::new(lvalue),
                    key: Box::new(key),
                };
            } else {
                break;
            }
        }
        Ok(lvalue)
    }

    fn parse_pragma(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Pragma)?;
        let name = self.expect_identifier()?;
        let arg = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let expr = self.parse_expression(0)?;
            self.expect(&TokenKind::RightParen)?;
            Some(expr)
        } else {
            None
        };
        Ok(Command::Pragma { name, arg })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.check_keyword(Keyword::Where) {
            self.advance();
            Ok(Some(self.parse_expression(0)?))
        } else {
            Ok(None)
        }
    }

    // --- Queries ---

    /// Parses a query: a SELECT core optionally compounded by
    /// UNION [ALL] / EXCEPT / INTERSECT, left associative.
    pub(crate) fn parse_query(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_select_core()?;
        loop {
            let op = match self.current.as_keyword() {
                Some(Keyword::Union) => {
                    self.advance();
                    if self.check_keyword(Keyword::All) {
                        self.advance();
                        CompoundOp::UnionAll
                    } else {
                        CompoundOp::Union
                    }
                }
                Some(Keyword::Except) => {
                    self.advance();
                    CompoundOp::Except
                }
                Some(Keyword::Intersect) => {
                    self.advance();
                    CompoundOp::Intersect
                }
                _ => break,
            };
            let right = self.parse_select_core()?;
            left = Query::Compound {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_select_core(&mut self) -> Result<Query, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        let distinct = if self.check_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else {
            if self.check_keyword(Keyword::All) {
                self.advance();
            }
            false
        };

        let result = if self.starts_expression() {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let from = if self.check_keyword(Keyword::From) {
            self.advance();
            Some(self.parse_data_src()?)
        } else {
            None
        };

        let where_clause = self.parse_optional_where()?;

        let group_by = if self.check_keyword(Keyword::Group) {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_expr_item_list()?
        } else {
            vec![]
        };

        let having = if self.check_keyword(Keyword::Having) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let order_by = if self.check_keyword(Keyword::Order) {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_expr_item_list()?
        } else {
            vec![]
        };

        let limit = if self.check_keyword(Keyword::Limit) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let offset = if self.check_keyword(Keyword::Offset) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(Query::Simple(SimpleQuery {
            distinct,
            result,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
            aggs: vec![],
        }))
    }

    /// Returns true if the current token can begin the optional SELECT
    /// result expression.
    fn starts_expression(&self) -> bool {
        !matches!(
            &self.current.kind,
            TokenKind::Keyword(
                Keyword::From
                    | Keyword::Where
                    | Keyword::Group
                    | Keyword::Having
                    | Keyword::Order
                    | Keyword::Limit
                    | Keyword::Offset
                    | Keyword::Union
                    | Keyword::Except
                    | Keyword::Intersect
            ) | TokenKind::Semicolon
                | TokenKind::RightParen
                | TokenKind::Eof
        )
    }

    /// Parses `expr [ASC|DESC]` items for GROUP BY and ORDER BY.
    fn parse_expr_item_list(&mut self) -> Result<Vec<ExprItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expression(0)?;
            let direction = match self.current.as_keyword() {
                Some(Keyword::Ascending) => {
                    self.advance();
                    Some(Direction::Ascending)
                }
                Some(Keyword::Descending) => {
                    self.advance();
                    Some(Direction::Descending)
                }
                _ => None,
            };
            items.push(ExprItem {
                expr,
                alias: None,
                direction,
            });
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    // --- FROM clause ---

    fn parse_data_src(&mut self) -> Result<DataSrc, ParseError> {
        let mut src = self.parse_src_unit()?;
        loop {
            if self.check(&TokenKind::Comma) {
                self.advance();
                let right = self.parse_src_unit()?;
                src = DataSrc::Join {
                    left: Box::new(src),
                    right: Box::new(right),
                };
            } else if let TokenKind::FlattenOp(op) = &self.current.kind {
                let op = *op;
                self.advance();
                src = self.parse_flatten(src, op)?;
            } else {
                break;
            }
        }
        Ok(src)
    }

    fn parse_src_unit(&mut self) -> Result<DataSrc, ParseError> {
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            let query = self.parse_query()?;
            self.expect(&TokenKind::RightParen)?;
            self.expect_keyword(Keyword::As)?;
            let alias = self.expect_identifier()?;
            return Ok(DataSrc::Subquery {
                query: Box::new(query),
                alias,
            });
        }
        let name = self.expect_identifier()?;
        let alias = if self.check_keyword(Keyword::As) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(DataSrc::Collection { name, alias })
    }

    fn parse_flatten(
        &mut self,
        inner: DataSrc,
        op: crate::lexer::FlattenOp,
    ) -> Result<DataSrc, ParseError> {
        let open_span = self.current.span;
        self.expect(&TokenKind::LeftParen)?;
        let mut raw = Vec::new();
        loop {
            let expr = self.parse_expression(0)?;
            let alias = if self.check_keyword(Keyword::As) {
                self.advance();
                Some(self.expect_identifier()?)
            } else {
                None
            };
            raw.push((expr, alias));
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightParen)?;
        let trailing = if self.check_keyword(Keyword::As) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let mut args = Vec::new();
        for (expr, alias) in raw {
            let alias = match alias.or_else(|| trailing.clone()) {
                Some(alias) => alias,
                None => {
                    return Err(ParseError::new(
                        format!("{} term requires an AS name", op.as_str()),
                        open_span,
                    ));
                }
            };
            args.push(FlattenArg { expr, alias });
        }
        Ok(DataSrc::Flatten {
            inner: Box::new(inner),
            op,
            args,
        })
    }

    // --- Expressions ---

    /// Parses an expression with Pratt binding powers.
    pub(crate) fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((l_bp, r_bp)) = infix_binding_power(&self.current.kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }

            match self.current.as_keyword() {
                Some(Keyword::Is) => {
                    self.advance();
                    let op = if self.check_keyword(Keyword::Not) {
                        self.advance();
                        BinaryOp::IsNot
                    } else {
                        BinaryOp::Is
                    };
                    let rhs = self.parse_expression(r_bp)?;
                    lhs = Expr::Binary {
                        left: Box::new(lhs),
                        op,
                        right: Box::new(rhs),
                    };
                }
                Some(Keyword::In) => {
                    self.advance();
                    lhs = self.parse_in_tail(lhs, false)?;
                }
                Some(Keyword::Between) => {
                    self.advance();
                    lhs = self.parse_between_tail(lhs, false, r_bp)?;
                }
                Some(Keyword::Not) => {
                    self.advance();
                    match self.current.as_keyword() {
                        Some(Keyword::In) => {
                            self.advance();
                            lhs = self.parse_in_tail(lhs, true)?;
                        }
                        Some(Keyword::Between) => {
                            self.advance();
                            lhs = self.parse_between_tail(lhs, true, r_bp)?;
                        }
                        Some(Keyword::Like) => {
                            self.advance();
                            let rhs = self.parse_expression(r_bp)?;
                            lhs = Expr::Binary {
                                left: Box::new(lhs),
                                op: BinaryOp::NotLike,
                                right: Box::new(rhs),
                            };
                        }
                        _ => {
                            return Err(ParseError::unexpected(
                                "IN, BETWEEN, or LIKE",
                                &self.current.kind,
                                self.current.span,
                            ));
                        }
                    }
                }
                _ => {
                    if let Some(op) = token_to_binary_op(&self.current.kind) {
                        self.advance();
                        let rhs = self.parse_expression(r_bp)?;
                        lhs = Expr::Binary {
                            left: Box::new(lhs),
                            op,
                            right: Box::new(rhs),
                        };
                    } else {
                        break;
                    }
                }
            }
        }

        // The conditional has the loosest precedence and is right
        // associative through its false branch.
        if min_bp == 0 && self.check(&TokenKind::Question) {
            self.advance();
            let if_true = self.parse_expression(0)?;
            self.expect(&TokenKind::Colon)?;
            let if_false = self.parse_expression(0)?;
            lhs = Expr::Conditional {
                test: Box::new(lhs),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            };
        }

        Ok(lhs)
    }

    fn parse_in_tail(&mut self, lhs: Expr, negated: bool) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;
        let mut list = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                list.push(self.parse_expression(0)?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(Expr::In {
            expr: Box::new(lhs),
            list,
            negated,
        })
    }

    fn parse_between_tail(
        &mut self,
        lhs: Expr,
        negated: bool,
        r_bp: u8,
    ) -> Result<Expr, ParseError> {
        let low = self.parse_expression(r_bp)?;
        self.expect_keyword(Keyword::And)?;
        let high = self.parse_expression(r_bp)?;
        Ok(Expr::Between {
            expr: Box::new(lhs),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        if let Some(op) = token_to_unary_op(&self.current.kind) {
            let bp = prefix_binding_power(&self.current.kind).unwrap_or(19);
            self.advance();
            let operand = self.parse_expression(bp)?;
            let expr = Expr::Unary {
                op,
                operand: Box::new(operand),
            };
            return Ok(fold_constant(expr));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current.span;
        match self.current.kind.clone() {
            TokenKind::Number(r) => {
                self.advance();
                Ok(Expr::Literal(JsonValue::real(r)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(JsonValue::string(s)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(JsonValue::boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(JsonValue::boolean(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(JsonValue::null()))
            }
            TokenKind::LeftParen => {
                self.advance();
                if self.check_keyword(Keyword::Select) {
                    let query = self.parse_query()?;
                    self.expect(&TokenKind::RightParen)?;
                    Ok(Expr::Subquery(Box::new(query)))
                } else {
                    let expr = self.parse_expression(0)?;
                    self.expect(&TokenKind::RightParen)?;
                    self.parse_postfix(expr)
                }
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RightBracket) {
                    loop {
                        items.push(self.parse_expression(0)?);
                        if !self.check(&TokenKind::Comma) {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(&TokenKind::RightBracket)?;
                self.parse_postfix(fold_constant(Expr::Array(items)))
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut elems = Vec::new();
                if !self.check(&TokenKind::RightBrace) {
                    loop {
                        let label = self.expect_label()?;
                        self.expect(&TokenKind::Colon)?;
                        let value = self.parse_expression(0)?;
                        elems.push((label, value));
                        if !self.check(&TokenKind::Comma) {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(&TokenKind::RightBrace)?;
                self.parse_postfix(fold_constant(Expr::Struct(elems)))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RightParen) {
                        loop {
                            args.push(self.parse_expression(0)?);
                            if !self.check(&TokenKind::Comma) {
                                break;
                            }
                            self.advance();
                        }
                    }
                    self.expect(&TokenKind::RightParen)?;
                    return self.parse_postfix(Expr::Call { name, args });
                }
                self.parse_postfix(Expr::Ident(name))
            }
            other => Err(ParseError::unexpected("an expression", &other, span)),
        }
    }

    /// Applies postfix `.label` and `[key]` operators.
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let label = self.expect_identifier()?;
                expr = Expr::Dot {
                    base: Box::new(expr),
                    label,
                };
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let key = self.parse_expression(0)?;
                self.expect(&TokenKind::RightBracket)?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    key: Box::new(key),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// A struct-constructor label: an identifier or a string.
    fn expect_label(&mut self) -> Result<String, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(ParseError::unexpected(
                "a struct label",
                &other,
                self.current.span,
            )),
        }
    }

    // --- Helpers ---

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current.as_keyword() == Some(keyword)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                &format!("{kind:?}"),
                &self.current.kind,
                self.current.span,
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                &format!("{keyword:?}").to_uppercase(),
                &self.current.kind,
                self.current.span,
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::unexpected(
                "an identifier",
                &other,
                self.current.span,
            )),
        }
    }
}

/// Folds constructor expressions whose parts are all constant into an
/// eagerly parsed JSON literal.
fn fold_constant(expr: Expr) -> Expr {
    match constant_value(&expr) {
        Some(value) => Expr::Literal(value),
        None => expr,
    }
}

fn constant_value(expr: &Expr) -> Option<Json> {
    match expr {
        Expr::Literal(v) => Some(Rc::clone(v)),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match constant_value(operand)?.as_ref() {
            JsonValue::Real(r) => Some(JsonValue::real(-r)),
            _ => None,
        },
        Expr::Array(items) => {
            let values = items.iter().map(constant_value).collect::<Option<Vec<_>>>()?;
            Some(Rc::new(JsonValue::Array(values)))
        }
        Expr::Struct(elems) => {
            let mut out = Vec::with_capacity(elems.len());
            for (label, value) in elems {
                out.push(StructElem {
                    label: label.clone(),
                    value: constant_value(value)?,
                });
            }
            Some(Rc::new(JsonValue::Struct(out)))
        }
        _ => None,
    }
}
