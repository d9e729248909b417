use super::ast::*;
use super::error::CompileError;
use super::lexer::{SpannedToken, Token};

pub fn parse(tokens: Vec<SpannedToken>) -> Result<Module, Vec<CompileError>> {
    let mut parser = Parser::new(tokens);
    parser.parse_module()
}

/// Parse a single expression (a macro value, for example). The whole token
/// stream must be consumed.
pub fn parse_expression(tokens: Vec<SpannedToken>) -> Result<Expr, CompileError> {
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    while matches!(parser.peek(), Token::Newline) {
        parser.advance();
    }
    if !parser.at_eof() {
        return Err(CompileError::parser(
            format!("Unexpected token after expression: {:?}", parser.peek()),
            parser.span(),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    errors: Vec<CompileError>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn parse_module(&mut self) -> Result<Module, Vec<CompileError>> {
        let mut body = Vec::new();
        while !self.at_eof() {
            match self.parse_stmt() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_newline();
                }
            }
        }
        if self.errors.is_empty() {
            Ok(Module { body })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map_or(&Token::Eof, |t| &t.token)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(
            Span::new(0, 0),
            |t| t.span,
        )
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Span {
        let sp = self.span();
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        sp
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, CompileError> {
        if self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("Expected {expected:?}")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), CompileError> {
        if let Token::Ident(name) = self.peek().clone() {
            let sp = self.advance();
            Ok((name, sp))
        } else {
            Err(self.unexpected("Expected identifier"))
        }
    }

    fn unexpected(&self, context: &str) -> CompileError {
        let message = match self.peek() {
            Token::Reserved(word) => format!("`{word}` is not supported in VUs"),
            Token::Indent => "Unexpected indent".to_string(),
            tok => format!("{context}, got {tok:?}"),
        };
        CompileError::parser(message, self.span())
    }

    fn recover_to_newline(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Indent => depth += 1,
                Token::Dedent => depth = depth.saturating_sub(1),
                Token::Newline if depth == 0 => {
                    self.advance();
                    break;
                }
                _ => {}
            }
            self.advance();
        }
        while matches!(self.peek(), Token::Dedent) {
            self.advance();
        }
    }

    // ── Statements ────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        match self.peek().clone() {
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::Comment(text) => {
                let span = self.advance();
                self.expect(&Token::Newline)?;
                Ok(Stmt::new(StmtKind::Comment(text), span))
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect_end_of_line()?;
                Ok(stmt)
            }
        }
    }

    fn expect_end_of_line(&mut self) -> Result<(), CompileError> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("Expected end of line")),
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, CompileError> {
        if matches!(self.peek(), Token::Pass) {
            let span = self.advance();
            return Ok(Stmt::new(StmtKind::Pass, span));
        }

        let first = self.parse_expr()?;
        if !matches!(self.peek(), Token::Eq) {
            if self.is_augmented_assignment() {
                return Err(CompileError::parser(
                    "Augmented assignment is not supported in VUs",
                    self.span(),
                ));
            }
            let span = first.span;
            return Ok(Stmt::new(StmtKind::Expr(first), span));
        }

        // a = b = c: every expression but the last is a target
        let mut exprs = vec![first];
        while matches!(self.peek(), Token::Eq) {
            self.advance();
            exprs.push(self.parse_expr()?);
        }
        let value = exprs.pop().ok_or_else(|| CompileError::parser("Missing value", self.span()))?;
        let span = exprs.first().map_or(value.span, |t| t.span).merge(value.span);
        Ok(Stmt::new(StmtKind::Assign { targets: exprs, value }, span))
    }

    fn is_augmented_assignment(&self) -> bool {
        let op = matches!(
            self.peek(),
            Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Percent
                | Token::Amp
                | Token::Pipe
                | Token::Caret
                | Token::Shl
                | Token::Shr
                | Token::StarStar
                | Token::SlashSlash
        );
        op && matches!(self.peek_at(1), Token::Eq)
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance(); // skip `if` / `elif`
        let test = self.parse_expr()?;
        self.expect(&Token::Colon)?;
        let body = self.parse_suite()?;

        let orelse = match self.peek() {
            Token::Elif => vec![self.parse_if()?],
            Token::Else => {
                self.advance();
                self.expect(&Token::Colon)?;
                self.parse_suite()?
            }
            _ => Vec::new(),
        };

        let end = orelse.last().or(body.last()).map_or(test.span, |s| s.span);
        Ok(Stmt::new(StmtKind::If { test, body, orelse }, start.merge(end)))
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        let start = self.advance(); // skip `for`
        let target = self.parse_target_list()?;
        self.expect(&Token::In)?;
        let iter = self.parse_expr()?;
        self.expect(&Token::Colon)?;
        let body = self.parse_suite()?;
        let end = body.last().map_or(iter.span, |s| s.span);
        Ok(Stmt::new(StmtKind::For { target, iter, body }, start.merge(end)))
    }

    /// The loop target. Tuples are rejected here since the AST has no node
    /// for them.
    fn parse_target_list(&mut self) -> Result<Expr, CompileError> {
        let target = self.parse_bit_or()?;
        if matches!(self.peek(), Token::Comma) {
            return Err(CompileError::parser(
                "Loop target must be a single variable",
                self.span(),
            ));
        }
        Ok(target)
    }

    /// Either an indented block, or a simple statement on the same line.
    fn parse_suite(&mut self) -> Result<Vec<Stmt>, CompileError> {
        if !matches!(self.peek(), Token::Newline) {
            let stmt = self.parse_simple_stmt()?;
            self.expect_end_of_line()?;
            return Ok(vec![stmt]);
        }
        self.advance();
        if !matches!(self.peek(), Token::Indent) {
            return Err(self.unexpected("Expected an indented block"));
        }
        self.advance();

        let mut stmts = Vec::new();
        while !matches!(self.peek(), Token::Dedent | Token::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        if matches!(self.peek(), Token::Dedent) {
            self.advance();
        }
        Ok(stmts)
    }

    // ── Expression parsing (precedence climbing) ──────────────────

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let body = self.parse_or()?;

        // Conditional expression: body if test else orelse
        if matches!(self.peek(), Token::If) {
            self.advance();
            let test = self.parse_or()?;
            self.expect(&Token::Else)?;
            // Right-associative: a if b else c if d else e
            let orelse = self.parse_expr()?;
            let span = body.span.merge(orelse.span);
            return Ok(Expr::new(
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
                span,
            ));
        }

        if matches!(self.peek(), Token::Reserved(w) if w == "lambda") {
            return Err(self.unexpected("Unexpected token"));
        }

        Ok(body)
    }

    fn parse_bool_op(
        &mut self,
        op: BoolOp,
        token: &Token,
        next: fn(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        let first = next(self)?;
        if self.peek() != token {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.peek() == token {
            self.advance();
            values.push(next(self)?);
        }
        let span = values
            .iter()
            .fold(values[0].span, |acc, v| acc.merge(v.span));
        Ok(Expr::new(ExprKind::BoolOp { op, values }, span))
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        self.parse_bool_op(BoolOp::Or, &Token::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        self.parse_bool_op(BoolOp::And, &Token::And, Self::parse_not)
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        if matches!(self.peek(), Token::Not) {
            let start = self.advance();
            let operand = self.parse_not()?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_bit_or()?;
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                Token::EqEq => CmpOp::Eq,
                Token::Ne => CmpOp::NotEq,
                Token::Lt => CmpOp::Lt,
                Token::Le => CmpOp::LtE,
                Token::Gt => CmpOp::Gt,
                Token::Ge => CmpOp::GtE,
                Token::In => CmpOp::In,
                Token::Is if matches!(self.peek_at(1), Token::Not) => {
                    self.advance();
                    CmpOp::IsNot
                }
                Token::Is => CmpOp::Is,
                Token::Not if matches!(self.peek_at(1), Token::In) => {
                    self.advance();
                    CmpOp::NotIn
                }
                _ => break,
            };
            self.advance();
            ops.push((op, self.parse_bit_or()?));
        }
        if ops.is_empty() {
            return Ok(left);
        }
        let span = ops.iter().fold(left.span, |acc, (_, e)| acc.merge(e.span));
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
            },
            span,
        ))
    }

    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, CompileError>,
        op_for: fn(&Token) -> Option<BinOp>,
    ) -> Result<Expr, CompileError> {
        let mut left = next(self)?;
        loop {
            let Some(op) = op_for(self.peek()) else {
                break;
            };
            self.advance();
            let right = next(self)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_level(Self::parse_bit_xor, |t| match t {
            Token::Pipe => Some(BinOp::BitOr),
            _ => None,
        })
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_level(Self::parse_bit_and, |t| match t {
            Token::Caret => Some(BinOp::BitXor),
            _ => None,
        })
    }

    fn parse_bit_and(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_level(Self::parse_shift, |t| match t {
            Token::Amp => Some(BinOp::BitAnd),
            _ => None,
        })
    }

    fn parse_shift(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_level(Self::parse_add, |t| match t {
            Token::Shl => Some(BinOp::LShift),
            Token::Shr => Some(BinOp::RShift),
            _ => None,
        })
    }

    fn parse_add(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_level(Self::parse_mul, |t| match t {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn parse_mul(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_level(Self::parse_unary, |t| match t {
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::SlashSlash => Some(BinOp::FloorDiv),
            Token::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            Token::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let start = self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let base = self.parse_postfix()?;
        if matches!(self.peek(), Token::StarStar) {
            self.advance();
            // Right-associative, and binds tighter than a unary on its left
            let exp = self.parse_unary()?;
            let span = base.span.merge(exp.span);
            return Ok(Expr::new(
                ExprKind::BinOp {
                    op: BinOp::Pow,
                    left: Box::new(base),
                    right: Box::new(exp),
                },
                span,
            ));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let (attr, attr_span) = self.expect_ident()?;
                    let span = expr.span.merge(attr_span);
                    expr = Expr::new(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                        span,
                    );
                }
                Token::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.expect(&Token::RParen)?;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    match self.peek() {
                        Token::Colon => {
                            return Err(CompileError::parser(
                                "Ranges in array subscripts are not supported",
                                self.span(),
                            ))
                        }
                        Token::Comma => {
                            return Err(CompileError::parser(
                                "Tuples in array subscripts are not supported",
                                self.span(),
                            ))
                        }
                        _ => {}
                    }
                    let end = self.expect(&Token::RBracket)?;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            return Ok(args);
        }
        loop {
            if matches!(self.peek(), Token::Ident(_)) && matches!(self.peek_at(1), Token::Eq) {
                return Err(CompileError::parser(
                    "Keyword arguments are not supported",
                    self.span(),
                ));
            }
            if matches!(self.peek(), Token::Star | Token::StarStar) {
                return Err(CompileError::parser(
                    "Argument unpacking is not supported",
                    self.span(),
                ));
            }
            let arg = self.parse_expr()?;
            if matches!(self.peek(), Token::For) {
                return Err(CompileError::parser(
                    "Comprehensions are not supported",
                    self.span(),
                ));
            }
            args.push(arg);
            if matches!(self.peek(), Token::Comma) {
                self.advance();
                if matches!(self.peek(), Token::RParen) {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::name(name, span))
            }
            Token::Int(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(v), span))
            }
            Token::Float(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::Float(v), span))
            }
            Token::True => {
                self.advance();
                Ok(Expr::boolean(true, span))
            }
            Token::False => {
                self.advance();
                Ok(Expr::boolean(false, span))
            }
            Token::LParen => {
                self.advance();
                if matches!(self.peek(), Token::RParen) {
                    return Err(CompileError::parser("Tuples are not supported", span));
                }
                let inner = self.parse_expr()?;
                match self.peek() {
                    Token::Comma => Err(CompileError::parser("Tuples are not supported", self.span())),
                    Token::For => Err(CompileError::parser(
                        "Comprehensions are not supported",
                        self.span(),
                    )),
                    _ => {
                        self.expect(&Token::RParen)?;
                        Ok(inner)
                    }
                }
            }
            Token::LBracket => Err(CompileError::parser("Lists are not supported", span)),
            _ => Err(self.unexpected("Unexpected token")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;

    fn parse_str(s: &str) -> Module {
        let tokens = lex(s).unwrap();
        parse(tokens).unwrap()
    }

    fn parse_err(s: &str) -> Vec<CompileError> {
        match lex(s) {
            Ok(tokens) => parse(tokens).unwrap_err(),
            Err(errors) => errors,
        }
    }

    fn expr_of(s: &str) -> Expr {
        let module = parse_str(s);
        match module.body.into_iter().next().unwrap().kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parse_require_call() {
        let e = expr_of("require(a == b)");
        let args = e.call_args("require").unwrap();
        assert!(matches!(args[0].kind, ExprKind::Compare { .. }));
    }

    #[test]
    fn parse_bool_ops_flatten() {
        let e = expr_of("a and b and c or d");
        match e.kind {
            ExprKind::BoolOp { op: BoolOp::Or, values } => {
                assert_eq!(values.len(), 2);
                match &values[0].kind {
                    ExprKind::BoolOp { op: BoolOp::And, values } => assert_eq!(values.len(), 3),
                    other => panic!("expected and, got {other:?}"),
                }
            }
            other => panic!("expected or, got {other:?}"),
        }
    }

    #[test]
    fn parse_parenthesized_bool_op_stays_nested() {
        let e = expr_of("(a or b) or c");
        match e.kind {
            ExprKind::BoolOp { values, .. } => {
                assert_eq!(values.len(), 2);
                assert!(matches!(values[0].kind, ExprKind::BoolOp { .. }));
            }
            other => panic!("expected or, got {other:?}"),
        }
    }

    #[test]
    fn parse_not_binds_looser_than_compare() {
        let e = expr_of("not a == b");
        match e.kind {
            ExprKind::UnaryOp { op: UnaryOp::Not, operand } => {
                assert!(matches!(operand.kind, ExprKind::Compare { .. }));
            }
            other => panic!("expected not, got {other:?}"),
        }
    }

    #[test]
    fn parse_arithmetic_precedence() {
        let e = expr_of("a + b * c");
        match e.kind {
            ExprKind::BinOp { op: BinOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Mul, .. }));
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn parse_power_is_right_associative() {
        let e = expr_of("a ** b ** c");
        match e.kind {
            ExprKind::BinOp { op: BinOp::Pow, right, .. } => {
                assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Pow, .. }));
            }
            other => panic!("expected pow, got {other:?}"),
        }
    }

    #[test]
    fn parse_unary_minus_applies_after_power() {
        let e = expr_of("-a ** 2");
        assert!(matches!(e.kind, ExprKind::UnaryOp { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn parse_chained_comparison() {
        let e = expr_of("a == b == c");
        match e.kind {
            ExprKind::Compare { ops, .. } => assert_eq!(ops.len(), 2),
            other => panic!("expected compare, got {other:?}"),
        }
    }

    #[test]
    fn parse_is_not_and_not_in() {
        match expr_of("a is not b").kind {
            ExprKind::Compare { ops, .. } => assert_eq!(ops[0].0, CmpOp::IsNot),
            other => panic!("expected compare, got {other:?}"),
        }
        match expr_of("a not in b").kind {
            ExprKind::Compare { ops, .. } => assert_eq!(ops[0].0, CmpOp::NotIn),
            other => panic!("expected compare, got {other:?}"),
        }
    }

    #[test]
    fn parse_postfix_chain() {
        let e = expr_of("pCreateInfos[0].flags.has_bit(X)");
        match e.kind {
            ExprKind::Call { func, args } => {
                assert_eq!(args.len(), 1);
                match func.kind {
                    ExprKind::Attribute { value, attr } => {
                        assert_eq!(attr, "has_bit");
                        assert!(matches!(value.kind, ExprKind::Attribute { .. }));
                    }
                    other => panic!("expected attribute, got {other:?}"),
                }
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parse_ternary() {
        let e = expr_of("a if b else c if d else e");
        match e.kind {
            ExprKind::IfExp { orelse, .. } => {
                assert!(matches!(orelse.kind, ExprKind::IfExp { .. }));
            }
            other => panic!("expected ternary, got {other:?}"),
        }
    }

    #[test]
    fn parse_if_elif_else() {
        let module = parse_str("if a:\n  require(b)\nelif c:\n  require(d)\nelse:\n  require(e)");
        assert_eq!(module.body.len(), 1);
        match &module.body[0].kind {
            StmtKind::If { orelse, .. } => {
                assert_eq!(orelse.len(), 1);
                match &orelse[0].kind {
                    StmtKind::If { orelse, .. } => assert_eq!(orelse.len(), 1),
                    other => panic!("expected elif, got {other:?}"),
                }
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parse_for_with_nested_body() {
        let module = parse_str("for x in pItems:\n  y = x.count\n  require(y > 0)\nrequire(z)");
        assert_eq!(module.body.len(), 2);
        match &module.body[0].kind {
            StmtKind::For { target, body, .. } => {
                assert_eq!(target.as_name(), Some("x"));
                assert_eq!(body.len(), 2);
            }
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn parse_inline_suite() {
        let module = parse_str("if a: require(b)");
        match &module.body[0].kind {
            StmtKind::If { body, .. } => assert_eq!(body.len(), 1),
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parse_cascaded_assignment_keeps_targets() {
        let module = parse_str("a = b = c");
        match &module.body[0].kind {
            StmtKind::Assign { targets, .. } => assert_eq!(targets.len(), 2),
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn parse_comments_and_pass() {
        let module = parse_str("# leading\nif a:\n  # inner\n  pass");
        assert!(module.body[0].is_comment());
        match &module.body[1].kind {
            StmtKind::If { body, .. } => {
                assert!(body[0].is_comment());
                assert!(matches!(body[1].kind, StmtKind::Pass));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unsupported_constructs() {
        assert!(!parse_err("while a:\n  require(b)").is_empty());
        assert!(!parse_err("for a in b:\n  break").is_empty());
        assert!(!parse_err("require(f(x=1))").is_empty());
        assert!(!parse_err("require([a, b])").is_empty());
        assert!(!parse_err("for a, b in c:\n  require(a)").is_empty());
        assert!(!parse_err("a += 1").is_empty());
        assert!(!parse_err("require(x[1:2])").is_empty());
        assert!(!parse_err("require(lambda: 1)").is_empty());
    }

    #[test]
    fn parse_rejects_missing_parenthesis() {
        let errs = parse_err("if (a != b and\n    c(d):\n  require(e)");
        assert!(!errs.is_empty());
    }

    #[test]
    fn parse_rejects_tag_in_source() {
        assert!(!parse_err("require(ename:VK_FALSE)").is_empty());
    }

    #[test]
    fn parse_expression_consumes_everything() {
        assert!(parse_expression(lex("a.b").unwrap()).is_ok());
        assert!(parse_expression(lex("a b").unwrap()).is_err());
        assert!(parse_expression(lex("VK_TRUE)").unwrap()).is_err());
    }
}
