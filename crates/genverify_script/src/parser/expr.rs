/// Expression parsing methods.
///
/// This chunk implements the expression grammar using a precedence ladder:
/// assignment → conditional → `||` → `&&` → equality → relational → additive → multiplicative → unary →
/// postfix → call/member/`new` → primary.
impl<'a> Parser<'a> {
    // ========================================================================
    // Expressions
    // ========================================================================

    fn expression(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        self.enter()?;
        let target = self.conditional()?;

        let op = if self.match_op(OperatorId::Eq) {
            Some(AssignOp::Assign)
        } else if self.match_op(OperatorId::PlusEq) {
            Some(AssignOp::Compound(BinaryOp::Add))
        } else if self.match_op(OperatorId::MinusEq) {
            Some(AssignOp::Compound(BinaryOp::Sub))
        } else if self.match_op(OperatorId::StarEq) {
            Some(AssignOp::Compound(BinaryOp::Mul))
        } else if self.match_op(OperatorId::SlashEq) {
            Some(AssignOp::Compound(BinaryOp::Div))
        } else {
            None
        };

        let result = match op {
            None => target,
            Some(op) => {
                if !target.node.is_assignable() {
                    return Err(ScriptError::syntax("Invalid assignment target", target.span));
                }
                let value = self.assignment()?;
                let span = target.span.merge(value.span);
                Spanned::new(
                    Expr::Assign {
                        op,
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    span,
                )
            }
        };
        self.leave();
        Ok(result)
    }

    fn conditional(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let test = self.logical_or()?;
        if !self.match_punct(PunctuationId::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(PunctuationId::Colon, "Expected ':' in conditional expression")?;
        let alternate = self.assignment()?;
        let span = test.span.merge(alternate.span);
        Ok(Spanned::new(
            Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn logical_or(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut left = self.logical_and()?;
        while self.match_op(OperatorId::OrOr) {
            let right = self.logical_and()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Logical(Box::new(left), LogicalOp::Or, Box::new(right)), span);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut left = self.equality()?;
        while self.match_op(OperatorId::AndAnd) {
            let right = self.equality()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Logical(Box::new(left), LogicalOp::And, Box::new(right)), span);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut left = self.relational()?;
        loop {
            let op = if self.match_op(OperatorId::EqEqEq) {
                BinaryOp::StrictEq
            } else if self.match_op(OperatorId::NotEqEq) {
                BinaryOp::StrictNotEq
            } else if self.match_op(OperatorId::EqEq) {
                BinaryOp::Eq
            } else if self.match_op(OperatorId::NotEq) {
                BinaryOp::NotEq
            } else {
                break;
            };
            let right = self.relational()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }
        Ok(left)
    }

    fn relational(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.match_op(OperatorId::Lt) {
                BinaryOp::Lt
            } else if self.match_op(OperatorId::Gt) {
                BinaryOp::Gt
            } else if self.match_op(OperatorId::LtEq) {
                BinaryOp::LtEq
            } else if self.match_op(OperatorId::GtEq) {
                BinaryOp::GtEq
            } else if self.match_keyword(KeywordId::Instanceof) {
                BinaryOp::Instanceof
            } else if self.match_keyword(KeywordId::In) {
                BinaryOp::In
            } else {
                break;
            };
            let right = self.additive()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.match_op(OperatorId::Plus) {
                BinaryOp::Add
            } else if self.match_op(OperatorId::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.multiplicative()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.match_op(OperatorId::Star) {
                BinaryOp::Mul
            } else if self.match_op(OperatorId::Slash) {
                BinaryOp::Div
            } else if self.match_op(OperatorId::Percent) {
                BinaryOp::Rem
            } else {
                break;
            };
            let right = self.unary()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let start = self.current_span().start;

        let op = if self.match_op(OperatorId::Bang) {
            Some(UnaryOp::Not)
        } else if self.match_op(OperatorId::Minus) {
            Some(UnaryOp::Neg)
        } else if self.match_op(OperatorId::Plus) {
            Some(UnaryOp::Plus)
        } else if self.match_keyword(KeywordId::Typeof) {
            Some(UnaryOp::Typeof)
        } else {
            None
        };
        if let Some(op) = op {
            self.enter()?;
            let operand = self.unary()?;
            self.leave();
            let span = Span::new(start, operand.span.end);
            return Ok(Spanned::new(Expr::Unary(op, Box::new(operand)), span));
        }

        let update = if self.match_op(OperatorId::PlusPlus) {
            Some(UpdateOp::Increment)
        } else if self.match_op(OperatorId::MinusMinus) {
            Some(UpdateOp::Decrement)
        } else {
            None
        };
        if let Some(op) = update {
            let target = self.unary()?;
            if !target.node.is_assignable() {
                return Err(ScriptError::syntax("Invalid update target", target.span));
            }
            let span = Span::new(start, target.span.end);
            return Ok(Spanned::new(
                Expr::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
                span,
            ));
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let expr = self.call_member()?;
        if self.peek().newline_before || !expr.node.is_assignable() {
            return Ok(expr);
        }
        let op = if self.match_op(OperatorId::PlusPlus) {
            UpdateOp::Increment
        } else if self.match_op(OperatorId::MinusMinus) {
            UpdateOp::Decrement
        } else {
            return Ok(expr);
        };
        let span = Span::new(expr.span.start, self.previous_span().end);
        Ok(Spanned::new(
            Expr::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            },
            span,
        ))
    }

    fn call_member(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let mut expr = if self.check_keyword(KeywordId::New) {
            self.new_expr()?
        } else {
            self.primary()?
        };

        loop {
            if self.match_punct(PunctuationId::Dot) {
                let name = self.expect_property_name()?;
                let span = Span::new(expr.span.start, self.previous_span().end);
                expr = Spanned::new(Expr::Member(Box::new(expr), name), span);
            } else if self.match_punct(PunctuationId::LBracket) {
                let index = self.expression()?;
                let end = self.expect_punct(PunctuationId::RBracket, "Expected ']' after index")?;
                let span = Span::new(expr.span.start, end.end);
                expr = Spanned::new(Expr::Index(Box::new(expr), Box::new(index)), span);
            } else if self.check_punct(PunctuationId::LParen) {
                let (args, end) = self.arguments()?;
                let span = Span::new(expr.span.start, end.end);
                expr = Spanned::new(Expr::Call(Box::new(expr), args), span);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// `new Callee(args)`; the callee is a member chain without calls.
    fn new_expr(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        self.enter()?;
        let start = self.expect_keyword(KeywordId::New, "Expected 'new'")?.start;
        let mut callee = if self.check_keyword(KeywordId::New) {
            self.new_expr()?
        } else {
            self.primary()?
        };

        loop {
            if self.match_punct(PunctuationId::Dot) {
                let name = self.expect_property_name()?;
                let span = Span::new(callee.span.start, self.previous_span().end);
                callee = Spanned::new(Expr::Member(Box::new(callee), name), span);
            } else if self.match_punct(PunctuationId::LBracket) {
                let index = self.expression()?;
                let end = self.expect_punct(PunctuationId::RBracket, "Expected ']' after index")?;
                let span = Span::new(callee.span.start, end.end);
                callee = Spanned::new(Expr::Index(Box::new(callee), Box::new(index)), span);
            } else {
                break;
            }
        }

        let (args, end) = if self.check_punct(PunctuationId::LParen) {
            self.arguments()?
        } else {
            (Vec::new(), callee.span)
        };
        self.leave();
        Ok(Spanned::new(Expr::New(Box::new(callee), args), Span::new(start, end.end)))
    }

    /// `( arg, ... )`, returning the span of the closing paren.
    fn arguments(&mut self) -> Result<(Vec<Spanned<Expr>>, Span), ScriptError> {
        self.expect_punct(PunctuationId::LParen, "Expected '('")?;
        let mut args = Vec::new();
        while !self.check_punct(PunctuationId::RParen) {
            args.push(self.assignment()?);
            if !self.match_punct(PunctuationId::Comma) {
                break;
            }
        }
        let end = self.expect_punct(PunctuationId::RParen, "Expected ')' after arguments")?;
        Ok((args, end))
    }

    fn primary(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let span = self.current_span();

        let node = match self.peek().kind.clone() {
            TokenKind::Number(value) => {
                self.advance();
                Expr::Number(value)
            }
            TokenKind::String(value) => {
                self.advance();
                Expr::Str(value)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Expr::Ident(name)
            }
            TokenKind::Keyword(KeywordId::This) => {
                self.advance();
                Expr::This
            }
            TokenKind::Keyword(KeywordId::Null) => {
                self.advance();
                Expr::Null
            }
            TokenKind::Keyword(KeywordId::True) => {
                self.advance();
                Expr::Bool(true)
            }
            TokenKind::Keyword(KeywordId::False) => {
                self.advance();
                Expr::Bool(false)
            }
            TokenKind::Keyword(KeywordId::Function) => {
                self.advance();
                let decl = self.function_rest(false)?;
                Expr::Function(Rc::new(decl))
            }
            TokenKind::Punctuation(PunctuationId::LParen) => {
                self.advance();
                let inner = self.expression()?;
                let end = self.expect_punct(PunctuationId::RParen, "Expected ')'")?;
                return Ok(Spanned::new(inner.node, Span::new(span.start, end.end)));
            }
            TokenKind::Punctuation(PunctuationId::LBracket) => return self.array_literal(),
            TokenKind::Punctuation(PunctuationId::LBrace) => return self.object_literal(),
            _ => return Err(self.error_here("Expected expression")),
        };

        Ok(Spanned::new(node, Span::new(span.start, self.previous_span().end)))
    }

    fn array_literal(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let start = self.expect_punct(PunctuationId::LBracket, "Expected '['")?.start;
        let mut elements = Vec::new();
        while !self.check_punct(PunctuationId::RBracket) {
            elements.push(self.assignment()?);
            if !self.match_punct(PunctuationId::Comma) {
                break;
            }
        }
        let end = self.expect_punct(PunctuationId::RBracket, "Expected ']' after array elements")?;
        Ok(Spanned::new(Expr::Array(elements), Span::new(start, end.end)))
    }

    fn object_literal(&mut self) -> Result<Spanned<Expr>, ScriptError> {
        let start = self.expect_punct(PunctuationId::LBrace, "Expected '{'")?.start;
        let mut properties = Vec::new();
        while !self.check_punct(PunctuationId::RBrace) {
            let key = match self.peek().kind.clone() {
                TokenKind::Ident(name) => name,
                TokenKind::String(value) => value,
                TokenKind::Number(value) => crate::interp::number_to_string(value),
                TokenKind::Keyword(id) => id.as_str().to_string(),
                _ => return Err(self.error_here("Expected property key")),
            };
            self.advance();
            self.expect_punct(PunctuationId::Colon, "Expected ':' after property key")?;
            let value = self.assignment()?;
            properties.push((key, value));
            if !self.match_punct(PunctuationId::Comma) {
                break;
            }
        }
        let end = self.expect_punct(PunctuationId::RBrace, "Expected '}' after object literal")?;
        Ok(Spanned::new(Expr::Object(properties), Span::new(start, end.end)))
    }
}
