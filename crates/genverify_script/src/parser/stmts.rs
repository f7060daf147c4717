/// Statement parsing methods.
///
/// This chunk parses statement forms (declarations, `if`, loops, `try`, blocks) and function bodies.
impl<'a> Parser<'a> {
    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self) -> Result<Spanned<Stmt>, ScriptError> {
        self.enter()?;
        let start = self.current_span().start;

        let stmt = if self.check_keyword(KeywordId::Var)
            || self.check_keyword(KeywordId::Let)
            || self.check_keyword(KeywordId::Const)
        {
            let stmt = self.var_declaration()?;
            self.consume_semicolon()?;
            stmt
        } else if self.check_keyword(KeywordId::Function) {
            self.advance();
            let decl = self.function_rest(true)?;
            Stmt::Function(Rc::new(decl))
        } else if self.match_keyword(KeywordId::Return) {
            let value = if self.check_punct(PunctuationId::Semicolon)
                || self.check_punct(PunctuationId::RBrace)
                || self.is_at_end()
                || self.peek().newline_before
            {
                None
            } else {
                Some(self.expression()?)
            };
            self.consume_semicolon()?;
            Stmt::Return(value)
        } else if self.check_keyword(KeywordId::If) {
            self.if_stmt()?
        } else if self.match_keyword(KeywordId::While) {
            self.expect_punct(PunctuationId::LParen, "Expected '(' after 'while'")?;
            let test = self.expression()?;
            self.expect_punct(PunctuationId::RParen, "Expected ')' after while condition")?;
            let body = self.statement()?;
            Stmt::While {
                test,
                body: Box::new(body),
            }
        } else if self.check_keyword(KeywordId::For) {
            self.for_stmt()?
        } else if self.match_keyword(KeywordId::Break) {
            self.consume_semicolon()?;
            Stmt::Break
        } else if self.match_keyword(KeywordId::Continue) {
            self.consume_semicolon()?;
            Stmt::Continue
        } else if self.match_keyword(KeywordId::Throw) {
            if self.peek().newline_before {
                return Err(self.error_here("Illegal newline after 'throw'"));
            }
            let value = self.expression()?;
            self.consume_semicolon()?;
            Stmt::Throw(value)
        } else if self.check_keyword(KeywordId::Try) {
            self.try_stmt()?
        } else if self.check_punct(PunctuationId::LBrace) {
            Stmt::Block(self.block()?)
        } else if self.match_punct(PunctuationId::Semicolon) {
            Stmt::Empty
        } else {
            let expr = self.expression()?;
            self.consume_semicolon()?;
            Stmt::Expr(expr)
        };

        self.leave();
        let end = self.previous_span().end;
        Ok(Spanned::new(stmt, Span::new(start, end.max(start))))
    }

    /// `{ statement* }`
    fn block(&mut self) -> Result<Vec<Spanned<Stmt>>, ScriptError> {
        self.expect_punct(PunctuationId::LBrace, "Expected '{'")?;
        let mut stmts = Vec::new();
        while !self.check_punct(PunctuationId::RBrace) && !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        self.expect_punct(PunctuationId::RBrace, "Expected '}'")?;
        Ok(stmts)
    }

    /// `var a = 1, b` without the terminating semicolon (shared with `for` headers).
    fn var_declaration(&mut self) -> Result<Stmt, ScriptError> {
        let kind = if self.match_keyword(KeywordId::Let) {
            VarKind::Let
        } else if self.match_keyword(KeywordId::Const) {
            VarKind::Const
        } else {
            self.expect_keyword(KeywordId::Var, "Expected 'var'")?;
            VarKind::Var
        };

        let mut declarators = Vec::new();
        loop {
            let name = self.expect_ident("Expected variable name")?;
            let init = if self.match_op(OperatorId::Eq) {
                Some(self.assignment()?)
            } else {
                None
            };
            if kind == VarKind::Const && init.is_none() {
                return Err(ScriptError::syntax(
                    format!("Missing initializer in const declaration '{}'", name),
                    self.previous_span(),
                ));
            }
            declarators.push(VarDeclarator { name, init });
            if !self.match_punct(PunctuationId::Comma) {
                break;
            }
        }
        Ok(Stmt::Var(kind, declarators))
    }

    fn if_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.expect_keyword(KeywordId::If, "Expected 'if'")?;
        self.expect_punct(PunctuationId::LParen, "Expected '(' after 'if'")?;
        let test = self.expression()?;
        self.expect_punct(PunctuationId::RParen, "Expected ')' after if condition")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_keyword(KeywordId::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            then_branch,
            else_branch,
        })
    }

    /// `for (init; test; update) body` or `for (var k in object) body`.
    fn for_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.expect_keyword(KeywordId::For, "Expected 'for'")?;
        self.expect_punct(PunctuationId::LParen, "Expected '(' after 'for'")?;

        // for-in: `for (var k in o)` / `for (k in o)`
        let declares = self.check_keyword(KeywordId::Var)
            || self.check_keyword(KeywordId::Let)
            || self.check_keyword(KeywordId::Const);
        let name_offset = usize::from(declares);
        if matches!(self.tokens.get(self.pos + name_offset).map(|t| &t.kind), Some(TokenKind::Ident(_)))
            && self
                .tokens
                .get(self.pos + name_offset + 1)
                .is_some_and(|t| t.kind.is_keyword(KeywordId::In))
        {
            if declares {
                self.advance();
            }
            let name = self.expect_ident("Expected loop variable")?;
            self.expect_keyword(KeywordId::In, "Expected 'in'")?;
            let object = self.expression()?;
            self.expect_punct(PunctuationId::RParen, "Expected ')' after for-in header")?;
            let body = self.statement()?;
            return Ok(Stmt::ForIn {
                name,
                object,
                body: Box::new(body),
            });
        }

        let init = if self.match_punct(PunctuationId::Semicolon) {
            None
        } else {
            let start = self.current_span().start;
            let stmt = if declares {
                self.var_declaration()?
            } else {
                Stmt::Expr(self.expression()?)
            };
            self.expect_punct(PunctuationId::Semicolon, "Expected ';' after for initializer")?;
            Some(Box::new(Spanned::new(stmt, Span::new(start, self.previous_span().end))))
        };

        let test = if self.check_punct(PunctuationId::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(PunctuationId::Semicolon, "Expected ';' after for condition")?;

        let update = if self.check_punct(PunctuationId::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(PunctuationId::RParen, "Expected ')' after for clauses")?;

        let body = self.statement()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    fn try_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.expect_keyword(KeywordId::Try, "Expected 'try'")?;
        let block = self.block()?;

        let handler = if self.match_keyword(KeywordId::Catch) {
            let param = if self.match_punct(PunctuationId::LParen) {
                let name = self.expect_ident("Expected catch binding")?;
                self.expect_punct(PunctuationId::RParen, "Expected ')' after catch binding")?;
                Some(name)
            } else {
                None
            };
            Some(CatchClause {
                param,
                body: self.block()?,
            })
        } else {
            None
        };

        let finalizer = if self.match_keyword(KeywordId::Finally) {
            Some(self.block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("Expected 'catch' or 'finally' after try block"));
        }

        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    /// Parse the remainder of a function after the `function` keyword.
    ///
    /// Declarations require a name; expressions may omit it.
    fn function_rest(&mut self, require_name: bool) -> Result<FunctionDecl, ScriptError> {
        let name = if let TokenKind::Ident(_) = self.peek().kind {
            Some(self.expect_ident("Expected function name")?)
        } else if require_name {
            return Err(self.error_here("Expected function name"));
        } else {
            None
        };

        self.expect_punct(PunctuationId::LParen, "Expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check_punct(PunctuationId::RParen) {
            loop {
                params.push(self.expect_ident("Expected parameter name")?);
                if !self.match_punct(PunctuationId::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(PunctuationId::RParen, "Expected ')' after parameters")?;

        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            body: Rc::new(body),
        })
    }
}
