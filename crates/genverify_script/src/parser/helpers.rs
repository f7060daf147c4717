/// Token-stream helpers and error recovery.
///
/// This chunk contains the low-level primitives used throughout parsing:
/// - Peeking/consuming tokens (`peek`, `advance`)
/// - Matching / expecting keywords, operators, and punctuation
/// - Statement termination with automatic semicolon insertion
/// - Error recovery (`synchronize`)
impl<'a> Parser<'a> {
    // ========================================================================
    // Helpers
    // ========================================================================

    /// Return `true` if the current token is [`TokenKind::Eof`].
    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Return the current token without consuming it.
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    /// Advance to the next token and return the token we just consumed.
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
            &self.tokens[self.pos - 1]
        } else {
            &self.tokens[self.pos]
        }
    }

    /// Span of the most recently consumed token.
    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn check_keyword(&self, id: KeywordId) -> bool {
        self.peek().kind.is_keyword(id)
    }

    fn check_punct(&self, id: PunctuationId) -> bool {
        self.peek().kind.is_punctuation(id)
    }

    fn check_op(&self, id: OperatorId) -> bool {
        self.peek().kind.is_operator(id)
    }

    fn match_keyword(&mut self, id: KeywordId) -> bool {
        if self.check_keyword(id) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_punct(&mut self, id: PunctuationId) -> bool {
        if self.check_punct(id) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_op(&mut self, id: OperatorId) -> bool {
        if self.check_op(id) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, msg: &str) -> ScriptError {
        ScriptError::syntax(format!("{}, found {:?}", msg, self.peek().kind), self.peek().span)
    }

    fn expect_keyword(&mut self, id: KeywordId, msg: &str) -> Result<Span, ScriptError> {
        if self.check_keyword(id) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(msg))
        }
    }

    fn expect_punct(&mut self, id: PunctuationId, msg: &str) -> Result<Span, ScriptError> {
        if self.check_punct(id) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(msg))
        }
    }

    fn expect_ident(&mut self, msg: &str) -> Result<String, ScriptError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(msg))
        }
    }

    /// Property names after `.` may be reserved words (`obj.new`, `stjs.this`).
    fn expect_property_name(&mut self) -> Result<String, ScriptError> {
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Keyword(id) => id.as_str().to_string(),
            _ => return Err(self.error_here("Expected property name after '.'")),
        };
        self.advance();
        Ok(name)
    }

    /// End a statement: explicit `;`, or an inserted one before `}` / end of input / a line break.
    fn consume_semicolon(&mut self) -> Result<(), ScriptError> {
        if self.match_punct(PunctuationId::Semicolon)
            || self.check_punct(PunctuationId::RBrace)
            || self.is_at_end()
            || self.peek().newline_before
        {
            Ok(())
        } else {
            Err(self.error_here("Expected ';'"))
        }
    }

    /// Guard recursion on deeply nested input.
    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            Err(ScriptError::syntax("Nesting too deep", self.current_span()))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Skip to the next statement boundary after an error.
    fn synchronize(&mut self) {
        self.depth = 0;
        self.advance();
        while !self.is_at_end() {
            if self.tokens[self.pos - 1].kind.is_punctuation(PunctuationId::Semicolon) {
                return;
            }
            if self.peek().newline_before
                && (self.check_keyword(KeywordId::Var)
                    || self.check_keyword(KeywordId::Let)
                    || self.check_keyword(KeywordId::Const)
                    || self.check_keyword(KeywordId::Function)
                    || self.check_keyword(KeywordId::If)
                    || self.check_keyword(KeywordId::For)
                    || self.check_keyword(KeywordId::While)
                    || self.check_keyword(KeywordId::Return))
            {
                return;
            }
            self.advance();
        }
    }
}
