//! Lexer for generated script artifacts
//!
//! Handles tokenization including:
//! - Keywords and identifiers (`$` and `_` allowed)
//! - Numeric literals (decimal, exponent, hex) and quoted strings
//! - Operators, including strict equality and update forms
//! - Line and block comments
//!
//! Line terminators are not tokens; each token records whether one preceded it so the parser can apply
//! automatic semicolon insertion where it matters.
//!
//! ## Module Structure
//!
//! - `tokens` - Token types (TokenKind, Token, vocabulary ids)
//! - `strings` - String literal scanning and escapes

mod strings;
pub mod tokens;

pub use tokens::{KeywordId, OperatorId, PunctuationId, Token, TokenKind, keyword_id};

use crate::ast::Span;
use crate::diagnostics::ScriptError;

/// Lexer for script source code.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    /// Set when a line terminator was skipped since the last emitted token.
    saw_newline: bool,
    tokens: Vec<Token>,
    errors: Vec<ScriptError>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            saw_newline: false,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source code.
    ///
    /// The token stream always ends with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Vec<ScriptError>> {
        while !self.is_at_end() {
            self.scan_token();
        }

        let newline_before = self.saw_newline;
        self.tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(self.current_pos, self.current_pos),
            newline_before,
        ));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    // ========================================================================
    // Core character handling
    // ========================================================================

    fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Main scanning dispatch
    // ========================================================================

    fn scan_token(&mut self) {
        let start = self.current_pos;

        let Some(c) = self.advance() else {
            return;
        };

        match c {
            '\n' | '\u{2028}' | '\u{2029}' => self.saw_newline = true,
            ' ' | '\t' | '\r' | '\u{feff}' | '\u{a0}' => {}

            '/' if self.peek() == Some('/') => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            }
            '/' if self.peek() == Some('*') => self.skip_block_comment(start),

            '(' => self.add_punct(PunctuationId::LParen, start),
            ')' => self.add_punct(PunctuationId::RParen, start),
            '[' => self.add_punct(PunctuationId::LBracket, start),
            ']' => self.add_punct(PunctuationId::RBracket, start),
            '{' => self.add_punct(PunctuationId::LBrace, start),
            '}' => self.add_punct(PunctuationId::RBrace, start),
            ',' => self.add_punct(PunctuationId::Comma, start),
            ';' => self.add_punct(PunctuationId::Semicolon, start),
            ':' => self.add_punct(PunctuationId::Colon, start),
            '?' => self.add_punct(PunctuationId::Question, start),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.scan_number(start, c),
            '.' => self.add_punct(PunctuationId::Dot, start),

            '+' => self.operator(
                start,
                OperatorId::Plus,
                &[('+', OperatorId::PlusPlus), ('=', OperatorId::PlusEq)],
            ),
            '-' => self.operator(
                start,
                OperatorId::Minus,
                &[('-', OperatorId::MinusMinus), ('=', OperatorId::MinusEq)],
            ),
            '*' => self.operator(start, OperatorId::Star, &[('=', OperatorId::StarEq)]),
            '/' => self.operator(start, OperatorId::Slash, &[('=', OperatorId::SlashEq)]),
            '%' => self.add_op(OperatorId::Percent, start),
            '<' => self.operator(start, OperatorId::Lt, &[('=', OperatorId::LtEq)]),
            '>' => self.operator(start, OperatorId::Gt, &[('=', OperatorId::GtEq)]),
            '=' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        self.add_op(OperatorId::EqEqEq, start);
                    } else {
                        self.add_op(OperatorId::EqEq, start);
                    }
                } else {
                    self.add_op(OperatorId::Eq, start);
                }
            }
            '!' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        self.add_op(OperatorId::NotEqEq, start);
                    } else {
                        self.add_op(OperatorId::NotEq, start);
                    }
                } else {
                    self.add_op(OperatorId::Bang, start);
                }
            }
            '&' if self.match_char('&') => self.add_op(OperatorId::AndAnd, start),
            '|' if self.match_char('|') => self.add_op(OperatorId::OrOr, start),

            '"' | '\'' => self.scan_string(start, c),

            '0'..='9' => self.scan_number(start, c),

            _ if is_ident_start(c) => self.scan_identifier(start),

            _ => {
                self.errors.push(ScriptError::syntax(
                    format!("Unexpected character '{}'", c),
                    Span::new(start, self.current_pos),
                ));
            }
        }
    }

    fn skip_block_comment(&mut self, start: usize) {
        self.advance(); // '*'
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return;
                }
                Some('\n') => self.saw_newline = true,
                Some(_) => {}
                None => {
                    self.errors.push(ScriptError::syntax(
                        "Unterminated block comment",
                        Span::new(start, self.current_pos),
                    ));
                    return;
                }
            }
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn add_token(&mut self, kind: TokenKind, start: usize) {
        let newline_before = std::mem::take(&mut self.saw_newline);
        self.tokens
            .push(Token::new(kind, Span::new(start, self.current_pos), newline_before));
    }

    fn add_op(&mut self, id: OperatorId, start: usize) {
        self.add_token(TokenKind::Operator(id), start);
    }

    fn add_punct(&mut self, id: PunctuationId, start: usize) {
        self.add_token(TokenKind::Punctuation(id), start);
    }

    /// Try to match a compound operator, fallback to simple.
    fn operator(&mut self, start: usize, simple: OperatorId, compounds: &[(char, OperatorId)]) {
        for (c, id) in compounds {
            if self.match_char(*c) {
                self.add_op(*id, start);
                return;
            }
        }
        self.add_op(simple, start);
    }

    // ========================================================================
    // Numbers and identifiers
    // ========================================================================

    fn scan_number(&mut self, start: usize, first: char) {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let digits_start = self.current_pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = &self.source[digits_start..self.current_pos];
            match u64::from_str_radix(digits, 16) {
                Ok(value) => self.add_token(TokenKind::Number(value as f64), start),
                Err(_) => self.errors.push(ScriptError::syntax(
                    format!("Invalid hex literal '0x{}'", digits),
                    Span::new(start, self.current_pos),
                )),
            }
            return;
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if first != '.' && self.peek() == Some('.') {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_follows = match self.peek_next() {
                Some('+' | '-') => true,
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.source[start..self.current_pos];
        match text.parse::<f64>() {
            Ok(value) => self.add_token(TokenKind::Number(value), start),
            Err(_) => self.errors.push(ScriptError::syntax(
                format!("Invalid number literal '{}'", text),
                Span::new(start, self.current_pos),
            )),
        }
    }

    fn scan_identifier(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        let spelling = &self.source[start..self.current_pos];
        if let Some(id) = keyword_id(spelling) {
            self.add_token(TokenKind::Keyword(id), start);
        } else {
            self.add_token(TokenKind::Ident(spelling.to_string()), start);
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Check if a character can start an identifier.
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

/// Check if a character can continue an identifier.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Convenience function to lex a source string.
///
/// This is a shorthand for `Lexer::new(source).tokenize()`.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<ScriptError>> {
    Lexer::new(source).tokenize()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_strict_equality_operators() {
        assert_eq!(
            kinds("a === b !== c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Operator(OperatorId::EqEqEq),
                TokenKind::Ident("b".into()),
                TokenKind::Operator(OperatorId::NotEqEq),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "// banner\nvar /* inline */ x = 1;";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Keyword(KeywordId::Var),
                TokenKind::Ident("x".into()),
                TokenKind::Operator(OperatorId::Eq),
                TokenKind::Number(1.0),
                TokenKind::Punctuation(PunctuationId::Semicolon),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_before_is_tracked() {
        let tokens = lex("return\nx").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 0xff"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(255.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_member_access_after_index() {
        assert_eq!(
            kinds("a[0].b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punctuation(PunctuationId::LBracket),
                TokenKind::Number(0.0),
                TokenKind::Punctuation(PunctuationId::RBracket),
                TokenKind::Punctuation(PunctuationId::Dot),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_update_and_compound_operators() {
        assert_eq!(
            kinds("i++ j-- k += 2"),
            vec![
                TokenKind::Ident("i".into()),
                TokenKind::Operator(OperatorId::PlusPlus),
                TokenKind::Ident("j".into()),
                TokenKind::Operator(OperatorId::MinusMinus),
                TokenKind::Ident("k".into()),
                TokenKind::Operator(OperatorId::PlusEq),
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unexpected_character_is_reported() {
        let errors = lex("var x = #;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unexpected character '#'"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let errors = lex("/* never closed").unwrap_err();
        assert!(errors[0].to_string().contains("Unterminated block comment"));
    }
}
