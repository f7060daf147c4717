//! String literal scanning for the script lexer

use super::Lexer;
use super::tokens::TokenKind;
use crate::ast::Span;
use crate::diagnostics::ScriptError;

/// Result of processing an escape sequence
enum EscapeResult {
    Char(char),
    /// Line continuation (`\` followed by a newline) contributes nothing.
    Skip,
    Invalid(String),
    Eof,
}

impl<'a> Lexer<'a> {
    /// Process an escape sequence. Called after consuming the backslash.
    fn scan_escape(&mut self) -> EscapeResult {
        match self.advance() {
            Some('n') => EscapeResult::Char('\n'),
            Some('t') => EscapeResult::Char('\t'),
            Some('r') => EscapeResult::Char('\r'),
            Some('b') => EscapeResult::Char('\u{8}'),
            Some('f') => EscapeResult::Char('\u{c}'),
            Some('v') => EscapeResult::Char('\u{b}'),
            Some('0') => EscapeResult::Char('\0'),
            Some('\n') => EscapeResult::Skip,
            Some('x') => self.scan_hex_escape(2),
            Some('u') => self.scan_hex_escape(4),
            Some(c) => EscapeResult::Char(c),
            None => EscapeResult::Eof,
        }
    }

    fn scan_hex_escape(&mut self, len: usize) -> EscapeResult {
        let mut hex = String::with_capacity(len);
        for _ in 0..len {
            match self.advance() {
                Some(c) => hex.push(c),
                None => return EscapeResult::Eof,
            }
        }
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(c) => EscapeResult::Char(c),
            None => EscapeResult::Invalid(hex),
        }
    }

    pub(super) fn scan_string(&mut self, start: usize, quote: char) {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some('\\') => match self.scan_escape() {
                    EscapeResult::Char(c) => value.push(c),
                    EscapeResult::Skip => {}
                    EscapeResult::Invalid(hex) => {
                        self.errors.push(ScriptError::syntax(
                            format!("Invalid escape sequence '{}'", hex),
                            Span::new(start, self.current_pos),
                        ));
                    }
                    EscapeResult::Eof => {
                        self.errors.push(ScriptError::syntax(
                            "Unterminated string literal",
                            Span::new(start, self.current_pos),
                        ));
                        return;
                    }
                },
                Some('\n') | None => {
                    self.errors.push(ScriptError::syntax(
                        "Unterminated string literal",
                        Span::new(start, self.current_pos),
                    ));
                    return;
                }
                Some(c) => value.push(c),
            }
        }

        self.add_token(TokenKind::String(value), start);
    }
}
