//! Token types for the script lexer.
//!
//! Reserved words, operators and punctuation carry small `Copy` ids so the parser never matches on
//! spellings.

use crate::ast::Span;

// ============================================================================
// VOCABULARY
// ============================================================================

/// Reserved words recognised by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordId {
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    New,
    This,
    Null,
    True,
    False,
    Typeof,
    Instanceof,
    Throw,
    Try,
    Catch,
    Finally,
}

const KEYWORDS: &[(&str, KeywordId)] = &[
    ("var", KeywordId::Var),
    ("let", KeywordId::Let),
    ("const", KeywordId::Const),
    ("function", KeywordId::Function),
    ("return", KeywordId::Return),
    ("if", KeywordId::If),
    ("else", KeywordId::Else),
    ("while", KeywordId::While),
    ("for", KeywordId::For),
    ("in", KeywordId::In),
    ("break", KeywordId::Break),
    ("continue", KeywordId::Continue),
    ("new", KeywordId::New),
    ("this", KeywordId::This),
    ("null", KeywordId::Null),
    ("true", KeywordId::True),
    ("false", KeywordId::False),
    ("typeof", KeywordId::Typeof),
    ("instanceof", KeywordId::Instanceof),
    ("throw", KeywordId::Throw),
    ("try", KeywordId::Try),
    ("catch", KeywordId::Catch),
    ("finally", KeywordId::Finally),
];

impl KeywordId {
    /// Source spelling of the keyword.
    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, id)| *id == self)
            .map_or("", |(spelling, _)| spelling)
    }
}

/// Operators, including compound assignment and update forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
}

/// Punctuation tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunctuationId {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    Colon,
    Question,
}

// ============================================================================
// TOKEN TYPES
// ============================================================================

/// Kind of token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(KeywordId),
    Operator(OperatorId),
    Punctuation(PunctuationId),

    Ident(String),
    Number(f64),
    String(String),

    Eof,
}

impl TokenKind {
    /// Return `true` if this is the given keyword.
    pub fn is_keyword(&self, id: KeywordId) -> bool {
        matches!(self, TokenKind::Keyword(k) if *k == id)
    }

    /// Return `true` if this is the given operator.
    pub fn is_operator(&self, id: OperatorId) -> bool {
        matches!(self, TokenKind::Operator(o) if *o == id)
    }

    /// Return `true` if this is the given punctuation.
    pub fn is_punctuation(&self, id: PunctuationId) -> bool {
        matches!(self, TokenKind::Punctuation(p) if *p == id)
    }
}

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Whether a line terminator separates this token from the previous one.
    ///
    /// Drives automatic semicolon insertion after `return` and before postfix `++`/`--`.
    pub newline_before: bool,
}

impl Token {
    /// Construct a new token.
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }
}

/// Resolve an identifier spelling to a keyword id, if reserved.
pub fn keyword_id(name: &str) -> Option<KeywordId> {
    KEYWORDS.iter().find(|(spelling, _)| *spelling == name).map(|(_, id)| *id)
}
