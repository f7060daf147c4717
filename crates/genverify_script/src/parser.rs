//! Parser for generated script artifacts
//!
//! Converts a token stream into a [`Program`]. Semicolons are optional: a statement ends at an explicit
//! `;`, before a closing `}`, at end of input, or wherever the next token cannot continue it.
//!
//! ## Examples
//!
//! ```rust
//! use genverify_script::{lexer, parser};
//!
//! let tokens = lexer::lex("var greeting = 'hi'; alert(greeting)").unwrap();
//! let program = parser::parse(&tokens).unwrap();
//! assert_eq!(program.body.len(), 2);
//! ```

use std::rc::Rc;

use crate::ast::*;
use crate::diagnostics::ScriptError;
use crate::lexer::{KeywordId, OperatorId, PunctuationId, Token, TokenKind};

// NOTE: split across multiple files with `include!` so every parser method stays in one module.

include!("parser/core.rs");
include!("parser/helpers.rs");
include!("parser/stmts.rs");
include!("parser/expr.rs");
include!("parser/api.rs");
include!("parser/tests.rs");
