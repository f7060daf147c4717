//! A small script engine for running generated browser scripts without a browser.
//!
//! Covers the language subset produced by source-to-source generators: functions and closures,
//! prototypes and `new`, object and array literals, `for`/`for-in`/`while`, and `try`/`catch`/`finally`.
//! Host functions (for example `alert`) are installed with [`Interpreter::define_function`].

pub mod ast;
pub mod diagnostics;
pub mod interp;
pub mod lexer;
pub mod parser;

pub use diagnostics::ScriptError;
pub use interp::{Interpreter, Value};
