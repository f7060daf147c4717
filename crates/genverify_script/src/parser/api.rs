/// Parse a token stream into a [`Program`].
///
/// ## Errors
/// Returns `Err(Vec<ScriptError>)` if parsing fails.
#[tracing::instrument(skip_all, fields(token_count = tokens.len()))]
pub fn parse(tokens: &[Token]) -> Result<Program, Vec<ScriptError>> {
    if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
        let end = tokens.last().map_or(0, |t| t.span.end);
        return Err(vec![ScriptError::syntax("Token stream must end with Eof", Span::new(end, end))]);
    }
    Parser::new(tokens).parse()
}

/// Lex and parse `source` in one step, returning the first error.
pub fn parse_source(source: &str) -> Result<Program, ScriptError> {
    let first = |errors: Vec<ScriptError>| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ScriptError::syntax("Unknown syntax error", Span::default()))
    };
    let tokens = crate::lexer::lex(source).map_err(first)?;
    parse(&tokens).map_err(first)
}
