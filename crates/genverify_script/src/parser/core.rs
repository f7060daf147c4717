/// Parser state.
///
/// ## Notes
/// - Single pass with statement-level error recovery, so one bad statement does not hide later ones.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    errors: Vec<ScriptError>,
    /// Nesting depth of expressions and statements, bounded to keep hostile input off the native stack.
    depth: usize,
}

/// Maximum nesting depth accepted by the parser.
const MAX_NESTING: usize = 96;

impl<'a> Parser<'a> {
    /// Create a new parser for a token stream.
    ///
    /// ## Parameters
    /// - `tokens`: Token stream produced by `genverify_script::lexer`; must end with `Eof`.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Parse the entire token stream into a [`Program`].
    ///
    /// ## Errors
    /// Returns every [`ScriptError`] found; the parser resynchronises at statement boundaries.
    pub fn parse(mut self) -> Result<Program, Vec<ScriptError>> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            match self.statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Program { body })
        } else {
            Err(self.errors)
        }
    }
}
