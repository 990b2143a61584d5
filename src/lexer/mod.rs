use logos::Logos;

/// Tokens of the line template grammar
/// Literal G-code text with bracketed placeholders: `[N] I[X#]J[Y#]`
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
pub enum Token<'a> {
    // Placeholder, optionally bare (`#` suffix drops the prefix letter)
    #[regex(r"\[[A-Za-z_][A-Za-z0-9_]*#?\]", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    Placeholder(&'a str),

    // Everything outside brackets is copied verbatim
    #[regex(r"[^\[\]]+", |lex| lex.slice())]
    Literal(&'a str),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LexerError;

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lexer error")
    }
}

impl std::error::Error for LexerError {}

/// Lex a template string, keeping errors with their spans so the
/// parser can say what went wrong and where
pub fn lex(input: &str) -> Vec<(Result<Token<'_>, LexerError>, logos::Span)> {
    Token::lexer(input).spanned().collect()
}
