/// A single comma-delimited token of the fields parameter.
///
/// Positions are byte offsets into the preprocessed string (see [`tokenize`]),
/// which is also the source text attached to parser diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, pos_start: usize, pos_end: usize) -> Token {
        Token {
            text: text.into(),
            pos_start,
            pos_end,
        }
    }
}

/// Splits a flat fields parameter into its token list.
///
/// Every `)` is first rewritten into `,)` so that close brackets become their
/// own list tokens, then the string is split on `,`. This keeps the parser to
/// a single forward pass at the cost of O(#fields) extra iterations. Empty
/// tokens (from consecutive commas) are kept; the parser skips them.
///
/// Returns the preprocessed string together with the tokens, so diagnostics
/// can carry spans into the exact text that was walked.
pub fn tokenize(raw: &str) -> (String, Vec<Token>) {
    let rewritten = raw.replace(')', ",)");
    let mut tokens = Vec::new();
    let mut offset = 0;
    for piece in rewritten.split(',') {
        tokens.push(Token::new(piece, offset, offset + piece.len()));
        offset += piece.len() + 1;
    }
    (rewritten, tokens)
}
