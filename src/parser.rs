use crate::error::ParseError;
use crate::lexer::{tokenize, Token};
use crate::selection::FieldSelection;
use miette::NamedSource;
use std::sync::Arc;

/// Parses a flat fields parameter (e.g. `id,name,comments(text,author(name))`)
/// into a [`FieldSelection`] tree.
///
/// # Errors
///
/// Returns a [`ParseError`] when the bracket structure is invalid: an
/// unmatched close bracket, an unclosed group, or a group without a name.
pub fn parse(raw: &str) -> Result<FieldSelection, ParseError> {
    Parser::new(raw).parse_selection()
}

/// A single-pass recursive parser over the comma-delimited token list.
///
/// One group of the selection is consumed per recursion level; the only state
/// threaded through is whether the current level still owes a close bracket
/// (and where its group was opened, for diagnostics).
#[derive(Debug)]
pub struct Parser {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(raw: &str) -> Parser {
        let (rewritten, tokens) = tokenize(raw);
        Parser {
            source: Arc::new(NamedSource::new("fields", rewritten)),
            tokens,
            position: 0,
        }
    }

    pub fn parse_selection(&mut self) -> Result<FieldSelection, ParseError> {
        match self.next_token() {
            Some(first) => self.parse_group(first, None),
            None => Ok(FieldSelection::new()),
        }
    }

    /// Consumes tokens into one selection node. `open_at` is `Some(position)`
    /// when this level was opened by a `(` and must find its close bracket.
    ///
    /// A token containing `(` is split at the first `(` only: the prefix
    /// names the nested field and the suffix re-enters the stream as the
    /// first token of the recursive call, so adjacent nests collapsed into
    /// one token (`a(b(c`) parse correctly.
    fn parse_group(
        &mut self,
        first: Token,
        open_at: Option<usize>,
    ) -> Result<FieldSelection, ParseError> {
        let mut selection = FieldSelection::new();
        let mut field = first;

        loop {
            if field.text.starts_with(':') {
                if field.text.contains(')') {
                    // An option that also closes its group, `:opt)`.
                    let option = field.text[1..field.text.len() - 1].to_string();
                    selection.options.insert(option);
                    return Ok(selection);
                }
                selection.options.insert(field.text[1..].to_string());
            } else if let Some(split_at) = field.text.find('(') {
                let name = field.text[..split_at].to_string();
                if name.is_empty() {
                    return Err(ParseError::NestedFieldWithoutName {
                        src: (*self.source).clone(),
                        span: (field.pos_start, field.text.len().max(1)).into(),
                    });
                }
                let rest = Token::new(
                    &field.text[split_at + 1..],
                    field.pos_start + split_at + 1,
                    field.pos_end,
                );
                let child = self.parse_group(rest, Some(field.pos_start + split_at))?;
                selection.insert_nested(name, child);
            } else if field.text == ")" {
                if open_at.is_none() {
                    return Err(ParseError::CloseWithoutOpen {
                        src: (*self.source).clone(),
                        span: (field.pos_start, 1).into(),
                    });
                }
                return Ok(selection);
            } else if !field.text.is_empty() {
                selection.fields.push(field.text.clone());
            }

            match self.next_token() {
                Some(next) => field = next,
                None => {
                    if let Some(open_pos) = open_at {
                        return Err(ParseError::UnclosedBracket {
                            src: (*self.source).clone(),
                            span: (open_pos, 1).into(),
                        });
                    }
                    return Ok(selection);
                }
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }
}
