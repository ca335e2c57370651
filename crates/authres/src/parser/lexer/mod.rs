//! Tokenizer for Authentication-Results header text.
//!
//! Breaks raw header text into a stream of classified tokens for the
//! parser. Tokenization is context-sensitive in exactly one place: `.`
//! and `/` act as operators unless the previous non-comment token was
//! itself an operator, in which case they are literal content.

mod token;

pub use token::{Token, TokenKind};

use crate::{Error, Result};

/// Case-insensitive header name prefix stripped before tokenizing.
const HEADER_NAME: &str = "authentication-results:";

/// Characters that terminate a bare string token.
const STRING_TERMINATORS: [char; 4] = ['"', '(', ';', '='];

/// Tokenizer state.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Kind of the last non-comment token, used to disambiguate `.` and
    /// `/`. Comments never update this.
    last: Option<TokenKind>,
}

impl<'a> Tokenizer<'a> {
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            last: None,
        }
    }

    /// Remaining unconsumed input.
    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Skips leading whitespace.
    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// Reads the next token, or None at end of input.
    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();

        let ch = self.remaining().chars().next()?;

        let token = match ch {
            '(' => self.read_comment(),
            ';' => {
                self.pos += 1;
                Token::new(TokenKind::Separator, ";", 1)
            }
            '"' => self.read_quoted_string(),
            '.' | '/' => {
                // One token of context: an operator cannot follow another
                // operator, so after an assignment these are literal text.
                self.pos += ch.len_utf8();
                if self.last == Some(TokenKind::Assignment) {
                    Token::new(TokenKind::String, ch, 1)
                } else {
                    Token::new(TokenKind::Assignment, ch, 1)
                }
            }
            '=' => {
                self.pos += 1;
                Token::new(TokenKind::Assignment, "=", 1)
            }
            _ => self.read_string(),
        };

        if token.kind() != TokenKind::Comment {
            self.last = Some(token.kind());
        }

        Some(token)
    }

    /// Reads a comment token, consuming through the matching close
    /// parenthesis. Parentheses nest; an unterminated comment runs to the
    /// end of the input.
    fn read_comment(&mut self) -> Token {
        let start = self.pos;
        let mut depth = 0usize;
        let mut end = self.input.len();
        let mut closed = false;

        for (offset, ch) in self.remaining().char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = self.pos + offset + 1;
                        closed = true;
                        break;
                    }
                }
                _ => {}
            }
        }

        let consumed = end - start;
        let body_start = start + 1;
        let body_end = if closed { end - 1 } else { end };
        self.pos = end;

        Token::new(
            TokenKind::Comment,
            &self.input[body_start..body_end.max(body_start)],
            consumed,
        )
    }

    /// Reads a quoted string token, consuming through the closing quote.
    /// Backslash escapes are unescaped; an unterminated string runs to
    /// the end of the input.
    fn read_quoted_string(&mut self) -> Token {
        let start = self.pos;
        let mut value = String::new();
        let mut chars = self.remaining().char_indices().skip(1);
        let mut end = self.input.len();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '"' => {
                    end = self.pos + offset + 1;
                    break;
                }
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                _ => value.push(ch),
            }
        }

        let consumed = end - start;
        self.pos = end;

        Token::new(TokenKind::QuotedString, value, consumed)
    }

    /// Reads a bare string token up to the next whitespace or delimiter.
    fn read_string(&mut self) -> Token {
        let rest = self.remaining();
        let end = rest
            .char_indices()
            .find(|&(_, c)| c.is_whitespace() || STRING_TERMINATORS.contains(&c))
            .map_or(rest.len(), |(offset, _)| offset);

        let value = &rest[..end];
        self.pos += end;

        Token::new(TokenKind::String, value, end)
    }
}

/// Normalizes line endings, strips the header name prefix and leading
/// whitespace.
fn preprocess(text: &str) -> String {
    let mut cleaned = text.replace("\r\n", " ").replace(['\r', '\n'], " ");

    if let Some(prefix) = cleaned.get(..HEADER_NAME.len())
        && prefix.eq_ignore_ascii_case(HEADER_NAME)
    {
        cleaned.drain(..HEADER_NAME.len());
    }

    let trimmed_len = cleaned.trim_start().len();
    cleaned.drain(..cleaned.len() - trimmed_len);
    cleaned
}

/// Tokenizes a raw header string.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] if the input yields no tokens.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let cleaned = preprocess(text);

    let mut tokenizer = Tokenizer::new(&cleaned);
    let mut tokens = Vec::new();

    while let Some(token) = tokenizer.next_token() {
        tokens.push(token);
    }

    if tokens.is_empty() {
        return Err(Error::EmptyInput);
    }

    tracing::trace!(count = tokens.len(), "Tokenized header");

    Ok(tokens)
}
