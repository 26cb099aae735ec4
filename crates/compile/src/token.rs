//! The byte tokenizer for the S-expression surface syntax.

use crate::error::{Error, Result};

/// A single token of the surface syntax.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Token<'src> {
    /// An opening parenthesis.
    Open,
    /// A closing parenthesis.
    Close,
    /// An identifier, form head, operator, or type name, borrowed from the
    /// source text.
    Symbol(&'src str),
    /// An integer literal, decimal or `0x`-hexadecimal.
    Int(i64),
    /// A float literal; any numeric literal containing a `.`.
    Float(f64),
}

/// Produces [`Token`]s from source text on demand, with one token of
/// lookahead for the parser.
#[derive(Debug)]
pub(crate) struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    peeked: Option<Token<'src>>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
        }
    }

    /// Consumes and returns the next token, or `None` at end of input.
    pub(crate) fn next(&mut self) -> Result<Option<Token<'src>>> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.scan(),
        }
    }

    /// Returns the next token without consuming it.
    pub(crate) fn peek(&mut self) -> Result<Option<Token<'src>>> {
        if self.peeked.is_none() {
            self.peeked = self.scan()?;
        }
        Ok(self.peeked)
    }

    fn scan(&mut self) -> Result<Option<Token<'src>>> {
        self.skip_trivia();

        let bytes = self.src.as_bytes();
        let Some(&first) = bytes.get(self.pos) else {
            return Ok(None);
        };

        match first {
            b'(' => {
                self.pos += 1;
                Ok(Some(Token::Open))
            }
            b')' => {
                self.pos += 1;
                Ok(Some(Token::Close))
            }
            b'0'..=b'9' => self.number().map(Some),
            // A leading `-` introduces a negative numeric literal only when a
            // digit follows; otherwise it is an operator symbol.
            b'-' if matches!(bytes.get(self.pos + 1), Some(b'0'..=b'9')) => self.number().map(Some),
            _ => Ok(Some(Token::Symbol(self.word()))),
        }
    }

    /// Skips whitespace and `;` comments, which run to end of line.
    fn skip_trivia(&mut self) {
        let bytes = self.src.as_bytes();
        while let Some(&byte) = bytes.get(self.pos) {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b';' => {
                    while !matches!(bytes.get(self.pos), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Consumes a maximal run of bytes up to the next delimiter. Multi-byte
    /// characters never match a delimiter, so the boundaries stay valid.
    fn word(&mut self) -> &'src str {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while let Some(&byte) = bytes.get(self.pos) {
            if matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b';') {
                break;
            }
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn number(&mut self) -> Result<Token<'src>> {
        let text = self.word();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            let magnitude = u64::from_str_radix(hex, 16).map_err(|e| match e.kind() {
                std::num::IntErrorKind::PosOverflow => Error::Overflow,
                _ => Error::Syntax,
            })?;
            let value = if negative {
                if magnitude > i64::MIN.unsigned_abs() {
                    return Err(Error::Overflow);
                }
                (magnitude as i64).wrapping_neg()
            } else {
                i64::try_from(magnitude).map_err(|_| Error::Overflow)?
            };
            Ok(Token::Int(value))
        } else if digits.contains('.') {
            let value = text.parse::<f64>().map_err(|_| Error::Syntax)?;
            Ok(Token::Float(value))
        } else {
            let value = text.parse::<i64>().map_err(|e| match e.kind() {
                std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
                    Error::Overflow
                }
                _ => Error::Syntax,
            })?;
            Ok(Token::Int(value))
        }
    }
}
