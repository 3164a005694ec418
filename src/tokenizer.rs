//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about semantics beyond recognising literals,
//! identifiers and punctuators. Keywords are ordinary identifiers that the
//! parser checks by text. Multi-character punctuators are matched before
//! single-character ones to avoid ambiguity.

use std::fmt;

use crate::error::{CompileError, CompileResult};

/// Radix of an integer literal, decided by its first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberBase {
  Decimal,
  Octal,
}

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Number(NumberBase),
  Identifier,
  StringLiteral,
  CharLiteral,
  Punctuator,
}

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
  pub loc: usize,
  pub len: usize,
}

/// One lexeme, borrowing its text from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
  pub kind: TokenKind,
  pub loc: usize,
  pub text: &'a str,
  pub value: Option<i64>,
}

impl<'a> Token<'a> {
  pub fn new(kind: TokenKind, loc: usize, text: &'a str, value: Option<i64>) -> Self {
    Self {
      kind,
      loc,
      text,
      value,
    }
  }

  pub fn span(&self) -> Span {
    Span {
      loc: self.loc,
      len: self.text.len(),
    }
  }

  pub fn is_punct(&self, op: &str) -> bool {
    self.kind == TokenKind::Punctuator && self.text == op
  }

  pub fn is_keyword(&self, keyword: &str) -> bool {
    self.kind == TokenKind::Identifier && self.text == keyword
  }
}

impl fmt::Display for Token<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.text)
  }
}

const PUNCTUATORS: [&str; 14] = [
  "<<", ">>", "+", "-", "*", "/", "%", "(", ")", "{", "}", ",", ";", "=",
];

/// Lex the whole input into a flat vector of tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token<'_>>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      let (base, radix) = if c == b'0' {
        (NumberBase::Octal, 8)
      } else {
        (NumberBase::Decimal, 10)
      };
      i += 1;
      while i < bytes.len() && (bytes[i] as char).is_digit(radix) {
        i += 1;
      }
      let text = &input[start..i];
      let value = i64::from_str_radix(text, radix).map_err(|err| {
        CompileError::lex(
          input,
          Span {
            loc: start,
            len: i - start,
          },
          format!("invalid number: {err}"),
        )
      })?;
      tokens.push(Token::new(TokenKind::Number(base), start, text, Some(value)));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      tokens.push(Token::new(
        TokenKind::Identifier,
        start,
        &input[start..i],
        None,
      ));
      continue;
    }

    if c == b'"' || c == b'\'' {
      let start = i;
      i = scan_quoted(input, start)?;
      let kind = if c == b'"' {
        TokenKind::StringLiteral
      } else {
        TokenKind::CharLiteral
      };
      tokens.push(Token::new(kind, start, &input[start..i], None));
      continue;
    }

    if let Some(op) = PUNCTUATORS
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(
        TokenKind::Punctuator,
        i,
        &input[i..i + op.len()],
        None,
      ));
      i += op.len();
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::lex(
      input,
      Span {
        loc: i,
        len: invalid_char.len_utf8(),
      },
      format!("unexpected char '{invalid_char}'"),
    ));
  }

  tracing::debug!(count = tokens.len(), "tokenized input");
  Ok(tokens)
}

/// Find the end of a string or char literal opening at `start`, honouring
/// backslash escapes. Returns the offset just past the closing quote.
fn scan_quoted(input: &str, start: usize) -> CompileResult<usize> {
  let bytes = input.as_bytes();
  let quote = bytes[start];
  let mut i = start + 1;
  while i < bytes.len() && bytes[i] != b'\n' {
    match bytes[i] {
      b'\\' => i += 2,
      q if q == quote => return Ok(i + 1),
      _ => i += 1,
    }
  }
  Err(CompileError::lex(
    input,
    Span { loc: start, len: 1 },
    "unterminated literal",
  ))
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>) -> String {
  match token {
    Some(t) => t.text.to_string(),
    None => "EOF".to_string(),
  }
}
