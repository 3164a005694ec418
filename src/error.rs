//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure is fatal: stages return a `CompileError` and `?` carries it
//! straight up to `main`. Token-anchored diagnostics render the offending
//! source line with a caret underline spanning the exact token, in the
//! style of chibicc.

use std::fmt;

use snafu::{Location, Snafu};

use crate::tokenizer::Span;

pub type CompileResult<T> = Result<T, CompileError>;

pub const USAGE: &str = "usage: rilc [--target_os Linux|Darwin] [--program] <source>";

/// The source line holding a token plus a caret marker underneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
  line: String,
  marker: String,
}

impl Snippet {
  pub fn new(source: &str, span: Span) -> Self {
    let loc = span.loc.min(source.len());
    let line_start = source[..loc].rfind('\n').map_or(0, |pos| pos + 1);
    let line_end = source[loc..]
      .find('\n')
      .map_or(source.len(), |pos| loc + pos);

    // Control characters would shift the caret, so they print as blanks.
    let line = source[line_start..line_end]
      .chars()
      .map(|c| if c <= ' ' { ' ' } else { c })
      .collect();
    let lead = source[line_start..loc].chars().count();
    let width = source[loc..(loc + span.len).min(source.len())]
      .chars()
      .count()
      .max(1);
    let marker = format!("{}{}", " ".repeat(lead), "^".repeat(width));
    Self { line, marker }
  }
}

impl fmt::Display for Snippet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}\n{}", self.line, self.marker)
  }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  /// Bad command-line invocation; nothing was compiled.
  #[snafu(display("error: {message}\n{}", USAGE))]
  Usage { message: String },

  #[snafu(display("{snippet}\nerror: {message}"))]
  Lex { snippet: Snippet, message: String },

  #[snafu(display("{snippet}\nerror: {message}"))]
  Syntax { snippet: Snippet, message: String },

  #[snafu(display("{snippet}\nerror: {message}"))]
  Semantic { snippet: Snippet, message: String },

  /// The physical register pool ran dry. There is no spilling.
  #[snafu(display("{snippet}\nerror: no more registers"))]
  Resource { snippet: Snippet },

  /// A broken compiler invariant, never a problem with the input.
  #[snafu(display("internal error: {message} at {location}"))]
  Internal {
    message: String,
    #[snafu(implicit)]
    location: Location,
  },
}

impl CompileError {
  pub fn lex(source: &str, span: Span, message: impl Into<String>) -> Self {
    Self::Lex {
      snippet: Snippet::new(source, span),
      message: message.into(),
    }
  }

  pub fn syntax(source: &str, span: Span, message: impl Into<String>) -> Self {
    Self::Syntax {
      snippet: Snippet::new(source, span),
      message: message.into(),
    }
  }

  pub fn semantic(source: &str, span: Span, message: impl Into<String>) -> Self {
    Self::Semantic {
      snippet: Snippet::new(source, span),
      message: message.into(),
    }
  }

  pub fn resource(source: &str, span: Span) -> Self {
    Self::Resource {
      snippet: Snippet::new(source, span),
    }
  }

  /// The bare message, without the rendered source line.
  pub fn message(&self) -> &str {
    match self {
      Self::Usage { message }
      | Self::Lex { message, .. }
      | Self::Syntax { message, .. }
      | Self::Semantic { message, .. }
      | Self::Internal { message, .. } => message,
      Self::Resource { .. } => "no more registers",
    }
  }

  pub fn snippet(&self) -> Option<&Snippet> {
    match self {
      Self::Lex { snippet, .. }
      | Self::Syntax { snippet, .. }
      | Self::Semantic { snippet, .. }
      | Self::Resource { snippet } => Some(snippet),
      Self::Usage { .. } | Self::Internal { .. } => None,
    }
  }
}
