//! Syntax tree produced by the parser.
//!
//! Leaves borrow their token from the token vector, so a tree never outlives
//! the tokens (and source) it was built from. Call expressions reuse
//! `BinaryOp` with the `(` token as operator, the callee on the left and a
//! `List` of arguments on the right.

use std::fmt;

use crate::tokenizer::{Span, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<'a> {
  NumberLiteral(&'a Token<'a>),
  Identifier(&'a Token<'a>),
  BinaryOp {
    op: &'a Token<'a>,
    left: Box<Node<'a>>,
    right: Box<Node<'a>>,
  },
  ExprStmt(Box<Node<'a>>),
  ReturnStmt {
    keyword: &'a Token<'a>,
    expr: Box<Node<'a>>,
  },
  CompoundStmt(Vec<Node<'a>>),
  Decl {
    specifiers: Vec<Node<'a>>,
    declarators: Vec<Node<'a>>,
  },
  FuncDef {
    specifiers: Vec<Node<'a>>,
    declarator: Box<Node<'a>>,
    body: Box<Node<'a>>,
  },
  /// Function suffix of a declarator: `declarator ( args )`.
  FuncDecl {
    declarator: Box<Node<'a>>,
    args: Vec<Node<'a>>,
  },
  /// Leading `*`s in front of a direct declarator.
  Declarator {
    pointers: Vec<&'a Token<'a>>,
    direct: Box<Node<'a>>,
  },
  DirectDeclarator(&'a Token<'a>),
  /// A declaration specifier such as `int`.
  Keyword(&'a Token<'a>),
  List(Vec<Node<'a>>),
}

impl<'a> Node<'a> {
  pub fn binary(op: &'a Token<'a>, left: Node<'a>, right: Node<'a>) -> Self {
    Self::BinaryOp {
      op,
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  /// Variant name, used by "not implemented" diagnostics.
  pub fn tag(&self) -> &'static str {
    match self {
      Self::NumberLiteral(_) => "NumberLiteral",
      Self::Identifier(_) => "Identifier",
      Self::BinaryOp { .. } => "BinaryOp",
      Self::ExprStmt(_) => "ExprStmt",
      Self::ReturnStmt { .. } => "ReturnStmt",
      Self::CompoundStmt(_) => "CompoundStmt",
      Self::Decl { .. } => "Decl",
      Self::FuncDef { .. } => "FuncDef",
      Self::FuncDecl { .. } => "FuncDecl",
      Self::Declarator { .. } => "Declarator",
      Self::DirectDeclarator(_) => "DirectDeclarator",
      Self::Keyword(_) => "Keyword",
      Self::List(_) => "List",
    }
  }

  /// The token a diagnostic about this node should underline, if any.
  pub fn anchor(&self) -> Option<&'a Token<'a>> {
    match self {
      Self::NumberLiteral(token)
      | Self::Identifier(token)
      | Self::DirectDeclarator(token)
      | Self::Keyword(token) => Some(*token),
      Self::BinaryOp { op, .. } => Some(*op),
      Self::ReturnStmt { keyword, .. } => Some(*keyword),
      Self::ExprStmt(expr) => expr.anchor(),
      Self::FuncDef { declarator, .. } => declarator.anchor(),
      Self::FuncDecl { declarator, .. } => declarator.anchor(),
      Self::Declarator { pointers, direct } => direct.anchor().or(pointers.first().copied()),
      Self::Decl { declarators, .. } => declarators.first().and_then(Node::anchor),
      Self::CompoundStmt(nodes) | Self::List(nodes) => nodes.first().and_then(Node::anchor),
    }
  }

  pub fn span(&self) -> Span {
    self.anchor().map(Token::span).unwrap_or_default()
  }

  /// Name introduced by a declarator, looking through pointer and function
  /// wrappers.
  pub fn declared_name(&self) -> Option<&'a Token<'a>> {
    match self {
      Self::DirectDeclarator(ident) => Some(*ident),
      Self::Declarator { direct, .. } => direct.declared_name(),
      Self::FuncDecl { declarator, .. } => declarator.declared_name(),
      _ => None,
    }
  }

  /// Parameter declarations of a function declarator, empty otherwise.
  pub fn params(&self) -> &[Node<'a>] {
    match self {
      Self::Declarator { direct, .. } => direct.params(),
      Self::FuncDecl { args, .. } => args,
      _ => &[],
    }
  }
}

/// S-expression rendering, used for debug logging and tests.
impl fmt::Display for Node<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn list(f: &mut fmt::Formatter<'_>, name: &str, nodes: &[Node<'_>]) -> fmt::Result {
      write!(f, "({name}")?;
      for node in nodes {
        write!(f, " {node}")?;
      }
      write!(f, ")")
    }

    match self {
      Self::NumberLiteral(token)
      | Self::Identifier(token)
      | Self::Keyword(token)
      | Self::DirectDeclarator(token) => write!(f, "{token}"),
      Self::BinaryOp { op, left, right } => write!(f, "({op} {left} {right})"),
      Self::ExprStmt(expr) => write!(f, "(expr {expr})"),
      Self::ReturnStmt { expr, .. } => write!(f, "(return {expr})"),
      Self::CompoundStmt(stmts) => list(f, "block", stmts),
      Self::Decl { declarators, .. } => list(f, "var", declarators),
      Self::FuncDef {
        declarator, body, ..
      } => write!(f, "(func {declarator} {body})"),
      Self::FuncDecl { declarator, args } => {
        write!(f, "{declarator}")?;
        list(f, "params", args)
      }
      Self::Declarator { pointers, direct } => {
        write!(f, "{}{direct}", "*".repeat(pointers.len()))
      }
      Self::List(nodes) => list(f, "list", nodes),
    }
  }
}
