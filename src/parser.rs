//! Recursive-descent parser producing the AST.
//!
//! The parser mirrors the classic chibicc structure: a precedence-climbing
//! set of helpers, one per binary tier, over a cursor that never rewinds.
//! Every level returns `Ok(None)` when the input does not start a construct
//! of that level, which lets callers tell "nothing here" apart from a hard
//! syntax error.

use crate::ast::Node;
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Span, Token, TokenKind, describe_token};

type ParseResult<'a> = CompileResult<Option<Node<'a>>>;

const KEYWORDS: [&str; 2] = ["int", "return"];

/// Parentheses, blocks and `=` chains deeper than this are rejected
/// before the recursion can exhaust the stack.
const MAX_NESTING: usize = 128;

/// Parse a single expression; trailing tokens are rejected.
pub fn parse_expression<'a>(tokens: &'a [Token<'a>], source: &'a str) -> CompileResult<Node<'a>> {
  let mut stream = TokenStream::new(tokens, source);

  let node = parse_shift(&mut stream)?;
  if let Some(token) = stream.peek() {
    return Err(stream.error_at(token, "unexpected token"));
  }
  let node = node.ok_or_else(|| stream.error_here("expected an expression"))?;

  tracing::debug!(ast = %node, "parsed expression");
  Ok(node)
}

/// Parse a translation unit: function definitions plus top-level
/// declarations such as globals and prototypes.
pub fn parse_translation_unit<'a>(
  tokens: &'a [Token<'a>],
  source: &'a str,
) -> CompileResult<Node<'a>> {
  let mut stream = TokenStream::new(tokens, source);

  let mut items = Vec::new();
  while !stream.is_eof() {
    items.push(parse_external_declaration(&mut stream)?);
  }

  let unit = Node::List(items);
  tracing::debug!(ast = %unit, "parsed translation unit");
  Ok(unit)
}

// external-decl := specifiers declarator ( compound | ("," declarator)* ";" )
fn parse_external_declaration<'a>(stream: &mut TokenStream<'a>) -> CompileResult<Node<'a>> {
  let specifiers = parse_specifiers(stream)?;
  let declarator = parse_declarator(stream)?;

  if stream.peek().is_some_and(|t| t.is_punct("{")) {
    let is_function = matches!(
      &declarator,
      Node::Declarator { direct, .. } if matches!(**direct, Node::FuncDecl { .. })
    );
    if !is_function {
      return Err(stream.error_here("expected a function definition"));
    }
    let body = parse_compound_stmt(stream)?;
    return Ok(Node::FuncDef {
      specifiers,
      declarator: Box::new(declarator),
      body: Box::new(body),
    });
  }

  parse_declarator_list(stream, specifiers, declarator)
}

/// One or more type keywords; at least one is required.
fn parse_specifiers<'a>(stream: &mut TokenStream<'a>) -> CompileResult<Vec<Node<'a>>> {
  let mut specifiers = Vec::new();
  while let Some(token) = stream.keyword("int") {
    specifiers.push(Node::Keyword(token));
  }
  if specifiers.is_empty() {
    let got = describe_token(stream.peek());
    return Err(stream.error_here(format!("expected a type specifier, but got \"{got}\"")));
  }
  Ok(specifiers)
}

// declarator := "*"* ident ( "(" params? ")" )?
fn parse_declarator<'a>(stream: &mut TokenStream<'a>) -> CompileResult<Node<'a>> {
  let mut pointers = Vec::new();
  while let Some(star) = stream.equal("*") {
    pointers.push(star);
  }

  let mut direct = Node::DirectDeclarator(stream.get_ident()?);
  if stream.equal("(").is_some() {
    let mut args = Vec::new();
    if stream.equal(")").is_none() {
      loop {
        let specifiers = parse_specifiers(stream)?;
        let declarator = parse_declarator(stream)?;
        args.push(Node::Decl {
          specifiers,
          declarators: vec![declarator],
        });
        if stream.equal(",").is_none() {
          stream.skip(")")?;
          break;
        }
      }
    }
    direct = Node::FuncDecl {
      declarator: Box::new(direct),
      args,
    };
  }

  Ok(Node::Declarator {
    pointers,
    direct: Box::new(direct),
  })
}

fn parse_compound_stmt<'a>(stream: &mut TokenStream<'a>) -> CompileResult<Node<'a>> {
  let open = stream.skip("{")?;
  stream.enter(open)?;
  let mut stmts = Vec::new();
  while stream.equal("}").is_none() {
    if stream.is_eof() {
      return Err(stream.error_here("expected \"}\", but got \"EOF\""));
    }
    let stmt = if stream.peek().is_some_and(|t| t.is_keyword("int")) {
      parse_declaration(stream)?
    } else {
      parse_stmt(stream)?
    };
    stmts.push(stmt);
  }
  stream.leave();
  Ok(Node::CompoundStmt(stmts))
}

fn parse_declaration<'a>(stream: &mut TokenStream<'a>) -> CompileResult<Node<'a>> {
  let specifiers = parse_specifiers(stream)?;
  let first = parse_declarator(stream)?;
  parse_declarator_list(stream, specifiers, first)
}

/// The rest of a declaration once its first declarator is parsed.
fn parse_declarator_list<'a>(
  stream: &mut TokenStream<'a>,
  specifiers: Vec<Node<'a>>,
  first: Node<'a>,
) -> CompileResult<Node<'a>> {
  let mut declarators = vec![first];
  while stream.equal(",").is_some() {
    declarators.push(parse_declarator(stream)?);
  }
  stream.skip(";")?;
  Ok(Node::Decl {
    specifiers,
    declarators,
  })
}

fn parse_stmt<'a>(stream: &mut TokenStream<'a>) -> CompileResult<Node<'a>> {
  if stream.peek().is_some_and(|t| t.is_punct("{")) {
    return parse_compound_stmt(stream);
  }

  if let Some(keyword) = stream.keyword("return") {
    let expr = parse_expr(stream)?.ok_or_else(|| stream.error_here("expected an expression"))?;
    stream.skip(";")?;
    return Ok(Node::ReturnStmt {
      keyword,
      expr: Box::new(expr),
    });
  }

  let Some(expr) = parse_expr(stream)? else {
    let got = describe_token(stream.peek());
    return Err(stream.error_here(format!("unexpected token \"{got}\"")));
  };
  stream.skip(";")?;
  Ok(Node::ExprStmt(Box::new(expr)))
}

// expression := assign ("," assign)*
fn parse_expr<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  parse_binary_level(stream, &[","], parse_assign)
}

// assign := shift ("=" assign)?
fn parse_assign<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  let Some(node) = parse_shift(stream)? else {
    return Ok(None);
  };

  if let Some(op) = stream.equal("=") {
    stream.enter(op)?;
    let Some(rhs) = parse_assign(stream)? else {
      return Err(stream.error_at(op, "expected expression after binary operator"));
    };
    stream.leave();
    return Ok(Some(Node::binary(op, node, rhs)));
  }

  Ok(Some(node))
}

fn parse_shift<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  parse_binary_level(stream, &["<<", ">>"], parse_add)
}

fn parse_add<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  parse_binary_level(stream, &["+", "-"], parse_mul)
}

fn parse_mul<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  parse_binary_level(stream, &["*", "/", "%"], parse_postfix)
}

/// One left-associative precedence tier: `operand (op operand)*`.
fn parse_binary_level<'a>(
  stream: &mut TokenStream<'a>,
  ops: &[&str],
  operand: fn(&mut TokenStream<'a>) -> ParseResult<'a>,
) -> ParseResult<'a> {
  let Some(mut node) = operand(stream)? else {
    return Ok(None);
  };

  while let Some(op) = ops.iter().find_map(|op| stream.equal(op)) {
    let Some(rhs) = operand(stream)? else {
      return Err(stream.error_at(op, "expected expression after binary operator"));
    };
    node = Node::binary(op, node, rhs);
  }

  Ok(Some(node))
}

// postfix := primary ("(" (assign ("," assign)*)? ")")*
fn parse_postfix<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  let Some(mut node) = parse_primary(stream)? else {
    return Ok(None);
  };

  while let Some(paren) = stream.equal("(") {
    let mut args = Vec::new();
    if stream.equal(")").is_none() {
      loop {
        let arg =
          parse_assign(stream)?.ok_or_else(|| stream.error_here("expected an expression"))?;
        args.push(arg);
        if stream.equal(",").is_none() {
          stream.skip(")")?;
          break;
        }
      }
    }
    node = Node::binary(paren, node, Node::List(args));
  }

  Ok(Some(node))
}

fn parse_primary<'a>(stream: &mut TokenStream<'a>) -> ParseResult<'a> {
  if let Some(open) = stream.equal("(") {
    stream.enter(open)?;
    let Some(node) = parse_expr(stream)? else {
      return Err(stream.error_at(open, "expected an expression after \"(\""));
    };
    stream.skip(")")?;
    stream.leave();
    return Ok(Some(node));
  }

  let Some(token) = stream.peek() else {
    return Ok(None);
  };
  let node = match token.kind {
    TokenKind::Number(_) => Node::NumberLiteral(token),
    TokenKind::Identifier if !KEYWORDS.contains(&token.text) => Node::Identifier(token),
    _ => return Ok(None),
  };
  stream.pos += 1;
  Ok(Some(node))
}

/// Lightweight cursor over the token slice.
struct TokenStream<'a> {
  tokens: &'a [Token<'a>],
  source: &'a str,
  pos: usize,
  depth: usize,
}

impl<'a> TokenStream<'a> {
  fn new(tokens: &'a [Token<'a>], source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      depth: 0,
    }
  }

  fn peek(&self) -> Option<&'a Token<'a>> {
    self.tokens.get(self.pos)
  }

  /// Consume the current token if it is the given punctuator.
  fn equal(&mut self, op: &str) -> Option<&'a Token<'a>> {
    let token = self.peek().filter(|token| token.is_punct(op))?;
    self.pos += 1;
    Some(token)
  }

  /// Consume the current token if it is the given keyword.
  fn keyword(&mut self, keyword: &str) -> Option<&'a Token<'a>> {
    let token = self.peek().filter(|token| token.is_keyword(keyword))?;
    self.pos += 1;
    Some(token)
  }

  fn skip(&mut self, s: &str) -> CompileResult<&'a Token<'a>> {
    if let Some(token) = self.equal(s) {
      return Ok(token);
    }
    let got = describe_token(self.peek());
    Err(self.error_here(format!("expected \"{s}\", but got \"{got}\"")))
  }

  fn get_ident(&mut self) -> CompileResult<&'a Token<'a>> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Identifier
      && !KEYWORDS.contains(&token.text)
    {
      self.pos += 1;
      return Ok(token);
    }
    let got = describe_token(self.peek());
    Err(self.error_here(format!("expected an identifier, but got \"{got}\"")))
  }

  /// Step one level deeper into a construct opened by `token`.
  fn enter(&mut self, token: &Token) -> CompileResult<()> {
    self.depth += 1;
    if self.depth > MAX_NESTING {
      return Err(self.error_at(token, "nesting too deep"));
    }
    Ok(())
  }

  fn leave(&mut self) {
    self.depth -= 1;
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }

  fn error_at(&self, token: &Token, message: impl Into<String>) -> CompileError {
    CompileError::syntax(self.source, token.span(), message)
  }

  /// Error anchored at the current token, or at the end of input.
  fn error_here(&self, message: impl Into<String>) -> CompileError {
    let span = self.peek().map_or(
      Span {
        loc: self.source.len(),
        len: 0,
      },
      Token::span,
    );
    CompileError::syntax(self.source, span, message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;
  use pretty_assertions::assert_eq;

  fn expr(source: &str) -> String {
    let tokens = tokenize(source).unwrap();
    parse_expression(&tokens, source).unwrap().to_string()
  }

  fn expr_err(source: &str) -> CompileError {
    let tokens = tokenize(source).unwrap();
    parse_expression(&tokens, source).unwrap_err()
  }

  fn unit(source: &str) -> String {
    let tokens = tokenize(source).unwrap();
    parse_translation_unit(&tokens, source).unwrap().to_string()
  }

  fn unit_err(source: &str) -> CompileError {
    let tokens = tokenize(source).unwrap();
    parse_translation_unit(&tokens, source).unwrap_err()
  }

  #[test]
  fn single_literal() {
    assert_eq!(expr("42"), "42");
  }

  #[test]
  fn subtraction_is_left_associative() {
    assert_eq!(expr("8-4-2"), "(- (- 8 4) 2)");
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    assert_eq!(expr("2+3*4"), "(+ 2 (* 3 4))");
    assert_eq!(expr("2*3+4"), "(+ (* 2 3) 4)");
  }

  #[test]
  fn shift_binds_looser_than_addition() {
    assert_eq!(expr("2<<1+1"), "(<< 2 (+ 1 1))");
    assert_eq!(expr("64>>1>>2"), "(>> (>> 64 1) 2)");
  }

  #[test]
  fn parentheses_override_precedence() {
    assert_eq!(expr("(2+3)*4"), "(* (+ 2 3) 4)");
  }

  #[test]
  fn trailing_operator_names_the_operator() {
    let err = expr_err("2+");
    assert!(matches!(err, CompileError::Syntax { .. }));
    assert_eq!(err.message(), "expected expression after binary operator");
    assert_eq!(err.to_string(), "2+\n ^\nerror: expected expression after binary operator");
  }

  #[test]
  fn two_literals_is_an_unexpected_token() {
    let err = expr_err("2 3");
    assert_eq!(err.message(), "unexpected token");
    assert_eq!(err.to_string(), "2 3\n  ^\nerror: unexpected token");
  }

  #[test]
  fn empty_input_expects_an_expression() {
    assert_eq!(expr_err("").message(), "expected an expression");
  }

  #[test]
  fn leading_operator_is_unexpected() {
    assert_eq!(expr_err("*2").message(), "unexpected token");
  }

  #[test]
  fn unclosed_paren_is_reported() {
    assert_eq!(expr_err("(1+2").message(), "expected \")\", but got \"EOF\"");
  }

  #[test]
  fn function_with_locals_and_return() {
    assert_eq!(
      unit("int main() { int a, b; a = 1; return a + 2; }"),
      "(list (func main(params) (block (var a b) (expr (= a 1)) (return (+ a 2)))))"
    );
  }

  #[test]
  fn assignment_is_right_associative_and_comma_is_lowest() {
    assert_eq!(
      unit("int f() { a = b = 1, 2; }"),
      "(list (func f(params) (block (expr (, (= a (= b 1)) 2)))))"
    );
  }

  #[test]
  fn calls_with_arguments_and_parameters() {
    assert_eq!(
      unit("int add(int x, int y) { return x + y; } int main() { return add(1, 2*3); }"),
      "(list (func add(params (var x) (var y)) (block (return (+ x y)))) \
       (func main(params) (block (return (( add (list 1 (* 2 3)))))))"
    );
  }

  #[test]
  fn nested_blocks_parse() {
    assert_eq!(
      unit("int main() { int a; { int a; a = 2; } return a; }"),
      "(list (func main(params) (block (var a) (block (var a) (expr (= a 2))) (return a))))"
    );
  }

  #[test]
  fn missing_semicolon_is_reported() {
    let err = unit_err("int main() { return 1 }");
    assert_eq!(err.message(), "expected \";\", but got \"}\"");
  }

  #[test]
  fn unclosed_body_is_reported() {
    let err = unit_err("int main() { return 1;");
    assert_eq!(err.message(), "expected \"}\", but got \"EOF\"");
  }

  #[test]
  fn globals_and_prototypes_are_declarations() {
    assert_eq!(
      unit("int g, h; int f(int x); int main() { return 0; }"),
      "(list (var g h) (var f(params (var x))) (func main(params) (block (return 0))))"
    );
  }

  #[test]
  fn variable_with_a_body_is_rejected() {
    let err = unit_err("int a { return 0; }");
    assert_eq!(err.message(), "expected a function definition");
  }

  #[test]
  fn unterminated_global_is_reported() {
    let err = unit_err("int g int main() { return 0; }");
    assert_eq!(err.message(), "expected \";\", but got \"int\"");
  }

  #[test]
  fn deep_parentheses_are_a_syntax_error() {
    let source = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
    let err = expr_err(&source);
    assert!(matches!(err, CompileError::Syntax { .. }));
    assert_eq!(err.message(), "nesting too deep");
  }

  #[test]
  fn nesting_below_the_limit_parses() {
    let source = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
    assert_eq!(expr(&source), "1");
  }

  #[test]
  fn deep_blocks_are_a_syntax_error() {
    let source = format!("int main() {}{}", "{".repeat(100_000), "}".repeat(100_000));
    assert_eq!(unit_err(&source).message(), "nesting too deep");
  }

  #[test]
  fn long_assignment_chains_are_a_syntax_error() {
    let source = format!("int main() {{ {}1; }}", "a=".repeat(100_000));
    assert_eq!(unit_err(&source).message(), "nesting too deep");
  }

  #[test]
  fn keyword_cannot_be_a_variable_name() {
    let err = unit_err("int main() { int return; }");
    assert_eq!(err.message(), "expected an identifier, but got \"return\"");
  }
}
