//! Direct AST-to-assembly path for a single expression.
//!
//! Every subtree gets a register: a literal allocates one, a binary node
//! reuses its left operand's register for the result and frees the right
//! one. At most one register per nesting level is live at a time.

use super::Emitter;
use crate::ast::Node;
use crate::config::TargetOs;
use crate::error::{CompileError, CompileResult, InternalSnafu};
use crate::il::ArithOp;
use crate::regalloc::PhysReg;

/// Emit a `main` that evaluates `node` and returns its value.
pub fn generate_expression(node: &Node, source: &str, target: TargetOs) -> CompileResult<String> {
  let mut emitter = Emitter::new(source, target);
  emitter.function_label("main");

  let reg = emit_expr(&mut emitter, node)?;
  emitter.ins(format!("mov rax, {reg}"));
  emitter.ins("ret");
  emitter.pool.free(reg)?;

  Ok(emitter.finish())
}

fn emit_expr(emitter: &mut Emitter, node: &Node) -> CompileResult<PhysReg> {
  match node {
    Node::NumberLiteral(token) => {
      let Some(value) = token.value else {
        return InternalSnafu {
          message: format!("number token '{}' has no value", token.text),
        }
        .fail();
      };
      let reg = emitter.alloc(token.span())?;
      emitter.ins(format!("mov {reg}, {value}"));
      Ok(reg)
    }
    Node::BinaryOp { op, left, right } => {
      let Some(arith) = ArithOp::from_punct(op.text) else {
        return Err(not_implemented(emitter, node));
      };
      let dst = emit_expr(emitter, left)?;
      let rhs = emit_expr(emitter, right)?;
      emitter.arith(arith, dst, rhs);
      emitter.pool.free(rhs)?;
      Ok(dst)
    }
    Node::Identifier(_)
    | Node::ExprStmt(_)
    | Node::ReturnStmt { .. }
    | Node::CompoundStmt(_)
    | Node::Decl { .. }
    | Node::FuncDef { .. }
    | Node::FuncDecl { .. }
    | Node::Declarator { .. }
    | Node::DirectDeclarator(_)
    | Node::Keyword(_)
    | Node::List(_) => Err(not_implemented(emitter, node)),
  }
}

fn not_implemented(emitter: &Emitter, node: &Node) -> CompileError {
  CompileError::semantic(
    emitter.source,
    node.span(),
    format!("Generate: {} is not implemented", describe(node)),
  )
}

fn describe(node: &Node) -> String {
  match node {
    Node::BinaryOp { op, .. } if op.text == "(" => "function call".to_string(),
    Node::BinaryOp { op, .. } => format!("operator '{}'", op.text),
    _ => node.tag().to_string(),
  }
}
