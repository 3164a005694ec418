//! Lowering from the AST to the linear IL.
//!
//! Each expression node yields the virtual register holding its value;
//! statements yield nothing. Every instruction needed to compute a value is
//! appended to one shared list in evaluation order (left operand fully before
//! the right one). Identifiers resolve through the scope chain threaded
//! alongside the walk.

use rustc_hash::FxHashSet;

use crate::ast::Node;
use crate::error::{CompileError, CompileResult, InternalSnafu};
use crate::il::{ArithOp, IlInst, IlOp, VReg};
use crate::scope::{FrameId, LocalVar, ScopeArena};
use crate::tokenizer::{Span, Token};

/// Integer arguments passed in registers; nothing goes on the stack.
const MAX_ARGS: usize = 6;

/// Lower a translation unit into IL.
pub fn generate_il<'a>(root: &Node<'a>, source: &'a str) -> CompileResult<Vec<IlInst<'a>>> {
  let mut generator = IlGenerator::new(source);
  let frame = generator.scopes.enter_scope(None);
  generator.generate(root, frame)?;

  for inst in &generator.il {
    tracing::debug!("{inst}");
  }
  Ok(generator.il)
}

struct IlGenerator<'a> {
  source: &'a str,
  il: Vec<IlInst<'a>>,
  scopes: ScopeArena<'a>,
  /// Functions defined in the unit; the only globals an identifier may name.
  functions: FxHashSet<&'a str>,
  last_vreg: u32,
}

impl<'a> IlGenerator<'a> {
  fn new(source: &'a str) -> Self {
    Self {
      source,
      il: Vec::new(),
      scopes: ScopeArena::new(),
      functions: FxHashSet::default(),
      last_vreg: 0,
    }
  }

  fn fresh(&mut self) -> VReg {
    self.last_vreg += 1;
    VReg(self.last_vreg)
  }

  fn emit(&mut self, op: IlOp<'a>, origin: Span) {
    self.il.push(IlInst { op, origin });
  }

  fn error(&self, span: Span, message: impl Into<String>) -> CompileError {
    CompileError::semantic(self.source, span, message)
  }

  fn generate(&mut self, node: &Node<'a>, frame: FrameId) -> CompileResult<Option<VReg>> {
    match node {
      Node::List(items) => {
        for item in items {
          if let Node::FuncDef { declarator, .. } = item
            && let Some(name) = declarator.declared_name()
            && !self.functions.insert(name.text)
          {
            return Err(self.error(name.span(), format!("redefinition of '{}'", name.text)));
          }
        }
        for item in items {
          if matches!(item, Node::FuncDef { .. }) {
            self.generate(item, frame)?;
          }
        }
        Ok(None)
      }
      Node::FuncDef {
        declarator, body, ..
      } => {
        self.generate_func_def(declarator, body, frame)?;
        Ok(None)
      }
      Node::CompoundStmt(stmts) => {
        let block = self.scopes.enter_scope(Some(frame));
        for stmt in stmts {
          self.generate(stmt, block)?;
        }
        self.scopes.leave_scope(block);
        Ok(None)
      }
      Node::Decl { declarators, .. } => {
        for declarator in declarators {
          self.declare(frame, declarator)?;
        }
        Ok(None)
      }
      Node::ExprStmt(expr) => self.generate(expr, frame),
      Node::ReturnStmt { keyword, expr } => {
        let value = self.value(expr, frame)?;
        self.emit(IlOp::Return { value }, keyword.span());
        Ok(None)
      }
      Node::NumberLiteral(token) => {
        let value = token.value.ok_or_else(|| {
          InternalSnafu {
            message: format!("number token '{}' has no value", token.text),
          }
          .build()
        })?;
        let dst = self.fresh();
        self.emit(IlOp::LoadImm { dst, value }, token.span());
        Ok(Some(dst))
      }
      Node::Identifier(token) => self.generate_ident(*token, frame).map(Some),
      Node::BinaryOp { op, left, right } => self.generate_binary(*op, left, right, frame),
      Node::FuncDecl { .. }
      | Node::Declarator { .. }
      | Node::DirectDeclarator(_)
      | Node::Keyword(_) => Err(self.error(
        node.span(),
        format!("IL generation for {} is not implemented", node.tag()),
      )),
    }
  }

  /// Generate an expression that must produce a value.
  fn value(&mut self, node: &Node<'a>, frame: FrameId) -> CompileResult<VReg> {
    match self.generate(node, frame)? {
      Some(reg) => Ok(reg),
      None => InternalSnafu {
        message: format!("{} produced no value", node.tag()),
      }
      .fail(),
    }
  }

  fn generate_func_def(
    &mut self,
    declarator: &Node<'a>,
    body: &Node<'a>,
    frame: FrameId,
  ) -> CompileResult<()> {
    let Some(name) = declarator.declared_name() else {
      return InternalSnafu {
        message: "function definition without a name",
      }
      .fail();
    };

    if declarator.params().len() > MAX_ARGS {
      return Err(self.error(name.span(), "functions take at most 6 parameters"));
    }

    let func_frame = self.scopes.enter_scope(Some(frame));
    let mut params = Vec::new();
    for param in declarator.params() {
      let Node::Decl { declarators, .. } = param else {
        return InternalSnafu {
          message: format!("parameter is a {}", param.tag()),
        }
        .fail();
      };
      for declarator in declarators {
        params.push(self.declare(func_frame, declarator)?);
      }
    }

    self.emit(
      IlOp::FuncBegin {
        name: name.text,
        params,
      },
      name.span(),
    );
    self.generate(body, func_frame)?;
    self.emit(IlOp::FuncEnd { name: name.text }, name.span());
    self.scopes.leave_scope(func_frame);
    Ok(())
  }

  fn declare(&mut self, frame: FrameId, declarator: &Node<'a>) -> CompileResult<LocalVar> {
    let Some(name) = declarator.declared_name() else {
      return Err(self.error(declarator.span(), "declarator has no name"));
    };
    if self.scopes.declared_here(frame, name.text) {
      return Err(self.error(name.span(), format!("redeclaration of '{}'", name.text)));
    }
    Ok(self.scopes.declare(frame, name.text))
  }

  fn generate_ident(&mut self, token: &'a Token<'a>, frame: FrameId) -> CompileResult<VReg> {
    let dst = self.fresh();
    let op = match self.scopes.resolve(frame, token.text) {
      Some(var) => IlOp::ReadLocalVar { dst, var },
      None if self.functions.contains(token.text) => IlOp::LoadIdent {
        dst,
        name: token.text,
      },
      None => {
        return Err(self.error(
          token.span(),
          format!("undeclared identifier '{}'", token.text),
        ));
      }
    };
    self.emit(op, token.span());
    Ok(dst)
  }

  fn generate_binary(
    &mut self,
    op: &'a Token<'a>,
    left: &Node<'a>,
    right: &Node<'a>,
    frame: FrameId,
  ) -> CompileResult<Option<VReg>> {
    if let Some(arith) = ArithOp::from_punct(op.text) {
      let left = self.value(left, frame)?;
      let right = self.value(right, frame)?;
      let dst = self.fresh();
      self.emit(
        IlOp::Binary {
          op: arith,
          dst,
          left,
          right,
        },
        op.span(),
      );
      return Ok(Some(dst));
    }

    match op.text {
      "=" => {
        let Node::Identifier(ident) = left else {
          return Err(self.error(
            left.span(),
            "left operand of assignment should be an lvalue",
          ));
        };
        let Some(var) = self.scopes.resolve(frame, ident.text) else {
          return Err(self.error(
            ident.span(),
            format!("local variable '{}' not defined here", ident.text),
          ));
        };
        let src = self.value(right, frame)?;
        self.emit(IlOp::WriteLocalVar { src, var }, op.span());
        Ok(Some(src))
      }
      "," => {
        self.generate(left, frame)?;
        self.generate(right, frame)
      }
      "(" => self.generate_call(op, left, right, frame).map(Some),
      other => Err(self.error(
        op.span(),
        format!("not implemented binary operator '{other}'"),
      )),
    }
  }

  fn generate_call(
    &mut self,
    paren: &'a Token<'a>,
    callee: &Node<'a>,
    args: &Node<'a>,
    frame: FrameId,
  ) -> CompileResult<VReg> {
    let Node::Identifier(callee) = callee else {
      return Err(self.error(
        callee.span(),
        "calling non-labeled function is not implemented",
      ));
    };
    let Node::List(args) = args else {
      return InternalSnafu {
        message: format!("call arguments are a {}", args.tag()),
      }
      .fail();
    };

    if args.len() > MAX_ARGS {
      return Err(self.error(paren.span(), "calls take at most 6 arguments"));
    }

    let mut regs = Vec::with_capacity(args.len());
    for arg in args {
      regs.push(self.value(arg, frame)?);
    }
    let dst = self.fresh();
    self.emit(
      IlOp::Call {
        dst,
        callee: callee.text,
        args: regs,
      },
      paren.span(),
    );
    Ok(dst)
  }
}
