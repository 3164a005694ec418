//! Code generation: lower expressions or IL into Intel-syntax x86-64.
//!
//! Values live in the four scratch registers of `RegisterPool`. Both paths
//! share the per-operator instruction sequences below; they differ only in
//! where operand registers come from. Output is buffered and only handed
//! back once the whole input compiled.

mod expr;
mod il;

pub use expr::generate_expression;
pub use il::generate_program;

use crate::config::TargetOs;
use crate::error::{CompileError, CompileResult};
use crate::il::ArithOp;
use crate::regalloc::{PhysReg, RegisterPool};
use crate::tokenizer::Span;

/// Assembly text under construction plus the register state behind it.
struct Emitter<'a> {
  source: &'a str,
  target: TargetOs,
  asm: String,
  pool: RegisterPool,
}

impl<'a> Emitter<'a> {
  fn new(source: &'a str, target: TargetOs) -> Self {
    let mut asm = String::new();
    asm.push_str(".intel_syntax noprefix\n");
    asm.push_str(".text\n");
    Self {
      source,
      target,
      asm,
      pool: RegisterPool::new(),
    }
  }

  fn ins(&mut self, text: impl AsRef<str>) {
    self.asm.push_str("    ");
    self.asm.push_str(text.as_ref());
    self.asm.push('\n');
  }

  fn symbol(&self, name: &str) -> String {
    format!("{}{name}", self.target.symbol_prefix())
  }

  /// `.global` declaration and label for a function entry point.
  fn function_label(&mut self, name: &str) {
    let symbol = self.symbol(name);
    self.asm.push_str(&format!(".global {symbol}\n"));
    self.asm.push_str(&format!("{symbol}:\n"));
  }

  /// Claim a scratch register for the value computed at `span`.
  fn alloc(&mut self, span: Span) -> CompileResult<PhysReg> {
    self
      .pool
      .allocate()
      .ok_or_else(|| CompileError::resource(self.source, span))
  }

  /// `dst = dst <op> rhs`, leaving `rhs` untouched.
  fn arith(&mut self, op: ArithOp, dst: PhysReg, rhs: PhysReg) {
    match op {
      ArithOp::Add => self.ins(format!("add {dst}, {rhs}")),
      ArithOp::Sub => self.ins(format!("sub {dst}, {rhs}")),
      ArithOp::Mul => {
        // rdx:rax <- rax * r/m
        self.ins("xor rdx, rdx");
        self.ins(format!("mov rax, {dst}"));
        self.ins(format!("imul {rhs}"));
        self.ins(format!("mov {dst}, rax"));
      }
      ArithOp::Div | ArithOp::Mod => {
        // rax <- rdx:rax / r/m, rdx <- remainder
        self.ins("xor rdx, rdx");
        self.ins(format!("mov rax, {dst}"));
        self.ins(format!("idiv {rhs}"));
        let half = if op == ArithOp::Div { "rax" } else { "rdx" };
        self.ins(format!("mov {dst}, {half}"));
      }
      ArithOp::Shl | ArithOp::Shr => {
        let mnemonic = if op == ArithOp::Shl { "sal" } else { "sar" };
        self.ins(format!("mov rcx, {rhs}"));
        self.ins(format!("{mnemonic} {dst}, cl"));
      }
    }
  }

  fn finish(self) -> String {
    self.asm
  }
}
