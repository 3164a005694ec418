//! IL-to-assembly path for whole translation units.
//!
//! Functions are compiled one at a time. A prescan finds the last use of
//! every virtual register; a register is returned to the pool right after
//! that instruction, and a value nobody reads is freed as soon as it is
//! defined. Locals live at `[rbp - 8 * slot]`.

use rustc_hash::FxHashMap;

use super::Emitter;
use crate::config::TargetOs;
use crate::error::{CompileError, CompileResult, InternalSnafu};
use crate::il::{IlInst, IlOp, VReg};
use crate::regalloc::{PhysReg, VregMap};
use crate::scope::LocalVar;
use crate::tokenizer::Span;

/// System V integer argument registers, in order.
const ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Emit every function of an IL listing.
pub fn generate_program(il: &[IlInst], source: &str, target: TargetOs) -> CompileResult<String> {
  let mut emitter = Emitter::new(source, target);

  let mut rest = il;
  while !rest.is_empty() {
    let Some(end) = rest
      .iter()
      .position(|inst| matches!(inst.op, IlOp::FuncEnd { .. }))
    else {
      return InternalSnafu {
        message: "function without FuncEnd",
      }
      .fail();
    };
    let (func, tail) = rest.split_at(end + 1);
    FunctionCodegen::new(&mut emitter, func).run()?;
    rest = tail;
  }

  Ok(emitter.finish())
}

struct FunctionCodegen<'e, 'a, 'i> {
  emitter: &'e mut Emitter<'a>,
  insts: &'i [IlInst<'i>],
  last_use: FxHashMap<VReg, usize>,
  vregs: VregMap,
}

impl<'e, 'a, 'i> FunctionCodegen<'e, 'a, 'i> {
  fn new(emitter: &'e mut Emitter<'a>, insts: &'i [IlInst<'i>]) -> Self {
    let mut last_use = FxHashMap::default();
    for (index, inst) in insts.iter().enumerate() {
      for vreg in inst.op.uses() {
        last_use.insert(vreg, index);
      }
    }
    Self {
      emitter,
      insts,
      last_use,
      vregs: VregMap::default(),
    }
  }

  /// Bytes of stack needed for the function's locals, kept 16-byte aligned.
  fn frame_size(&self) -> usize {
    let max_slot = self
      .insts
      .iter()
      .flat_map(|inst| match &inst.op {
        IlOp::ReadLocalVar { var, .. } | IlOp::WriteLocalVar { var, .. } => vec![var.slot],
        IlOp::FuncBegin { params, .. } => params.iter().map(|p| p.slot).collect(),
        _ => Vec::new(),
      })
      .max()
      .unwrap_or(0);
    (max_slot * LocalVar::SIZE).next_multiple_of(16)
  }

  fn run(mut self) -> CompileResult<()> {
    let insts = self.insts;
    for (index, inst) in insts.iter().enumerate() {
      self.emit(index, inst)?;
      if let Some(dst) = inst.op.def()
        && !self.last_use.contains_key(&dst)
      {
        self.kill(dst)?;
      }
    }

    if !self.vregs.is_empty() || !self.emitter.pool.live().is_empty() {
      return InternalSnafu {
        message: "registers still live at end of function",
      }
      .fail();
    }
    Ok(())
  }

  fn dies_at(&self, vreg: VReg, index: usize) -> bool {
    self.last_use.get(&vreg) == Some(&index)
  }

  fn define(&mut self, vreg: VReg, span: Span) -> CompileResult<PhysReg> {
    let reg = self.emitter.alloc(span)?;
    self.vregs.bind(vreg, reg);
    Ok(reg)
  }

  /// Drop `vreg` and give its register back to the pool.
  fn kill(&mut self, vreg: VReg) -> CompileResult<()> {
    let reg = self.vregs.release(vreg)?;
    self.emitter.pool.free(reg)
  }

  fn kill_if_dead(&mut self, vreg: VReg, index: usize) -> CompileResult<()> {
    if self.dies_at(vreg, index) {
      self.kill(vreg)?;
    }
    Ok(())
  }

  fn emit(&mut self, index: usize, inst: &IlInst) -> CompileResult<()> {
    match &inst.op {
      IlOp::FuncBegin { name, params } => {
        if params.len() > ARG_REGS.len() {
          return Err(self.error(inst.origin, "functions take at most 6 parameters"));
        }
        self.emitter.function_label(name);
        self.emitter.ins("push rbp");
        self.emitter.ins("mov rbp, rsp");
        let frame_size = self.frame_size();
        if frame_size > 0 {
          self.emitter.ins(format!("sub rsp, {frame_size}"));
        }
        for (param, reg) in params.iter().zip(ARG_REGS) {
          self
            .emitter
            .ins(format!("mov [rbp-{}], {reg}", param.offset()));
        }
      }
      IlOp::LoadImm { dst, value } => {
        let reg = self.define(*dst, inst.origin)?;
        self.emitter.ins(format!("mov {reg}, {value}"));
      }
      IlOp::LoadIdent { dst, name } => {
        let reg = self.define(*dst, inst.origin)?;
        let symbol = self.emitter.symbol(name);
        self.emitter.ins(format!("lea {reg}, [rip+{symbol}]"));
      }
      IlOp::ReadLocalVar { dst, var } => {
        let reg = self.define(*dst, inst.origin)?;
        self.emitter.ins(format!("mov {reg}, [rbp-{}]", var.offset()));
      }
      IlOp::WriteLocalVar { src, var } => {
        let reg = self.vregs.get(*src)?;
        self.emitter.ins(format!("mov [rbp-{}], {reg}", var.offset()));
        self.kill_if_dead(*src, index)?;
      }
      IlOp::Binary {
        op,
        dst,
        left,
        right,
      } => {
        let lhs = self.vregs.get(*left)?;
        let rhs = self.vregs.get(*right)?;
        let result = if self.dies_at(*left, index) {
          // The left value is consumed here, so compute in place.
          self.vregs.release(*left)?;
          self.vregs.bind(*dst, lhs);
          lhs
        } else {
          let reg = self.define(*dst, inst.origin)?;
          self.emitter.ins(format!("mov {reg}, {lhs}"));
          reg
        };
        self.emitter.arith(*op, result, rhs);
        self.kill_if_dead(*right, index)?;
      }
      IlOp::Call { dst, callee, args } => self.emit_call(index, inst, *dst, callee, args)?,
      IlOp::Return { value } => {
        let reg = self.vregs.get(*value)?;
        self.emitter.ins(format!("mov rax, {reg}"));
        self.kill_if_dead(*value, index)?;
        self.epilogue();
      }
      IlOp::FuncEnd { .. } => {
        self.emitter.ins("mov rax, 0");
        self.epilogue();
      }
    }
    Ok(())
  }

  /// Caller-saved scratch registers are pushed around the call, and the
  /// arguments are loaded from those saved copies so no argument register
  /// is overwritten before it is read.
  fn emit_call(
    &mut self,
    index: usize,
    inst: &IlInst,
    dst: VReg,
    callee: &str,
    args: &[VReg],
  ) -> CompileResult<()> {
    if args.len() > ARG_REGS.len() {
      return Err(self.error(inst.origin, "calls take at most 6 arguments"));
    }

    let saved = self.emitter.pool.live();
    for reg in &saved {
      self.emitter.ins(format!("push {reg}"));
    }
    let padding = if saved.len() % 2 == 1 { 8 } else { 0 };
    if padding > 0 {
      self.emitter.ins(format!("sub rsp, {padding}"));
    }

    for (arg, target) in args.iter().zip(ARG_REGS) {
      let reg = self.vregs.get(*arg)?;
      let Some(position) = saved.iter().position(|saved| *saved == reg) else {
        return InternalSnafu {
          message: format!("argument {arg} is not in a live register"),
        }
        .fail();
      };
      let offset = padding + (saved.len() - 1 - position) * 8;
      self.emitter.ins(format!("mov {target}, [rsp+{offset}]"));
    }

    let symbol = self.emitter.symbol(callee);
    self.emitter.ins(format!("call {symbol}"));
    if padding > 0 {
      self.emitter.ins(format!("add rsp, {padding}"));
    }
    for reg in saved.iter().rev() {
      self.emitter.ins(format!("pop {reg}"));
    }

    for arg in args {
      self.kill_if_dead(*arg, index)?;
    }
    let reg = self.define(dst, inst.origin)?;
    self.emitter.ins(format!("mov {reg}, rax"));
    Ok(())
  }

  fn epilogue(&mut self) {
    self.emitter.ins("mov rsp, rbp");
    self.emitter.ins("pop rbp");
    self.emitter.ins("ret");
  }

  fn error(&self, span: Span, message: impl Into<String>) -> CompileError {
    CompileError::semantic(self.emitter.source, span, message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ilgen::generate_il;
  use crate::parser::parse_translation_unit;
  use crate::tokenizer::tokenize;
  use pretty_assertions::assert_eq;

  fn compile(source: &str, target: TargetOs) -> CompileResult<String> {
    let tokens = tokenize(source)?;
    let unit = parse_translation_unit(&tokens, source)?;
    let il = generate_il(&unit, source)?;
    generate_program(&il, source, target)
  }

  fn lines(source: &str) -> Vec<String> {
    compile(source, TargetOs::Linux)
      .unwrap()
      .lines()
      .map(|line| line.trim().to_string())
      .collect()
  }

  #[test]
  fn function_with_local_variable() {
    assert_eq!(
      lines("int main() { int a; a = 3; return a + 1; }"),
      vec![
        ".intel_syntax noprefix",
        ".text",
        ".global main",
        "main:",
        "push rbp",
        "mov rbp, rsp",
        "sub rsp, 16",
        "mov rdi, 3",
        "mov [rbp-8], rdi",
        "mov rdi, [rbp-8]",
        "mov rsi, 1",
        "add rdi, rsi",
        "mov rax, rdi",
        "mov rsp, rbp",
        "pop rbp",
        "ret",
        "mov rax, 0",
        "mov rsp, rbp",
        "pop rbp",
        "ret",
      ]
    );
  }

  #[test]
  fn each_read_of_a_local_gets_its_own_register() {
    let asm = lines("int main() { int a, b; a = 2; b = a * a; return b; }");
    assert!(asm.contains(&"mov rsi, [rbp-8]".to_string()));
    assert!(asm.contains(&"imul rsi".to_string()));
    assert!(asm.contains(&"mov [rbp-16], rdi".to_string()));
  }

  fn inst(op: IlOp<'static>) -> IlInst<'static> {
    IlInst {
      op,
      origin: Span::default(),
    }
  }

  #[test]
  fn left_operand_still_live_is_copied() {
    let il = vec![
      inst(IlOp::FuncBegin {
        name: "main",
        params: Vec::new(),
      }),
      inst(IlOp::LoadImm {
        dst: VReg(1),
        value: 5,
      }),
      inst(IlOp::Binary {
        op: crate::il::ArithOp::Add,
        dst: VReg(2),
        left: VReg(1),
        right: VReg(1),
      }),
      inst(IlOp::Binary {
        op: crate::il::ArithOp::Sub,
        dst: VReg(3),
        left: VReg(2),
        right: VReg(1),
      }),
      inst(IlOp::Return { value: VReg(3) }),
      inst(IlOp::FuncEnd { name: "main" }),
    ];
    let asm = generate_program(&il, "", TargetOs::Linux).unwrap();
    assert!(asm.contains("    mov rdi, 5
    mov rsi, rdi
    add rsi, rdi
    sub rsi, rdi
"));
  }

  #[test]
  fn listing_without_func_end_is_an_internal_error() {
    let il = vec![inst(IlOp::FuncBegin {
      name: "main",
      params: Vec::new(),
    })];
    let err = generate_program(&il, "", TargetOs::Linux).unwrap_err();
    assert!(matches!(err, CompileError::Internal { .. }));
  }

  #[test]
  fn parameters_are_spilled_to_their_slots() {
    let asm = lines("int add(int x, int y) { return x + y; }");
    assert_eq!(
      asm[4..10],
      [
        "push rbp",
        "mov rbp, rsp",
        "sub rsp, 16",
        "mov [rbp-8], rdi",
        "mov [rbp-16], rsi",
        "mov rdi, [rbp-8]",
      ]
    );
  }

  #[test]
  fn call_saves_live_registers_and_loads_arguments() {
    let asm = lines("int add(int x, int y) { return x + y; } int main() { return add(1, 2); }");
    let main = asm.iter().position(|line| line == "main:").unwrap();
    assert_eq!(
      asm[main + 1..],
      [
        "push rbp",
        "mov rbp, rsp",
        "mov rdi, 1",
        "mov rsi, 2",
        "push rdi",
        "push rsi",
        "mov rdi, [rsp+8]",
        "mov rsi, [rsp+0]",
        "call add",
        "pop rsi",
        "pop rdi",
        "mov rdi, rax",
        "mov rax, rdi",
        "mov rsp, rbp",
        "pop rbp",
        "ret",
        "mov rax, 0",
        "mov rsp, rbp",
        "pop rbp",
        "ret",
      ]
    );
  }

  #[test]
  fn odd_number_of_saved_registers_is_padded() {
    let asm = lines("int f(int x) { return x; } int main() { return f(7); }");
    let call = asm.iter().position(|line| line == "call f").unwrap();
    assert_eq!(
      asm[call - 3..call + 3],
      [
        "push rdi",
        "sub rsp, 8",
        "mov rdi, [rsp+8]",
        "call f",
        "add rsp, 8",
        "pop rdi",
      ]
    );
  }

  #[test]
  fn darwin_prefixes_labels_and_calls() {
    let asm = compile("int f() { return 1; } int main() { return f(); }", TargetOs::Darwin).unwrap();
    assert!(asm.contains(".global _f\n_f:\n"));
    assert!(asm.contains("call _f\n"));
    assert!(asm.contains(".global _main\n_main:\n"));
  }

  #[test]
  fn function_address_is_loaded_rip_relative() {
    let asm = lines("int f() { return f; }");
    assert!(asm.contains(&"lea rdi, [rip+f]".to_string()));
  }

  #[test]
  fn unused_values_do_not_leak_registers() {
    // Five discarded statements would exhaust the pool if values leaked.
    let asm = compile(
      "int main() { 1; 2; 3; 4; 5; 6, 7; return 0; }",
      TargetOs::Linux,
    );
    assert!(asm.is_ok());
  }

  #[test]
  fn deep_nesting_exhausts_the_pool() {
    let err = compile("int main() { return 1+(2+(3+(4+5))); }", TargetOs::Linux).unwrap_err();
    assert!(matches!(err, CompileError::Resource { .. }));
  }

  #[test]
  fn five_live_arguments_exhaust_the_pool() {
    let err = compile(
      "int f() { return 0; } int main() { return f(1, 2, 3, 4, 5); }",
      TargetOs::Linux,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Resource { .. }));
  }

  #[test]
  fn too_many_arguments_is_rejected() {
    let mut il = vec![inst(IlOp::FuncBegin {
      name: "main",
      params: Vec::new(),
    })];
    il.push(inst(IlOp::Call {
      dst: VReg(1),
      callee: "f",
      args: vec![VReg(9); 7],
    }));
    il.push(inst(IlOp::FuncEnd { name: "main" }));
    let err = generate_program(&il, "", TargetOs::Linux).unwrap_err();
    assert_eq!(err.message(), "calls take at most 6 arguments");
  }

  #[test]
  fn too_many_parameters_is_rejected() {
    let err = compile(
      "int f(int a, int b, int c, int d, int e, int g, int h) { return 0; }",
      TargetOs::Linux,
    )
    .unwrap_err();
    assert_eq!(err.message(), "functions take at most 6 parameters");
  }
}
