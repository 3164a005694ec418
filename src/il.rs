//! Linear intermediate language over virtual registers.

use std::fmt;

use crate::scope::LocalVar;
use crate::tokenizer::Span;

/// The value produced by one IL instruction. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "v{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Shl,
  Shr,
}

impl ArithOp {
  pub fn from_punct(op: &str) -> Option<Self> {
    Some(match op {
      "+" => Self::Add,
      "-" => Self::Sub,
      "*" => Self::Mul,
      "/" => Self::Div,
      "%" => Self::Mod,
      "<<" => Self::Shl,
      ">>" => Self::Shr,
      _ => return None,
    })
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Add => "Add",
      Self::Sub => "Sub",
      Self::Mul => "Mul",
      Self::Div => "Div",
      Self::Mod => "Mod",
      Self::Shl => "ShiftLeft",
      Self::Shr => "ShiftRight",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IlOp<'a> {
  LoadImm { dst: VReg, value: i64 },
  /// Address of a global symbol (function) that is not a local.
  LoadIdent { dst: VReg, name: &'a str },
  ReadLocalVar { dst: VReg, var: LocalVar },
  WriteLocalVar { src: VReg, var: LocalVar },
  Binary {
    op: ArithOp,
    dst: VReg,
    left: VReg,
    right: VReg,
  },
  Call {
    dst: VReg,
    callee: &'a str,
    args: Vec<VReg>,
  },
  Return { value: VReg },
  FuncBegin { name: &'a str, params: Vec<LocalVar> },
  FuncEnd { name: &'a str },
}

impl IlOp<'_> {
  pub fn opcode(&self) -> &'static str {
    match self {
      Self::LoadImm { .. } => "LoadImm",
      Self::LoadIdent { .. } => "LoadIdent",
      Self::ReadLocalVar { .. } => "ReadLocalVar",
      Self::WriteLocalVar { .. } => "WriteLocalVar",
      Self::Binary { op, .. } => op.name(),
      Self::Call { .. } => "Call",
      Self::Return { .. } => "Return",
      Self::FuncBegin { .. } => "FuncBegin",
      Self::FuncEnd { .. } => "FuncEnd",
    }
  }

  /// Register defined by this instruction, if any.
  pub fn def(&self) -> Option<VReg> {
    match self {
      Self::LoadImm { dst, .. }
      | Self::LoadIdent { dst, .. }
      | Self::ReadLocalVar { dst, .. }
      | Self::Binary { dst, .. }
      | Self::Call { dst, .. } => Some(*dst),
      Self::WriteLocalVar { .. }
      | Self::Return { .. }
      | Self::FuncBegin { .. }
      | Self::FuncEnd { .. } => None,
    }
  }

  /// Registers read by this instruction, in operand order.
  pub fn uses(&self) -> Vec<VReg> {
    match self {
      Self::WriteLocalVar { src, .. } => vec![*src],
      Self::Binary { left, right, .. } => vec![*left, *right],
      Self::Call { args, .. } => args.clone(),
      Self::Return { value } => vec![*value],
      Self::LoadImm { .. }
      | Self::LoadIdent { .. }
      | Self::ReadLocalVar { .. }
      | Self::FuncBegin { .. }
      | Self::FuncEnd { .. } => Vec::new(),
    }
  }
}

/// One instruction plus the source location it was lowered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlInst<'a> {
  pub op: IlOp<'a>,
  pub origin: Span,
}

impl fmt::Display for IlInst<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let opcode = self.op.opcode();
    match &self.op {
      IlOp::LoadImm { dst, value } => write!(f, "{dst} = {opcode} {value}"),
      IlOp::LoadIdent { dst, name } => write!(f, "{dst} = {opcode} {name}"),
      IlOp::ReadLocalVar { dst, var } => write!(f, "{dst} = {opcode} [{}]", var.slot),
      IlOp::WriteLocalVar { src, var } => write!(f, "{opcode} [{}], {src}", var.slot),
      IlOp::Binary {
        dst, left, right, ..
      } => write!(f, "{dst} = {opcode} {left}, {right}"),
      IlOp::Call { dst, callee, args } => {
        write!(f, "{dst} = {opcode} {callee}(")?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{arg}")?;
        }
        write!(f, ")")
      }
      IlOp::Return { value } => write!(f, "{opcode} {value}"),
      IlOp::FuncBegin { name, params } => {
        write!(f, "{opcode} {name}")?;
        for param in params {
          write!(f, " [{}]", param.slot)?;
        }
        Ok(())
      }
      IlOp::FuncEnd { name } => write!(f, "{opcode} {name}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn inst(op: IlOp<'_>) -> IlInst<'_> {
    IlInst {
      op,
      origin: Span::default(),
    }
  }

  #[test]
  fn listing_format() {
    let call = inst(IlOp::Call {
      dst: VReg(4),
      callee: "f",
      args: vec![VReg(2), VReg(3)],
    });
    assert_eq!(call.to_string(), "v4 = Call f(v2, v3)");

    let write = inst(IlOp::WriteLocalVar {
      src: VReg(1),
      var: LocalVar { slot: 2 },
    });
    assert_eq!(write.to_string(), "WriteLocalVar [2], v1");
  }

  #[test]
  fn defs_and_uses() {
    let add = IlOp::Binary {
      op: ArithOp::Add,
      dst: VReg(3),
      left: VReg(1),
      right: VReg(2),
    };
    assert_eq!(add.def(), Some(VReg(3)));
    assert_eq!(add.uses(), vec![VReg(1), VReg(2)]);
    assert_eq!(IlOp::Return { value: VReg(3) }.def(), None);
  }

  #[test]
  fn only_arithmetic_punctuators_map_to_ops() {
    assert_eq!(ArithOp::from_punct("%"), Some(ArithOp::Mod));
    assert_eq!(ArithOp::from_punct(">>"), Some(ArithOp::Shr));
    assert_eq!(ArithOp::from_punct("="), None);
  }
}
