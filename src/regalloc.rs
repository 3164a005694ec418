//! Physical register bookkeeping.
//!
//! `RegisterPool` hands out the four scratch registers in a fixed order and
//! never spills: running out is a fatal error for the caller to report.
//! `VregMap` records which scratch register currently holds each virtual
//! register on the IL path.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{CompileResult, InternalSnafu};
use crate::il::VReg;

/// Scratch registers, in allocation order. None of them is used implicitly
/// by `imul`/`idiv` (rax, rdx) or by shifts (rcx).
pub const SCRATCH_REGS: [&str; 4] = ["rdi", "rsi", "r8", "r9"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysReg(usize);

impl PhysReg {
  pub fn name(self) -> &'static str {
    SCRATCH_REGS[self.0]
  }
}

impl fmt::Display for PhysReg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Default)]
pub struct RegisterPool {
  used: [bool; SCRATCH_REGS.len()],
}

impl RegisterPool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Claim the first free register, or `None` when all are taken.
  pub fn allocate(&mut self) -> Option<PhysReg> {
    let index = self.used.iter().position(|used| !used)?;
    self.used[index] = true;
    tracing::trace!(reg = SCRATCH_REGS[index], "allocated register");
    Some(PhysReg(index))
  }

  pub fn free(&mut self, reg: PhysReg) -> CompileResult<()> {
    match self.used.get_mut(reg.0) {
      Some(used) if *used => {
        *used = false;
        tracing::trace!(reg = reg.name(), "freed register");
        Ok(())
      }
      Some(_) => InternalSnafu {
        message: format!("register {reg} freed twice"),
      }
      .fail(),
      None => InternalSnafu {
        message: format!("register index {} out of range", reg.0),
      }
      .fail(),
    }
  }

  /// Registers currently bound, in allocation order.
  pub fn live(&self) -> Vec<PhysReg> {
    self
      .used
      .iter()
      .enumerate()
      .filter(|(_, used)| **used)
      .map(|(index, _)| PhysReg(index))
      .collect()
  }
}

/// Virtual-to-physical bindings for the values currently live.
#[derive(Debug, Default)]
pub struct VregMap {
  dict: FxHashMap<VReg, PhysReg>,
}

impl VregMap {
  pub fn bind(&mut self, vreg: VReg, reg: PhysReg) {
    self.dict.insert(vreg, reg);
  }

  pub fn get(&self, vreg: VReg) -> CompileResult<PhysReg> {
    match self.dict.get(&vreg) {
      Some(reg) => Ok(*reg),
      None => InternalSnafu {
        message: format!("{vreg} has no register"),
      }
      .fail(),
    }
  }

  /// Forget `vreg`, handing back the register it occupied.
  pub fn release(&mut self, vreg: VReg) -> CompileResult<PhysReg> {
    match self.dict.remove(&vreg) {
      Some(reg) => Ok(reg),
      None => InternalSnafu {
        message: format!("{vreg} released while not live"),
      }
      .fail(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.dict.is_empty()
  }
}
