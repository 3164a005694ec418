//! Nested symbol tables for the IL generator.
//!
//! Frames live in an arena and point at their parent by index. Frames are
//! entered and left in strict LIFO order, so the arena is also a stack.
//!
//! Stack layout: a frame starts numbering its slots right after the slots
//! of every enclosing frame (`base`). Variables that can be live at the same
//! time never share a slot, while sibling blocks reuse the same range.

use rustc_hash::FxHashMap;

/// A function-local variable living at `[rbp - 8 * slot]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalVar {
  pub slot: usize,
}

impl LocalVar {
  pub const SIZE: usize = 8;

  pub fn offset(&self) -> usize {
    self.slot * Self::SIZE
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId(usize);

#[derive(Debug)]
struct Frame<'a> {
  parent: Option<FrameId>,
  base: usize,
  vars: FxHashMap<&'a str, LocalVar>,
}

#[derive(Debug, Default)]
pub struct ScopeArena<'a> {
  frames: Vec<Frame<'a>>,
}

impl<'a> ScopeArena<'a> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Open a new, empty frame below `parent`.
  pub fn enter_scope(&mut self, parent: Option<FrameId>) -> FrameId {
    let base = parent.map_or(0, |id| {
      let frame = &self.frames[id.0];
      frame.base + frame.vars.len()
    });
    self.frames.push(Frame {
      parent,
      base,
      vars: FxHashMap::default(),
    });
    FrameId(self.frames.len() - 1)
  }

  /// Drop `frame` together with anything opened after it.
  pub fn leave_scope(&mut self, frame: FrameId) {
    self.frames.truncate(frame.0);
  }

  /// Bind `name` to the next free slot of `frame`.
  pub fn declare(&mut self, frame: FrameId, name: &'a str) -> LocalVar {
    let frame = &mut self.frames[frame.0];
    let var = LocalVar {
      slot: frame.base + frame.vars.len() + 1,
    };
    frame.vars.insert(name, var);
    tracing::trace!(name, slot = var.slot, "declared local");
    var
  }

  /// Whether `name` is already bound in `frame` itself, ignoring ancestors.
  pub fn declared_here(&self, frame: FrameId, name: &str) -> bool {
    self.frames[frame.0].vars.contains_key(name)
  }

  /// Look `name` up from `frame` outwards; the innermost binding wins.
  pub fn resolve(&self, frame: FrameId, name: &str) -> Option<LocalVar> {
    let mut current = Some(frame);
    while let Some(id) = current {
      let frame = &self.frames[id.0];
      if let Some(var) = frame.vars.get(name) {
        return Some(*var);
      }
      current = frame.parent;
    }
    None
  }
}
