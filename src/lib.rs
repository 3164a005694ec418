//! Crate root: wires together the compilation pipeline.
//!
//! Source text flows through four stages:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and builds the `ast`.
//! - `ilgen` lowers a translation unit into the linear `il`, resolving
//!   locals through `scope`.
//! - `codegen` emits Intel-syntax x86-64, handing out registers from
//!   `regalloc`.
//!
//! A bare expression skips the IL and is compiled straight from its tree.
//! `error` centralises the diagnostics shared by every stage.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod il;
pub mod ilgen;
pub mod parser;
pub mod regalloc;
pub mod scope;
pub mod tokenizer;

pub use config::{Config, Mode, TargetOs};
pub use error::{CompileError, CompileResult};

/// Compile the source held by `config` in the mode it asks for.
pub fn compile(config: &Config) -> CompileResult<String> {
  match config.mode {
    Mode::Expression => compile_expression(&config.source, config.target_os),
    Mode::Program => compile_program(&config.source, config.target_os),
  }
}

/// Compile a single arithmetic expression into a `main` returning its value.
pub fn compile_expression(source: &str, target: TargetOs) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let node = parser::parse_expression(&tokens, source)?;
  codegen::generate_expression(&node, source, target)
}

/// Compile a translation unit of function definitions.
pub fn compile_program(source: &str, target: TargetOs) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let unit = parser::parse_translation_unit(&tokens, source)?;
  let il = ilgen::generate_il(&unit, source)?;
  codegen::generate_program(&il, source, target)
}
