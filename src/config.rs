//! Command-line configuration.

use std::str::FromStr;

use crate::error::{CompileError, CompileResult, UsageSnafu};

/// Operating system the assembly is meant for; decides symbol naming.
/// Darwin unless `--target_os` says otherwise, whatever the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetOs {
  Linux,
  #[default]
  Darwin,
}

impl TargetOs {
  /// Prefix the platform's C ABI puts in front of global symbols.
  pub fn symbol_prefix(self) -> &'static str {
    match self {
      Self::Linux => "",
      Self::Darwin => "_",
    }
  }
}

impl FromStr for TargetOs {
  type Err = CompileError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Linux" => Ok(Self::Linux),
      "Darwin" => Ok(Self::Darwin),
      _ => UsageSnafu {
        message: format!("unknown os type {s}"),
      }
      .fail(),
    }
  }
}

/// What the source argument holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
  /// A single arithmetic expression, compiled straight from the AST.
  #[default]
  Expression,
  /// A translation unit of function definitions, compiled through the IL.
  Program,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub target_os: TargetOs,
  pub mode: Mode,
  pub source: String,
}

impl Config {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      target_os: TargetOs::default(),
      mode: Mode::default(),
      source: source.into(),
    }
  }

  /// Build a configuration from `argv`, program name included.
  pub fn from_args(args: impl IntoIterator<Item = String>) -> CompileResult<Self> {
    let mut args = args.into_iter().skip(1);
    let mut target_os = None;
    let mut mode = Mode::default();
    let mut source = None;

    while let Some(arg) = args.next() {
      match arg.as_str() {
        "--target_os" => {
          let Some(os) = args.next() else {
            return UsageSnafu {
              message: "--target_os needs a value",
            }
            .fail();
          };
          target_os = Some(os.parse::<TargetOs>()?);
        }
        "--program" => mode = Mode::Program,
        _ if arg.starts_with("--target_os=") => {
          target_os = Some(arg["--target_os=".len()..].parse::<TargetOs>()?);
        }
        _ if arg.starts_with("--") => {
          return UsageSnafu {
            message: format!("unknown option {arg}"),
          }
          .fail();
        }
        _ if source.is_none() => source = Some(arg),
        _ => {
          return UsageSnafu {
            message: format!("unexpected argument {arg}"),
          }
          .fail();
        }
      }
    }

    let Some(source) = source else {
      return UsageSnafu {
        message: "no source given",
      }
      .fail();
    };
    let mut config = Self::new(source);
    config.mode = mode;
    if let Some(os) = target_os {
      config.target_os = os;
    }
    Ok(config)
  }
}
