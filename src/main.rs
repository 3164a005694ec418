use std::env;
use std::process;

use rilc::Config;

/// Log to stderr, but only when `RUST_LOG` asks for it.
fn init_tracing() {
  use tracing_subscriber::{EnvFilter, fmt, prelude::*};

  if env::var("RUST_LOG").is_ok() {
    tracing_subscriber::registry()
      .with(
        fmt::layer()
          .with_writer(std::io::stderr)
          .with_target(true)
          .with_level(true),
      )
      .with(EnvFilter::from_default_env())
      .init();
  }
}

fn main() {
  init_tracing();

  let asm = Config::from_args(env::args()).and_then(|config| {
    tracing::debug!(?config, "starting compilation");
    rilc::compile(&config)
  });

  match asm {
    Ok(asm) => print!("{asm}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
