//! Property-based tests over generated sources.

use proptest::prelude::*;
use rilc::{CompileError, TargetOs, compile_expression, compile_program};

fn body(asm: &str) -> Vec<&str> {
  asm.lines().skip(4).map(str::trim).collect()
}

fn identifier_strategy() -> impl Strategy<Value = String> {
  prop::string::string_regex("[a-z_][a-z0-9_]{0,8}")
    .expect("valid regex")
    .prop_filter("not a keyword", |s| s != "int" && s != "return")
}

proptest! {
  #[test]
  fn decimal_literal_loads_its_value(n in 1u32..u32::MAX) {
    let asm = compile_expression(&n.to_string(), TargetOs::Linux).unwrap();
    prop_assert_eq!(body(&asm)[0], format!("mov rdi, {n}"));
  }

  #[test]
  fn octal_literal_loads_its_value(n in 0u32..u32::MAX) {
    let asm = compile_expression(&format!("0{n:o}"), TargetOs::Linux).unwrap();
    prop_assert_eq!(body(&asm)[0], format!("mov rdi, {n}"));
  }

  #[test]
  fn flat_chains_fold_left_in_two_registers(
    first in 0u8..100,
    rest in prop::collection::vec((prop::bool::ANY, 0u8..100), 1..20),
  ) {
    let mut source = first.to_string();
    let mut expected = vec![format!("mov rdi, {first}")];
    for (add, n) in &rest {
      let (op, mnemonic) = if *add { ('+', "add") } else { ('-', "sub") };
      source.push(op);
      source.push_str(&n.to_string());
      expected.push(format!("mov rsi, {n}"));
      expected.push(format!("{mnemonic} rdi, rsi"));
    }
    expected.push("mov rax, rdi".to_string());
    expected.push("ret".to_string());

    let asm = compile_expression(&source, TargetOs::Linux).unwrap();
    prop_assert_eq!(body(&asm), expected);
  }

  #[test]
  fn pool_runs_dry_only_past_four_levels(depth in 1usize..8) {
    let mut source = "1".to_string();
    for _ in 1..depth {
      source = format!("1+({source})");
    }
    let result = compile_expression(&source, TargetOs::Linux);
    if depth <= 4 {
      prop_assert!(result.is_ok());
    } else {
      prop_assert!(matches!(result, Err(CompileError::Resource { .. })), "expected Resource error, got {:?}", result);
    }
  }

  #[test]
  fn darwin_prefixes_every_function(name in identifier_strategy()) {
    prop_assume!(name != "main");
    let source = format!("int {name}() {{ return 0; }} int main() {{ return {name}(); }}");
    let asm = compile_program(&source, TargetOs::Darwin).unwrap();
    let label = format!("_{name}:\n");
    let call = format!("call _{name}\n");
    prop_assert!(asm.contains(&label));
    prop_assert!(asm.contains(&call));
  }
}
