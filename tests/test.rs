use std::fs;

use c0::{ErrorKind, GlobalValue, Instr, Program, Result};

fn run_file(filename: &str) -> Result<Program> {
    let source = fs::read_to_string(filename)?;
    c0::compile_str(&source)
}

/// Looks up a function by the name stored in its name constant.
fn function<'a>(program: &'a Program, name: &str) -> &'a c0::FunctionDef {
    program
        .functions
        .iter()
        .find(|f| program.globals[f.name as usize].value == GlobalValue::Str(name.into()))
        .unwrap()
}

#[test]
fn test01() -> Result<()> {
    let program = run_file("tests/test01.c0")?;
    let fib = function(&program, "fib");
    assert_eq!((fib.ret_slots, fib.param_slots, fib.loc_slots), (1, 1, 0));
    let main = function(&program, "main");
    assert_eq!((main.ret_slots, main.param_slots, main.loc_slots), (0, 0, 1));
    assert_eq!(main.body.last(), Some(&Instr::Ret));
    Ok(())
}

#[test]
fn test02() -> Result<()> {
    let program = run_file("tests/test02.c0")?;
    let start = &program.functions[0];
    assert_eq!(start.body[start.body.len() - 2], Instr::StackAlloc(1));
    assert_eq!(program.globals[9].value, GlobalValue::Float(2.5));
    assert!(program.globals[9].is_const);
    Ok(())
}

#[test]
fn test03() -> Result<()> {
    let program = run_file("tests/test03.c0")?;
    assert!(program
        .globals
        .iter()
        .any(|g| g.value == GlobalValue::Str("<newline>".into())));
    Ok(())
}

#[test]
fn test04() -> Result<()> {
    let program = run_file("tests/test04.c0")?;
    let main = function(&program, "main");
    // n, i, sum and the block-local odd.
    assert_eq!(main.loc_slots, 4);
    let bytes = program.to_bytes();
    assert_eq!(&bytes[..4], &[0x72, 0x30, 0x3b, 0x3e]);
    Ok(())
}

#[test]
fn test05() {
    let err = run_file("tests/test05.c0").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FatalLink(_)));
}

#[test]
fn test06() {
    let err = run_file("tests/test06.c0").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Type(_)));
    assert_eq!(err.to_string().rsplit(' ').next(), Some("3:11"));
}

#[test]
fn test_unterminated_string() {
    let err = c0::compile_str("fn main() -> void { putstr(\"abc); }").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Lex(_)));
}
