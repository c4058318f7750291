use std::fs;
use std::process::Command;

use tempfile::tempdir;

fn axon_binary() -> &'static str {
    env!("CARGO_BIN_EXE_axon")
}

#[test]
fn version_flag_prints_the_version() {
    let output = Command::new(axon_binary())
        .arg("--version")
        .output()
        .expect("run axon --version");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Axon "), "unexpected output: {stdout}");
}

#[test]
fn help_flag_prints_usage() {
    let output = Command::new(axon_binary())
        .arg("--help")
        .output()
        .expect("run axon --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE"), "unexpected output: {stdout}");
    assert!(stdout.contains("emit-ir"), "unexpected output: {stdout}");
}

#[test]
fn check_passes_on_a_valid_file() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("ok.ax");
    fs::write(&path, "fn add(a: i64, b: i64) -> i64:\n    return a + b\n")?;

    let output = Command::new(axon_binary())
        .arg("check")
        .arg(&path)
        .output()
        .expect("run axon check");
    assert!(output.status.success(), "check should pass");
    Ok(())
}

#[test]
fn check_reports_semantic_errors_with_locations() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("bad.ax");
    fs::write(&path, "fn test():\n    let x = 10\n    x = 20\n")?;

    let output = Command::new(axon_binary())
        .arg("check")
        .arg(&path)
        .output()
        .expect("run axon check");
    assert!(!output.status.success(), "check should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Cannot assign to immutable variable 'x'"),
        "missing diagnostic: {stderr}"
    );
    // <filename>:<line>:<column>: error: <message>
    assert!(stderr.contains("bad.ax:3:5: error:"), "bad format: {stderr}");
    Ok(())
}

#[test]
fn lex_prints_the_token_stream() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("tokens.ax");
    fs::write(&path, "let x = 42\n")?;

    let output = Command::new(axon_binary())
        .arg("lex")
        .arg(&path)
        .output()
        .expect("run axon lex");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("IntegerLiteral(42)"), "unexpected output: {stdout}");
    assert!(stdout.contains("Eof"), "unexpected output: {stdout}");
    Ok(())
}

#[test]
fn lex_fails_on_lexical_errors() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("bad_token.ax");
    fs::write(&path, "let s = \"oops\n")?;

    let output = Command::new(axon_binary())
        .arg("lex")
        .arg(&path)
        .output()
        .expect("run axon lex");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unterminated string literal"),
        "missing diagnostic: {stderr}"
    );
    Ok(())
}

#[test]
fn parse_prints_a_declaration_summary() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("decls.ax");
    fs::write(
        &path,
        "struct Point:\n    x: i64\n\nfn origin(p: Point) -> i64:\n    return p.x\n",
    )?;

    let output = Command::new(axon_binary())
        .arg("parse")
        .arg(&path)
        .output()
        .expect("run axon parse");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Declarations: 2"), "unexpected output: {stdout}");
    assert!(stdout.contains("struct Point"), "unexpected output: {stdout}");
    assert!(stdout.contains("fn origin (1 params)"), "unexpected output: {stdout}");
    Ok(())
}

#[test]
fn emit_ir_dumps_textual_ir() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("ir.ax");
    fs::write(&path, "fn add(a: i64, b: i64) -> i64:\n    return a + b\n")?;

    let output = Command::new(axon_binary())
        .arg("emit-ir")
        .arg(&path)
        .output()
        .expect("run axon emit-ir");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("define i64 @add"), "unexpected output: {stdout}");
    assert!(stdout.contains("; ModuleID ="), "unexpected output: {stdout}");
    Ok(())
}

#[test]
fn parse_errors_exit_nonzero() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("syntax.ax");
    fs::write(&path, "fn f(:\n")?;

    let output = Command::new(axon_binary())
        .arg("parse")
        .arg(&path)
        .output()
        .expect("run axon parse");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "missing diagnostics: {stderr}");
    Ok(())
}

#[test]
fn repl_quits_on_command() -> anyhow::Result<()> {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new(axon_binary())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("start repl");

    child
        .stdin
        .as_mut()
        .expect("stdin")
        .write_all(b":quit\n")?;
    let output = child.wait_with_output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Goodbye"), "unexpected output: {stdout}");
    Ok(())
}
