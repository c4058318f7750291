mod repl;

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use tempfile::Builder as TempBuilder;

use axon_compiler::{
    CompileOptions, Compiler, Decl, Diagnostic, DiagnosticLevel, Lexer, Parser, SourceFile,
    SourceId,
};

const USAGE: &str = "\
Axon Programming Language

USAGE:
    axon [FLAGS] [COMMAND] [FILE]

FLAGS:
    -h, --help       Show this help message
    -v, --version    Show version information

COMMANDS:
    axon                      Start interactive REPL
    axon <file.ax>            Compile a file to an object file
    axon repl                 Start interactive REPL
    axon build <file.ax>      Compile and link to an executable
    axon lex <file.ax>        Tokenize and print the token stream
    axon parse <file.ax>      Parse and print a declaration summary
    axon check <file.ax>      Type-check and report errors only
    axon emit-ir <file.ax>    Print textual IR to stdout";

#[derive(ClapParser)]
#[command(name = "axon lex", about = "Tokenize a source file and print the token stream.")]
struct LexCli {
    /// Path to an Axon source file.
    input: PathBuf,
}

#[derive(ClapParser)]
#[command(name = "axon parse", about = "Parse a source file and print a declaration summary.")]
struct ParseCli {
    input: PathBuf,
}

#[derive(ClapParser)]
#[command(name = "axon check", about = "Run the full type-check and report errors.")]
struct CheckCli {
    input: PathBuf,
}

#[derive(ClapParser)]
#[command(name = "axon emit-ir", about = "Dump textual IR to stdout.")]
struct EmitIrCli {
    input: PathBuf,
}

#[derive(ClapParser)]
#[command(name = "axon build", about = "Compile and link to an executable.")]
struct BuildCli {
    /// Path to an Axon source file.
    input: PathBuf,

    /// Destination for the produced binary (defaults to the input stem).
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Optimization level passed to the system toolchain.
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,

    /// Print phase progress and toolchain invocations.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let raw: Vec<OsString> = env::args_os().collect();

    match raw.get(1).and_then(|arg| arg.to_str()) {
        None | Some("repl") => repl::run(),
        Some("-h") | Some("--help") => {
            println!("{USAGE}");
            Ok(())
        }
        Some("-v") | Some("--version") => {
            println!("Axon {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some("lex") => {
            let cli = LexCli::parse_from(strip_subcommand(raw));
            run_lex(&cli.input)
        }
        Some("parse") => {
            let cli = ParseCli::parse_from(strip_subcommand(raw));
            run_parse(&cli.input)
        }
        Some("check") => {
            let cli = CheckCli::parse_from(strip_subcommand(raw));
            run_check(&cli.input)
        }
        Some("emit-ir") => {
            let cli = EmitIrCli::parse_from(strip_subcommand(raw));
            run_emit_ir(&cli.input)
        }
        Some("build") => {
            let cli = BuildCli::parse_from(strip_subcommand(raw));
            run_build(&cli)
        }
        Some(_) => {
            #[derive(ClapParser)]
            #[command(name = "axon", about = "Compile an Axon source file to an object file.")]
            struct CompileCli {
                input: PathBuf,
            }
            let cli = CompileCli::parse_from(raw);
            run_compile_to_object(&cli.input)
        }
    }
}

fn strip_subcommand(mut raw: Vec<OsString>) -> Vec<OsString> {
    if raw.len() > 1 {
        raw.remove(1);
    }
    raw
}

fn load_source(path: &Path) -> Result<SourceFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Could not open file '{}'", path.display()))?;
    Ok(SourceFile::new(SourceId(0), path.to_path_buf(), contents))
}

/// `<filename>:<line>:<column>: error: <message>` on stderr, with the
/// category bolded when stderr is a terminal.
fn print_diagnostic(filename: &str, diagnostic: &Diagnostic) {
    let category = match diagnostic.level {
        DiagnosticLevel::Error => "error",
        DiagnosticLevel::Warning => "warning",
    };
    let styled = if std::io::stderr().is_terminal() {
        match diagnostic.level {
            DiagnosticLevel::Error => format!("\x1b[1;31m{category}\x1b[0m"),
            DiagnosticLevel::Warning => format!("\x1b[1;33m{category}\x1b[0m"),
        }
    } else {
        category.to_string()
    };

    match diagnostic.location {
        Some(location) => eprintln!(
            "{filename}:{}:{}: {styled}: {}",
            location.line, location.column, diagnostic.message
        ),
        None => eprintln!("{filename}: {styled}: {}", diagnostic.message),
    }
}

fn print_all(filename: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        print_diagnostic(filename, diagnostic);
    }
}

fn run_lex(input: &Path) -> Result<()> {
    let source = load_source(input)?;
    let filename = source.display_name();
    let mut lexer = Lexer::new(&source);
    let tokens = lexer.tokenize_all();

    for token in &tokens {
        println!(
            "{:>4}:{:<4} {:?} {:?}",
            token.location.line, token.location.column, token.kind, token.lexeme
        );
    }

    if lexer.has_errors() {
        print_all(&filename, lexer.diagnostics().entries());
        bail!("Lexing failed");
    }
    Ok(())
}

fn run_parse(input: &Path) -> Result<()> {
    let source = load_source(input)?;
    let filename = source.display_name();
    let lexer = Lexer::new(&source);
    let mut parser = Parser::new(lexer, filename.clone());
    let program = parser.parse();
    let diagnostics = parser.into_diagnostics();

    if diagnostics.has_errors() {
        print_all(&filename, diagnostics.entries());
        bail!("Parsing failed");
    }

    println!("Declarations: {}", program.declarations.len());
    for (index, decl) in program.declarations.iter().enumerate() {
        println!("  [{index}] {}", describe_declaration(decl));
    }
    Ok(())
}

fn describe_declaration(decl: &Decl) -> String {
    match decl {
        Decl::Fn(decl) => format!("fn {} ({} params)", decl.name, decl.params.len()),
        Decl::Struct(decl) => format!("struct {}", decl.name),
        Decl::Class(decl) => format!("class {}", decl.name),
        Decl::Trait(decl) => format!("trait {}", decl.name),
        Decl::Impl(decl) => match &decl.trait_name {
            Some(trait_name) => format!("impl {} for {}", trait_name, decl.type_name),
            None => format!("impl {}", decl.type_name),
        },
        Decl::Enum(decl) => format!("enum {} ({} variants)", decl.name, decl.variants.len()),
        Decl::TypeAlias(decl) => format!("type {}", decl.name),
        Decl::Import(decl) => format!("import {}", decl.module_path),
    }
}

fn run_check(input: &Path) -> Result<()> {
    let source = load_source(input)?;
    let filename = source.display_name();
    let mut compiler = Compiler::new(CompileOptions::default());
    if compiler.compile(&source).is_err() {
        print_all(&filename, compiler.diagnostics().entries());
        bail!("Check failed");
    }
    Ok(())
}

fn run_emit_ir(input: &Path) -> Result<()> {
    let source = load_source(input)?;
    let filename = source.display_name();
    let mut compiler = Compiler::new(CompileOptions::default());
    let compilation = match compiler.compile(&source) {
        Ok(compilation) => compilation,
        Err(err) => {
            print_all(&filename, compiler.diagnostics().entries());
            return Err(err.context("Compilation failed"));
        }
    };

    let ir = compilation.emit_ir()?;
    print!("{ir}");
    Ok(())
}

fn run_compile_to_object(input: &Path) -> Result<()> {
    let source = load_source(input)?;
    let filename = source.display_name();
    let mut compiler = Compiler::new(CompileOptions::default());
    let compilation = match compiler.compile(&source) {
        Ok(compilation) => compilation,
        Err(err) => {
            print_all(&filename, compiler.diagnostics().entries());
            return Err(err.context("Compilation failed"));
        }
    };

    let ir = compilation.emit_ir()?;
    let object_path = input.with_extension("obj");
    emit_object(&ir, &object_path, 0, false)?;
    Ok(())
}

fn run_build(cli: &BuildCli) -> Result<()> {
    if cli.verbose {
        println!("Compiling {}...", cli.input.display());
    }

    let source = load_source(&cli.input)?;
    let filename = source.display_name();
    let mut compiler = Compiler::new(CompileOptions::default());
    let compilation = match compiler.compile(&source) {
        Ok(compilation) => compilation,
        Err(err) => {
            print_all(&filename, compiler.diagnostics().entries());
            return Err(err.context("Compilation failed"));
        }
    };

    let ir = compilation.emit_ir()?;
    let object_path = cli.input.with_extension("obj");
    emit_object(&ir, &object_path, cli.opt_level, cli.verbose)?;

    let exe_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension(env::consts::EXE_EXTENSION));
    link_executable(&object_path, &exe_path, cli.verbose)?;
    println!("Build successful: {}", exe_path.display());
    Ok(())
}

/// Writes the textual IR to a scratch file and shells out to the system
/// toolchain for object emission. clang is required here: it consumes .ll
/// directly.
fn emit_object(ir: &str, object_path: &Path, opt_level: u8, verbose: bool) -> Result<()> {
    if find_tool("clang").is_none() {
        bail!("No LLVM toolchain found (clang is required to assemble IR)");
    }

    let mut ir_file = TempBuilder::new()
        .prefix("axon")
        .suffix(".ll")
        .tempfile()
        .context("failed to create scratch file for IR")?;
    ir_file
        .write_all(ir.as_bytes())
        .context("failed to write IR")?;

    if verbose {
        println!(
            "Generating {} (optimization level {opt_level})",
            object_path.display()
        );
    }

    let status = Command::new("clang")
        .arg("-c")
        .arg(format!("-O{opt_level}"))
        .arg(ir_file.path())
        .arg("-o")
        .arg(object_path)
        .status()
        .context("failed to run clang")?;
    if !status.success() {
        bail!("Failed to generate object file");
    }
    Ok(())
}

fn link_executable(object_path: &Path, exe_path: &Path, verbose: bool) -> Result<()> {
    let linker = find_tool("clang")
        .or_else(|| find_tool("cc"))
        .ok_or_else(|| anyhow::anyhow!("No linker found (clang or cc required)"))?;

    if verbose {
        println!(
            "$ {linker} {} -o {}",
            object_path.display(),
            exe_path.display()
        );
    }

    let status = Command::new(&linker)
        .arg(object_path)
        .arg("-o")
        .arg(exe_path)
        .status()
        .with_context(|| format!("failed to run {linker}"))?;
    if !status.success() {
        bail!("Linking failed");
    }
    Ok(())
}

fn find_tool(name: &str) -> Option<String> {
    let ok = Command::new(name)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    ok.then(|| name.to_string())
}
