use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;

use axon_compiler::{Lexer, Lowerer, Parser, SourceFile, SourceId, TypeChecker};

const PROMPT: &str = ">>> ";
const CONTINUATION: &str = "... ";

struct ReplState {
    checker: TypeChecker,
    show_tokens: bool,
    show_ast: bool,
    show_ir: bool,
    line_number: usize,
}

impl ReplState {
    fn new() -> Self {
        Self {
            checker: TypeChecker::new(),
            show_tokens: false,
            show_ast: false,
            show_ir: false,
            line_number: 1,
        }
    }
}

/// Line-buffered interactive loop. A trailing ':' or an unmatched bracket
/// switches to the continuation prompt; an empty line closes the block.
/// Definitions persist across inputs until `:reset`.
pub fn run() -> Result<()> {
    println!("Axon {} — type :help for commands", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut state = ReplState::new();

    loop {
        print!("{PROMPT}");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!("\nGoodbye!");
            break;
        };
        let mut input = line?;

        if input.trim().is_empty() {
            continue;
        }

        if let Some(command) = input.trim().strip_prefix(':') {
            if !handle_command(command, &mut state) {
                break;
            }
            continue;
        }

        if needs_more_input(&input) {
            read_multiline(&mut lines, &mut input)?;
        }

        execute(&mut state, &input);
        state.line_number += 1;
    }

    Ok(())
}

fn handle_command(command: &str, state: &mut ReplState) -> bool {
    match command.trim() {
        "quit" | "q" | "exit" => {
            println!("Goodbye!");
            return false;
        }
        "help" | "h" | "?" => {
            println!(":help    Show this message");
            println!(":quit    Exit the REPL");
            println!(":tokens  Toggle token display");
            println!(":ast     Toggle AST display");
            println!(":ir      Toggle IR display");
            println!(":clear   Clear the screen");
            println!(":reset   Discard all definitions");
        }
        "tokens" | "t" => {
            state.show_tokens = !state.show_tokens;
            println!("Token display: {}", on_off(state.show_tokens));
        }
        "ast" | "a" => {
            state.show_ast = !state.show_ast;
            println!("AST display: {}", on_off(state.show_ast));
        }
        "ir" => {
            state.show_ir = !state.show_ir;
            println!("IR display: {}", on_off(state.show_ir));
        }
        "clear" => {
            print!("\x1b[2J\x1b[H");
            let _ = io::stdout().flush();
        }
        "reset" => {
            state.checker = TypeChecker::new();
            state.line_number = 1;
            println!("Definitions discarded");
        }
        other => {
            println!("Unknown command ':{other}' (try :help)");
        }
    }
    true
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

fn needs_more_input(code: &str) -> bool {
    let trimmed = code.trim_end();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.ends_with(':') {
        return true;
    }

    let mut parens = 0i32;
    let mut brackets = 0i32;
    let mut braces = 0i32;
    for ch in code.chars() {
        match ch {
            '(' => parens += 1,
            ')' => parens -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            _ => {}
        }
    }
    parens > 0 || brackets > 0 || braces > 0
}

fn read_multiline(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    input: &mut String,
) -> Result<()> {
    let mut depth = 1usize;
    while depth > 0 {
        print!("{CONTINUATION}");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        // An empty line closes the innermost open block.
        if line.trim().is_empty() {
            depth -= 1;
            continue;
        }

        input.push('\n');
        input.push_str(&line);

        if line.trim_end().ends_with(':') {
            depth += 1;
        }
    }
    Ok(())
}

fn execute(state: &mut ReplState, code: &str) {
    let source = SourceFile::new(
        SourceId(state.line_number as u32),
        PathBuf::from("<repl>"),
        format!("{code}\n"),
    );

    if state.show_tokens {
        let mut lexer = Lexer::new(&source);
        for token in lexer.tokenize_all() {
            println!("{:?} {:?}", token.kind, token.lexeme);
        }
    }

    let lexer = Lexer::new(&source);
    let mut parser = Parser::new(lexer, "<repl>");
    let program = parser.parse();
    let diagnostics = parser.into_diagnostics();
    if diagnostics.has_errors() {
        for diagnostic in diagnostics.entries() {
            match diagnostic.location {
                Some(location) => eprintln!(
                    "<repl>:{}:{}: error: {}",
                    location.line, location.column, diagnostic.message
                ),
                None => eprintln!("<repl>: error: {}", diagnostic.message),
            }
        }
        return;
    }

    if state.show_ast {
        println!("Declarations: {}", program.declarations.len());
    }

    state.checker.check(&program);
    let diagnostics = state.checker.take_diagnostics();
    if diagnostics.has_errors() {
        for diagnostic in diagnostics.entries() {
            match diagnostic.location {
                Some(location) => eprintln!(
                    "<repl>:{}:{}: error: {}",
                    location.line, location.column, diagnostic.message
                ),
                None => eprintln!("<repl>: error: {}", diagnostic.message),
            }
        }
        return;
    }

    if state.show_ir {
        let (ir, lower_diagnostics) = Lowerer::new(&state.checker).lower(&program);
        if lower_diagnostics.has_errors() {
            for diagnostic in lower_diagnostics.entries() {
                eprintln!("<repl>: error: {}", diagnostic.message);
            }
        } else {
            print!("{ir}");
        }
    }
}
