use anyhow::{bail, Result};

use crate::ast::Program;
use crate::checker::TypeChecker;
use crate::diagnostics::Diagnostics;
use crate::lexer::Lexer;
use crate::lower::Lowerer;
use crate::parser::Parser;
use crate::source::SourceFile;

#[derive(Debug, Default)]
pub struct CompileOptions {
    pub dump_tokens: bool,
}

/// A fully checked program plus the checker that annotated it; the lowerer
/// consumes both.
pub struct Compilation {
    pub program: Program,
    pub checker: TypeChecker,
}

impl Compilation {
    pub fn emit_ir(&self) -> Result<String> {
        let (ir, diagnostics) = Lowerer::new(&self.checker).lower(&self.program);
        if diagnostics.has_errors() {
            let messages = diagnostics
                .entries()
                .iter()
                .map(|diagnostic| diagnostic.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            bail!(messages);
        }
        Ok(ir)
    }
}

/// Drives the pipeline: lex, parse, check. Each phase accumulates
/// diagnostics; the pipeline halts at the first phase that reports an error
/// so later phases never see malformed input.
pub struct Compiler {
    diagnostics: Diagnostics,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            options,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn compile(&mut self, source: &SourceFile) -> Result<Compilation> {
        if self.options.dump_tokens {
            let mut lexer = Lexer::new(source);
            for token in lexer.tokenize_all() {
                println!("{token:?}");
            }
        }

        let lexer = Lexer::new(source);
        let mut parser = Parser::new(lexer, source.display_name());
        let program = parser.parse();
        let front_diagnostics = parser.into_diagnostics();
        let front_errors = front_diagnostics.has_errors();
        self.diagnostics.extend(front_diagnostics);
        if front_errors {
            bail!("Parsing failed");
        }

        let mut checker = TypeChecker::new();
        checker.check(&program);
        let type_errors = checker.has_errors();
        self.diagnostics.extend(checker.take_diagnostics());
        if type_errors {
            bail!("Type checking failed");
        }

        Ok(Compilation { program, checker })
    }
}
