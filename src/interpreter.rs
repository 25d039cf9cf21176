//! Tree-walking evaluator.
//!
//! Execution pipeline:
//! `Interpreter::run` -> `exec_top_level` -> `exec_block` -> `exec_statement`
//! -> `eval_expression` -> `call_function` -> `exec_block` (function body).

use crate::ast::Program;
use crate::config::RunConfig;

mod builtins;
mod class;
mod dict;
mod environment;
mod error;
mod module;
mod operators;
mod runtime;
mod specializer;
mod value;

pub use error::InterpreterError;
pub use module::{FsModuleLoader, MemoryModuleLoader, ModuleLoader};

use environment::{Environment, ScopeKind};
use error::Unwind;
use module::ModuleCache;
use runtime::InterpreterRuntime;

/// One evaluation session. Modules imported during any run of the session
/// are cached and shared by later runs.
pub struct Interpreter {
    config: RunConfig,
    modules: ModuleCache,
}

impl Interpreter {
    pub fn new(config: RunConfig, loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            config,
            modules: ModuleCache::new(loader),
        }
    }

    /// Evaluates `program` in a fresh global scope and returns everything it
    /// printed. On failure nothing printed by the program is returned.
    pub fn run(&mut self, program: &Program) -> Result<String, InterpreterError> {
        let globals = Environment::new(ScopeKind::Module);
        let mut runtime = InterpreterRuntime {
            config: &self.config,
            modules: &mut self.modules,
            output: String::new(),
        };
        match runtime.exec_top_level(&program.statements, &globals) {
            Ok(()) => Ok(runtime.output),
            Err(Unwind::Error(error)) => Err(error),
            Err(Unwind::Raised(value)) => Err(InterpreterError::UncaughtRaise {
                value: value.repr(),
            }),
        }
    }
}
