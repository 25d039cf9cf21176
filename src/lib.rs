pub mod ast;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::ast::Program;

pub use config::RunConfig;
pub use error::{Error, ErrorKind, Result};
pub use interpreter::{
    FsModuleLoader, Interpreter, InterpreterError, MemoryModuleLoader, ModuleLoader,
};

/// Lexes and parses `source` without evaluating it.
pub fn parse_source(source: &str) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    debug!(tokens = tokens.len(), "lexed source");
    let program = parser::parse_tokens(tokens)?;
    debug!(statements = program.statements.len(), "parsed program");
    Ok(program)
}

/// Runs in-memory source and returns the finalized output buffer. Modules
/// resolve against `config.module_dir`, or the working directory.
pub fn run_source(source: &str, config: &RunConfig) -> Result<String> {
    run_with_entry(source, config, None)
}

/// Runs the program at `path`; modules resolve next to it unless
/// `config.module_dir` says otherwise.
pub fn run_file(path: &Path, config: &RunConfig) -> Result<String> {
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    run_with_entry(&source, config, Some(path))
}

fn run_with_entry(source: &str, config: &RunConfig, entry: Option<&Path>) -> Result<String> {
    let program = parse_source(source)?;
    let loader = FsModuleLoader::new(
        config.module_dir_for(entry),
        config.module_suffix.as_str(),
    );
    let mut interpreter = Interpreter::new(config.clone(), Box::new(loader));
    Ok(interpreter.run(&program)?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use indoc::indoc;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pasmhon-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn runs_source_to_output_buffer() {
        let output = run_source("print(1+2*3)\nprint(\"a\", 2)\n", &RunConfig::default())
            .expect("run failed");
        assert_eq!(output, "7\na 2\n");
    }

    #[test]
    fn same_source_twice_gives_identical_output() {
        let source = indoc! {"
            class P:
                def __init__(self, v):
                    self.v = v
            xs = []
            for i in range(3):
                xs.append(P(i).v * 2)
            print(xs)
        "};
        let config = RunConfig::default();
        let first = run_source(source, &config).expect("first run failed");
        let second = run_source(source, &config).expect("second run failed");
        assert_eq!(first, "[0, 2, 4]\n");
        assert_eq!(first, second);
    }

    #[test]
    fn errors_carry_their_kind_in_the_message() {
        let config = RunConfig::default();

        let error = run_source("x = \"open\n", &config).expect_err("expected lex error");
        assert_eq!(error.kind(), ErrorKind::Syntax);
        assert!(error.to_string().starts_with("SyntaxError: "));

        let error = run_source("if x\n", &config).expect_err("expected parse error");
        assert_eq!(error.kind(), ErrorKind::Syntax);

        let error = run_source("print(y)\n", &config).expect_err("expected name error");
        assert_eq!(error.kind(), ErrorKind::Name);
        assert_eq!(error.to_string(), "NameError: name 'y' is not defined");

        let error = run_source("print(\"a\" - 1)\n", &config).expect_err("expected runtime error");
        assert_eq!(error.kind(), ErrorKind::Runtime);
        assert!(error.to_string().starts_with("RuntimeError: "));
    }

    #[test]
    fn duplicate_parameters_never_reach_the_evaluator() {
        let source = indoc! {"
            def f(a, a):
                return a
            print(f(1, 2))
            print(f(1, 2))
            print(f(1, 2))
        "};
        let config = RunConfig {
            specialize_threshold: 1,
            ..RunConfig::default()
        };
        let error = run_source(source, &config).expect_err("expected syntax error");
        assert_eq!(error.kind(), ErrorKind::Syntax);
        assert_eq!(
            error.to_string(),
            "SyntaxError: Duplicate parameter 'a' at line 1, column 9"
        );
    }

    #[test]
    fn run_file_resolves_modules_next_to_the_entry() {
        let dir = scratch_dir("entry");
        fs::write(dir.join("helper.pa"), "def triple(n):\n    return n * 3\n")
            .expect("write module");
        let entry = dir.join("main.pa");
        fs::write(&entry, "import helper\nprint(helper.triple(4))\n").expect("write entry");

        let output = run_file(&entry, &RunConfig::default()).expect("run failed");
        assert_eq!(output, "12\n");

        fs::remove_dir_all(&dir).expect("remove scratch dir");
    }

    #[test]
    fn configured_module_dir_and_suffix_win() {
        let dir = scratch_dir("config");
        fs::write(dir.join("lib.src"), "answer = 42\n").expect("write module");
        let config = RunConfig {
            module_suffix: ".src".to_string(),
            module_dir: Some(dir.clone()),
            ..RunConfig::default()
        };

        let output = run_source("import lib\nprint(lib.answer)\n", &config).expect("run failed");
        assert_eq!(output, "42\n");

        fs::remove_dir_all(&dir).expect("remove scratch dir");
    }

    #[test]
    fn missing_entry_file_is_an_io_error() {
        let error = run_file(Path::new("/nonexistent/pasmhon/main.pa"), &RunConfig::default())
            .expect_err("expected io error");
        assert!(matches!(error, Error::Io { .. }));
        assert_eq!(error.kind(), ErrorKind::Runtime);
    }
}
