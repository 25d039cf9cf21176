#![allow(dead_code)]
use std::fs;
use std::path::{Path, PathBuf};

use pasmhon::ast::Program;

pub fn workloads() -> Vec<(String, PathBuf)> {
    test_support::bench_workloads(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load bench workloads: {err}"))
}

pub fn load_source(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}

pub fn load_program(path: &Path) -> Program {
    let source = load_source(path);
    pasmhon::parse_source(&source).unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
}
