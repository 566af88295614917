//! Compiler for the lisq language targeting the COMP-3 toy computer.
//!
//! The entry point is [`compile`](fn.compile.html), which runs the whole
//! pipeline: `#include` expansion, lexing, parsing, code generation and
//! stub resolution, producing a [`Program`](../isa/struct.Program.html)
//! image ready for the machine. Compilation is a pure function of its
//! inputs: the same source always yields a byte-identical image.

pub mod ast;
pub mod codegen;
pub mod labels;
pub mod lexer;
pub mod parser;
pub mod preprocess;

mod error;

pub use crate::error::CompileError;

use isa::Program;
use std::path::Path;

/// Compiles preprocessed source text (no `#include` handling).
pub fn compile_source(source: &str) -> Result<Program, CompileError> {
    let tokens = lexer::lex(source)?;
    let nodes = parser::parse(tokens)?;
    let unit = codegen::CodeGen::new().compile(&nodes)?;
    let instructions = labels::resolve(unit.instructions, &unit.data_memory)?;

    Ok(Program {
        instructions,
        data_memory: unit.data_memory,
    })
}

/// Runs the full pipeline. `base_dir` anchors relative `#include` paths,
/// normally the directory of the source file.
pub fn compile(source: &str, base_dir: &Path) -> Result<Program, CompileError> {
    let source = preprocess::process_includes(source, base_dir)?;
    compile_source(&source)
}
