use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Everything that can abort the compilation pipeline. Each stage is fatal:
/// there is no recovery, only a diagnostic pointing at the cause.
#[derive(Debug)]
pub enum CompileError {
    /// An `#include`d file could not be read.
    Include { path: PathBuf, source: io::Error },

    // Lexical errors.
    UnexpectedChar { ch: char, line: u32, col: u32 },
    UnterminatedString { line: u32, col: u32 },
    UnexpectedClosingParen { line: u32, col: u32 },
    UnbalancedParens,
    IntOutOfRange { literal: String, line: u32, col: u32 },

    // Syntactic errors.
    UnexpectedToken {
        found: String,
        expected: String,
        line: u32,
        col: u32,
    },
    UnexpectedEof { line: u32, col: u32 },
    GlobalOnly {
        construct: &'static str,
        line: u32,
        col: u32,
    },

    // Semantic errors.
    DuplicateBuffer {
        identifier: String,
        line: u32,
        col: u32,
    },

    // Linking errors.
    UnresolvedLabel { label: String },
    UnresolvedData { identifier: String },
    DuplicateData { identifier: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Include { path, source } => {
                write!(f, "failed to include \"{}\": {}", path.display(), source)
            }
            CompileError::UnexpectedChar { ch, line, col } => {
                write!(f, "unexpected character '{}' at line {} col {}", ch, line, col)
            }
            CompileError::UnterminatedString { line, col } => write!(
                f,
                "unexpected line break inside string literal at line {} col {}",
                line, col
            ),
            CompileError::UnexpectedClosingParen { line, col } => write!(
                f,
                "unexpected closing parenthesis at line {} col {}",
                line, col
            ),
            CompileError::UnbalancedParens => write!(f, "unexpected EOF, unbalanced parentheses"),
            CompileError::IntOutOfRange { literal, line, col } => write!(
                f,
                "integer literal {} at line {} col {} does not fit in 32 bits",
                literal, line, col
            ),
            CompileError::UnexpectedToken {
                found,
                expected,
                line,
                col,
            } => write!(
                f,
                "unexpected token {} at line {} col {}, expected {}",
                found, line, col, expected
            ),
            CompileError::UnexpectedEof { line, col } => {
                write!(f, "unexpected EOF reached at line {} col {}", line, col)
            }
            CompileError::GlobalOnly { construct, line, col } => write!(
                f,
                "unexpected {} at line {} col {}, {} is only allowed in the global scope",
                construct, line, col, construct
            ),
            CompileError::DuplicateBuffer { identifier, line, col } => write!(
                f,
                "buffer {} at line {} col {} is already declared",
                identifier, line, col
            ),
            CompileError::UnresolvedLabel { label } => {
                write!(f, "unresolved instruction label {}", label)
            }
            CompileError::UnresolvedData { identifier } => {
                write!(f, "unresolved data identifier {}", identifier)
            }
            CompileError::DuplicateData { identifier } => {
                write!(f, "duplicate data identifier {}", identifier)
            }
        }
    }
}

impl StdError for CompileError {}
