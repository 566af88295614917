//! Instruction set and program image format shared by the COMP-3 compiler
//! and the [machine](../comp3/index.html).
//!
//! A compiled program is stored on disk as a JSON document with two arrays:
//! `instructions` and `data_memory`. The functions [`read`](fn.read.html) and
//! [`write`](fn.write.html) (de)serialize that image, and
//! [`read_file`](fn.read_file.html) / [`write_file`](fn.write_file.html) are
//! convenience wrappers operating on paths.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Address the machine maps to the input side of the character port.
/// `LD` with an address operand of this value consumes one input character.
pub const IO_READ_ADDRESS: u32 = 42;

/// Address the machine maps to the output side of the character port.
/// `ST` with an address operand of this value appends one output byte.
pub const IO_WRITE_ADDRESS: u32 = 69;

/// Processor instruction set.
///
///  Mnemonic | Name                 | Effect
/// ----------|----------------------|--------------------------------------------
/// `ADD`     | Add                  | `AC = AC + operand`
/// `SUB`     | Subtract             | `AC = AC - operand`
/// `AND`     | Bitwise and          | `AC = AC & operand`
/// `OR`      | Bitwise or           | `AC = AC \| operand`
/// `SHL`     | Shift left logical   | `AC = AC << operand`
/// `SHR`     | Shift right logical  | `AC = AC >> operand`
/// `LD`      | Load                 | `AC = operand`
/// `ST`      | Store                | `MEM[addr] = AC`
/// `PUSH`    | Push                 | `SP -= 1; MEM[SP] = AC`
/// `POP`     | Pop                  | `SP += 1`
/// `CMP`     | Compare              | flags of `AC - operand`, `AC` unchanged
/// `JZ`      | Jump if zero         | `PC = operand` if `Z`
/// `JNZ`     | Jump if not zero     | `PC = operand` if `!Z`
/// `JA`      | Jump if above        | `PC = operand` if `!N && !Z`
/// `JAE`     | Jump if above/equal  | `PC = operand` if `!N`
/// `JB`      | Jump if below        | `PC = operand` if `N && !Z`
/// `JBE`     | Jump if below/equal  | `PC = operand` if `N`
/// `JMP`     | Jump                 | `PC = operand`
/// `HLT`     | Halt                 | stops the machine
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpCode {
    Add,
    Sub,
    And,
    Or,
    Shl,
    Shr,
    Ld,
    St,
    Push,
    Pop,
    Cmp,
    Jz,
    Jnz,
    Ja,
    Jae,
    Jb,
    Jbe,
    Jmp,
    Hlt,
}

impl OpCode {
    pub fn as_str(self) -> &'static str {
        match self {
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Ld => "LD",
            OpCode::St => "ST",
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Cmp => "CMP",
            OpCode::Jz => "JZ",
            OpCode::Jnz => "JNZ",
            OpCode::Ja => "JA",
            OpCode::Jae => "JAE",
            OpCode::Jb => "JB",
            OpCode::Jbe => "JBE",
            OpCode::Jmp => "JMP",
            OpCode::Hlt => "HLT",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an instruction's operand is interpreted by the machine.
///
/// The pointer variants add one level of indirection through data memory;
/// the stack variants are offsets from the current stack top (0 = top).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandType {
    Immediate,
    Address,
    PointerAddress,
    StackOffset,
    PointerStackOffset,
    NoOperand,
}

impl OperandType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperandType::Immediate => "immediate",
            OperandType::Address => "address",
            OperandType::PointerAddress => "pointer_address",
            OperandType::StackOffset => "stack_offset",
            OperandType::PointerStackOffset => "pointer_stack_offset",
            OperandType::NoOperand => "no_operand",
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One machine instruction of the program image.
///
/// `instr_index` is the instruction's own address, filled in when symbolic
/// references are resolved. `comment` is advisory output from the compiler
/// and has no effect on execution.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub instr_index: u32,
    pub op_code: OpCode,
    pub operand_type: OperandType,
    pub operand: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// One word of initialized data memory. The identifier names the first
/// word of a string literal or of a reserved buffer.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DataWord {
    pub value: u32,
    #[serde(default)]
    pub identifier: Option<String>,
}

/// A fully resolved program image: the long-lived artifact passed from the
/// compiler to the machine.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub data_memory: Vec<DataWord>,
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{}", err),
            Error::Json(err) => write!(f, "invalid program image: {}", err),
        }
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

pub fn read<R: Read>(reader: &mut R) -> Result<Program, Error> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn write<W: Write>(writer: &mut W, program: &Program) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *writer, program)?;
    writer.write_all(b"\n")?;
    Ok(())
}

pub trait ReadImageExt: Read + Sized {
    fn read_image(&mut self) -> Result<Program, Error> {
        read(self)
    }
}

impl<R: Read + Sized> ReadImageExt for R {}

pub trait WriteImageExt: Write + Sized {
    fn write_image(&mut self, program: &Program) -> Result<(), Error> {
        write(self, program)
    }
}

impl<W: Write + Sized> WriteImageExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Program, Error> {
    BufReader::new(File::open(path)?).read_image()
}

pub fn write_file<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), Error> {
    BufWriter::new(File::create(path)?).write_image(program)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_program() -> Program {
        Program {
            instructions: vec![
                Instruction {
                    instr_index: 0,
                    op_code: OpCode::Ld,
                    operand_type: OperandType::Immediate,
                    operand: 53,
                    comment: String::from("load 53"),
                },
                Instruction {
                    instr_index: 1,
                    op_code: OpCode::St,
                    operand_type: OperandType::Address,
                    operand: IO_WRITE_ADDRESS,
                    comment: String::new(),
                },
                Instruction {
                    instr_index: 2,
                    op_code: OpCode::Hlt,
                    operand_type: OperandType::NoOperand,
                    operand: 0,
                    comment: String::new(),
                },
            ],
            data_memory: vec![
                DataWord {
                    value: 104,
                    identifier: Some(String::from("hi")),
                },
                DataWord {
                    value: 0,
                    identifier: None,
                },
            ],
        }
    }

    #[test]
    fn roundtrip_through_buffer() {
        let program = sample_program();

        let mut buffer = Vec::new();
        write(&mut buffer, &program).unwrap();
        let read_back = read(&mut &buffer[..]).unwrap();

        assert_eq!(program, read_back);
    }

    #[test]
    fn opcode_spelling() {
        let json = serde_json::to_string(&OpCode::Jnz).unwrap();
        assert_eq!(json, "\"JNZ\"");

        let json = serde_json::to_string(&OperandType::PointerStackOffset).unwrap();
        assert_eq!(json, "\"pointer_stack_offset\"");
    }

    #[test]
    fn comment_omitted_when_empty() {
        let program = sample_program();
        let text = serde_json::to_string(&program).unwrap();

        assert!(text.contains("\"comment\":\"load 53\""));
        assert!(!text.contains("\"comment\":\"\""));
    }

    #[test]
    fn deterministic_serialization() {
        let program = sample_program();

        let mut first = Vec::new();
        let mut second = Vec::new();
        write(&mut first, &program).unwrap();
        write(&mut second, &program).unwrap();

        assert_eq!(first, second);
    }
}
