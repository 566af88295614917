//! Lowers the AST to the stack-oriented instruction stream.
//!
//! Every expression leaves its result in the accumulator; local variables
//! live on the downward-growing runtime stack. The generator mirrors the
//! machine stack with a compile-time shadow stack of identifiers, which is
//! how variable references become stack offsets (0 = top). Forward
//! references are emitted as stubs carrying symbolic ids and resolved by
//! [`labels::resolve`](../labels/fn.resolve.html) in a second linear pass.

use crate::ast::{Ast, MathOp};
use crate::error::CompileError;
use isa::{DataWord, OpCode, OperandType, IO_READ_ADDRESS, IO_WRITE_ADDRESS};
use matches::debug_assert_matches;
use std::fmt;

/// Symbolic reference to an instruction: either a generated id or a
/// function name (identifiers double as instruction labels).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum StubId {
    Auto(u32),
    Name(String),
}

impl fmt::Display for StubId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StubId::Auto(id) => write!(f, "__stub_{}", id),
            StubId::Name(name) => f.write_str(name),
        }
    }
}

/// What still needs to be patched into an instruction's operand.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Stub {
    /// Operand is final.
    None,
    /// Operand becomes the address of a data-memory identifier.
    Data { identifier: String },
    /// Operand becomes the address of a labeled instruction plus a small
    /// offset, so a stub can target "the instruction after label X".
    Instr { target: StubId, offset: u32 },
}

/// An instruction as emitted by the generator: possibly a stub, possibly
/// carrying labels other stubs refer to.
#[derive(Clone, Debug)]
pub struct EmittedInstr {
    pub op_code: OpCode,
    pub operand_type: OperandType,
    pub operand: u32,
    pub comment: String,
    pub labels: Vec<StubId>,
    pub stub: Stub,
}

/// Output of code generation, still containing stubs.
#[derive(Debug)]
pub struct CompiledUnit {
    pub instructions: Vec<EmittedInstr>,
    pub data_memory: Vec<DataWord>,
}

pub struct CodeGen {
    program: Vec<EmittedInstr>,
    /// Compile-time mirror of the machine stack within the current frame;
    /// `None` marks an anonymous slot. Its length always equals the
    /// machine stack depth.
    stack_identifiers: Vec<Option<String>>,
    /// String literals in discovery order, each stored once.
    string_literals: Vec<String>,
    /// Reserved buffers in declaration order.
    buffers: Vec<(String, u32)>,
    stub_counter: u32,
}

fn alu_opcode(op: MathOp) -> OpCode {
    match op {
        MathOp::Add => OpCode::Add,
        MathOp::Sub => OpCode::Sub,
        MathOp::And => OpCode::And,
        MathOp::Or => OpCode::Or,
        MathOp::Shl => OpCode::Shl,
        MathOp::Shr => OpCode::Shr,
        _ => unreachable!("comparison has no ALU opcode"),
    }
}

fn branch_opcode(op: MathOp) -> OpCode {
    match op {
        MathOp::Eq => OpCode::Jz,
        MathOp::Ne => OpCode::Jnz,
        MathOp::Lt => OpCode::Jb,
        MathOp::Le => OpCode::Jbe,
        MathOp::Gt => OpCode::Ja,
        MathOp::Ge => OpCode::Jae,
        _ => unreachable!("arithmetic op has no branch opcode"),
    }
}

impl CodeGen {
    pub fn new() -> CodeGen {
        CodeGen {
            program: Vec::new(),
            stack_identifiers: Vec::new(),
            string_literals: Vec::new(),
            buffers: Vec::new(),
            stub_counter: 0,
        }
    }

    /// Compiles the whole program: global declarations first, then
    /// top-level code, then the single trailing `HLT`.
    pub fn compile(mut self, nodes: &[Ast]) -> Result<CompiledUnit, CompileError> {
        for node in nodes.iter().filter(|node| node.is_global_decl()) {
            self.compile_node(node)?;
        }
        for node in nodes.iter().filter(|node| !node.is_global_decl()) {
            self.compile_node(node)?;
        }
        self.emit(OpCode::Hlt, OperandType::NoOperand, 0, "");

        debug_assert!(self.stack_identifiers.is_empty());

        let data_memory = build_data_memory(&self.string_literals, &self.buffers);

        Ok(CompiledUnit {
            instructions: self.program,
            data_memory,
        })
    }

    fn next_stub(&mut self) -> StubId {
        self.stub_counter += 1;
        StubId::Auto(self.stub_counter)
    }

    fn emit(&mut self, op_code: OpCode, operand_type: OperandType, operand: u32, comment: &str) {
        self.program.push(EmittedInstr {
            op_code,
            operand_type,
            operand,
            comment: comment.to_string(),
            labels: Vec::new(),
            stub: Stub::None,
        });
    }

    fn emit_data_stub(
        &mut self,
        op_code: OpCode,
        operand_type: OperandType,
        identifier: &str,
        comment: &str,
    ) {
        self.program.push(EmittedInstr {
            op_code,
            operand_type,
            operand: 0,
            comment: comment.to_string(),
            labels: Vec::new(),
            stub: Stub::Data {
                identifier: identifier.to_string(),
            },
        });
    }

    fn emit_instr_stub(
        &mut self,
        op_code: OpCode,
        operand_type: OperandType,
        target: StubId,
        offset: u32,
        comment: &str,
    ) {
        self.program.push(EmittedInstr {
            op_code,
            operand_type,
            operand: 0,
            comment: comment.to_string(),
            labels: Vec::new(),
            stub: Stub::Instr { target, offset },
        });
    }

    fn label_last(&mut self, id: StubId) {
        let last = self
            .program
            .last_mut()
            .expect("labeling before any instruction was emitted");
        last.labels.push(id);
    }

    /// Offset of the most recent binding of `identifier` from the stack
    /// top, or `None` when the name is not a local.
    fn stack_offset(&self, identifier: &str) -> Option<u32> {
        self.stack_identifiers
            .iter()
            .rev()
            .position(|slot| slot.as_deref() == Some(identifier))
            .map(|position| position as u32)
    }

    fn compile_node(&mut self, node: &Ast) -> Result<(), CompileError> {
        match node {
            Ast::IntLiteral { value, .. } => {
                self.emit(OpCode::Ld, OperandType::Immediate, *value, "");
            }

            Ast::StringLiteral { value, .. } => {
                if !self.string_literals.contains(value) {
                    self.string_literals.push(value.clone());
                }
                self.emit_data_stub(
                    OpCode::Ld,
                    OperandType::Immediate,
                    value,
                    &format!("address of \"{}\"", value),
                );
            }

            Ast::LoadById { identifier, .. } => match self.stack_offset(identifier) {
                Some(offset) => {
                    self.emit(
                        OpCode::Ld,
                        OperandType::StackOffset,
                        offset,
                        &format!("load {}", identifier),
                    );
                }
                None => {
                    // Unknown names become data stubs; an identifier that
                    // is neither a local nor declared data fails at link
                    // time with its name in the diagnostic.
                    self.emit_data_stub(
                        OpCode::Ld,
                        OperandType::Address,
                        identifier,
                        &format!("load {}", identifier),
                    );
                }
            },

            Ast::LoadByPtrId { identifier, .. } => match self.stack_offset(identifier) {
                Some(offset) => {
                    self.emit(
                        OpCode::Ld,
                        OperandType::PointerStackOffset,
                        offset,
                        &format!("load @{}", identifier),
                    );
                }
                None => {
                    self.emit_data_stub(
                        OpCode::Ld,
                        OperandType::PointerAddress,
                        identifier,
                        &format!("load @{}", identifier),
                    );
                }
            },

            Ast::Let { vars, body, .. } => {
                for var in vars {
                    self.compile_node(&var.value)?;
                    self.emit(
                        OpCode::Push,
                        OperandType::NoOperand,
                        0,
                        &format!("let {}", var.identifier),
                    );
                    self.stack_identifiers.push(Some(var.identifier.clone()));
                }

                for expr in body {
                    self.compile_node(expr)?;
                }

                for var in vars.iter().rev() {
                    let popped = self.stack_identifiers.pop();
                    debug_assert_matches!(
                        popped,
                        Some(Some(ref id)) if *id == var.identifier
                    );
                    self.emit(
                        OpCode::Pop,
                        OperandType::NoOperand,
                        0,
                        &format!("drop {}", var.identifier),
                    );
                }
            }

            Ast::Set { identifier, value, .. } => {
                self.compile_node(value)?;
                match self.stack_offset(identifier) {
                    Some(offset) => {
                        self.emit(
                            OpCode::St,
                            OperandType::StackOffset,
                            offset,
                            &format!("store {}", identifier),
                        );
                    }
                    None => {
                        self.emit_data_stub(
                            OpCode::St,
                            OperandType::Address,
                            identifier,
                            &format!("store {}", identifier),
                        );
                    }
                }
            }

            Ast::SetPtr { identifier, value, .. } => {
                self.compile_node(value)?;
                match self.stack_offset(identifier) {
                    Some(offset) => {
                        self.emit(
                            OpCode::St,
                            OperandType::PointerStackOffset,
                            offset,
                            &format!("store @{}", identifier),
                        );
                    }
                    None => {
                        self.emit_data_stub(
                            OpCode::St,
                            OperandType::PointerAddress,
                            identifier,
                            &format!("store @{}", identifier),
                        );
                    }
                }
            }

            Ast::GetChar { .. } => {
                self.emit(
                    OpCode::Ld,
                    OperandType::Address,
                    IO_READ_ADDRESS,
                    "read char",
                );
            }

            Ast::PutChar { value, .. } => {
                self.compile_node(value)?;
                self.emit(
                    OpCode::St,
                    OperandType::Address,
                    IO_WRITE_ADDRESS,
                    "write char",
                );
            }

            Ast::Math { op, left, right, .. } => {
                let end = self.next_stub();

                // Right operand first, parked on the stack, so the left
                // operand ends up in AC for the two-operand instruction.
                self.compile_node(right)?;
                self.emit(OpCode::Push, OperandType::NoOperand, 0, "");
                self.stack_identifiers.push(None);
                self.compile_node(left)?;

                if op.is_comparison() {
                    self.emit(OpCode::Cmp, OperandType::StackOffset, 0, "");
                    self.emit(OpCode::Ld, OperandType::Immediate, 1, "");
                    self.emit_instr_stub(
                        branch_opcode(*op),
                        OperandType::Address,
                        end.clone(),
                        0,
                        "",
                    );
                    self.emit(OpCode::Ld, OperandType::Immediate, 0, "");
                } else {
                    self.emit(alu_opcode(*op), OperandType::StackOffset, 0, "");
                }

                // The POP both drops the right operand and serves as the
                // landing point for the comparison's taken branch.
                self.emit(OpCode::Pop, OperandType::NoOperand, 0, "");
                self.label_last(end);

                let popped = self.stack_identifiers.pop();
                debug_assert_matches!(popped, Some(None));
            }

            Ast::If {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                self.compile_node(condition)?;
                self.emit(OpCode::Cmp, OperandType::Immediate, 0, "if condition");

                match else_expr {
                    None => {
                        let end = self.next_stub();
                        self.emit_instr_stub(OpCode::Jz, OperandType::Address, end.clone(), 1, "");
                        self.compile_node(then_expr)?;
                        self.label_last(end);
                    }
                    Some(else_expr) => {
                        let false_label = self.next_stub();
                        let end = self.next_stub();
                        self.emit_instr_stub(
                            OpCode::Jz,
                            OperandType::Address,
                            false_label.clone(),
                            1,
                            "",
                        );
                        self.compile_node(then_expr)?;
                        self.emit_instr_stub(OpCode::Jmp, OperandType::Address, end.clone(), 1, "");
                        self.label_last(false_label);
                        self.compile_node(else_expr)?;
                        self.label_last(end);
                    }
                }
            }

            Ast::LoopWhile { condition, body, .. } => {
                let start = self.next_stub();
                let end = self.next_stub();

                let condition_index = self.program.len();
                self.compile_node(condition)?;
                self.program[condition_index].labels.push(start.clone());

                self.emit(OpCode::Cmp, OperandType::Immediate, 0, "loop condition");
                self.emit_instr_stub(OpCode::Jz, OperandType::Address, end.clone(), 1, "exit loop");

                for expr in body {
                    self.compile_node(expr)?;
                }

                self.emit_instr_stub(OpCode::Jmp, OperandType::Address, start, 0, "repeat loop");
                self.label_last(end);
            }

            Ast::Func {
                identifier,
                params,
                body,
                ..
            } => {
                // Function bodies sit in the global region before the entry
                // point; each opens with a jump over itself so startup
                // control falls through to the top-level code.
                let skip = self.next_stub();
                self.emit_instr_stub(
                    OpCode::Jmp,
                    OperandType::Address,
                    skip.clone(),
                    1,
                    &format!("skip over {}", identifier),
                );

                let entry_index = self.program.len();

                // The caller pushes the return address, then the arguments
                // in order; mirror that frame on the shadow stack.
                self.stack_identifiers.push(None);
                for param in params {
                    self.stack_identifiers.push(Some(param.clone()));
                }

                for expr in body {
                    self.compile_node(expr)?;
                }

                self.emit(
                    OpCode::Jmp,
                    OperandType::PointerStackOffset,
                    params.len() as u32,
                    &format!("return from {}", identifier),
                );
                self.label_last(skip);

                self.program[entry_index]
                    .labels
                    .push(StubId::Name(identifier.clone()));

                // No machine POPs here: the caller owns the frame. Only the
                // shadow stack unwinds.
                for param in params.iter().rev() {
                    let popped = self.stack_identifiers.pop();
                    debug_assert_matches!(popped, Some(Some(ref id)) if id == param);
                }
                let popped = self.stack_identifiers.pop();
                debug_assert_matches!(popped, Some(None));
            }

            Ast::FuncCall {
                identifier, args, ..
            } => {
                let ret = self.next_stub();

                self.emit_instr_stub(
                    OpCode::Ld,
                    OperandType::Immediate,
                    ret.clone(),
                    1,
                    &format!("return address for {}", identifier),
                );
                self.emit(OpCode::Push, OperandType::NoOperand, 0, "push return address");
                self.stack_identifiers.push(None);

                for arg in args {
                    self.compile_node(arg)?;
                    self.emit(OpCode::Push, OperandType::NoOperand, 0, "push argument");
                    self.stack_identifiers.push(None);
                }

                self.emit_instr_stub(
                    OpCode::Jmp,
                    OperandType::Address,
                    StubId::Name(identifier.clone()),
                    0,
                    &format!("call {}", identifier),
                );
                self.label_last(ret);

                for _ in args {
                    self.emit(OpCode::Pop, OperandType::NoOperand, 0, "drop argument");
                    let popped = self.stack_identifiers.pop();
                    debug_assert_matches!(popped, Some(None));
                }
                self.emit(OpCode::Pop, OperandType::NoOperand, 0, "drop return address");
                let popped = self.stack_identifiers.pop();
                debug_assert_matches!(popped, Some(None));
            }

            Ast::StrAlloc {
                start,
                identifier,
                size,
                ..
            } => {
                if self.buffers.iter().any(|(id, _)| id == identifier) {
                    return Err(CompileError::DuplicateBuffer {
                        identifier: identifier.clone(),
                        line: start.line,
                        col: start.col,
                    });
                }
                self.buffers.push((identifier.clone(), *size));
            }

            Ast::MultiExpr { exprs, .. } => {
                for expr in exprs {
                    self.compile_node(expr)?;
                }
            }
        }

        Ok(())
    }
}

/// Lays out data memory: every string literal as its characters followed by
/// a 0 terminator, then every buffer as zero words. The first word of each
/// region carries the identifier (for literals, the text itself).
fn build_data_memory(string_literals: &[String], buffers: &[(String, u32)]) -> Vec<DataWord> {
    let mut data = Vec::new();

    for literal in string_literals {
        let start = data.len();
        for ch in literal.chars() {
            data.push(DataWord {
                value: ch as u32,
                identifier: None,
            });
        }
        data.push(DataWord {
            value: 0,
            identifier: None,
        });
        data[start].identifier = Some(literal.clone());
    }

    for (identifier, size) in buffers {
        let start = data.len();
        for _ in 0..*size {
            data.push(DataWord {
                value: 0,
                identifier: None,
            });
        }
        if *size > 0 {
            data[start].identifier = Some(identifier.clone());
        }
    }

    data
}
