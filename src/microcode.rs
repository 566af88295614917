//! The microcode table driving the machine.
//!
//! The table is a flat sequence of entries. A plain
//! [`MicroInstruction`](struct.MicroInstruction.html) carries mux selections
//! and latch enables for one cycle; a
//! [`BranchMicroInstruction`](struct.BranchMicroInstruction.html) redirects
//! the micro-PC when all of its guards hold. Entries may be labeled with an
//! alias, and branch targets are written symbolically;
//! [`resolve`](fn.resolve.html) rewrites every alias to an absolute index
//! before execution.

use crate::alu::AluOp;
use crate::datapath::{AluLopSel, AluRopSel, BrMuxSel, DataIoMuxSel, DataPath, DrMuxSel};
use crate::Error;
use isa::{OpCode, OperandType, IO_READ_ADDRESS, IO_WRITE_ADDRESS};
use std::collections::HashMap;
use std::fmt;

/// One cycle worth of register-transfer signals.
#[derive(Clone, Debug)]
pub struct MicroInstruction {
    pub alu_lop: AluLopSel,
    pub alu_rop: AluRopSel,
    pub data_io_mux: DataIoMuxSel,
    pub br_mux: BrMuxSel,
    pub dr_mux: DrMuxSel,
    pub alu_op: AluOp,

    pub latch_ac: bool,
    pub latch_br: bool,
    pub latch_ir: bool,
    pub latch_dr: bool,
    pub latch_ar: bool,
    pub latch_sp: bool,
    pub latch_pc: bool,
    pub latch_io: bool,
    pub latch_data: bool,
    pub latch_ps: bool,
    pub latch_hlt: bool,

    pub alias: Option<&'static str>,
}

impl Default for MicroInstruction {
    fn default() -> MicroInstruction {
        MicroInstruction {
            alu_lop: AluLopSel::Zero,
            alu_rop: AluRopSel::Zero,
            data_io_mux: DataIoMuxSel::Data,
            br_mux: BrMuxSel::Alu,
            dr_mux: DrMuxSel::Data,
            alu_op: AluOp::Add,
            latch_ac: false,
            latch_br: false,
            latch_ir: false,
            latch_dr: false,
            latch_ar: false,
            latch_sp: false,
            latch_pc: false,
            latch_io: false,
            latch_data: false,
            latch_ps: false,
            latch_hlt: false,
            alias: None,
        }
    }
}

/// A branch target inside the table: symbolic before
/// [`resolve`](fn.resolve.html), an absolute index afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BranchTarget {
    Alias(&'static str),
    Index(usize),
}

/// Redirects the micro-PC to `target` when every present guard holds.
/// An empty opcode/operand-type set and a `None` check are trivially true,
/// so a branch without guards is unconditional.
#[derive(Clone, Debug)]
pub struct BranchMicroInstruction {
    pub target: BranchTarget,

    pub check_op_code: &'static [OpCode],
    pub check_operand_type: &'static [OperandType],
    pub check_operand: Option<u32>,
    pub check_c: Option<bool>,
    pub check_n: Option<bool>,
    pub check_z: Option<bool>,

    pub alias: Option<&'static str>,
}

/// Unconditional branch to `target`; guards are added with struct update
/// syntax at the use site.
fn branch(target: &'static str) -> BranchMicroInstruction {
    BranchMicroInstruction {
        target: BranchTarget::Alias(target),
        check_op_code: &[],
        check_operand_type: &[],
        check_operand: None,
        check_c: None,
        check_n: None,
        check_z: None,
        alias: None,
    }
}

impl BranchMicroInstruction {
    /// Evaluates the guard conjunction against the current instruction
    /// register and status flags.
    pub fn taken(&self, datapath: &DataPath) -> bool {
        let ir = datapath.ir();
        let ps = datapath.ps();

        if !self.check_op_code.is_empty() && !self.check_op_code.contains(&ir.op_code) {
            return false;
        }
        if !self.check_operand_type.is_empty()
            && !self.check_operand_type.contains(&ir.operand_type)
        {
            return false;
        }
        if let Some(operand) = self.check_operand {
            if ir.operand != operand {
                return false;
            }
        }
        if let Some(c) = self.check_c {
            if ps.c != c {
                return false;
            }
        }
        if let Some(n) = self.check_n {
            if ps.n != n {
                return false;
            }
        }
        if let Some(z) = self.check_z {
            if ps.z != z {
                return false;
            }
        }

        true
    }
}

#[derive(Clone, Debug)]
pub enum MicroEntry {
    Plain(MicroInstruction),
    Branch(BranchMicroInstruction),
}

impl MicroEntry {
    pub fn alias(&self) -> Option<&'static str> {
        match self {
            MicroEntry::Plain(mi) => mi.alias,
            MicroEntry::Branch(bmi) => bmi.alias,
        }
    }
}

impl fmt::Display for MicroInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let alu = format!(
            "{:?} {:?} {:?}",
            self.alu_lop, self.alu_op, self.alu_rop
        );

        if self.latch_ac {
            write!(f, "AC <- {} ", alu)?;
        }
        if self.latch_br {
            match self.br_mux {
                BrMuxSel::Alu => write!(f, "BR <- {} ", alu)?,
                BrMuxSel::Pc => write!(f, "BR <- PC ")?,
            }
        }
        if self.latch_ir {
            write!(f, "IR <- INSTR_MEMORY ")?;
        }
        if self.latch_dr {
            match self.dr_mux {
                DrMuxSel::Alu => write!(f, "DR <- {} ", alu)?,
                DrMuxSel::Data => write!(f, "DR <- {:?} ", self.data_io_mux)?,
            }
        }
        if self.latch_ar {
            write!(f, "AR <- {} ", alu)?;
        }
        if self.latch_sp {
            write!(f, "SP <- {} ", alu)?;
        }
        if self.latch_pc {
            write!(f, "PC <- {} ", alu)?;
        }
        if self.latch_io {
            write!(f, "IO <- {} ", alu)?;
        }
        if self.latch_data {
            write!(f, "DATA <- {} ", alu)?;
        }
        if self.latch_ps {
            write!(f, "PS <- NZC({}) ", alu)?;
        }
        if self.latch_hlt {
            write!(f, "HLT ")?;
        }
        if let Some(alias) = self.alias {
            write!(f, "({})", alias)?;
        }

        Ok(())
    }
}

impl fmt::Display for BranchMicroInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.target {
            BranchTarget::Alias(alias) => write!(f, "JUMP TO {} IF ", alias)?,
            BranchTarget::Index(index) => write!(f, "JUMP TO {} IF ", index)?,
        }

        if !self.check_op_code.is_empty() {
            write!(f, "OP_CODE IN {:?} ", self.check_op_code)?;
        }
        if !self.check_operand_type.is_empty() {
            write!(f, "OPERAND_TYPE IN {:?} ", self.check_operand_type)?;
        }
        if let Some(operand) = self.check_operand {
            write!(f, "OPERAND = {} ", operand)?;
        }
        if let Some(c) = self.check_c {
            write!(f, "C = {} ", c)?;
        }
        if let Some(n) = self.check_n {
            write!(f, "N = {} ", n)?;
        }
        if let Some(z) = self.check_z {
            write!(f, "Z = {} ", z)?;
        }
        if let Some(alias) = self.alias {
            write!(f, "({})", alias)?;
        }

        Ok(())
    }
}

impl fmt::Display for MicroEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MicroEntry::Plain(mi) => mi.fmt(f),
            MicroEntry::Branch(bmi) => bmi.fmt(f),
        }
    }
}

/// Rewrites every symbolic branch target to an absolute table index.
/// A target naming an alias that no entry carries is a build error.
pub fn resolve(mut entries: Vec<MicroEntry>) -> Result<Vec<MicroEntry>, Error> {
    let mut alias_index: HashMap<&'static str, usize> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        if let Some(alias) = entry.alias() {
            alias_index.insert(alias, index);
        }
    }

    for (index, entry) in entries.iter_mut().enumerate() {
        if let MicroEntry::Branch(bmi) = entry {
            if let BranchTarget::Alias(alias) = bmi.target {
                match alias_index.get(alias) {
                    Some(&target) => bmi.target = BranchTarget::Index(target),
                    None => {
                        return Err(Error::UnresolvedAlias {
                            alias: alias.to_string(),
                            index,
                        })
                    }
                }
            }
        }
    }

    Ok(entries)
}

/// The COMP-3 runtime: instruction fetch, PC increment, operand fetch
/// dispatched on operand type, and an execute region dispatched on opcode.
/// Every instruction's path ends at `end`, which loops back to `start`.
pub fn standard_runtime() -> Vec<MicroEntry> {
    use self::MicroEntry::{Branch, Plain};

    let plain = MicroInstruction::default;

    vec![
        // Instruction fetch and PC increment.
        Plain(MicroInstruction {
            latch_ir: true,
            alias: Some("start"),
            ..plain()
        }),
        Plain(MicroInstruction {
            br_mux: BrMuxSel::Pc,
            latch_br: true,
            ..plain()
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Br,
            alu_op: AluOp::Inc,
            latch_pc: true,
            ..plain()
        }),
        // Opcodes that need no operand go straight to their handlers.
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Push],
            ..branch("push")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Pop],
            ..branch("pop")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Hlt],
            ..branch("hlt")
        }),
        // Operand fetch, dispatched on operand type.
        Branch(BranchMicroInstruction {
            check_operand_type: &[OperandType::PointerAddress],
            ..branch("fetch_pointer_address")
        }),
        Branch(BranchMicroInstruction {
            check_operand_type: &[OperandType::StackOffset, OperandType::PointerStackOffset],
            ..branch("fetch_stack_offset")
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ir,
            dr_mux: DrMuxSel::Alu,
            latch_dr: true,
            alias: Some("fetch_immediate_or_no_operand_or_address"),
            ..plain()
        }),
        Branch(BranchMicroInstruction {
            check_operand_type: &[OperandType::Address],
            ..branch("fetch_operand")
        }),
        Branch(branch("execute")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ir,
            latch_ar: true,
            alias: Some("fetch_pointer_address"),
            ..plain()
        }),
        Plain(MicroInstruction {
            latch_dr: true,
            ..plain()
        }),
        Branch(branch("fetch_operand")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ir,
            alu_rop: AluRopSel::Sp,
            dr_mux: DrMuxSel::Alu,
            latch_dr: true,
            alias: Some("fetch_stack_offset"),
            ..plain()
        }),
        Branch(BranchMicroInstruction {
            check_operand_type: &[OperandType::StackOffset],
            ..branch("fetch_operand")
        }),
        Plain(MicroInstruction {
            alu_rop: AluRopSel::Dr,
            latch_ar: true,
            ..plain()
        }),
        Plain(MicroInstruction {
            latch_dr: true,
            ..plain()
        }),
        Plain(MicroInstruction {
            alu_rop: AluRopSel::Dr,
            latch_ar: true,
            alias: Some("fetch_operand"),
            ..plain()
        }),
        // Execute region.
        Branch(BranchMicroInstruction {
            check_op_code: &[
                OpCode::Jz,
                OpCode::Jnz,
                OpCode::Jb,
                OpCode::Jbe,
                OpCode::Ja,
                OpCode::Jae,
                OpCode::Jmp,
            ],
            alias: Some("execute"),
            ..branch("jump_routing")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::St],
            ..branch("st")
        }),
        Branch(BranchMicroInstruction {
            check_operand_type: &[OperandType::Immediate, OperandType::NoOperand],
            ..branch("execute2")
        }),
        Branch(BranchMicroInstruction {
            check_operand: Some(IO_READ_ADDRESS),
            check_operand_type: &[OperandType::Address],
            ..branch("fetch_from_io")
        }),
        Plain(MicroInstruction {
            latch_dr: true,
            ..plain()
        }),
        Branch(branch("execute2")),
        Plain(MicroInstruction {
            data_io_mux: DataIoMuxSel::Io,
            latch_dr: true,
            alias: Some("fetch_from_io"),
            ..plain()
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Add],
            alias: Some("execute2"),
            ..branch("add")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Sub],
            ..branch("sub")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::And],
            ..branch("and")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Or],
            ..branch("or")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Shl],
            ..branch("shl")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Shr],
            ..branch("shr")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Cmp],
            ..branch("cmp")
        }),
        // Everything else falling through execute2 is LD.
        Plain(MicroInstruction {
            alu_rop: AluRopSel::Dr,
            latch_ac: true,
            alias: Some("ld"),
            ..plain()
        }),
        Branch(branch("end")),
        // ST, with the I/O write port special-cased by address.
        Branch(BranchMicroInstruction {
            check_operand: Some(IO_WRITE_ADDRESS),
            check_operand_type: &[OperandType::Address],
            alias: Some("st"),
            ..branch("st_to_io")
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            latch_data: true,
            ..plain()
        }),
        Branch(branch("end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            latch_io: true,
            alias: Some("st_to_io"),
            ..plain()
        }),
        Branch(branch("end")),
        // Two-operand math: result through BR, flags into PS, then AC.
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::Add,
            latch_br: true,
            latch_ps: true,
            alias: Some("add"),
            ..plain()
        }),
        Branch(branch("math_end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::Sub,
            latch_br: true,
            latch_ps: true,
            alias: Some("sub"),
            ..plain()
        }),
        Branch(branch("math_end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::And,
            latch_br: true,
            latch_ps: true,
            alias: Some("and"),
            ..plain()
        }),
        Branch(branch("math_end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::Or,
            latch_br: true,
            latch_ps: true,
            alias: Some("or"),
            ..plain()
        }),
        Branch(branch("math_end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::Shl,
            latch_br: true,
            latch_ps: true,
            alias: Some("shl"),
            ..plain()
        }),
        Branch(branch("math_end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::Shr,
            latch_br: true,
            latch_ps: true,
            alias: Some("shr"),
            ..plain()
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Br,
            latch_ac: true,
            alias: Some("math_end"),
            ..plain()
        }),
        Branch(branch("end")),
        // PUSH: decrement SP, store AC at the new top.
        Plain(MicroInstruction {
            alu_rop: AluRopSel::Sp,
            alu_op: AluOp::Dec,
            latch_br: true,
            alias: Some("push"),
            ..plain()
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Br,
            latch_sp: true,
            latch_ar: true,
            ..plain()
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            latch_data: true,
            ..plain()
        }),
        Branch(branch("end")),
        // POP: the word stays in memory, only SP moves.
        Plain(MicroInstruction {
            alu_rop: AluRopSel::Sp,
            latch_br: true,
            alias: Some("pop"),
            ..plain()
        }),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Br,
            alu_op: AluOp::Inc,
            latch_sp: true,
            ..plain()
        }),
        Branch(branch("end")),
        Plain(MicroInstruction {
            latch_hlt: true,
            alias: Some("hlt"),
            ..plain()
        }),
        Branch(branch("end")),
        Plain(MicroInstruction {
            alu_lop: AluLopSel::Ac,
            alu_rop: AluRopSel::Dr,
            alu_op: AluOp::Sub,
            latch_ps: true,
            alias: Some("cmp"),
            ..plain()
        }),
        Branch(branch("end")),
        // Conditional jump routing; JZ handles the final fallthrough row.
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Jnz],
            alias: Some("jump_routing"),
            ..branch("jnz")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Ja],
            ..branch("ja")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Jae],
            ..branch("jae")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Jbe],
            ..branch("jbe")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Jb],
            ..branch("jb")
        }),
        Branch(BranchMicroInstruction {
            check_op_code: &[OpCode::Jmp],
            ..branch("jmp")
        }),
        Branch(BranchMicroInstruction {
            check_z: Some(true),
            alias: Some("jz"),
            ..branch("jmp")
        }),
        Branch(branch("end")),
        Branch(BranchMicroInstruction {
            check_z: Some(false),
            alias: Some("jnz"),
            ..branch("jmp")
        }),
        Branch(branch("end")),
        Branch(BranchMicroInstruction {
            check_n: Some(false),
            alias: Some("jae"),
            ..branch("jmp")
        }),
        Branch(BranchMicroInstruction {
            check_n: Some(false),
            check_z: Some(false),
            alias: Some("ja"),
            ..branch("jmp")
        }),
        Branch(branch("end")),
        Branch(branch("end")),
        Branch(BranchMicroInstruction {
            check_n: Some(true),
            alias: Some("jbe"),
            ..branch("jmp")
        }),
        Branch(BranchMicroInstruction {
            check_n: Some(true),
            check_z: Some(false),
            alias: Some("jb"),
            ..branch("jmp")
        }),
        Branch(branch("end")),
        Plain(MicroInstruction {
            alu_rop: AluRopSel::Dr,
            latch_pc: true,
            alias: Some("jmp"),
            ..plain()
        }),
        Branch(BranchMicroInstruction {
            alias: Some("end"),
            ..branch("start")
        }),
    ]
}

/// The resolved standard table, ready for the control unit.
pub fn runtime() -> Result<Vec<MicroEntry>, Error> {
    resolve(standard_runtime())
}
