//! Second pass of code generation: rewrites every stub to a plain
//! instruction with an absolute operand.

use crate::codegen::{EmittedInstr, Stub, StubId};
use crate::error::CompileError;
use isa::{DataWord, Instruction};
use std::collections::HashMap;

/// Resolves all symbolic references. Builds the label and data-identifier
/// address maps, then replaces each stub's operand; opcode, operand type
/// and comment carry over unchanged, and `instr_index` becomes the
/// instruction's own address. Afterwards no stub remains.
pub fn resolve(
    instructions: Vec<EmittedInstr>,
    data_memory: &[DataWord],
) -> Result<Vec<Instruction>, CompileError> {
    let mut instr_addresses: HashMap<&StubId, u32> = HashMap::new();
    for (index, instr) in instructions.iter().enumerate() {
        for label in &instr.labels {
            instr_addresses.insert(label, index as u32);
        }
    }

    let mut data_addresses: HashMap<&str, u32> = HashMap::new();
    for (address, word) in data_memory.iter().enumerate() {
        if let Some(identifier) = &word.identifier {
            if data_addresses
                .insert(identifier.as_str(), address as u32)
                .is_some()
            {
                return Err(CompileError::DuplicateData {
                    identifier: identifier.clone(),
                });
            }
        }
    }

    instructions
        .iter()
        .enumerate()
        .map(|(index, instr)| {
            let operand = match &instr.stub {
                Stub::None => instr.operand,
                Stub::Data { identifier } => *data_addresses
                    .get(identifier.as_str())
                    .ok_or_else(|| CompileError::UnresolvedData {
                        identifier: identifier.clone(),
                    })?,
                Stub::Instr { target, offset } => instr_addresses
                    .get(target)
                    .ok_or_else(|| CompileError::UnresolvedLabel {
                        label: target.to_string(),
                    })?
                    + offset,
            };

            Ok(Instruction {
                instr_index: index as u32,
                op_code: instr.op_code,
                operand_type: instr.operand_type,
                operand,
                comment: instr.comment.clone(),
            })
        })
        .collect()
}
