//! Decodes one instruction (opcode + operand bytes) from a [`Script`] at a
//! given instruction pointer.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::script::Script;

pub struct Instruction<'a> {
    pub opcode: OpCode,
    pub operand: &'a [u8],
    /// Total length including the opcode byte.
    pub size: usize,
}

impl<'a> Instruction<'a> {
    pub fn decode(script: &'a Script, ip: usize) -> VmResult<Self> {
        let bytes = script.bytes();
        let opcode_byte = *bytes
            .get(ip)
            .ok_or(VmError::InstructionPointerOutOfBounds(ip, bytes.len()))?;
        let opcode = OpCode::from_byte(opcode_byte).ok_or(VmError::UnknownOpCode(opcode_byte))?;

        if let Some(prefix_len) = opcode.push_data_prefix_len() {
            let data_len = match prefix_len {
                1 => bytes[ip + 1] as usize,
                2 => u16::from_le_bytes([bytes[ip + 1], bytes[ip + 2]]) as usize,
                4 => u32::from_le_bytes([
                    bytes[ip + 1],
                    bytes[ip + 2],
                    bytes[ip + 3],
                    bytes[ip + 4],
                ]) as usize,
                _ => unreachable!(),
            };
            let operand_start = ip + 1 + prefix_len;
            let operand = &bytes[operand_start..operand_start + data_len];
            return Ok(Self { opcode, operand, size: 1 + prefix_len + data_len });
        }

        let operand_len = opcode.fixed_operand_size().unwrap_or(0);
        let operand = &bytes[ip + 1..ip + 1 + operand_len];
        Ok(Self { opcode, operand, size: 1 + operand_len })
    }

    pub fn operand_i8(&self) -> i8 {
        self.operand[0] as i8
    }

    pub fn operand_i32(&self) -> i32 {
        i32::from_le_bytes([self.operand[0], self.operand[1], self.operand[2], self.operand[3]])
    }

    pub fn operand_u8(&self) -> u8 {
        self.operand[0]
    }

    pub fn operand_u16(&self) -> u16 {
        u16::from_le_bytes([self.operand[0], self.operand[1]])
    }

    pub fn operand_u32(&self) -> u32 {
        u32::from_le_bytes([self.operand[0], self.operand[1], self.operand[2], self.operand[3]])
    }
}
