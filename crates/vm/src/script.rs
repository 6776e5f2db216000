//! An immutable, validated script: the bytecode an [`ExecutionContext`]
//! steps through, plus a precomputed bitmap of valid jump targets so branch
//! instructions can be checked in O(1) without rescanning the script.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Script {
    inner: Arc<ScriptData>,
}

#[derive(Debug)]
struct ScriptData {
    bytes: Vec<u8>,
    /// `true` at every byte offset that starts an instruction.
    instruction_boundaries: Vec<bool>,
}

pub const MAX_SCRIPT_LENGTH: usize = 512 * 1024;

impl Script {
    /// Parses `bytes` into a script, recording every instruction boundary.
    /// Does not reject unknown opcodes at parse time (those fault at
    /// execution time instead, matching a real interpreter's behavior).
    pub fn new(bytes: Vec<u8>) -> VmResult<Self> {
        if bytes.len() > MAX_SCRIPT_LENGTH {
            return Err(VmError::ScriptTooLong {
                actual: bytes.len(),
                max: MAX_SCRIPT_LENGTH,
            });
        }
        let mut boundaries = vec![false; bytes.len() + 1];
        let mut ip = 0usize;
        while ip < bytes.len() {
            boundaries[ip] = true;
            let op = OpCode::from_byte(bytes[ip]).ok_or(VmError::UnknownOpCode(bytes[ip]))?;
            let len = instruction_len(op, &bytes, ip)?;
            ip += len;
        }
        boundaries[bytes.len()] = true; // one-past-the-end is a valid "fell off" target for RET.

        Ok(Self {
            inner: Arc::new(ScriptData {
                bytes,
                instruction_boundaries: boundaries,
            }),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.inner.bytes
    }

    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }

    pub fn is_instruction_boundary(&self, offset: usize) -> bool {
        self.inner
            .instruction_boundaries
            .get(offset)
            .copied()
            .unwrap_or(false)
    }

    /// Validates that `target` (an absolute offset computed from a signed
    /// relative jump) lands on an instruction boundary within the script.
    pub fn validate_jump(&self, target: i64) -> VmResult<usize> {
        if target < 0 || target as usize > self.len() {
            return Err(VmError::InvalidJumpTarget(target as i32));
        }
        let target = target as usize;
        if !self.is_instruction_boundary(target) {
            return Err(VmError::InvalidJumpTarget(target as i32));
        }
        Ok(target)
    }
}

/// Total length (opcode byte + operand) of the instruction at `ip`.
fn instruction_len(op: OpCode, bytes: &[u8], ip: usize) -> VmResult<usize> {
    if let Some(prefix_len) = op.push_data_prefix_len() {
        let header_end = ip + 1 + prefix_len;
        if header_end > bytes.len() {
            return Err(VmError::TruncatedOperand(ip));
        }
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
        let total = 1 + prefix_len + data_len;
        if ip + total > bytes.len() {
            return Err(VmError::TruncatedOperand(ip));
        }
        return Ok(total);
    }

    let operand = op.fixed_operand_size().unwrap_or(0);
    if ip + 1 + operand > bytes.len() {
        return Err(VmError::TruncatedOperand(ip));
    }
    Ok(1 + operand)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push0_push16_add_has_three_boundaries() {
        let script = Script::new(vec![0x10, 0x20, 0x9E]).unwrap();
        assert!(script.is_instruction_boundary(0));
        assert!(script.is_instruction_boundary(1));
        assert!(script.is_instruction_boundary(2));
        assert!(script.is_instruction_boundary(3));
        assert!(!script.is_instruction_boundary(4));
    }

    #[test]
    fn pushdata1_operand_is_skipped_as_one_instruction() {
        // PUSHDATA1, len=2, data
        let script = Script::new(vec![0x0C, 0x02, 0xAA, 0xBB, 0x40]).unwrap();
        assert!(script.is_instruction_boundary(0));
        assert!(!script.is_instruction_boundary(1));
        assert!(!script.is_instruction_boundary(2));
        assert!(!script.is_instruction_boundary(3));
        assert!(script.is_instruction_boundary(4));
    }

    #[test]
    fn truncated_pushdata_is_rejected() {
        assert!(Script::new(vec![0x0C, 0x05, 0x01]).is_err());
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(Script::new(vec![0xFF]).is_err());
    }

    #[test]
    fn jump_validation_rejects_mid_instruction_targets() {
        let script = Script::new(vec![0x0C, 0x02, 0xAA, 0xBB, 0x40]).unwrap();
        assert!(script.validate_jump(2).is_err());
        assert!(script.validate_jump(4).is_ok());
    }
}
