//! One stack frame of a running script (spec §3.5): the script, its
//! instruction pointer, its evaluation stack, static/local/argument slots,
//! active exception frames, and the call flags it was invoked with.

use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::ExceptionHandlingContext;
use crate::script::Script;
use crate::slot::Slots;

pub const DEFAULT_MAX_STACK_SIZE: usize = 2 * 1024;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct CallFlags: u8 {
        const NONE = 0x00;
        const READ_STATES = 0x01;
        const WRITE_STATES = 0x02;
        const ALLOW_CALL = 0x04;
        const ALLOW_NOTIFY = 0x08;
        const STATES = Self::READ_STATES.bits() | Self::WRITE_STATES.bits();
        const READ_ONLY = Self::READ_STATES.bits() | Self::ALLOW_CALL.bits();
        const ALL = Self::STATES.bits() | Self::ALLOW_CALL.bits() | Self::ALLOW_NOTIFY.bits();
    }
}

pub struct ExecutionContext {
    pub script: Script,
    pub instruction_pointer: usize,
    pub evaluation_stack: EvaluationStack,
    pub static_fields: Option<Slots>,
    pub local_variables: Option<Slots>,
    pub arguments: Option<Slots>,
    pub exception_frames: Vec<ExceptionHandlingContext>,
    pub call_flags: CallFlags,
    /// Number of return values the caller expects; `-1` means "all of
    /// them" (used for the entry context).
    pub return_value_count: i32,
}

impl ExecutionContext {
    pub fn new(script: Script, call_flags: CallFlags, return_value_count: i32) -> Self {
        Self {
            script,
            instruction_pointer: 0,
            evaluation_stack: EvaluationStack::new(DEFAULT_MAX_STACK_SIZE),
            static_fields: None,
            local_variables: None,
            arguments: None,
            exception_frames: Vec::new(),
            call_flags,
            return_value_count,
        }
    }

    pub fn current_opcode(&self) -> Option<u8> {
        self.script.bytes().get(self.instruction_pointer).copied()
    }

    pub fn is_at_end(&self) -> bool {
        self.instruction_pointer >= self.script.len()
    }
}
