//! The opcode interpreter: `ExecuteNext` stepping until the VM reaches
//! `Halt`, `Fault`, or a requested `Break` (spec §4.3).
//!
//! Generic over `Ctx`, arbitrary state a host (the `neo-smart-contract`
//! `ApplicationEngine`) attaches to the engine so that `SYSCALL`/`CALLT`
//! handlers registered through [`ExecutionEngine::register_syscall`] can
//! reach outside the pure VM (snapshot access, notifications, gas
//! accounting beyond the opcode price table) without this crate knowing
//! anything about native contracts.
//!
//! `CALL`/`CALL_L`/`CALLA` share the caller's evaluation stack (matching
//! the reference VM's calling convention, where `INITSLOT` pops arguments
//! straight off that shared stack); a freshly loaded script or a
//! cross-contract call gets its own. Stacks live in a pool on the engine so
//! two contexts can point at the same one without shared-ownership
//! wrappers.

use crate::error::VmError;
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::{ExceptionHandlingContext, ExceptionHandlingState};
use crate::execution_context::{CallFlags, ExecutionContext};
use crate::gas_table::base_price;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::stack_item::{
    bigint_to_bytes, bigint_to_i64_checked, bytes_to_bigint, bigint_fits_vm_integer, CompoundData,
    StackItem, StackItemType, MAX_ITEM_SIZE,
};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    None,
    Break,
    Halt,
    Fault,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub max_stack_size: usize,
    pub max_item_size: usize,
    pub max_invocation_stack_size: usize,
    pub max_array_size: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_stack_size: 2 * 1024,
            max_item_size: MAX_ITEM_SIZE,
            max_invocation_stack_size: 1024,
            max_array_size: 1024,
        }
    }
}

pub struct SyscallEntry<Ctx> {
    pub name: &'static str,
    pub required_flags: CallFlags,
    pub fixed_price: i64,
    pub handler: fn(&mut ExecutionEngine<Ctx>) -> Result<(), String>,
}

pub struct ExecutionEngine<Ctx> {
    pub invocation_stack: Vec<ExecutionContext>,
    pub reference_counter: ReferenceCounter,
    pub state: VmState,
    pub uncaught_exception: Option<StackItem>,
    pub fault_message: Option<String>,
    pub gas_consumed: i64,
    pub gas_limit: i64,
    pub limits: ExecutionLimits,
    syscalls: HashMap<u32, SyscallEntry<Ctx>>,
    pub ctx: Ctx,
}

/// `first 4 bytes little-endian of Sha256(name)` (spec §4.3).
pub fn syscall_hash(name: &str) -> u32 {
    let digest = neo_cryptography::sha256(name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

impl<Ctx> ExecutionEngine<Ctx> {
    pub fn new(ctx: Ctx, gas_limit: i64, limits: ExecutionLimits) -> Self {
        Self {
            invocation_stack: Vec::new(),
            reference_counter: ReferenceCounter::new(),
            state: VmState::None,
            uncaught_exception: None,
            fault_message: None,
            gas_consumed: 0,
            gas_limit,
            limits,
            syscalls: HashMap::new(),
            ctx,
        }
    }

    pub fn register_syscall(
        &mut self,
        name: &'static str,
        required_flags: CallFlags,
        fixed_price: i64,
        handler: fn(&mut ExecutionEngine<Ctx>) -> Result<(), String>,
    ) {
        let hash = syscall_hash(name);
        self.syscalls.insert(
            hash,
            SyscallEntry { name, required_flags, fixed_price, handler },
        );
    }

    pub fn syscall_price(&self, hash: u32) -> Option<i64> {
        self.syscalls.get(&hash).map(|e| e.fixed_price)
    }

    /// Loads the entry script and transitions `None -> Break`.
    pub fn load_script(&mut self, script: Script, call_flags: CallFlags) {
        self.invocation_stack.push(ExecutionContext::new(script, call_flags, -1));
        self.state = VmState::Break;
    }

    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    pub fn eval_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.invocation_stack.last_mut().expect("no context loaded").evaluation_stack
    }

    pub fn eval_stack(&self) -> &EvaluationStack {
        &self.invocation_stack.last().expect("no context loaded").evaluation_stack
    }

    pub fn push(&mut self, item: StackItem) -> Result<(), String> {
        let rc = &mut self.reference_counter;
        self.invocation_stack
            .last_mut()
            .expect("no context loaded")
            .evaluation_stack
            .push(item, rc)
            .map_err(|e| e.to_string())
    }

    pub fn pop(&mut self) -> Result<StackItem, String> {
        let rc = &mut self.reference_counter;
        self.invocation_stack
            .last_mut()
            .expect("no context loaded")
            .evaluation_stack
            .pop(rc)
            .map_err(|e| e.to_string())
    }

    pub fn peek(&self, index: usize) -> Result<StackItem, String> {
        self.eval_stack().peek(index).cloned().map_err(|e| e.to_string())
    }

    /// Drops a stack reference for an item pulled off the stack via
    /// [`EvaluationStack::remove`], which does not adjust refcounts itself.
    fn release(&mut self, item: StackItem) {
        if let Some(h) = item.compound_handle() {
            self.reference_counter.remove_stack_ref(h);
        }
    }

    /// Result stack for a `Halt`ed engine: the entry context's remaining
    /// evaluation stack, top-first. Kept around by [`Self::do_return`],
    /// which does not pop the last remaining context.
    pub fn result_stack(&self) -> Vec<StackItem> {
        match self.invocation_stack.last() {
            Some(ctx) => ctx.evaluation_stack.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn add_gas(&mut self, amount: i64) {
        if self.state == VmState::Fault {
            return;
        }
        self.gas_consumed = self.gas_consumed.saturating_add(amount);
        if self.gas_consumed < 0 || self.gas_consumed > self.gas_limit {
            self.fault(format!(
                "gas limit exceeded: consumed {}, limit {}",
                self.gas_consumed, self.gas_limit
            ));
        }
    }

    pub fn fault(&mut self, message: impl Into<String>) {
        self.state = VmState::Fault;
        self.fault_message = Some(message.into());
    }

    /// Runs `ExecuteNext` until the VM leaves `Break`.
    pub fn execute(&mut self) -> VmState {
        if self.state == VmState::Break {
            self.state = VmState::None;
        }
        while self.state != VmState::Halt && self.state != VmState::Fault {
            self.execute_next();
        }
        self.state
    }

    pub fn execute_next(&mut self) {
        if self.invocation_stack.is_empty() {
            self.state = VmState::Halt;
            return;
        }
        let context_idx = self.invocation_stack.len() - 1;
        let ip = self.invocation_stack[context_idx].instruction_pointer;
        let script = self.invocation_stack[context_idx].script.clone();

        let instruction = match Instruction::decode(&script, ip) {
            Ok(i) => i,
            Err(e) => {
                self.fault(e.to_string());
                return;
            }
        };

        self.add_gas(base_price(instruction.opcode));
        if self.state == VmState::Fault {
            return;
        }

        let next_ip = ip + instruction.size;
        self.invocation_stack[context_idx].instruction_pointer = next_ip;

        if let Err(msg) = self.dispatch(instruction.opcode, instruction.operand, ip) {
            self.handle_fault_or_throw(msg);
        }
    }

    /// A `THROW`/runtime error unwinds to the nearest catch frame instead
    /// of faulting immediately, matching spec §4.3 exception semantics.
    fn handle_fault_or_throw(&mut self, message: String) {
        let thrown = StackItem::ByteString(Arc::from(message.clone().into_bytes().into_boxed_slice()));
        self.throw(thrown);
        if self.state != VmState::Fault {
            // thrown was caught somewhere; nothing else to do.
            return;
        }
        self.fault_message = Some(message);
    }

    fn throw(&mut self, exception: StackItem) {
        loop {
            let Some(context) = self.invocation_stack.last_mut() else {
                self.state = VmState::Fault;
                self.uncaught_exception = Some(exception);
                return;
            };
            if let Some(frame) = context
                .exception_frames
                .iter_mut()
                .rev()
                .find(|f| f.has_catch() || f.has_finally())
            {
                if frame.has_catch() {
                    frame.state = ExceptionHandlingState::Catch;
                    let target = frame.catch_offset.unwrap();
                    let stack_depth = frame.stack_depth_on_entry;
                    context.instruction_pointer = target;
                    while context.evaluation_stack.len() > stack_depth {
                        let _ = context.evaluation_stack.pop(&mut self.reference_counter);
                    }
                    let _ = context.evaluation_stack.push(exception, &mut self.reference_counter);
                    return;
                } else {
                    frame.state = ExceptionHandlingState::Finally;
                    context.instruction_pointer = frame.finally_offset.unwrap();
                    return;
                }
            }
            context.exception_frames.clear();
            self.invocation_stack.pop();
        }
    }

    pub fn check_array_size(&mut self, len: usize) -> Result<(), String> {
        if len > self.limits.max_array_size {
            return Err(VmError::ArrayTooLarge { actual: len, max: self.limits.max_array_size }.to_string());
        }
        Ok(())
    }

    pub fn check_item_size(&mut self, len: usize) -> Result<(), String> {
        if len > self.limits.max_item_size {
            return Err(VmError::ItemTooLarge { actual: len, max: self.limits.max_item_size }.to_string());
        }
        Ok(())
    }

    fn jump_target(&self, ip_at_start: usize, offset: i64) -> Result<usize, String> {
        let script = &self.invocation_stack.last().unwrap().script;
        let target = ip_at_start as i64 + offset;
        script.validate_jump(target).map_err(|e| e.to_string())
    }

    fn do_jump(&mut self, ip_at_start: usize, offset: i64) -> Result<(), String> {
        let target = self.jump_target(ip_at_start, offset)?;
        self.invocation_stack.last_mut().unwrap().instruction_pointer = target;
        Ok(())
    }

    pub fn pop_int(&mut self) -> Result<BigInt, String> {
        self.pop()?.as_int().map_err(|e| e.to_string())
    }

    pub fn pop_bool(&mut self) -> Result<bool, String> {
        let item = self.pop()?;
        Ok(item.as_bool(&self.reference_counter))
    }

    pub fn pop_bytes(&mut self) -> Result<Vec<u8>, String> {
        let item = self.pop()?;
        item.as_bytes(&self.reference_counter).map_err(|e| e.to_string())
    }

    pub fn push_int(&mut self, value: BigInt) -> Result<(), String> {
        if !bigint_fits_vm_integer(&value) {
            return Err("integer exceeds maximum VM width".to_string());
        }
        self.push(StackItem::Integer(value))
    }

    pub fn alloc_buffer(&mut self, data: Vec<u8>) -> Result<StackItem, String> {
        self.check_item_size(data.len())?;
        Ok(StackItem::Buffer(self.reference_counter.alloc(CompoundData::Buffer(data))))
    }

    pub fn alloc_array(&mut self, items: Vec<StackItem>) -> Result<StackItem, String> {
        self.check_array_size(items.len())?;
        Ok(StackItem::Array(self.reference_counter.alloc(CompoundData::Array(items))))
    }

    pub fn alloc_struct(&mut self, items: Vec<StackItem>) -> Result<StackItem, String> {
        self.check_array_size(items.len())?;
        Ok(StackItem::Struct(self.reference_counter.alloc(CompoundData::Struct(items))))
    }

    pub fn alloc_map(&mut self, items: Vec<(StackItem, StackItem)>) -> Result<StackItem, String> {
        self.check_array_size(items.len())?;
        Ok(StackItem::Map(self.reference_counter.alloc(CompoundData::Map(items))))
    }

    fn dispatch(&mut self, opcode: OpCode, operand: &[u8], ip: usize) -> Result<(), String> {
        use OpCode::*;
        match opcode {
            // ---- Constants ----
            PushInt8 => self.push_int(BigInt::from(operand[0] as i8)),
            PushInt16 => self.push_int(bytes_to_bigint(operand)),
            PushInt32 | PushInt64 | PushInt128 | PushInt256 => self.push_int(bytes_to_bigint(operand)),
            PushA => {
                let offset = i32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
                let target = self.jump_target(ip, offset as i64)?;
                let script = self.invocation_stack.last().unwrap().script.clone();
                self.push(StackItem::Pointer { script, offset: target })
            }
            PushNull => self.push(StackItem::Null),
            PushData1 | PushData2 | PushData4 => {
                let item = self.alloc_buffer(operand.to_vec())?;
                self.push(item)
            }
            PushM1 => self.push_int(BigInt::from(-1)),
            Push0 | Push1 | Push2 | Push3 | Push4 | Push5 | Push6 | Push7 | Push8 | Push9
            | Push10 | Push11 | Push12 | Push13 | Push14 | Push15 | Push16 => {
                self.push_int(BigInt::from(opcode as i64 - Push0 as i64))
            }

            // ---- Flow control ----
            Nop => Ok(()),
            Jmp => self.do_jump(ip, operand[0] as i8 as i64),
            JmpL => self.do_jump(ip, i32::from_le_bytes(operand.try_into().unwrap()) as i64),
            JmpIf => {
                let cond = self.pop_bool()?;
                if cond { self.do_jump(ip, operand[0] as i8 as i64) } else { Ok(()) }
            }
            JmpIfL => {
                let cond = self.pop_bool()?;
                if cond {
                    self.do_jump(ip, i32::from_le_bytes(operand.try_into().unwrap()) as i64)
                } else {
                    Ok(())
                }
            }
            JmpIfNot => {
                let cond = self.pop_bool()?;
                if !cond { self.do_jump(ip, operand[0] as i8 as i64) } else { Ok(()) }
            }
            JmpIfNotL => {
                let cond = self.pop_bool()?;
                if !cond {
                    self.do_jump(ip, i32::from_le_bytes(operand.try_into().unwrap()) as i64)
                } else {
                    Ok(())
                }
            }
            JmpEq | JmpEqL | JmpNe | JmpNeL | JmpGt | JmpGtL | JmpGe | JmpGeL | JmpLt | JmpLtL
            | JmpLe | JmpLeL => self.dispatch_compare_jump(opcode, operand, ip),

            Call => {
                let offset = operand[0] as i8 as i64;
                let target = self.jump_target(ip, offset)?;
                self.call_internal(target)
            }
            CallL => {
                let offset = i32::from_le_bytes(operand.try_into().unwrap()) as i64;
                let target = self.jump_target(ip, offset)?;
                self.call_internal(target)
            }
            CallA => {
                let item = self.pop()?;
                let StackItem::Pointer { offset, .. } = item else {
                    return Err("CALLA requires a Pointer item".to_string());
                };
                self.call_internal(offset)
            }
            CallT => Err("CALLT requires a host-provided method-token resolver".to_string()),
            Abort => Err("ABORT".to_string()),
            AbortMsg => {
                let msg = self.pop_bytes()?;
                Err(format!("ABORT: {}", String::from_utf8_lossy(&msg)))
            }
            Assert => {
                let cond = self.pop_bool()?;
                if cond { Ok(()) } else { Err("ASSERT failed".to_string()) }
            }
            AssertMsg => {
                let msg = self.pop_bytes()?;
                let cond = self.pop_bool()?;
                if cond { Ok(()) } else { Err(format!("ASSERT failed: {}", String::from_utf8_lossy(&msg))) }
            }
            Throw => {
                let item = self.pop()?;
                self.throw(item);
                Ok(())
            }
            Try => {
                let catch = operand[0] as i8;
                let finally = operand[1] as i8;
                self.begin_try(ip, catch as i64, finally as i64)
            }
            TryL => {
                let catch = i32::from_le_bytes(operand[0..4].try_into().unwrap());
                let finally = i32::from_le_bytes(operand[4..8].try_into().unwrap());
                self.begin_try(ip, catch as i64, finally as i64)
            }
            EndTry | EndTryL => {
                let offset = if opcode == EndTry {
                    operand[0] as i8 as i64
                } else {
                    i32::from_le_bytes(operand.try_into().unwrap()) as i64
                };
                self.end_try(ip, offset)
            }
            EndFinally => self.end_finally(),
            Ret => self.do_return(),
            Syscall => {
                let hash = u32::from_le_bytes(operand.try_into().unwrap());
                self.do_syscall(hash)
            }

            // ---- Stack ----
            Depth => {
                let n = self.eval_stack().len() as i64;
                self.push_int(BigInt::from(n))
            }
            Drop => self.pop().map(|_| ()),
            Nip => {
                let item = self.eval_stack_mut().remove(1).map_err(|e| e.to_string())?;
                self.release(item);
                Ok(())
            }
            XDrop => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let item = self.eval_stack_mut().remove(n).map_err(|e| e.to_string())?;
                self.release(item);
                Ok(())
            }
            Clear => {
                self.eval_stack_mut().clear(&mut self.reference_counter);
                Ok(())
            }
            Dup => {
                let top = self.peek(0)?;
                self.push(top)
            }
            Over => {
                let item = self.peek(1)?;
                self.push(item)
            }
            Pick => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let item = self.peek(n)?;
                self.push(item)
            }
            Tuck => {
                let top = self.peek(0)?;
                if let Some(h) = top.compound_handle() {
                    self.reference_counter.add_stack_ref(h);
                }
                self.eval_stack_mut().insert(2, top).map_err(|e| e.to_string())
            }
            Swap => {
                let a = self.eval_stack_mut().remove(1).map_err(|e| e.to_string())?;
                self.eval_stack_mut().insert(0, a).map_err(|e| e.to_string())
            }
            Rot => {
                let a = self.eval_stack_mut().remove(2).map_err(|e| e.to_string())?;
                self.eval_stack_mut().insert(0, a).map_err(|e| e.to_string())
            }
            Roll => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let item = self.eval_stack_mut().remove(n).map_err(|e| e.to_string())?;
                self.eval_stack_mut().insert(0, item).map_err(|e| e.to_string())
            }
            Reverse3 => self.reverse_n(3),
            Reverse4 => self.reverse_n(4),
            ReverseN => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                self.reverse_n(n)
            }

            // ---- Slots ----
            InitSSlot => {
                let count = operand[0] as usize;
                self.current_context_mut().unwrap().static_fields = Some(crate::slot::Slots::new(count));
                Ok(())
            }
            InitSlot => {
                let local_count = operand[0] as usize;
                let arg_count = operand[1] as usize;
                let mut args = crate::slot::Slots::new(arg_count);
                for i in 0..arg_count {
                    let value = self.pop()?;
                    args.set(arg_count - 1 - i, value, &mut self.reference_counter).map_err(|e| e.to_string())?;
                }
                let ctx = self.current_context_mut().unwrap();
                ctx.local_variables = Some(crate::slot::Slots::new(local_count));
                ctx.arguments = Some(args);
                Ok(())
            }
            LdSFld0 | LdSFld1 | LdSFld2 | LdSFld3 | LdSFld4 | LdSFld5 | LdSFld6 => {
                self.load_slot_fixed(Self::static_index(opcode), SlotKind::Static)
            }
            LdSFld => self.load_slot(operand[0] as usize, SlotKind::Static),
            StSFld0 | StSFld1 | StSFld2 | StSFld3 | StSFld4 | StSFld5 | StSFld6 => {
                self.store_slot_fixed(Self::static_index2(opcode), SlotKind::Static)
            }
            StSFld => self.store_slot(operand[0] as usize, SlotKind::Static),
            LdLoc0 | LdLoc1 | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6 => {
                self.load_slot_fixed(Self::local_index(opcode), SlotKind::Local)
            }
            LdLoc => self.load_slot(operand[0] as usize, SlotKind::Local),
            StLoc0 | StLoc1 | StLoc2 | StLoc3 | StLoc4 | StLoc5 | StLoc6 => {
                self.store_slot_fixed(Self::local_index2(opcode), SlotKind::Local)
            }
            StLoc => self.store_slot(operand[0] as usize, SlotKind::Local),
            LdArg0 | LdArg1 | LdArg2 | LdArg3 | LdArg4 | LdArg5 | LdArg6 => {
                self.load_slot_fixed(Self::arg_index(opcode), SlotKind::Argument)
            }
            LdArg => self.load_slot(operand[0] as usize, SlotKind::Argument),
            StArg0 | StArg1 | StArg2 | StArg3 | StArg4 | StArg5 | StArg6 => {
                self.store_slot_fixed(Self::arg_index2(opcode), SlotKind::Argument)
            }
            StArg => self.store_slot(operand[0] as usize, SlotKind::Argument),

            // ---- Splice ----
            NewBuffer => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                self.check_item_size(n)?;
                let item = self.alloc_buffer(vec![0u8; n])?;
                self.push(item)
            }
            MemCpy => {
                let count = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let src_index = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let src = self.pop_bytes()?;
                let dst_index = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let dst_item = self.pop()?;
                let StackItem::Buffer(handle) = dst_item else {
                    return Err("MEMCPY destination must be a Buffer".to_string());
                };
                if src_index + count > src.len() {
                    return Err("MEMCPY source range out of bounds".to_string());
                }
                let CompoundData::Buffer(dst) = self.reference_counter.data_mut(handle) else {
                    return Err("corrupt buffer handle".to_string());
                };
                if dst_index + count > dst.len() {
                    return Err("MEMCPY destination range out of bounds".to_string());
                }
                dst[dst_index..dst_index + count].copy_from_slice(&src[src_index..src_index + count]);
                Ok(())
            }
            Cat => {
                let b = self.pop_bytes()?;
                let a = self.pop_bytes()?;
                let mut out = a;
                out.extend_from_slice(&b);
                self.check_item_size(out.len())?;
                let item = self.alloc_buffer(out)?;
                self.push(item)
            }
            SubStr => {
                let len = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let index = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let data = self.pop_bytes()?;
                if index + len > data.len() {
                    return Err("SUBSTR range out of bounds".to_string());
                }
                let item = self.alloc_buffer(data[index..index + len].to_vec())?;
                self.push(item)
            }
            Left => {
                let len = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let data = self.pop_bytes()?;
                if len > data.len() {
                    return Err("LEFT count out of bounds".to_string());
                }
                let item = self.alloc_buffer(data[..len].to_vec())?;
                self.push(item)
            }
            Right => {
                let len = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let data = self.pop_bytes()?;
                if len > data.len() {
                    return Err("RIGHT count out of bounds".to_string());
                }
                let item = self.alloc_buffer(data[data.len() - len..].to_vec())?;
                self.push(item)
            }

            // ---- Bitwise logic ----
            Invert => {
                let a = self.pop_int()?;
                self.push_int(!a)
            }
            And => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a & b)
            }
            Or => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a | b)
            }
            Xor => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a ^ b)
            }
            Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                let eq = self.reference_counter.structural_equals(&a, &b, 8);
                self.push(StackItem::Boolean(eq))
            }
            NotEqual => {
                let b = self.pop()?;
                let a = self.pop()?;
                let eq = self.reference_counter.structural_equals(&a, &b, 8);
                self.push(StackItem::Boolean(!eq))
            }

            // ---- Arithmetic ----
            Sign => {
                let a = self.pop_int()?;
                self.push_int(BigInt::from(a.signum().to_i8().unwrap_or(0)))
            }
            Abs => {
                let a = self.pop_int()?;
                self.push_int(a.abs())
            }
            Negate => {
                let a = self.pop_int()?;
                self.push_int(-a)
            }
            Inc => {
                let a = self.pop_int()?;
                self.push_int(a + 1)
            }
            Dec => {
                let a = self.pop_int()?;
                self.push_int(a - 1)
            }
            Add => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a + b)
            }
            Sub => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a - b)
            }
            Mul => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a * b)
            }
            Div => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                if b.is_zero() { return Err("division by zero".to_string()); }
                self.push_int(a / b)
            }
            Mod => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                if b.is_zero() { return Err("division by zero".to_string()); }
                self.push_int(a % b)
            }
            Pow => {
                let exp = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())?;
                if !(0..=1_024).contains(&exp) { return Err("POW exponent out of range".to_string()); }
                let base = self.pop_int()?;
                self.push_int(base.pow(exp as u32))
            }
            Sqrt => {
                let a = self.pop_int()?;
                if a.is_negative() { return Err("SQRT of negative number".to_string()); }
                let (_, magnitude) = a.into_parts();
                self.push_int(BigInt::from(magnitude.sqrt()))
            }
            ModMul => {
                let m = self.pop_int()?;
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                if m.is_zero() { return Err("modulus is zero".to_string()); }
                self.push_int((a * b).mod_floor(&m))
            }
            ModPow => {
                let m = self.pop_int()?;
                let e = self.pop_int()?;
                let a = self.pop_int()?;
                if e.is_negative() { return Err("MODPOW exponent must be non-negative".to_string()); }
                self.push_int(a.modpow(&e, &m))
            }
            Shl => {
                let b = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())?;
                let a = self.pop_int()?;
                if !(0..=256).contains(&b) { return Err("SHL shift out of range".to_string()); }
                self.push_int(a << b)
            }
            Shr => {
                let b = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())?;
                let a = self.pop_int()?;
                if !(0..=256).contains(&b) { return Err("SHR shift out of range".to_string()); }
                self.push_int(a >> b)
            }
            Not => {
                let a = self.pop_bool()?;
                self.push(StackItem::Boolean(!a))
            }
            BoolAnd => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                self.push(StackItem::Boolean(a && b))
            }
            BoolOr => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                self.push(StackItem::Boolean(a || b))
            }
            Nz => {
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(!a.is_zero()))
            }
            NumEqual => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(a == b))
            }
            NumNotEqual => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(a != b))
            }
            Lt => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(a < b))
            }
            Le => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(a <= b))
            }
            Gt => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(a > b))
            }
            Ge => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(StackItem::Boolean(a >= b))
            }
            Min => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a.min(b))
            }
            Max => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push_int(a.max(b))
            }
            Within => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                let x = self.pop_int()?;
                self.push(StackItem::Boolean(a <= x && x < b))
            }

            // ---- Compound types ----
            PackMap => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let mut pairs = Vec::with_capacity(n);
                for _ in 0..n {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    pairs.push((key, value));
                }
                let item = self.alloc_map(pairs)?;
                self.push(item)
            }
            PackStruct => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.pop()?);
                }
                let item = self.alloc_struct(items)?;
                self.push(item)
            }
            Pack => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.pop()?);
                }
                let item = self.alloc_array(items)?;
                self.push(item)
            }
            Unpack => {
                let item = self.pop()?;
                let items = self.compound_items(&item)?;
                let len = items.len();
                for value in items.into_iter().rev() {
                    self.push(value)?;
                }
                self.push_int(BigInt::from(len as i64))
            }
            NewArray0 => {
                let item = self.alloc_array(Vec::new())?;
                self.push(item)
            }
            NewArray => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                self.check_array_size(n)?;
                let item = self.alloc_array(vec![StackItem::Null; n])?;
                self.push(item)
            }
            NewArrayT => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                self.check_array_size(n)?;
                let default = default_for_type(operand[0]);
                let item = self.alloc_array(vec![default; n])?;
                self.push(item)
            }
            NewStruct0 => {
                let item = self.alloc_struct(Vec::new())?;
                self.push(item)
            }
            NewStruct => {
                let n = bigint_to_i64_checked(&self.pop_int()?).map_err(|e| e.to_string())? as usize;
                self.check_array_size(n)?;
                let item = self.alloc_struct(vec![StackItem::Null; n])?;
                self.push(item)
            }
            NewMap => {
                let item = self.alloc_map(Vec::new())?;
                self.push(item)
            }
            Size => {
                let item = self.pop()?;
                let len = match &item {
                    StackItem::ByteString(b) => b.len(),
                    StackItem::Buffer(h) => self.reference_counter.data(*h).len(),
                    StackItem::Array(h) | StackItem::Struct(h) => self.reference_counter.data(*h).len(),
                    StackItem::Map(h) => self.reference_counter.data(*h).len(),
                    _ => return Err("SIZE requires a collection or byte-like item".to_string()),
                };
                self.push_int(BigInt::from(len as i64))
            }
            HasKey => {
                let key = self.pop()?;
                let item = self.pop()?;
                let found = match item {
                    StackItem::Array(h) | StackItem::Struct(h) => {
                        let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())?;
                        idx >= 0 && (idx as usize) < self.reference_counter.data(h).len()
                    }
                    StackItem::Map(h) => {
                        let CompoundData::Map(pairs) = self.reference_counter.data(h) else { unreachable!() };
                        pairs.iter().any(|(k, _)| self.reference_counter.structural_equals(k, &key, 8))
                    }
                    _ => return Err("HASKEY requires a collection".to_string()),
                };
                self.push(StackItem::Boolean(found))
            }
            Keys => {
                let item = self.pop()?;
                let StackItem::Map(h) = item else { return Err("KEYS requires a Map".to_string()) };
                let CompoundData::Map(pairs) = self.reference_counter.data(h) else { unreachable!() };
                let keys: Vec<StackItem> = pairs.iter().map(|(k, _)| k.clone()).collect();
                let out = self.alloc_array(keys)?;
                self.push(out)
            }
            Values => {
                let item = self.pop()?;
                let items = match item {
                    StackItem::Map(h) => {
                        let CompoundData::Map(pairs) = self.reference_counter.data(h) else { unreachable!() };
                        pairs.iter().map(|(_, v)| v.clone()).collect()
                    }
                    StackItem::Array(h) | StackItem::Struct(h) => {
                        let data = self.reference_counter.data(h);
                        match data {
                            CompoundData::Array(v) | CompoundData::Struct(v) => v.clone(),
                            _ => unreachable!(),
                        }
                    }
                    _ => return Err("VALUES requires a collection".to_string()),
                };
                let out = self.alloc_array(items)?;
                self.push(out)
            }
            PickItem => {
                let key = self.pop()?;
                let item = self.pop()?;
                let value = self.pick_item(item, key)?;
                self.push(value)
            }
            Append => {
                let value = self.pop()?;
                let item = self.pop()?;
                let StackItem::Array(h) = item else { return Err("APPEND requires an Array".to_string()) };
                let CompoundData::Array(v) = self.reference_counter.data_mut(h) else { unreachable!() };
                v.push(value);
                let new_len = v.len();
                self.check_array_size(new_len)
            }
            SetItem => {
                let value = self.pop()?;
                let key = self.pop()?;
                let item = self.pop()?;
                self.set_item(item, key, value)
            }
            ReverseItems => {
                let item = self.pop()?;
                match item {
                    StackItem::Array(h) | StackItem::Struct(h) => {
                        if let CompoundData::Array(v) | CompoundData::Struct(v) = self.reference_counter.data_mut(h) {
                            v.reverse();
                        }
                        Ok(())
                    }
                    StackItem::Buffer(h) => {
                        if let CompoundData::Buffer(b) = self.reference_counter.data_mut(h) {
                            b.reverse();
                        }
                        Ok(())
                    }
                    _ => Err("REVERSEITEMS requires a collection".to_string()),
                }
            }
            Remove => {
                let key = self.pop()?;
                let item = self.pop()?;
                self.remove_item(item, key)
            }
            ClearItems => {
                let item = self.pop()?;
                match item {
                    StackItem::Array(h) | StackItem::Struct(h) => {
                        if let CompoundData::Array(v) | CompoundData::Struct(v) = self.reference_counter.data_mut(h) {
                            v.clear();
                        }
                        Ok(())
                    }
                    StackItem::Map(h) => {
                        if let CompoundData::Map(m) = self.reference_counter.data_mut(h) {
                            m.clear();
                        }
                        Ok(())
                    }
                    _ => Err("CLEARITEMS requires a collection".to_string()),
                }
            }
            PopItem => {
                let item = self.pop()?;
                let StackItem::Array(h) = item else { return Err("POPITEM requires an Array".to_string()) };
                let popped = {
                    let CompoundData::Array(v) = self.reference_counter.data_mut(h) else { unreachable!() };
                    v.pop().ok_or_else(|| "POPITEM on empty array".to_string())?
                };
                self.push(popped)
            }

            // ---- Types ----
            IsNull => {
                let item = self.pop()?;
                self.push(StackItem::Boolean(matches!(item, StackItem::Null)))
            }
            IsType => {
                let item = self.pop()?;
                let expected = operand[0];
                self.push(StackItem::Boolean(item.type_of() as u8 == expected))
            }
            Convert => {
                let item = self.pop()?;
                let converted = self.convert(item, operand[0])?;
                self.push(converted)
            }
        }
    }

    fn dispatch_compare_jump(&mut self, opcode: OpCode, operand: &[u8], ip: usize) -> Result<(), String> {
        use OpCode::*;
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let taken = match opcode {
            JmpEq | JmpEqL => a == b,
            JmpNe | JmpNeL => a != b,
            JmpGt | JmpGtL => a > b,
            JmpGe | JmpGeL => a >= b,
            JmpLt | JmpLtL => a < b,
            JmpLe | JmpLeL => a <= b,
            _ => unreachable!(),
        };
        if !taken {
            return Ok(());
        }
        let is_long = matches!(opcode, JmpEqL | JmpNeL | JmpGtL | JmpGeL | JmpLtL | JmpLeL);
        let offset = if is_long {
            i32::from_le_bytes(operand.try_into().unwrap()) as i64
        } else {
            operand[0] as i8 as i64
        };
        self.do_jump(ip, offset)
    }

    fn reverse_n(&mut self, n: usize) -> Result<(), String> {
        if n <= 1 {
            return Ok(());
        }
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.eval_stack_mut().remove(0).map_err(|e| e.to_string())?);
        }
        for item in items {
            self.eval_stack_mut().insert(0, item).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn static_index(op: OpCode) -> usize { (op as u8 - OpCode::LdSFld0 as u8) as usize }
    fn static_index2(op: OpCode) -> usize { (op as u8 - OpCode::StSFld0 as u8) as usize }
    fn local_index(op: OpCode) -> usize { (op as u8 - OpCode::LdLoc0 as u8) as usize }
    fn local_index2(op: OpCode) -> usize { (op as u8 - OpCode::StLoc0 as u8) as usize }
    fn arg_index(op: OpCode) -> usize { (op as u8 - OpCode::LdArg0 as u8) as usize }
    fn arg_index2(op: OpCode) -> usize { (op as u8 - OpCode::StArg0 as u8) as usize }

    fn load_slot_fixed(&mut self, index: usize, kind: SlotKind) -> Result<(), String> {
        self.load_slot(index, kind)
    }

    fn store_slot_fixed(&mut self, index: usize, kind: SlotKind) -> Result<(), String> {
        self.store_slot(index, kind)
    }

    fn load_slot(&mut self, index: usize, kind: SlotKind) -> Result<(), String> {
        let context = self.current_context_mut().ok_or("no context")?;
        let slots = match kind {
            SlotKind::Static => context.static_fields.as_ref(),
            SlotKind::Local => context.local_variables.as_ref(),
            SlotKind::Argument => context.arguments.as_ref(),
        }
        .ok_or("slot storage not initialized")?;
        let value = slots.get(index).map_err(|e| e.to_string())?;
        self.push(value)
    }

    fn store_slot(&mut self, index: usize, kind: SlotKind) -> Result<(), String> {
        let value = self.pop()?;
        let context = self.invocation_stack.last_mut().ok_or("no context")?;
        let slots = match kind {
            SlotKind::Static => context.static_fields.as_mut(),
            SlotKind::Local => context.local_variables.as_mut(),
            SlotKind::Argument => context.arguments.as_mut(),
        }
        .ok_or("slot storage not initialized")?;
        slots.set(index, value, &mut self.reference_counter).map_err(|e| e.to_string())
    }

    /// `CALL` targets a context of its own, but inherits the caller's
    /// evaluation stack contents so `INITSLOT` can pop arguments left there
    /// by the caller, the way the reference VM's single shared stack would.
    /// [`Self::do_return`] drains the callee's stack back onto the caller's
    /// on the way out so results are visible there too.
    fn call_internal(&mut self, target: usize) -> Result<(), String> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::InvocationStackOverflow(self.limits.max_invocation_stack_size).to_string());
        }
        let (script, flags, carried) = {
            let current = self.invocation_stack.last().unwrap();
            (current.script.clone(), current.call_flags, current.evaluation_stack.iter().cloned().collect::<Vec<_>>())
        };
        let mut new_context = ExecutionContext::new(script, flags, 0);
        new_context.instruction_pointer = target;
        for item in carried {
            if let Some(h) = item.compound_handle() {
                self.reference_counter.add_stack_ref(h);
            }
            new_context.evaluation_stack.push(item, &mut self.reference_counter).map_err(|e| e.to_string())?;
        }
        self.invocation_stack.push(new_context);
        Ok(())
    }

    fn do_return(&mut self) -> Result<(), String> {
        if self.invocation_stack.len() <= 1 {
            self.state = VmState::Halt;
            return Ok(());
        }
        let mut returned = self.invocation_stack.pop().unwrap();
        let carried: Vec<StackItem> = returned.evaluation_stack.iter().cloned().collect();
        let caller = self.invocation_stack.last_mut().unwrap();
        for item in carried {
            caller.evaluation_stack.push(item, &mut self.reference_counter).map_err(|e| e.to_string())?;
        }
        returned.evaluation_stack.clear(&mut self.reference_counter);
        Ok(())
    }

    fn do_syscall(&mut self, hash: u32) -> Result<(), String> {
        let Some(entry) = self.syscalls.get(&hash) else {
            return Err(VmError::UnknownSyscall(hash).to_string());
        };
        let required = entry.required_flags;
        let have = self.current_context().unwrap().call_flags;
        if !have.contains(required) {
            return Err(format!(
                "syscall {} requires call flags {:?}, have {:?}",
                entry.name, required, have
            ));
        }
        let price = entry.fixed_price;
        let handler = entry.handler;
        self.add_gas(price);
        if self.state == VmState::Fault {
            return Ok(());
        }
        handler(self)
    }

    fn begin_try(&mut self, ip_at_start: usize, catch_offset: i64, finally_offset: i64) -> Result<(), String> {
        let context = self.invocation_stack.last().unwrap();
        let stack_depth = context.evaluation_stack.len();
        let end_offset = context.instruction_pointer;
        let catch = if catch_offset == 0 { None } else { Some(self.jump_target(ip_at_start, catch_offset)?) };
        let finally = if finally_offset == 0 { None } else { Some(self.jump_target(ip_at_start, finally_offset)?) };
        if catch.is_none() && finally.is_none() {
            return Err("TRY requires a catch or finally target".to_string());
        }
        let frame = ExceptionHandlingContext::new(catch, finally, end_offset, stack_depth);
        self.invocation_stack.last_mut().unwrap().exception_frames.push(frame);
        Ok(())
    }

    fn end_try(&mut self, ip_at_start: usize, offset: i64) -> Result<(), String> {
        let target = self.jump_target(ip_at_start, offset)?;
        let context = self.invocation_stack.last_mut().unwrap();
        let Some(frame) = context.exception_frames.last_mut() else {
            return Err("ENDTRY without a matching TRY".to_string());
        };
        if frame.state == ExceptionHandlingState::Finally {
            return Err("ENDTRY inside a finally block".to_string());
        }
        if frame.has_finally() {
            frame.end_offset = target;
            frame.state = ExceptionHandlingState::Finally;
            context.instruction_pointer = frame.finally_offset.unwrap();
        } else {
            context.exception_frames.pop();
            context.instruction_pointer = target;
        }
        Ok(())
    }

    fn end_finally(&mut self) -> Result<(), String> {
        let context = self.invocation_stack.last_mut().unwrap();
        let Some(frame) = context.exception_frames.pop() else {
            return Err("ENDFINALLY without a matching TRY".to_string());
        };
        context.instruction_pointer = frame.end_offset;
        Ok(())
    }

    fn compound_items(&self, item: &StackItem) -> Result<Vec<StackItem>, String> {
        match item {
            StackItem::Array(h) | StackItem::Struct(h) => match self.reference_counter.data(*h) {
                CompoundData::Array(v) | CompoundData::Struct(v) => Ok(v.clone()),
                _ => unreachable!(),
            },
            _ => Err("expected an Array or Struct".to_string()),
        }
    }

    fn pick_item(&mut self, item: StackItem, key: StackItem) -> Result<StackItem, String> {
        match item {
            StackItem::Array(h) | StackItem::Struct(h) => {
                let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())?;
                let CompoundData::Array(v) | CompoundData::Struct(v) = self.reference_counter.data(h) else { unreachable!() };
                v.get(idx.max(0) as usize).cloned().ok_or_else(|| "index out of range".to_string())
            }
            StackItem::Map(h) => {
                let CompoundData::Map(pairs) = self.reference_counter.data(h) else { unreachable!() };
                pairs
                    .iter()
                    .find(|(k, _)| self.reference_counter.structural_equals(k, &key, 8))
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| "key not found".to_string())
            }
            StackItem::Buffer(h) => {
                let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())?;
                let CompoundData::Buffer(b) = self.reference_counter.data(h) else { unreachable!() };
                b.get(idx.max(0) as usize).map(|&byte| StackItem::Integer(BigInt::from(byte))).ok_or_else(|| "index out of range".to_string())
            }
            StackItem::ByteString(b) => {
                let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())?;
                b.get(idx.max(0) as usize).map(|&byte| StackItem::Integer(BigInt::from(byte))).ok_or_else(|| "index out of range".to_string())
            }
            _ => Err("PICKITEM requires a collection".to_string()),
        }
    }

    fn set_item(&mut self, item: StackItem, key: StackItem, value: StackItem) -> Result<(), String> {
        match item {
            StackItem::Array(h) => {
                let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())? as usize;
                let CompoundData::Array(v) = self.reference_counter.data_mut(h) else { unreachable!() };
                let slot = v.get_mut(idx).ok_or("index out of range")?;
                *slot = value;
                Ok(())
            }
            StackItem::Map(h) => {
                let existing = {
                    let CompoundData::Map(pairs) = self.reference_counter.data(h) else { unreachable!() };
                    pairs.iter().position(|(k, _)| self.reference_counter.structural_equals(k, &key, 8))
                };
                let CompoundData::Map(pairs) = self.reference_counter.data_mut(h) else { unreachable!() };
                match existing {
                    Some(pos) => pairs[pos].1 = value,
                    None => pairs.push((key, value)),
                }
                Ok(())
            }
            StackItem::Buffer(h) => {
                let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())? as usize;
                let byte = bigint_to_i64_checked(&value.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())? as u8;
                let CompoundData::Buffer(b) = self.reference_counter.data_mut(h) else { unreachable!() };
                *b.get_mut(idx).ok_or("index out of range")? = byte;
                Ok(())
            }
            _ => Err("SETITEM requires a mutable collection".to_string()),
        }
    }

    fn remove_item(&mut self, item: StackItem, key: StackItem) -> Result<(), String> {
        match item {
            StackItem::Array(h) => {
                let idx = bigint_to_i64_checked(&key.as_int().map_err(|e| e.to_string())?).map_err(|e| e.to_string())? as usize;
                let CompoundData::Array(v) = self.reference_counter.data_mut(h) else { unreachable!() };
                if idx >= v.len() {
                    return Err("index out of range".to_string());
                }
                v.remove(idx);
                Ok(())
            }
            StackItem::Map(h) => {
                let pos = {
                    let CompoundData::Map(pairs) = self.reference_counter.data(h) else { unreachable!() };
                    pairs.iter().position(|(k, _)| self.reference_counter.structural_equals(k, &key, 8))
                };
                if let Some(pos) = pos {
                    let CompoundData::Map(pairs) = self.reference_counter.data_mut(h) else { unreachable!() };
                    pairs.remove(pos);
                }
                Ok(())
            }
            _ => Err("REMOVE requires a Map or Array".to_string()),
        }
    }

    fn convert(&mut self, item: StackItem, target: u8) -> Result<StackItem, String> {
        use StackItemType::*;
        let target_type = match target {
            0x00 => Any,
            0x20 => Boolean,
            0x21 => Integer,
            0x28 => ByteString,
            0x30 => Buffer,
            0x40 => Array,
            _ => return Err(format!("unsupported CONVERT target type 0x{target:02x}")),
        };
        match target_type {
            Boolean => Ok(StackItem::Boolean(item.as_bool(&self.reference_counter))),
            Integer => item.as_int().map(StackItem::Integer).map_err(|e| e.to_string()),
            ByteString => {
                let bytes = item.as_bytes(&self.reference_counter).map_err(|e| e.to_string())?;
                Ok(StackItem::ByteString(Arc::from(bytes.into_boxed_slice())))
            }
            Buffer => {
                let bytes = item.as_bytes(&self.reference_counter).map_err(|e| e.to_string())?;
                self.alloc_buffer(bytes)
            }
            Array => match item {
                StackItem::Array(_) => Ok(item),
                StackItem::Struct(h) => {
                    let CompoundData::Struct(v) = self.reference_counter.data(h) else { unreachable!() };
                    self.alloc_array(v.clone())
                }
                _ => Err("cannot convert item to Array".to_string()),
            },
            Any => Ok(item),
            _ => Err("unsupported CONVERT target type".to_string()),
        }
    }
}

#[derive(Clone, Copy)]
enum SlotKind {
    Static,
    Local,
    Argument,
}

fn default_for_type(type_byte: u8) -> StackItem {
    match type_byte {
        0x21 => StackItem::Integer(BigInt::zero()),
        0x20 => StackItem::Boolean(false),
        _ => StackItem::Null,
    }
}

trait ModFloor {
    fn mod_floor(&self, m: &BigInt) -> BigInt;
}

impl ModFloor for BigInt {
    fn mod_floor(&self, m: &BigInt) -> BigInt {
        let r = self % m;
        if (r.is_negative() && m.is_positive()) || (r.is_positive() && m.is_negative()) {
            r + m
        } else {
            r
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;

    fn engine() -> ExecutionEngine<()> {
        ExecutionEngine::new((), 10_000_000, ExecutionLimits::default())
    }

    #[test]
    fn push0_push16_add_halts_with_16() {
        let mut e = engine();
        let script = Script::new(vec![0x10, 0x20, 0x9E]).unwrap();
        e.load_script(script, CallFlags::ALL);
        let state = e.execute();
        assert_eq!(state, VmState::Halt);
        let result = e.result_stack();
        assert_eq!(result.len(), 1);
        assert!(matches!(&result[0], StackItem::Integer(i) if *i == BigInt::from(16)));
        assert_eq!(
            e.gas_consumed,
            base_price(OpCode::Push0) + base_price(OpCode::Push16) + base_price(OpCode::Add)
        );
    }

    #[test]
    fn division_by_zero_faults() {
        let mut e = engine();
        // PUSH1 PUSH0 DIV
        let script = Script::new(vec![0x11, 0x10, 0xA1]).unwrap();
        e.load_script(script, CallFlags::ALL);
        assert_eq!(e.execute(), VmState::Fault);
    }

    #[test]
    fn assert_false_faults() {
        let mut e = engine();
        // PUSHF(Push0 as falsy int) ASSERT -> fault; use PUSH0 then ASSERT
        let script = Script::new(vec![0x10, 0x39]).unwrap();
        e.load_script(script, CallFlags::ALL);
        assert_eq!(e.execute(), VmState::Fault);
    }

    #[test]
    fn try_catch_recovers_from_throw() {
        // TRY catch=+5 finally=0 (ip0..3); PUSH1 THROW (ip3,4);
        // catch: DROP the thrown value, PUSH2 (ip5,6); ENDTRY +2 -> RET (ip7,8,9).
        let mut e = engine();
        let script_bytes: Vec<u8> = vec![
            0x3B, 0x05, 0x00, // TRY
            0x11, 0x3A,       // PUSH1 THROW
            0x45, 0x12,       // catch: DROP PUSH2
            0x3D, 0x02,       // ENDTRY +2
            0x40,             // RET
        ];
        let script = Script::new(script_bytes).unwrap();
        e.load_script(script, CallFlags::ALL);
        let state = e.execute();
        assert_eq!(state, VmState::Halt);
        let result = e.result_stack();
        assert_eq!(result.len(), 1);
        assert!(matches!(&result[0], StackItem::Integer(i) if *i == BigInt::from(2)));
    }
}
