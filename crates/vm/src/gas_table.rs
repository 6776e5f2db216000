//! Per-opcode gas prices (spec §4.3, §9 Open Questions). Prices follow the
//! publicly documented Neo N3 `ApplicationEngine.OpCodePriceTable` scale:
//! cheap stack/push/flow-control opcodes cost `1 << 0`..`1 << 4`, arithmetic
//! `1 << 3`, compound-type construction `1 << 4`/`1 << 8`, and syscalls are
//! priced by their interop registration rather than a fixed opcode price.
//!
//! Some opcodes have a base price plus a data-dependent component (charged
//! by the caller, not this table): `PUSHDATA*` scales with payload length,
//! `CAT`/`NEWARRAY`/`NEWBUFFER` scale with the resulting item size.

use crate::op_code::OpCode;

/// Fixed per-opcode price in gas units (1 unit = 1e-8 GAS datoshi).
pub fn base_price(op: OpCode) -> i64 {
    use OpCode::*;
    match op {
        // Constants: cheap, a handful of scales by encoded width.
        PushInt8 | PushInt16 | Push0 | Push1 | Push2 | Push3 | Push4 | Push5 | Push6 | Push7
        | Push8 | Push9 | Push10 | Push11 | Push12 | Push13 | Push14 | Push15 | Push16 | PushM1
        | Nop => 1 << 0,
        PushInt32 | PushInt64 => 1 << 1,
        PushInt128 | PushInt256 | PushA => 1 << 2,
        PushNull => 1 << 4,
        PushData1 => 1 << 3,
        PushData2 => 1 << 9,
        PushData4 => 1 << 12,

        // Flow control.
        Jmp | JmpL | JmpIf | JmpIfL | JmpIfNot | JmpIfNotL | JmpEq | JmpEqL | JmpNe | JmpNeL
        | JmpGt | JmpGtL | JmpGe | JmpGeL | JmpLt | JmpLtL | JmpLe | JmpLeL => 1 << 1,
        Call | CallL | CallA => 1 << 9,
        CallT => 1 << 15,
        Abort | AbortMsg => 0,
        Assert | AssertMsg => 1 << 0,
        Throw => 1 << 9,
        Try | TryL | EndTry | EndTryL | EndFinally => 1 << 2,
        Ret => 0,
        Syscall => 0,

        // Stack.
        Depth | Drop | Nip | XDrop | Clear | Dup | Over | Pick | Tuck | Swap | Rot | Roll
        | Reverse3 | Reverse4 | ReverseN => 1 << 1,

        // Slots.
        InitSSlot => 1 << 4,
        InitSlot => 1 << 6,
        LdSFld0 | LdSFld1 | LdSFld2 | LdSFld3 | LdSFld4 | LdSFld5 | LdSFld6 | LdSFld | StSFld0
        | StSFld1 | StSFld2 | StSFld3 | StSFld4 | StSFld5 | StSFld6 | StSFld | LdLoc0 | LdLoc1
        | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6 | LdLoc | StLoc0 | StLoc1 | StLoc2
        | StLoc3 | StLoc4 | StLoc5 | StLoc6 | StLoc | LdArg0 | LdArg1 | LdArg2 | LdArg3
        | LdArg4 | LdArg5 | LdArg6 | LdArg | StArg0 | StArg1 | StArg2 | StArg3 | StArg4
        | StArg5 | StArg6 | StArg => 1 << 1,

        // Splice: base price only, caller adds the per-byte component.
        NewBuffer => 1 << 4,
        MemCpy | Cat | SubStr | Left | Right => 1 << 8,

        // Bitwise logic.
        Invert => 1 << 2,
        And | Or | Xor | Equal | NotEqual => 1 << 3,

        // Arithmetic.
        Sign | Abs | Negate | Inc | Dec | Not | Nz => 1 << 2,
        Add | Sub | Mul | Div | Mod | Shl | Shr | BoolAnd | BoolOr | NumEqual | NumNotEqual
        | Lt | Le | Gt | Ge | Min | Max | Within => 1 << 3,
        Pow | ModMul => 1 << 6,
        Sqrt | ModPow => 1 << 7,

        // Compound types.
        PackMap | PackStruct | Pack | Unpack => 1 << 8,
        NewArray0 | NewStruct0 | NewMap => 1 << 4,
        NewArray | NewArrayT | NewStruct => 1 << 8,
        Size | HasKey | Keys | Values | PickItem | Append | SetItem | ReverseItems | Remove
        | ClearItems | PopItem => 1 << 4,

        // Types.
        IsNull | IsType => 1 << 1,
        Convert => 1 << 13,
    }
}

/// Per-byte surcharge for `PUSHDATA*`/`NEWBUFFER`/`CAT`-style opcodes whose
/// true cost scales with the resulting data size; `base_price` already
/// covers the fixed component.
pub const BYTE_PRICE: i64 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_add_example_matches_documented_scenario() {
        // spec §8 scenario 3: PUSH0 PUSH16 ADD.
        let total = base_price(OpCode::Push0) + base_price(OpCode::Push16) + base_price(OpCode::Add);
        assert_eq!(total, 1 + 1 + (1 << 3));
    }

    #[test]
    fn syscall_has_no_fixed_opcode_price() {
        assert_eq!(base_price(OpCode::Syscall), 0);
    }
}
