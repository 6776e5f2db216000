//! The Neo N3 VM instruction set. One byte per opcode; some opcodes carry a
//! fixed-size or length-prefixed operand immediately following the opcode
//! byte (see [`OpCode::operand_size`]).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // ---- Constants ----
    PushInt8 = 0x00,
    PushInt16 = 0x01,
    PushInt32 = 0x02,
    PushInt64 = 0x03,
    PushInt128 = 0x04,
    PushInt256 = 0x05,
    PushA = 0x0A,
    PushNull = 0x0B,
    PushData1 = 0x0C,
    PushData2 = 0x0D,
    PushData4 = 0x0E,
    PushM1 = 0x0F,
    Push0 = 0x10,
    Push1 = 0x11,
    Push2 = 0x12,
    Push3 = 0x13,
    Push4 = 0x14,
    Push5 = 0x15,
    Push6 = 0x16,
    Push7 = 0x17,
    Push8 = 0x18,
    Push9 = 0x19,
    Push10 = 0x1A,
    Push11 = 0x1B,
    Push12 = 0x1C,
    Push13 = 0x1D,
    Push14 = 0x1E,
    Push15 = 0x1F,
    Push16 = 0x20,

    // ---- Flow control ----
    Nop = 0x21,
    Jmp = 0x22,
    JmpL = 0x23,
    JmpIf = 0x24,
    JmpIfL = 0x25,
    JmpIfNot = 0x26,
    JmpIfNotL = 0x27,
    JmpEq = 0x28,
    JmpEqL = 0x29,
    JmpNe = 0x2A,
    JmpNeL = 0x2B,
    JmpGt = 0x2C,
    JmpGtL = 0x2D,
    JmpGe = 0x2E,
    JmpGeL = 0x2F,
    JmpLt = 0x30,
    JmpLtL = 0x31,
    JmpLe = 0x32,
    JmpLeL = 0x33,
    Call = 0x34,
    CallL = 0x35,
    CallA = 0x36,
    CallT = 0x37,
    Abort = 0x38,
    Assert = 0x39,
    Throw = 0x3A,
    Try = 0x3B,
    TryL = 0x3C,
    EndTry = 0x3D,
    EndTryL = 0x3E,
    EndFinally = 0x3F,
    Ret = 0x40,
    Syscall = 0x41,

    // ---- Stack ----
    Depth = 0x43,
    Drop = 0x45,
    Nip = 0x46,
    XDrop = 0x48,
    Clear = 0x49,
    Dup = 0x4A,
    Over = 0x4B,
    Pick = 0x4D,
    Tuck = 0x4E,
    Swap = 0x50,
    Rot = 0x51,
    Roll = 0x52,
    Reverse3 = 0x53,
    Reverse4 = 0x54,
    ReverseN = 0x55,

    // ---- Slot ----
    InitSSlot = 0x56,
    InitSlot = 0x57,
    LdSFld0 = 0x58,
    LdSFld1 = 0x59,
    LdSFld2 = 0x5A,
    LdSFld3 = 0x5B,
    LdSFld4 = 0x5C,
    LdSFld5 = 0x5D,
    LdSFld6 = 0x5E,
    LdSFld = 0x5F,
    StSFld0 = 0x60,
    StSFld1 = 0x61,
    StSFld2 = 0x62,
    StSFld3 = 0x63,
    StSFld4 = 0x64,
    StSFld5 = 0x65,
    StSFld6 = 0x66,
    StSFld = 0x67,
    LdLoc0 = 0x68,
    LdLoc1 = 0x69,
    LdLoc2 = 0x6A,
    LdLoc3 = 0x6B,
    LdLoc4 = 0x6C,
    LdLoc5 = 0x6D,
    LdLoc6 = 0x6E,
    LdLoc = 0x6F,
    StLoc0 = 0x70,
    StLoc1 = 0x71,
    StLoc2 = 0x72,
    StLoc3 = 0x73,
    StLoc4 = 0x74,
    StLoc5 = 0x75,
    StLoc6 = 0x76,
    StLoc = 0x77,
    LdArg0 = 0x78,
    LdArg1 = 0x79,
    LdArg2 = 0x7A,
    LdArg3 = 0x7B,
    LdArg4 = 0x7C,
    LdArg5 = 0x7D,
    LdArg6 = 0x7E,
    LdArg = 0x7F,
    StArg0 = 0x80,
    StArg1 = 0x81,
    StArg2 = 0x82,
    StArg3 = 0x83,
    StArg4 = 0x84,
    StArg5 = 0x85,
    StArg6 = 0x86,
    StArg = 0x87,

    // ---- Splice ----
    NewBuffer = 0x88,
    MemCpy = 0x89,
    Cat = 0x8B,
    SubStr = 0x8C,
    Left = 0x8D,
    Right = 0x8E,

    // ---- Bitwise logic ----
    Invert = 0x90,
    And = 0x91,
    Or = 0x92,
    Xor = 0x93,
    Equal = 0x97,
    NotEqual = 0x98,

    // ---- Arithmetic ----
    Sign = 0x99,
    Abs = 0x9A,
    Negate = 0x9B,
    Inc = 0x9C,
    Dec = 0x9D,
    Add = 0x9E,
    Sub = 0x9F,
    Mul = 0xA0,
    Div = 0xA1,
    Mod = 0xA2,
    Pow = 0xA3,
    Sqrt = 0xA4,
    ModMul = 0xA5,
    ModPow = 0xA6,
    Shl = 0xA8,
    Shr = 0xA9,
    Not = 0xAA,
    BoolAnd = 0xAB,
    BoolOr = 0xAC,
    Nz = 0xB1,
    NumEqual = 0xB3,
    NumNotEqual = 0xB4,
    Lt = 0xB5,
    Le = 0xB6,
    Gt = 0xB7,
    Ge = 0xB8,
    Min = 0xB9,
    Max = 0xBA,
    Within = 0xBB,

    // ---- Compound types ----
    PackMap = 0xBE,
    PackStruct = 0xBF,
    Pack = 0xC0,
    Unpack = 0xC1,
    NewArray0 = 0xC2,
    NewArray = 0xC3,
    NewArrayT = 0xC4,
    NewStruct0 = 0xC5,
    NewStruct = 0xC6,
    NewMap = 0xC8,
    Size = 0xCA,
    HasKey = 0xCB,
    Keys = 0xCC,
    Values = 0xCD,
    PickItem = 0xCE,
    Append = 0xCF,
    SetItem = 0xD0,
    ReverseItems = 0xD1,
    Remove = 0xD2,
    ClearItems = 0xD3,
    PopItem = 0xD4,

    // ---- Types ----
    IsNull = 0xD8,
    IsType = 0xD9,
    Convert = 0xDB,

    // ---- Extensions ----
    AbortMsg = 0xE0,
    AssertMsg = 0xE1,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use OpCode::*;
        Some(match byte {
            0x00 => PushInt8,
            0x01 => PushInt16,
            0x02 => PushInt32,
            0x03 => PushInt64,
            0x04 => PushInt128,
            0x05 => PushInt256,
            0x0A => PushA,
            0x0B => PushNull,
            0x0C => PushData1,
            0x0D => PushData2,
            0x0E => PushData4,
            0x0F => PushM1,
            0x10 => Push0,
            0x11 => Push1,
            0x12 => Push2,
            0x13 => Push3,
            0x14 => Push4,
            0x15 => Push5,
            0x16 => Push6,
            0x17 => Push7,
            0x18 => Push8,
            0x19 => Push9,
            0x1A => Push10,
            0x1B => Push11,
            0x1C => Push12,
            0x1D => Push13,
            0x1E => Push14,
            0x1F => Push15,
            0x20 => Push16,
            0x21 => Nop,
            0x22 => Jmp,
            0x23 => JmpL,
            0x24 => JmpIf,
            0x25 => JmpIfL,
            0x26 => JmpIfNot,
            0x27 => JmpIfNotL,
            0x28 => JmpEq,
            0x29 => JmpEqL,
            0x2A => JmpNe,
            0x2B => JmpNeL,
            0x2C => JmpGt,
            0x2D => JmpGtL,
            0x2E => JmpGe,
            0x2F => JmpGeL,
            0x30 => JmpLt,
            0x31 => JmpLtL,
            0x32 => JmpLe,
            0x33 => JmpLeL,
            0x34 => Call,
            0x35 => CallL,
            0x36 => CallA,
            0x37 => CallT,
            0x38 => Abort,
            0x39 => Assert,
            0x3A => Throw,
            0x3B => Try,
            0x3C => TryL,
            0x3D => EndTry,
            0x3E => EndTryL,
            0x3F => EndFinally,
            0x40 => Ret,
            0x41 => Syscall,
            0x43 => Depth,
            0x45 => Drop,
            0x46 => Nip,
            0x48 => XDrop,
            0x49 => Clear,
            0x4A => Dup,
            0x4B => Over,
            0x4D => Pick,
            0x4E => Tuck,
            0x50 => Swap,
            0x51 => Rot,
            0x52 => Roll,
            0x53 => Reverse3,
            0x54 => Reverse4,
            0x55 => ReverseN,
            0x56 => InitSSlot,
            0x57 => InitSlot,
            0x58 => LdSFld0,
            0x59 => LdSFld1,
            0x5A => LdSFld2,
            0x5B => LdSFld3,
            0x5C => LdSFld4,
            0x5D => LdSFld5,
            0x5E => LdSFld6,
            0x5F => LdSFld,
            0x60 => StSFld0,
            0x61 => StSFld1,
            0x62 => StSFld2,
            0x63 => StSFld3,
            0x64 => StSFld4,
            0x65 => StSFld5,
            0x66 => StSFld6,
            0x67 => StSFld,
            0x68 => LdLoc0,
            0x69 => LdLoc1,
            0x6A => LdLoc2,
            0x6B => LdLoc3,
            0x6C => LdLoc4,
            0x6D => LdLoc5,
            0x6E => LdLoc6,
            0x6F => LdLoc,
            0x70 => StLoc0,
            0x71 => StLoc1,
            0x72 => StLoc2,
            0x73 => StLoc3,
            0x74 => StLoc4,
            0x75 => StLoc5,
            0x76 => StLoc6,
            0x77 => StLoc,
            0x78 => LdArg0,
            0x79 => LdArg1,
            0x7A => LdArg2,
            0x7B => LdArg3,
            0x7C => LdArg4,
            0x7D => LdArg5,
            0x7E => LdArg6,
            0x7F => LdArg,
            0x80 => StArg0,
            0x81 => StArg1,
            0x82 => StArg2,
            0x83 => StArg3,
            0x84 => StArg4,
            0x85 => StArg5,
            0x86 => StArg6,
            0x87 => StArg,
            0x88 => NewBuffer,
            0x89 => MemCpy,
            0x8B => Cat,
            0x8C => SubStr,
            0x8D => Left,
            0x8E => Right,
            0x90 => Invert,
            0x91 => And,
            0x92 => Or,
            0x93 => Xor,
            0x97 => Equal,
            0x98 => NotEqual,
            0x99 => Sign,
            0x9A => Abs,
            0x9B => Negate,
            0x9C => Inc,
            0x9D => Dec,
            0x9E => Add,
            0x9F => Sub,
            0xA0 => Mul,
            0xA1 => Div,
            0xA2 => Mod,
            0xA3 => Pow,
            0xA4 => Sqrt,
            0xA5 => ModMul,
            0xA6 => ModPow,
            0xA8 => Shl,
            0xA9 => Shr,
            0xAA => Not,
            0xAB => BoolAnd,
            0xAC => BoolOr,
            0xB1 => Nz,
            0xB3 => NumEqual,
            0xB4 => NumNotEqual,
            0xB5 => Lt,
            0xB6 => Le,
            0xB7 => Gt,
            0xB8 => Ge,
            0xB9 => Min,
            0xBA => Max,
            0xBB => Within,
            0xBE => PackMap,
            0xBF => PackStruct,
            0xC0 => Pack,
            0xC1 => Unpack,
            0xC2 => NewArray0,
            0xC3 => NewArray,
            0xC4 => NewArrayT,
            0xC5 => NewStruct0,
            0xC6 => NewStruct,
            0xC8 => NewMap,
            0xCA => Size,
            0xCB => HasKey,
            0xCC => Keys,
            0xCD => Values,
            0xCE => PickItem,
            0xCF => Append,
            0xD0 => SetItem,
            0xD1 => ReverseItems,
            0xD2 => Remove,
            0xD3 => ClearItems,
            0xD4 => PopItem,
            0xD8 => IsNull,
            0xD9 => IsType,
            0xDB => Convert,
            0xE0 => AbortMsg,
            0xE1 => AssertMsg,
            _ => return None,
        })
    }

    /// Size in bytes of the operand immediately following this opcode, not
    /// counting the opcode byte itself. `None` means the operand is a
    /// variable-length, length-prefixed byte string (`PUSHDATA*`).
    pub fn fixed_operand_size(self) -> Option<usize> {
        use OpCode::*;
        Some(match self {
            PushInt8 => 1,
            PushInt16 => 2,
            PushInt32 => 4,
            PushInt64 => 8,
            PushInt128 => 16,
            PushInt256 => 32,
            PushA => 4,
            Jmp | JmpIf | JmpIfNot | JmpEq | JmpNe | JmpGt | JmpGe | JmpLt | JmpLe | Call
            | EndTry => 1,
            JmpL | JmpIfL | JmpIfNotL | JmpEqL | JmpNeL | JmpGtL | JmpGeL | JmpLtL | JmpLeL
            | CallL | EndTryL => 4,
            CallA => 0,
            CallT => 2,
            Try => 2,
            TryL => 8,
            Syscall => 4,
            InitSSlot => 1,
            InitSlot => 2,
            LdSFld | StSFld | LdLoc | StLoc | LdArg | StArg => 1,
            NewArrayT | IsType | Convert => 1,
            Pick | Roll | ReverseN | XDrop => 0,
            _ => 0,
        })
    }

    /// `PUSHDATA1/2/4` carry a length-prefixed operand whose prefix width is
    /// 1/2/4 bytes respectively.
    pub fn push_data_prefix_len(self) -> Option<usize> {
        match self {
            OpCode::PushData1 => Some(1),
            OpCode::PushData2 => Some(2),
            OpCode::PushData4 => Some(4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_documented_opcode() {
        for byte in 0u16..=255 {
            if let Some(op) = OpCode::from_byte(byte as u8) {
                assert_eq!(op as u8, byte as u8);
            }
        }
    }

    #[test]
    fn push_family_values_match_wire_spec() {
        assert_eq!(OpCode::Push0 as u8, 0x10);
        assert_eq!(OpCode::Push16 as u8, 0x20);
        assert_eq!(OpCode::PushM1 as u8, 0x0F);
    }
}
