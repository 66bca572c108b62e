use std::fmt::{self, Display, Formatter};

/// A single stack-machine instruction. The operand, if any, is carried by the
/// variant; its encoded width is fixed per opcode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instr {
    Push(u64),
    Pop,

    // Addressing. Each pushes the address of a slot.
    Loca(u32),
    Arga(u32),
    Globa(u32),

    Load64,
    Store64,
    StackAlloc(u32),

    AddI,
    SubI,
    MulI,
    DivI,
    AddF,
    SubF,
    MulF,
    DivF,

    Not,
    CmpI,
    CmpF,
    NegI,
    NegF,
    SetLt,
    SetGt,

    // Branch offsets are relative to the instruction after the branch.
    Br(i32),
    BrFalse(i32),

    Ret,
    // The operand is the global index of the callee's name.
    CallName(u32),
}

impl Instr {
    pub fn opcode(&self) -> u8 {
        use Instr::*;
        match self {
            Push(_) => 0x01,
            Pop => 0x02,
            Loca(_) => 0x0a,
            Arga(_) => 0x0b,
            Globa(_) => 0x0c,
            Load64 => 0x13,
            Store64 => 0x17,
            StackAlloc(_) => 0x1a,
            AddI => 0x20,
            SubI => 0x21,
            MulI => 0x22,
            DivI => 0x23,
            AddF => 0x24,
            SubF => 0x25,
            MulF => 0x26,
            DivF => 0x27,
            Not => 0x2e,
            CmpI => 0x30,
            CmpF => 0x32,
            NegI => 0x34,
            NegF => 0x35,
            SetLt => 0x39,
            SetGt => 0x3a,
            Br(_) => 0x41,
            BrFalse(_) => 0x42,
            Ret => 0x49,
            CallName(_) => 0x4a,
        }
    }

    /// Appends the opcode and its big-endian operand to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        use Instr::*;
        out.push(self.opcode());
        match *self {
            Push(x) => out.extend_from_slice(&x.to_be_bytes()),
            Br(off) | BrFalse(off) => out.extend_from_slice(&off.to_be_bytes()),
            Loca(x) | Arga(x) | Globa(x) | StackAlloc(x) | CallName(x) => {
                out.extend_from_slice(&x.to_be_bytes())
            }
            _ => (),
        }
    }

    /// Returns the same branch instruction with a new offset, or `None` if
    /// this is not a branch.
    pub fn with_offset(self, offset: i32) -> Option<Instr> {
        match self {
            Instr::Br(_) => Some(Instr::Br(offset)),
            Instr::BrFalse(_) => Some(Instr::BrFalse(offset)),
            _ => None,
        }
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use Instr::*;
        match self {
            Push(x) => write!(f, "push {}", x),
            Pop => write!(f, "pop"),
            Loca(i) => write!(f, "loca {}", i),
            Arga(i) => write!(f, "arga {}", i),
            Globa(i) => write!(f, "globa {}", i),
            Load64 => write!(f, "load.64"),
            Store64 => write!(f, "store.64"),
            StackAlloc(n) => write!(f, "stackalloc {}", n),
            AddI => write!(f, "add.i"),
            SubI => write!(f, "sub.i"),
            MulI => write!(f, "mul.i"),
            DivI => write!(f, "div.i"),
            AddF => write!(f, "add.f"),
            SubF => write!(f, "sub.f"),
            MulF => write!(f, "mul.f"),
            DivF => write!(f, "div.f"),
            Not => write!(f, "not"),
            CmpI => write!(f, "cmp.i"),
            CmpF => write!(f, "cmp.f"),
            NegI => write!(f, "neg.i"),
            NegF => write!(f, "neg.f"),
            SetLt => write!(f, "set.lt"),
            SetGt => write!(f, "set.gt"),
            Br(off) => write!(f, "br {}", off),
            BrFalse(off) => write!(f, "br.false {}", off),
            Ret => write!(f, "ret"),
            CallName(i) => write!(f, "callname {}", i),
        }
    }
}
