//! The linked program and its o0 binary image.

use std::fmt::{self, Display, Formatter};
use std::io::Write;

use crate::Instr;

const MAGIC: u32 = 0x7230_3b3e;
const VERSION: u32 = 1;

/// A linked program, ready to be written out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub globals: Vec<GlobalDef>,
    /// The entry function first, then user functions in declaration order.
    pub functions: Vec<FunctionDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlobalDef {
    pub is_const: bool,
    pub value: GlobalValue,
}

/// The initial contents of a global slot.
#[derive(Clone, Debug, PartialEq)]
pub enum GlobalValue {
    /// A variable, zeroed until the entry function stores to it.
    Slot,
    Int(i64),
    Float(f64),
    Str(String),
}

impl GlobalValue {
    fn kind(&self) -> u8 {
        match self {
            GlobalValue::Slot => 0,
            GlobalValue::Int(_) => 1,
            GlobalValue::Float(_) => 2,
            GlobalValue::Str(_) => 3,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            GlobalValue::Slot => vec![0; 8],
            GlobalValue::Int(i) => i.to_be_bytes().to_vec(),
            GlobalValue::Float(f) => f.to_bits().to_be_bytes().to_vec(),
            GlobalValue::Str(s) => s.as_bytes().to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    /// Global index of the constant holding the function's name.
    pub name: u32,
    pub ret_slots: u32,
    pub param_slots: u32,
    pub loc_slots: u32,
    pub body: Vec<Instr>,
}

impl Program {
    /// Encodes the program as an o0 image. All integers are big-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC);
        put_u32(&mut out, VERSION);

        put_u32(&mut out, self.globals.len() as u32);
        for global in &self.globals {
            let payload = global.value.payload();
            out.push(global.is_const as u8);
            out.push(global.value.kind());
            put_u32(&mut out, payload.len() as u32);
            out.extend_from_slice(&payload);
        }

        put_u32(&mut out, self.functions.len() as u32);
        for function in &self.functions {
            put_u32(&mut out, function.name);
            put_u32(&mut out, function.ret_slots);
            put_u32(&mut out, function.param_slots);
            put_u32(&mut out, function.loc_slots);
            put_u32(&mut out, function.body.len() as u32);
            for instr in &function.body {
                instr.encode(&mut out);
            }
        }
        out
    }

    pub fn write_to(&self, sink: &mut impl Write) -> std::io::Result<()> {
        sink.write_all(&self.to_bytes())
    }

    fn function_name(&self, def: &FunctionDef) -> Option<&str> {
        match self.globals.get(def.name as usize) {
            Some(GlobalDef {
                value: GlobalValue::Str(s),
                ..
            }) => Some(s),
            _ => None,
        }
    }
}

fn put_u32(out: &mut Vec<u8>, x: u32) {
    out.extend_from_slice(&x.to_be_bytes());
}

/// An assembly listing, one global or instruction per line.
impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, ".globals")?;
        for (i, global) in self.globals.iter().enumerate() {
            let qualifier = if global.is_const { "const" } else { "var" };
            match &global.value {
                GlobalValue::Slot => writeln!(f, "{:>4}: {}", i, qualifier)?,
                GlobalValue::Int(x) => writeln!(f, "{:>4}: {} {}", i, qualifier, x)?,
                GlobalValue::Float(x) => writeln!(f, "{:>4}: {} {:?}", i, qualifier, x)?,
                GlobalValue::Str(s) => writeln!(f, "{:>4}: {} {:?}", i, qualifier, s)?,
            }
        }
        for def in &self.functions {
            writeln!(
                f,
                "\nfn {} [ret {}, params {}, locals {}]",
                self.function_name(def).unwrap_or("?"),
                def.ret_slots,
                def.param_slots,
                def.loc_slots
            )?;
            for (i, instr) in def.body.iter().enumerate() {
                writeln!(f, "{:>4}: {}", i, instr)?;
            }
        }
        Ok(())
    }
}
