use crate::ErrorKind;
use crate::FunctionDef;
use crate::Instr;

use super::super::ValueType;

/// Refers to a function owned by the global symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionId(pub(super) usize);

/// A stable handle to an instruction in a function's code. The handle equal
/// to the code length refers to the next instruction to be emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstrId(pub(super) usize);

impl InstrId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The continue target and the pending `break` branches of one loop.
#[derive(Debug)]
struct LoopBinding {
    continue_target: InstrId,
    breaks: Vec<InstrId>,
}

#[derive(Debug)]
pub struct Function {
    name: String,
    /// Global index of the constant holding this function's name.
    name_slot: u32,
    params: Vec<ValueType>,
    return_type: ValueType,
    code: Vec<Instr>,
    loc_slots: u32,
    /// Innermost loop last.
    loops: Vec<LoopBinding>,
    /// Library functions are provided by the VM and have no body.
    is_library: bool,
}

impl Function {
    pub(super) fn new(name: &str, name_slot: u32) -> Self {
        Function {
            name: name.to_string(),
            name_slot,
            params: Vec::new(),
            return_type: ValueType::Void,
            code: Vec::new(),
            loc_slots: 0,
            loops: Vec::new(),
            is_library: false,
        }
    }

    pub(super) fn make_library(&mut self, params: &[ValueType], return_type: ValueType) {
        self.params = params.to_vec();
        self.return_type = return_type;
        self.is_library = true;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_slot(&self) -> u32 {
        self.name_slot
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    pub fn ret_slots(&self) -> u32 {
        self.return_type.slots()
    }

    pub fn param_slots(&self) -> u32 {
        self.params.len() as u32
    }

    pub fn loc_slots(&self) -> u32 {
        self.loc_slots
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    pub fn is_library(&self) -> bool {
        self.is_library
    }

    pub(super) fn set_return_type(&mut self, return_type: ValueType) {
        self.return_type = return_type;
    }

    /// Returns the parameter's index.
    pub(super) fn add_param(&mut self, value_type: ValueType) -> u32 {
        self.params.push(value_type);
        self.params.len() as u32 - 1
    }

    /// Allocates a fresh local slot. Slots are never reused, even after the
    /// block that declared them closes.
    pub(super) fn alloc_local(&mut self) -> u32 {
        self.loc_slots += 1;
        self.loc_slots - 1
    }

    pub(super) fn push(&mut self, instr: Instr) -> InstrId {
        log::trace!("{}: {}", self.name, instr);
        self.code.push(instr);
        InstrId(self.code.len() - 1)
    }

    pub(super) fn next_id(&self) -> InstrId {
        InstrId(self.code.len())
    }

    /// Drops `from` and everything emitted after it.
    pub(super) fn truncate(&mut self, from: InstrId) {
        self.code.truncate(from.0);
    }

    /// Rewrites the branch at `at` so that it lands on `target`.
    pub(super) fn patch_branch(&mut self, at: InstrId, target: InstrId) -> Result<(), ErrorKind> {
        if target > self.next_id() {
            return Err(ErrorKind::Internal(format!(
                "branch target {} is past the end of `{}`",
                target.0, self.name
            )));
        }
        // The VM adds the offset to the address of the following instruction.
        let offset = target.0 as i32 - at.0 as i32 - 1;
        let patched = self
            .code
            .get(at.0)
            .and_then(|instr| instr.with_offset(offset));
        match patched {
            Some(instr) => {
                self.code[at.0] = instr;
                Ok(())
            }
            None => Err(ErrorKind::Internal(format!(
                "instruction {} of `{}` is not a branch",
                at.0, self.name
            ))),
        }
    }

    /// Appends `ret` unless the body already ends with one that no branch
    /// jumps past.
    pub(super) fn seal(&mut self) {
        let end = self.code.len() as i64;
        let jumps_to_end = self.code.iter().enumerate().any(|(i, instr)| match instr {
            Instr::Br(off) | Instr::BrFalse(off) => i as i64 + 1 + i64::from(*off) == end,
            _ => false,
        });
        if jumps_to_end || self.code.last() != Some(&Instr::Ret) {
            self.push(Instr::Ret);
        }
    }

    pub(super) fn enter_loop(&mut self, continue_target: InstrId) {
        self.loops.push(LoopBinding {
            continue_target,
            breaks: Vec::new(),
        });
    }

    /// Closes the innermost loop, pointing its `break`s at the next instruction.
    pub(super) fn leave_loop(&mut self) -> Result<(), ErrorKind> {
        let binding = self.loops.pop().ok_or_else(not_in_loop)?;
        let end = self.next_id();
        for at in binding.breaks {
            self.patch_branch(at, end)?;
        }
        Ok(())
    }

    pub(super) fn mark_continue(&mut self) -> Result<InstrId, ErrorKind> {
        let target = self.loops.last().ok_or_else(not_in_loop)?.continue_target;
        let at = self.push(Instr::Br(0));
        self.patch_branch(at, target)?;
        Ok(at)
    }

    pub(super) fn mark_break(&mut self) -> Result<InstrId, ErrorKind> {
        if self.loops.is_empty() {
            return Err(not_in_loop());
        }
        let at = self.push(Instr::Br(0));
        if let Some(binding) = self.loops.last_mut() {
            binding.breaks.push(at);
        }
        Ok(at)
    }

    pub(super) fn to_def(&self) -> FunctionDef {
        FunctionDef {
            name: self.name_slot,
            ret_slots: self.ret_slots(),
            param_slots: self.param_slots(),
            loc_slots: self.loc_slots,
            body: self.code.clone(),
        }
    }
}

fn not_in_loop() -> ErrorKind {
    ErrorKind::Structural("`break` or `continue` outside of a loop".to_string())
}
