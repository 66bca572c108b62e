//! This module provides the `SymbolManager`, which owns every scope, declares
//! names, resolves them to addresses and finally links the program.

mod function;
mod table;

use std::io::Write;

use crate::Error;
use crate::ErrorKind;
use crate::Instr;
use crate::Result;
use crate::{GlobalDef, GlobalValue, Program};

use super::ValueType;

pub use function::{Function, FunctionId, InstrId};
pub use table::{Param, Slot, Symbol, Variable};

use table::{GlobalSymbolTable, SymbolTable};

/// The synthetic function that initializes globals and calls `main`.
const START: &str = "_start";

#[derive(Debug)]
pub struct SymbolManager {
    global: GlobalSymbolTable,
    /// `locals[0]` is the current function's own table (parameters and
    /// top-level locals); the rest are nested blocks, innermost last.
    locals: Vec<SymbolTable>,
    current: FunctionId,
    start: FunctionId,
}

impl Default for SymbolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolManager {
    pub fn new() -> Self {
        let mut global = GlobalSymbolTable::default();
        global.load_library();
        let start = global.add_function(START);
        SymbolManager {
            global,
            locals: Vec::new(),
            current: start,
            start,
        }
    }

    /// Searches every active scope, innermost first.
    pub fn find_symbol(&self, name: &str) -> Option<Symbol> {
        self.locals
            .iter()
            .rev()
            .chain(std::iter::once(&self.global.table))
            .find_map(|table| table.find(name))
            .copied()
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.global.functions[id.0]
    }

    pub fn current_function(&self) -> &Function {
        self.function(self.current)
    }

    fn current_mut(&mut self) -> &mut Function {
        &mut self.global.functions[self.current.0]
    }

    pub fn is_global_scope(&self) -> bool {
        self.locals.is_empty()
    }

    /// The number of tables on the scope stack, including the global one.
    pub fn scope_depth(&self) -> usize {
        self.locals.len() + 1
    }

    fn current_table(&self) -> &SymbolTable {
        self.locals.last().unwrap_or(&self.global.table)
    }

    fn current_table_mut(&mut self) -> &mut SymbolTable {
        match self.locals.last_mut() {
            Some(table) => table,
            None => &mut self.global.table,
        }
    }

    fn check_duplicate(&self, name: &str) -> Result<()> {
        if self.current_table().contains(name) {
            Err(ErrorKind::DuplicateDefinition(name.to_string()).into())
        } else {
            Ok(())
        }
    }

    pub fn declare_variable(
        &mut self,
        name: &str,
        value_type: ValueType,
        is_const: bool,
    ) -> Result<Variable> {
        self.check_duplicate(name)?;
        let slot = if self.is_global_scope() {
            Slot::Global(self.global.add_global(GlobalDef {
                is_const,
                value: GlobalValue::Slot,
            }))
        } else {
            Slot::Local(self.current_mut().alloc_local())
        };
        let var = Variable {
            id: self.global.fresh_id(),
            value_type,
            is_const,
            slot,
        };
        self.current_table_mut().add(name.to_string(), Symbol::Variable(var));
        Ok(var)
    }

    /// Declares a function and opens its top-level scope. Instructions are
    /// emitted into it until `finish_function` is called.
    pub fn declare_function(&mut self, name: &str) -> Result<FunctionId> {
        if !self.is_global_scope() {
            let msg = format!("function `{}` must be declared at the top level", name);
            return Err(ErrorKind::Structural(msg).into());
        }
        self.check_duplicate(name)?;
        let id = self.global.add_function(name);
        self.locals.push(SymbolTable::default());
        self.current = id;
        log::debug!("declared function `{}`", name);
        Ok(id)
    }

    pub fn declare_param(
        &mut self,
        name: &str,
        value_type: ValueType,
        is_const: bool,
    ) -> Result<Param> {
        if self.locals.len() != 1 || self.current == self.start {
            let msg = format!("parameter `{}` declared outside of a parameter list", name);
            return Err(ErrorKind::Structural(msg).into());
        }
        self.check_duplicate(name)?;
        let index = self.current_mut().add_param(value_type);
        let param = Param {
            id: self.global.fresh_id(),
            value_type,
            is_const,
            index,
        };
        self.current_table_mut().add(name.to_string(), Symbol::Param(param));
        Ok(param)
    }

    pub fn set_return_type(&mut self, value_type: ValueType) {
        self.current_mut().set_return_type(value_type);
    }

    /// Closes the current function's top-level scope and returns to the
    /// global scope.
    pub fn finish_function(&mut self) -> Result<()> {
        if self.locals.len() != 1 || self.current == self.start {
            let msg = "function closed with unbalanced scopes".to_string();
            return Err(ErrorKind::Structural(msg).into());
        }
        self.locals.pop();
        self.current_mut().seal();
        log::debug!(
            "finished function `{}` ({} instructions, {} locals)",
            self.current_function().name(),
            self.current_function().code().len(),
            self.current_function().loc_slots()
        );
        self.current = self.start;
        Ok(())
    }

    /// Stores a string literal as an anonymous constant and returns its index.
    pub fn add_string_constant(&mut self, s: &str) -> u32 {
        self.global.add_global(GlobalDef {
            is_const: true,
            value: GlobalValue::Str(s.to_string()),
        })
    }

    /// Appends an instruction to the current function.
    pub fn emit(&mut self, instr: Instr) -> InstrId {
        self.current_mut().push(instr)
    }

    /// The handle the next emitted instruction will get.
    pub fn next_instruction(&self) -> InstrId {
        self.current_function().next_id()
    }

    /// The distance, in instructions, from `from` to `to`.
    pub fn instruction_offset(&self, from: InstrId, to: InstrId) -> i32 {
        to.0 as i32 - from.0 as i32
    }

    /// Makes the branch at `at` jump to `target`.
    pub fn patch_branch(&mut self, at: InstrId, target: InstrId) -> Result<()> {
        self.current_mut().patch_branch(at, target)?;
        Ok(())
    }

    /// Emits the instruction pushing the address of `symbol`.
    pub fn emit_address_load(&mut self, symbol: &Symbol) -> Result<InstrId> {
        let instr = match symbol {
            Symbol::Function(id) => {
                let msg = format!("function `{}` is not a value", self.function(*id).name());
                return Err(ErrorKind::Type(msg).into());
            }
            Symbol::Variable(var) => self.variable_address(var)?,
            Symbol::Param(param) => {
                let found = self
                    .locals
                    .first()
                    .map_or(false, |table| table.contains_param(param));
                if !found {
                    return Err(undefined(format!("parameter {}", param.index)));
                }
                Instr::Arga(self.current_function().ret_slots() + param.index)
            }
        };
        Ok(self.emit(instr))
    }

    fn variable_address(&self, var: &Variable) -> Result<Instr> {
        match var.slot {
            Slot::Local(i) if self.locals.iter().any(|table| table.contains_variable(var)) => {
                Ok(Instr::Loca(i))
            }
            Slot::Global(i) if self.global.table.contains_variable(var) => Ok(Instr::Globa(i)),
            Slot::Local(i) => Err(undefined(format!("local {}", i))),
            Slot::Global(i) => Err(undefined(format!("global {}", i))),
        }
    }

    /// Presets a global constant whose initializer is a single literal, and
    /// drops the code from `from` (its address load) on that would have
    /// stored it at startup. Returns whether the initializer was folded.
    pub fn fold_constant(&mut self, var: &Variable, from: InstrId) -> bool {
        let index = match var.slot {
            Slot::Global(i) if var.is_const && self.current == self.start => i,
            _ => return false,
        };
        let (bits, negate) = match self.current_function().code().get(from.index()..) {
            Some(&[Instr::Globa(i), Instr::Push(x)]) if i == index => (x, false),
            Some(&[Instr::Globa(i), Instr::Push(x), Instr::NegI | Instr::NegF]) if i == index => {
                (x, true)
            }
            _ => return false,
        };
        let value = match var.value_type {
            ValueType::Int if negate => GlobalValue::Int((bits as i64).wrapping_neg()),
            ValueType::Int => GlobalValue::Int(bits as i64),
            ValueType::Float if negate => GlobalValue::Float(-f64::from_bits(bits)),
            ValueType::Float => GlobalValue::Float(f64::from_bits(bits)),
            _ => return false,
        };
        log::debug!("folded constant global {} to {:?}", index, value);
        self.global.globals[index as usize].value = value;
        self.current_mut().truncate(from);
        true
    }

    /// Opens a block scope.
    pub fn enter_scope(&mut self) {
        self.locals.push(SymbolTable::default());
        log::debug!("entered scope {}", self.scope_depth() - 1);
    }

    /// Closes a block scope opened by `enter_scope`.
    pub fn leave_scope(&mut self) -> Result<()> {
        if self.locals.len() < 2 {
            let msg = "no block scope to leave".to_string();
            return Err(ErrorKind::Structural(msg).into());
        }
        if let Some(table) = self.locals.pop() {
            log::debug!(
                "left scope {} ({} variables)",
                self.scope_depth(),
                table.variable_count()
            );
        }
        Ok(())
    }

    /// Starts a loop whose `continue` jumps to `continue_target`.
    pub fn enter_loop(&mut self, continue_target: InstrId) {
        self.current_mut().enter_loop(continue_target);
    }

    /// Ends the innermost loop and patches its `break`s to the next instruction.
    pub fn leave_loop(&mut self) -> Result<()> {
        self.current_mut().leave_loop()?;
        Ok(())
    }

    pub fn mark_continue(&mut self) -> Result<InstrId> {
        Ok(self.current_mut().mark_continue()?)
    }

    pub fn mark_break(&mut self) -> Result<InstrId> {
        Ok(self.current_mut().mark_break()?)
    }

    /// Links the entry function to `main` and produces the program.
    pub fn finalize(mut self) -> Result<Program> {
        if !self.is_global_scope() {
            let msg = format!("{} scopes still open at end of program", self.locals.len());
            return Err(ErrorKind::Structural(msg).into());
        }
        let main = match self.global.table.find("main") {
            Some(Symbol::Function(id)) => *id,
            _ => {
                let msg = "no main function found".to_string();
                return Err(ErrorKind::FatalLink(msg).into());
            }
        };
        if self.function(main).param_slots() != 0 {
            let msg = "main function must not take parameters".to_string();
            return Err(ErrorKind::FatalLink(msg).into());
        }
        let ret_slots = self.function(main).ret_slots();
        let name_slot = self.function(main).name_slot();
        let start = &mut self.global.functions[self.start.0];
        start.push(Instr::StackAlloc(ret_slots));
        start.push(Instr::CallName(name_slot));

        let functions = self
            .global
            .functions
            .iter()
            .filter(|function| !function.is_library())
            .map(Function::to_def)
            .collect();
        let program = Program {
            globals: self.global.globals,
            functions,
        };
        log::debug!("linked program:\n{}", program);
        Ok(program)
    }

    /// Links the program and writes its binary image to `sink`. Nothing is
    /// written unless linking succeeds.
    pub fn finalize_and_emit(self, sink: &mut impl Write) -> Result<()> {
        let program = self.finalize()?;
        program.write_to(sink).map_err(Error::from)
    }
}

fn undefined(what: String) -> Error {
    ErrorKind::UndefinedSymbol(what).into()
}
