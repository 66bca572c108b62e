use indexmap::IndexMap;

use crate::{GlobalDef, GlobalValue};

use super::super::ValueType;
use super::{Function, FunctionId};

/// Where a variable lives at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// An index into the program's global table.
    Global(u32),
    /// An index into the declaring function's local frame.
    Local(u32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Variable {
    /// Distinguishes this declaration from every other one in the compilation.
    pub id: u32,
    pub value_type: ValueType,
    pub is_const: bool,
    pub slot: Slot,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Param {
    pub id: u32,
    pub value_type: ValueType,
    pub is_const: bool,
    /// Position in the parameter list, not counting the return slot.
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Symbol {
    Variable(Variable),
    Param(Param),
    Function(FunctionId),
}

/// The names declared in one scope.
#[derive(Debug, Default)]
pub(super) struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
    variable_count: u32,
}

impl SymbolTable {
    pub(super) fn find(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub(super) fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub(super) fn add(&mut self, name: String, symbol: Symbol) {
        if let Symbol::Variable(_) = symbol {
            self.variable_count += 1;
        }
        self.symbols.insert(name, symbol);
    }

    /// Whether `var` itself (not merely its name or slot) was declared in this table.
    pub(super) fn contains_variable(&self, var: &Variable) -> bool {
        self.symbols
            .values()
            .any(|symbol| matches!(symbol, Symbol::Variable(v) if v.id == var.id))
    }

    pub(super) fn contains_param(&self, param: &Param) -> bool {
        self.symbols
            .values()
            .any(|symbol| matches!(symbol, Symbol::Param(p) if p.id == param.id))
    }

    pub(super) fn variable_count(&self) -> u32 {
        self.variable_count
    }
}

/// Table 0: global names, plus everything that outlives a single scope.
#[derive(Debug, Default)]
pub(super) struct GlobalSymbolTable {
    pub(super) table: SymbolTable,
    pub(super) globals: Vec<GlobalDef>,
    pub(super) functions: Vec<Function>,
    next_symbol: u32,
}

impl GlobalSymbolTable {
    /// Hands out the id of a new variable or parameter.
    pub(super) fn fresh_id(&mut self) -> u32 {
        self.next_symbol += 1;
        self.next_symbol - 1
    }

    pub(super) fn add_global(&mut self, def: GlobalDef) -> u32 {
        self.globals.push(def);
        self.globals.len() as u32 - 1
    }

    /// Registers a function along with the hidden constant holding its name.
    /// The caller is responsible for the duplicate check.
    pub(super) fn add_function(&mut self, name: &str) -> FunctionId {
        let name_slot = self.add_global(GlobalDef {
            is_const: true,
            value: GlobalValue::Str(name.to_string()),
        });
        let name_var = Variable {
            id: self.fresh_id(),
            value_type: ValueType::String,
            is_const: true,
            slot: Slot::Global(name_slot),
        };
        self.table.add(hidden_name(name), Symbol::Variable(name_var));

        let id = FunctionId(self.functions.len());
        self.functions.push(Function::new(name, name_slot));
        self.table.add(name.to_string(), Symbol::Function(id));
        id
    }

    pub(super) fn add_library_function(
        &mut self,
        name: &str,
        return_type: ValueType,
        params: &[ValueType],
    ) {
        let id = self.add_function(name);
        self.functions[id.0].make_library(params, return_type);
    }

    /// Installs the functions the VM provides.
    pub(super) fn load_library(&mut self) {
        use ValueType::*;
        self.add_library_function("getint", Int, &[]);
        self.add_library_function("getdouble", Float, &[]);
        self.add_library_function("getchar", Int, &[]);
        self.add_library_function("putint", Void, &[Int]);
        self.add_library_function("putdouble", Void, &[Float]);
        self.add_library_function("putchar", Void, &[Int]);
        self.add_library_function("putstr", Void, &[String]);
        self.add_library_function("putln", Void, &[]);
    }
}

/// The key under which a function's name constant is stored. Identifiers
/// cannot contain angle brackets, so source code can never refer to it.
pub(super) fn hidden_name(name: &str) -> String {
    format!("<fn {}>", name)
}
