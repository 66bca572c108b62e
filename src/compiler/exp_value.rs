//! This module holds the compile-time description of an analysed expression.

use std::fmt::{self, Display, Formatter};

/// The static type of a value on the VM's operand stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Void,
    Int,
    Float,
    String,
}

impl ValueType {
    /// The number of 8-byte stack slots a value of this type occupies.
    pub fn slots(self) -> u32 {
        match self {
            ValueType::Void => 0,
            _ => 1,
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Void => "void",
            ValueType::Int => "int",
            ValueType::Float => "double",
            ValueType::String => "string",
        };
        f.write_str(name)
    }
}

/// The result of analysing an expression. Only the type is known at compile
/// time; the instructions computing the value have already been emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpValue {
    pub value_type: ValueType,
    /// The stack holds an address that may be stored to, not a value.
    pub(super) is_place: bool,
}

impl ExpValue {
    pub fn new(value_type: ValueType) -> Self {
        ExpValue {
            value_type,
            is_place: false,
        }
    }

    pub(super) fn place(value_type: ValueType) -> Self {
        ExpValue {
            value_type,
            is_place: true,
        }
    }
}

impl From<ValueType> for ExpValue {
    fn from(value_type: ValueType) -> Self {
        Self::new(value_type)
    }
}
