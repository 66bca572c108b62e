//! Functions and types associated with converting source code into an o0 program.

mod char_source;
mod combine;
mod exp_value;
mod expr;
mod lexer;
mod parser;
mod symbols;
mod token;

pub use char_source::{CharSource, CharStream, SourcePos};
pub use exp_value::{ExpValue, ValueType};
pub use lexer::{Lexer, Tokenizer};
pub use parser::Parser;
pub use symbols::{Function, FunctionId, InstrId, Param, Slot, Symbol, SymbolManager, Variable};
pub use token::{Token, TokenKind, TokenValue};

use crate::Program;
use crate::Result;

/// Compiles a complete C0 source file into a linked program.
pub fn compile_str(source: &str) -> Result<Program> {
    Parser::new(CharStream::new(source)).parse_program()
}
