//! A single-pass compiler for the C0 teaching language.
//!
//! Source text is tokenized, parsed and translated straight into stack-machine
//! instructions; there is no AST. The result is a [`Program`] that can be
//! serialized into the o0 binary image.

#![warn(future_incompatible)]
#![warn(non_ascii_idents)]
#![warn(rust_2018_idioms)]
#![warn(single_use_lifetimes)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unused)]

pub mod compiler;
mod error;
mod instr;
mod program;

pub use compiler::compile_str;
pub use error::{Error, ErrorKind};
pub use instr::Instr;
pub use program::{FunctionDef, GlobalDef, GlobalValue, Program};

/// Custom result type for compiling C0.
pub type Result<T> = std::result::Result<T, Error>;
