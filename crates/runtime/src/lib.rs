//! Lute Runtime: the bytecode virtual machine
//!
//! A stack machine over the chunks `lute-compiler` produces. One `Vm` holds
//! the pieces that outlive a single run: the operand stack, the globals
//! table, and the heap with its string intern set. `Vm::interpret` compiles
//! and executes one source buffer; in a REPL the same `Vm` is fed line after
//! line and globals carry over.

pub mod error;
pub mod vm;

pub use error::{InterpretError, RuntimeError};
pub use vm::{STACK_MAX, Vm};
