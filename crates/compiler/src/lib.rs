//! Lute Compiler
//!
//! Turns source text into a ready-to-run [`Chunk`](lute_core::Chunk) in a
//! single pass: the scanner hands out tokens lazily and the Pratt-style
//! compiler emits bytecode as it parses, never building a syntax tree.
//!
//! String literals and global-variable names are interned into the heap the
//! caller provides, so the VM executing the chunk sees the same canonical
//! string objects the compiler saw.

pub mod compiler;
pub mod scanner;

pub use compiler::{CompileError, compile};
pub use scanner::{Scanner, Token, TokenKind};
