//! Lute Core: shared primitives for the Lute bytecode pipeline
//!
//! This crate holds everything both the compiler and the VM need to agree on:
//!
//! - `Value`: the tagged runtime value (number, bool, nil, object reference)
//! - `Obj`/`ObjString`: heap objects with precomputed hashes
//! - `Heap`: the object registry and string intern set
//! - `Table`: open-addressed hash table keyed by interned strings
//! - `Chunk`/`OpCode`: the in-memory bytecode format with its constant pool
//!   and run-length-encoded line map
//! - `disasm`: human-readable rendering of chunks and single instructions
//!
//! Interned strings compare by reference identity; the heap guarantees that
//! no two live string objects share the same byte content.

pub mod chunk;
pub mod disasm;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, MAX_CONSTANTS, OpCode};
pub use heap::Heap;
pub use object::{Obj, ObjString, hash_str};
pub use table::Table;
pub use value::Value;
