//! Interpreter error types
//!
//! Compile-time failures keep their diagnostics on the writer; runtime
//! failures carry the message and the 1-based source line of the faulting
//! instruction so the VM can render the standard report:
//!
//! ```text
//! <message>
//! [line N] in script
//! ```

use lute_compiler::CompileError;
use thiserror::Error;

/// Execution aborted. The stack has been reset by the time this is returned.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

/// Either phase of `Vm::interpret` failing.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
