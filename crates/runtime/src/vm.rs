//! The virtual machine
//!
//! A straight dispatch loop over one chunk: read a byte, match the opcode,
//! mutate the operand stack. Binary operators pop the right operand first.
//! Printed values go to the injected output writer; compile diagnostics,
//! runtime error reports and the optional execution trace go to the injected
//! error writer.

use crate::error::{InterpretError, RuntimeError};
use lute_compiler::compile;
use lute_core::{Chunk, Heap, OpCode, Table, Value, disasm};
use std::io::Write;
use tracing::debug;

/// Operand stack capacity. Exceeding it is a runtime error, not a panic.
pub const STACK_MAX: usize = 256;

/// One interpreter instance. Globals, interned strings and heap objects
/// survive across `interpret` calls; the operand stack is empty between
/// calls.
pub struct Vm {
    stack: Vec<Value>,
    globals: Table<Value>,
    heap: Heap,
    trace: bool,
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            stack: Vec::with_capacity(STACK_MAX),
            globals: Table::new(),
            heap: Heap::new(),
            trace: false,
        }
    }

    /// Disassemble each instruction (plus the stack) to the error writer as
    /// it executes.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Compile and run one source buffer.
    pub fn interpret(
        &mut self,
        source: &str,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), InterpretError> {
        let chunk = compile(source, &mut self.heap, err)?;
        match self.run(&chunk, out, err) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.stack.clear();
                let _ = writeln!(err, "{}\n[line {}] in script", error.message, error.line);
                Err(error.into())
            }
        }
    }

    fn run(
        &mut self,
        chunk: &Chunk,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), RuntimeError> {
        debug!(bytes = chunk.len(), "executing chunk");
        let code = chunk.code();
        let mut ip = 0usize;

        loop {
            // Offset of the opcode byte; operand bytes share its line
            let offset = ip;
            if self.trace {
                let _ = write!(err, "          ");
                for value in &self.stack {
                    let _ = write!(err, "[ {} ]", value);
                }
                let _ = writeln!(err);
                let _ = disasm::disassemble_instruction(chunk, offset, err);
            }

            let byte = code[ip];
            ip += 1;
            let Ok(op) = OpCode::try_from(byte) else {
                return Err(self.fail(chunk, offset, format!("Unknown opcode {}.", byte)));
            };

            match op {
                OpCode::Constant => {
                    let index = code[ip];
                    ip += 1;
                    let value = chunk.constant(index).clone();
                    self.push(value, chunk, offset)?;
                }
                OpCode::Nil => self.push(Value::Nil, chunk, offset)?,
                OpCode::True => self.push(Value::Bool(true), chunk, offset)?,
                OpCode::False => self.push(Value::Bool(false), chunk, offset)?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetGlobal => {
                    let index = code[ip];
                    ip += 1;
                    let name = self.global_name(chunk, index);
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value, chunk, offset)?;
                        }
                        None => {
                            return Err(self.fail(
                                chunk,
                                offset,
                                format!("Undefined variable: '{}'", name),
                            ));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let index = code[ip];
                    ip += 1;
                    let name = self.global_name(chunk, index);
                    let value = self.pop();
                    self.globals.set(name, value);
                }
                OpCode::SetGlobal => {
                    let index = code[ip];
                    ip += 1;
                    let name = self.global_name(chunk, index);
                    // Assignment is an expression; the value stays on the stack
                    let value = self.peek(0).clone();
                    if !self.globals.set_existing(&name, value) {
                        return Err(self.fail(
                            chunk,
                            offset,
                            format!("Undefined variable: '{}'", name),
                        ));
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => {
                    self.numeric_binary(chunk, offset, |a, b| Value::Bool(a > b))?;
                }
                OpCode::Less => {
                    self.numeric_binary(chunk, offset, |a, b| Value::Bool(a < b))?;
                }
                OpCode::Add => {
                    let b = self.pop();
                    let a = self.pop();
                    match (&a, &b) {
                        (Value::Number(x), Value::Number(y)) => {
                            self.stack.push(Value::Number(x + y));
                        }
                        _ => match (a.as_string(), b.as_string()) {
                            (Some(x), Some(y)) => {
                                let joined = self.heap.concat(x, y);
                                self.stack.push(Value::Obj(joined));
                            }
                            _ => {
                                return Err(self.fail(
                                    chunk,
                                    offset,
                                    "Operands must be two numbers or two strings.",
                                ));
                            }
                        },
                    }
                }
                OpCode::Subtract => {
                    self.numeric_binary(chunk, offset, |a, b| Value::Number(a - b))?;
                }
                OpCode::Multiply => {
                    self.numeric_binary(chunk, offset, |a, b| Value::Number(a * b))?;
                }
                OpCode::Divide => {
                    let b = self.pop();
                    let a = self.pop();
                    match (a, b) {
                        (Value::Number(_), Value::Number(divisor)) if divisor == 0.0 => {
                            return Err(self.fail(chunk, offset, "Division by zero."));
                        }
                        (Value::Number(a), Value::Number(b)) => {
                            self.stack.push(Value::Number(a / b));
                        }
                        _ => {
                            return Err(self.fail(chunk, offset, "Operands must be numbers."));
                        }
                    }
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.stack.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => match self.pop() {
                    Value::Number(n) => self.stack.push(Value::Number(-n)),
                    _ => {
                        return Err(self.fail(chunk, offset, "Operand must be a number."));
                    }
                },
                OpCode::Print => {
                    let value = self.pop();
                    writeln!(out, "{}", value)
                        .map_err(|e| self.fail(chunk, offset, format!("I/O error: {}", e)))?;
                }
                OpCode::Return => return Ok(()),
            }
        }
    }

    fn numeric_binary(
        &mut self,
        chunk: &Chunk,
        offset: usize,
        apply: impl Fn(f64, f64) -> Value,
    ) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.push(apply(a, b));
                Ok(())
            }
            _ => Err(self.fail(chunk, offset, "Operands must be numbers.")),
        }
    }

    /// The interned name a global opcode's operand points at.
    fn global_name(&self, chunk: &Chunk, index: u8) -> std::rc::Rc<lute_core::Obj> {
        match chunk.constant(index) {
            Value::Obj(name) => name.clone(),
            _ => unreachable!("global name constant must be a string"),
        }
    }

    fn push(&mut self, value: Value, chunk: &Chunk, offset: usize) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(self.fail(chunk, offset, "Stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    fn fail(&self, chunk: &Chunk, offset: usize, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
            line: chunk.line_for(offset),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}
