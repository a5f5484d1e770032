//! Chunk disassembler
//!
//! Renders chunks for `--disasm` output and for the VM's execution trace.
//! Offsets are printed in four digits, the line column collapses to `|` when
//! the line matches the previous offset's.

use crate::chunk::{Chunk, OpCode};
use std::io::{self, Write};

/// Disassemble an entire chunk under a header.
pub fn disassemble(chunk: &Chunk, name: &str, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "== {} ==", name)?;
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, out)?;
    }
    Ok(())
}

/// Disassemble the instruction at `offset`; returns the offset of the next
/// instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut dyn Write) -> io::Result<usize> {
    write!(out, "{:04} ", offset)?;
    if offset > 0 && chunk.line_for(offset) == chunk.line_for(offset - 1) {
        write!(out, "   | ")?;
    } else {
        write!(out, "{:4} ", chunk.line_for(offset))?;
    }

    let byte = chunk.code()[offset];
    let Ok(op) = OpCode::try_from(byte) else {
        writeln!(out, "??? {}", byte)?;
        return Ok(offset + 1);
    };
    match op {
        OpCode::Constant | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            constant_instruction(op, chunk, offset, out)
        }
        _ => {
            writeln!(out, "{}", op_name(op))?;
            Ok(offset + 1)
        }
    }
}

fn constant_instruction(
    op: OpCode,
    chunk: &Chunk,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    match chunk.code().get(offset + 1) {
        Some(&index) => {
            writeln!(
                out,
                "{:<16} {:4} '{}'",
                op_name(op),
                index,
                chunk.constant(index)
            )?;
            Ok(offset + 2)
        }
        None => {
            // Truncated operand; render what we can and stop at the end
            writeln!(out, "{:<16} <truncated>", op_name(op))?;
            Ok(offset + 1)
        }
    }
}

fn op_name(op: OpCode) -> &'static str {
    match op {
        OpCode::Constant => "CONSTANT",
        OpCode::Nil => "NIL",
        OpCode::True => "TRUE",
        OpCode::False => "FALSE",
        OpCode::Pop => "POP",
        OpCode::GetGlobal => "GET_GLOBAL",
        OpCode::DefineGlobal => "DEFINE_GLOBAL",
        OpCode::SetGlobal => "SET_GLOBAL",
        OpCode::Equal => "EQUAL",
        OpCode::Greater => "GREATER",
        OpCode::Less => "LESS",
        OpCode::Add => "ADD",
        OpCode::Subtract => "SUBTRACT",
        OpCode::Multiply => "MULTIPLY",
        OpCode::Divide => "DIVIDE",
        OpCode::Not => "NOT",
        OpCode::Negate => "NEGATE",
        OpCode::Print => "PRINT",
        OpCode::Return => "RETURN",
    }
}
