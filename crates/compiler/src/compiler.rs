//! Single-pass bytecode compiler
//!
//! A predictive Pratt parser that emits into a [`Chunk`] as it goes. Each
//! token kind owns a rule row (prefix handler, infix handler, precedence);
//! `parse_precedence` drives them. There is no AST: the emit calls happen in
//! parse order, and every emitted byte records the previous token's line.
//!
//! Errors are written to the diagnostics writer as they are found. After the
//! first error in a statement the compiler goes into panic mode and stays
//! quiet until it can synchronize at a statement boundary, so one typo does
//! not cascade into a page of noise.

use crate::scanner::{Scanner, Token, TokenKind};
use lute_core::{Chunk, Heap, OpCode, Value};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

/// Compilation failed. Diagnostics were already written to the writer handed
/// to [`compile`].
#[derive(Debug, Error)]
#[error("compilation failed with {errors} error(s)")]
pub struct CompileError {
    pub errors: usize,
}

/// Compile `source` into a chunk. String literals and global names are
/// interned into `heap`; diagnostics go to `diag`.
pub fn compile(source: &str, heap: &mut Heap, diag: &mut dyn Write) -> Result<Chunk, CompileError> {
    let mut compiler = Compiler {
        scanner: Scanner::new(source),
        previous: Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: 1,
        },
        current: Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: 1,
        },
        chunk: Chunk::new(),
        heap,
        diag,
        errors: 0,
        panic_mode: false,
    };

    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.emit_op(OpCode::Return);

    if compiler.errors > 0 {
        Err(CompileError {
            errors: compiler.errors,
        })
    } else {
        debug!(
            bytes = compiler.chunk.len(),
            constants = compiler.chunk.constants().len(),
            "compiled chunk"
        );
        Ok(compiler.chunk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment, // =
    Or,
    And,
    Equality,   // == !=
    Comparison, // < <= > >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'src, 'ctx> = fn(&mut Compiler<'src, 'ctx>, bool);

struct ParseRule<'src, 'ctx> {
    prefix: Option<ParseFn<'src, 'ctx>>,
    infix: Option<ParseFn<'src, 'ctx>>,
    precedence: Precedence,
}

impl<'src, 'ctx> ParseRule<'src, 'ctx> {
    fn new(
        prefix: Option<ParseFn<'src, 'ctx>>,
        infix: Option<ParseFn<'src, 'ctx>>,
        precedence: Precedence,
    ) -> Self {
        ParseRule {
            prefix,
            infix,
            precedence,
        }
    }
}

fn rule_for<'src, 'ctx>(kind: TokenKind) -> ParseRule<'src, 'ctx> {
    use TokenKind::*;
    match kind {
        LeftParen => ParseRule::new(Some(Compiler::grouping), None, Precedence::None),
        Minus => ParseRule::new(
            Some(Compiler::unary),
            Some(Compiler::binary),
            Precedence::Term,
        ),
        Plus => ParseRule::new(None, Some(Compiler::binary), Precedence::Term),
        Slash | Star => ParseRule::new(None, Some(Compiler::binary), Precedence::Factor),
        Bang => ParseRule::new(Some(Compiler::unary), None, Precedence::None),
        BangEqual | EqualEqual => ParseRule::new(None, Some(Compiler::binary), Precedence::Equality),
        Greater | GreaterEqual | Less | LessEqual => {
            ParseRule::new(None, Some(Compiler::binary), Precedence::Comparison)
        }
        Identifier => ParseRule::new(Some(Compiler::variable), None, Precedence::None),
        String => ParseRule::new(Some(Compiler::string), None, Precedence::None),
        Number => ParseRule::new(Some(Compiler::number), None, Precedence::None),
        False | True | Nil => ParseRule::new(Some(Compiler::literal), None, Precedence::None),
        _ => ParseRule::new(None, None, Precedence::None),
    }
}

struct Compiler<'src, 'ctx> {
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    chunk: Chunk,
    heap: &'ctx mut Heap,
    diag: &'ctx mut dyn Write,
    errors: usize,
    panic_mode: bool,
}

impl<'src, 'ctx> Compiler<'src, 'ctx> {
    // Token plumbing

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.next_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    // Emitters

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.into());
    }

    fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    fn emit_with_operand(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_with_operand(OpCode::Constant, index);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk.add_constant(value) {
            Some(index) => index,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let obj = self.heap.intern(name);
        self.make_constant(Value::Obj(obj))
    }

    // Declarations and statements

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else {
            self.expression_statement();
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect variable name.");
        let global = self.identifier_constant(self.previous.lexeme);
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.emit_with_operand(OpCode::DefineGlobal, global);
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    // Expressions

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule_for(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = rule_for(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let text = &lexeme[1..lexeme.len() - 1];
        let obj = self.heap.intern(text);
        self.emit_constant(Value::Obj(obj));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!("literal rule on non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let index = self.identifier_constant(self.previous.lexeme);
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_with_operand(OpCode::SetGlobal, index);
        } else {
            self.emit_with_operand(OpCode::GetGlobal, index);
        }
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary rule on non-unary token"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let rule = rule_for(operator);
        self.parse_precedence(rule.precedence.next());
        match operator {
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!("binary rule on non-binary token"),
        }
    }

    // Error reporting

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors += 1;
        let _ = write!(self.diag, "[line {}] Error", token.line);
        match token.kind {
            TokenKind::Eof => {
                let _ = write!(self.diag, " at end");
            }
            // The lexeme of an error token is its message, not source text
            TokenKind::Error => {}
            _ => {
                let _ = write!(self.diag, " at '{}'", token.lexeme);
            }
        }
        let _ = writeln!(self.diag, ": {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn compile_ok(source: &str) -> (Chunk, Heap) {
        let mut heap = Heap::new();
        let mut diag = Vec::new();
        let chunk = compile(source, &mut heap, &mut diag)
            .unwrap_or_else(|e| panic!("{}: {}", e, String::from_utf8_lossy(&diag)));
        (chunk, heap)
    }

    fn compile_err(source: &str) -> (CompileError, String) {
        let mut heap = Heap::new();
        let mut diag = Vec::new();
        let err = compile(source, &mut heap, &mut diag).expect_err("expected compile error");
        (err, String::from_utf8(diag).unwrap())
    }

    fn op(code: OpCode) -> u8 {
        code.into()
    }

    #[test]
    fn test_arithmetic_respects_precedence() {
        let (chunk, _heap) = compile_ok("1 + 2 * 3;");
        assert_eq!(
            chunk.code(),
            &[
                op(OpCode::Constant),
                0,
                op(OpCode::Constant),
                1,
                op(OpCode::Constant),
                2,
                op(OpCode::Multiply),
                op(OpCode::Add),
                op(OpCode::Pop),
                op(OpCode::Return),
            ]
        );
        assert_eq!(chunk.constants(), &[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
    }

    #[test]
    fn test_print_statement() {
        let (chunk, _heap) = compile_ok("print 1;");
        assert_eq!(
            chunk.code(),
            &[
                op(OpCode::Constant),
                0,
                op(OpCode::Print),
                op(OpCode::Return),
            ]
        );
    }

    #[test]
    fn test_var_declaration_defaults_to_nil() {
        let (chunk, _heap) = compile_ok("var a;");
        assert_eq!(
            chunk.code(),
            &[
                op(OpCode::Nil),
                op(OpCode::DefineGlobal),
                0,
                op(OpCode::Return),
            ]
        );
        assert_eq!(chunk.constant(0).as_string().unwrap().as_str(), "a");
    }

    #[test]
    fn test_assignment_is_an_expression() {
        let (chunk, _heap) = compile_ok("a = 1;");
        assert_eq!(
            chunk.code(),
            &[
                op(OpCode::Constant),
                1,
                op(OpCode::SetGlobal),
                0,
                op(OpCode::Pop),
                op(OpCode::Return),
            ]
        );
    }

    #[test]
    fn test_comparison_pairs_desugar() {
        let (chunk, _heap) = compile_ok("1 <= 2;");
        assert_eq!(
            chunk.code(),
            &[
                op(OpCode::Constant),
                0,
                op(OpCode::Constant),
                1,
                op(OpCode::Greater),
                op(OpCode::Not),
                op(OpCode::Pop),
                op(OpCode::Return),
            ]
        );
    }

    #[test]
    fn test_string_literal_is_interned() {
        let (chunk, mut heap) = compile_ok("\"hi\";");
        let Value::Obj(constant) = chunk.constant(0) else {
            panic!("expected string constant");
        };
        assert!(Rc::ptr_eq(constant, &heap.intern("hi")));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (err, diag) = compile_err("1 + 2 = 3;");
        assert_eq!(err.errors, 1);
        assert!(diag.contains("Invalid assignment target."), "{}", diag);
    }

    #[test]
    fn test_missing_semicolon_reports_at_end() {
        let (_err, diag) = compile_err("print 1");
        assert!(diag.contains("[line 1] Error at end: Expect ';' after value."), "{}", diag);
    }

    #[test]
    fn test_blocks_are_rejected() {
        let (_err, diag) = compile_err("{ var a = 1; }");
        assert!(diag.contains("Expect expression."), "{}", diag);
    }

    #[test]
    fn test_panic_mode_synchronizes_per_statement() {
        let (err, diag) = compile_err("var 1;\nvar 2;");
        assert_eq!(err.errors, 2);
        assert!(diag.contains("[line 1] Error at '1': Expect variable name."), "{}", diag);
        assert!(diag.contains("[line 2] Error at '2': Expect variable name."), "{}", diag);
    }

    #[test]
    fn test_scan_error_becomes_compile_error() {
        let (_err, diag) = compile_err("print \"open;\n");
        assert!(diag.contains("Unterminated string."), "{}", diag);
    }

    #[test]
    fn test_constant_pool_overflow() {
        let source: String = (0..257).map(|i| format!("print {};", i)).collect();
        let (_err, diag) = compile_err(&source);
        assert!(diag.contains("Too many constants in one chunk."), "{}", diag);
    }

    #[test]
    fn test_line_map_tracks_statements() {
        let (chunk, _heap) = compile_ok("print 1;\nprint 2;");
        // First PRINT sits at offset 2, second at offset 5
        assert_eq!(chunk.line_for(2), 1);
        assert_eq!(chunk.line_for(5), 2);
    }
}
