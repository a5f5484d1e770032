//! End-to-end interpreter tests
//!
//! Each case feeds source through the full pipeline (scanner, compiler, VM)
//! and checks what lands on the output and error writers.

use lute_runtime::{InterpretError, Vm};

fn interpret(source: &str) -> (Result<(), InterpretError>, String, String) {
    let mut vm = Vm::new();
    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = vm.interpret(source, &mut out, &mut err);
    (
        result,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

fn expect_output(source: &str, expected: &str) {
    let (result, out, err) = interpret(source);
    assert!(result.is_ok(), "unexpected failure: {}", err);
    assert_eq!(out, expected);
}

fn expect_runtime_error(source: &str, message: &str, line: u32) {
    let (result, _out, err) = interpret(source);
    match result {
        Err(InterpretError::Runtime(e)) => {
            assert_eq!(e.message, message);
            assert_eq!(e.line, line);
        }
        other => panic!("expected runtime error, got {:?}: {}", other, err),
    }
    assert_eq!(err, format!("{}\n[line {}] in script\n", message, line));
}

#[test]
fn test_arithmetic_precedence() {
    expect_output("print 1 + 2 * 3;", "7\n");
    expect_output("print (1 + 2) * 3;", "9\n");
    expect_output("print 10 - 4 - 3;", "3\n");
    expect_output("print 1 + 6 / 3;", "3\n");
}

#[test]
fn test_unary_and_grouping() {
    expect_output("print -(1 + 2);", "-3\n");
    expect_output("print --5;", "5\n");
    expect_output("print !(1 == 2);", "true\n");
}

#[test]
fn test_number_printing() {
    expect_output("print 7;", "7\n");
    expect_output("print 2.5;", "2.5\n");
    expect_output("print 0.5 + 0.25;", "0.75\n");
}

#[test]
fn test_string_concatenation() {
    expect_output("print \"foo\" + \"bar\";", "foobar\n");
    expect_output("print \"\" + \"x\";", "x\n");
}

#[test]
fn test_string_equality_through_interning() {
    expect_output("var a = \"hi\"; var b = \"hi\"; print a == b;", "true\n");
    expect_output("print \"a\" + \"bc\" == \"ab\" + \"c\";", "true\n");
    expect_output("print \"a\" == \"b\";", "false\n");
}

#[test]
fn test_equality_across_tags() {
    expect_output("print nil == false;", "false\n");
    expect_output("print 1 == true;", "false\n");
    expect_output("print 1 == 1.0;", "true\n");
    expect_output("print nil == nil;", "true\n");
    expect_output("print 1 != 2;", "true\n");
}

#[test]
fn test_truthiness() {
    expect_output("print !nil;", "true\n");
    expect_output("print !false;", "true\n");
    expect_output("print !0;", "false\n");
    expect_output("print !\"\";", "false\n");
}

#[test]
fn test_comparisons() {
    expect_output("print 1 < 2;", "true\n");
    expect_output("print 2 <= 2;", "true\n");
    expect_output("print 1 > 2;", "false\n");
    expect_output("print 3 >= 4;", "false\n");
}

#[test]
fn test_globals_define_read_assign() {
    expect_output("var x = 1; print x;", "1\n");
    expect_output("var x = 1; x = 2; print x;", "2\n");
    expect_output("var x; print x;", "nil\n");
    // Assignment is an expression with a value
    expect_output("var x = 1; print x = 3;", "3\n");
    // Redefinition overwrites
    expect_output("var x = 1; var x = 2; print x;", "2\n");
}

#[test]
fn test_undefined_global_read() {
    expect_runtime_error("print x;", "Undefined variable: 'x'", 1);
}

#[test]
fn test_undefined_global_assignment() {
    expect_runtime_error("z = 1;", "Undefined variable: 'z'", 1);
}

#[test]
fn test_operand_type_errors() {
    expect_runtime_error("print -true;", "Operand must be a number.", 1);
    expect_runtime_error("print 1 < \"x\";", "Operands must be numbers.", 1);
    expect_runtime_error("print \"a\" + 1;", "Operands must be two numbers or two strings.", 1);
    expect_runtime_error("print 1 + nil;", "Operands must be two numbers or two strings.", 1);
}

#[test]
fn test_division_by_zero() {
    expect_runtime_error("print 1 / 0;", "Division by zero.", 1);
}

#[test]
fn test_runtime_error_cites_faulting_line() {
    expect_runtime_error("var a = 1;\nvar b = nil;\nprint a + b;", "Operands must be two numbers or two strings.", 3);
    expect_runtime_error("var a = nil;\n\nprint -a;", "Operand must be a number.", 3);
}

#[test]
fn test_equal_pops_both_operands_on_mismatch() {
    // Cross-type EQUAL is not an error and must leave the stack balanced
    expect_output("print (1 == \"1\") == false;", "true\n");
}

#[test]
fn test_compile_error_does_not_execute() {
    let (result, out, err) = interpret("print \"before\";\nprint ;");
    assert!(matches!(result, Err(InterpretError::Compile(_))));
    assert_eq!(out, "", "no statement may run when compilation fails");
    assert!(err.contains("[line 2] Error at ';': Expect expression."), "{}", err);
}

#[test]
fn test_blocks_are_a_compile_error() {
    let (result, _out, err) = interpret("var a = 1; { var a = 2; }");
    assert!(matches!(result, Err(InterpretError::Compile(_))));
    assert!(err.contains("Expect expression."), "{}", err);
}

#[test]
fn test_expression_statement_discards_value() {
    expect_output("1 + 2; print 3;", "3\n");
}
