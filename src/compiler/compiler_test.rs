// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::compile;
use crate::chunk::OpCode;
use crate::heap::Heap;
use crate::object::Obj;
use crate::value::ObjRef;

fn compile_ok(source: &str) -> (Heap, ObjRef) {
    let mut heap = Heap::new();
    let func_ref = compile(source, &mut heap).expect("expected successful compile");
    (heap, func_ref)
}

fn compile_err(source: &str) -> bool {
    let mut heap = Heap::new();
    compile(source, &mut heap).is_none()
}

fn opcodes(heap: &Heap, func_ref: ObjRef) -> Vec<u8> {
    match heap.get(func_ref) {
        Obj::Function(f) => f.chunk.code.clone(),
        other => panic!("expected a compiled function, got {other:?}"),
    }
}

fn contains_op(code: &[u8], op: OpCode) -> bool {
    code.iter().any(|&b| OpCode::from_byte(b) == Some(op))
}

#[test]
fn compiles_a_constant_expression_statement() {
    let (heap, func_ref) = compile_ok("1;");
    let code = opcodes(&heap, func_ref);
    assert_eq!(
        code,
        vec![
            OpCode::Constant as u8,
            0,
            OpCode::Pop as u8,
            OpCode::Nil as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn arithmetic_respects_precedence() {
    let (heap, func_ref) = compile_ok("1 + 2 * 3;");
    let code = opcodes(&heap, func_ref);
    // 1, 2, 3, MULTIPLY, ADD, POP, NIL, RETURN
    assert_eq!(code[0], OpCode::Constant as u8);
    assert_eq!(code[2], OpCode::Constant as u8);
    assert_eq!(code[4], OpCode::Constant as u8);
    assert_eq!(code[6], OpCode::Multiply as u8);
    assert_eq!(code[7], OpCode::Add as u8);
    assert_eq!(code[8], OpCode::Pop as u8);
}

#[test]
fn global_variable_declaration_and_read() {
    let (heap, func_ref) = compile_ok("var a = 1; print a;");
    let code = opcodes(&heap, func_ref);
    assert!(contains_op(&code, OpCode::DefineGlobal));
    assert!(contains_op(&code, OpCode::GetGlobal));
    assert!(contains_op(&code, OpCode::Print));
}

#[test]
fn local_variable_never_touches_globals() {
    let (heap, func_ref) = compile_ok("{ var a = 1; print a; }");
    let code = opcodes(&heap, func_ref);
    assert!(!contains_op(&code, OpCode::DefineGlobal));
    assert!(!contains_op(&code, OpCode::GetGlobal));
    assert!(contains_op(&code, OpCode::GetLocal));
}

#[test]
fn closures_capture_enclosing_locals_as_upvalues() {
    let (heap, func_ref) = compile_ok(
        "fun outer() { var x = 1; fun inner() { return x; } return inner; }",
    );
    let code = opcodes(&heap, func_ref);
    assert!(contains_op(&code, OpCode::Closure));
}

#[test]
fn function_call_emits_call_opcode() {
    let (heap, func_ref) = compile_ok("fun f() { return 1; } f();");
    let code = opcodes(&heap, func_ref);
    assert!(contains_op(&code, OpCode::Closure));
    assert!(contains_op(&code, OpCode::Call));
}

#[test]
fn method_call_on_an_expression_fuses_into_invoke() {
    let (heap, func_ref) = compile_ok(
        "class A { greet() { return 1; } } var a = A(); a.greet();",
    );
    let code = opcodes(&heap, func_ref);
    assert!(contains_op(&code, OpCode::Class));
    assert!(contains_op(&code, OpCode::Method));
    assert!(contains_op(&code, OpCode::Invoke));
}

#[test]
fn subclass_emits_inherit() {
    let (heap, func_ref) =
        compile_ok("class A {} class B < A {} var b = B();");
    let code = opcodes(&heap, func_ref);
    assert!(contains_op(&code, OpCode::Inherit));
}

#[test]
fn return_from_top_level_is_a_compile_error() {
    assert!(compile_err("return 1;"));
}

#[test]
fn returning_a_value_from_an_initializer_is_an_error() {
    assert!(compile_err("class A { init() { return 1; } }"));
}

#[test]
fn assigning_to_a_non_identifier_is_an_error() {
    assert!(compile_err("1 = 2;"));
}

#[test]
fn this_outside_a_class_is_an_error() {
    assert!(compile_err("fun f() { return this; }"));
}

#[test]
fn super_outside_a_class_is_an_error() {
    assert!(compile_err("fun f() { super.x(); }"));
}

#[test]
fn class_inheriting_from_itself_is_an_error() {
    assert!(compile_err("class A < A {}"));
}

#[test]
fn unterminated_string_is_a_compile_error() {
    assert!(compile_err("print \"oops;"));
}

#[test]
fn reading_a_local_in_its_own_initializer_is_an_error() {
    assert!(compile_err("{ var a = a; }"));
}

#[test]
fn redeclaring_a_local_in_the_same_scope_is_an_error() {
    assert!(compile_err("{ var a = 1; var a = 2; }"));
}

#[test]
fn valid_program_with_no_errors_compiles() {
    let (_heap, _func_ref) = compile_ok(
        r#"
        class Greeter {
            init(name) {
                this.name = name;
            }
            greet() {
                return "hello, " + this.name;
            }
        }
        var g = Greeter("world");
        print g.greet();
        "#,
    );
}
