//! End-to-end tests: compile and run whole programs through the public
//! `Interpreter` API, exercising the boundary behaviors called out for
//! the compiler and VM's fixed-size limits.

use lumen::{InterpretResult, Interpreter};

fn run(source: &str) -> InterpretResult {
    let mut interpreter = Interpreter::new();
    interpreter.interpret(source)
}

#[test]
fn fibonacci_recursion() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        var result = fib(10);
        if (result != 55) {
            print "wrong";
        }
    "#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn closures_over_loop_variables_are_independent() {
    let source = r#"
        fun makeAdder(n) {
            fun adder(x) {
                return x + n;
            }
            return adder;
        }
        var addOne = makeAdder(1);
        var addTen = makeAdder(10);
        if (addOne(5) != 6) { print "fail addOne"; }
        if (addTen(5) != 15) { print "fail addTen"; }
    "#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn class_hierarchies_with_super_and_this() {
    let source = r#"
        class Shape {
            init(name) {
                this.name = name;
            }
            area() {
                return 0;
            }
            describe() {
                return this.name + " has area " + this.area();
            }
        }
        class Square < Shape {
            init(side) {
                super.init("square");
                this.side = side;
            }
            area() {
                return this.side * this.side;
            }
        }
        var s = Square(4);
        if (s.area() != 16) { print "bad area"; }
        print s.describe();
    "#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn control_flow_if_else_while_for() {
    let source = r#"
        var total = 0;
        var i = 0;
        while (i < 3) {
            total = total + i;
            i = i + 1;
        }
        for (var j = 0; j < 3; j = j + 1) {
            if (j == 1) {
                total = total + 100;
            } else {
                total = total + 1;
            }
        }
        if (total != 105) {
            print "wrong total";
        }
    "#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn string_and_number_equality_follows_value_semantics() {
    let source = r#"
        if ("abc" != "ab" + "c") { print "interning broke equality"; }
        if (1 == true) { print "numbers and bools must not compare equal"; }
        if (nil == false) { print "nil and false must not compare equal"; }
    "#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn runtime_type_errors_surface_as_runtime_error() {
    assert_eq!(run(r#"print "a" - "b";"#), InterpretResult::RuntimeError);
    assert_eq!(run("print nil + 1;"), InterpretResult::RuntimeError);
    assert_eq!(run("var x; x.field;"), InterpretResult::RuntimeError);
}

#[test]
fn syntax_errors_surface_as_compile_error_and_never_run() {
    assert_eq!(run("print 1 +;"), InterpretResult::CompileError);
    assert_eq!(run("var 1x = 2;"), InterpretResult::CompileError);
}

#[test]
fn repeated_identifiers_share_one_constant_slot() {
    // Each reference to `total` costs a constant only the first time;
    // a chunk with 300 statements touching the same two globals must
    // still fit comfortably under the 256-constant pool.
    let mut source = String::from("var total = 0;\nvar step = 1;\n");
    for _ in 0..300 {
        source.push_str("total = total + step;\n");
    }
    assert_eq!(run(&source), InterpretResult::Ok);
}

#[test]
fn distinct_number_literals_exhaust_the_constant_pool() {
    // Numbers are never deduplicated, so 256 distinct literals alone
    // fill one chunk's constant pool and the 257th is a compile error.
    let mut source = String::from("var total = 0.0;\n");
    for i in 0..256 {
        source.push_str(&format!("total = total + {i}.5;\n"));
    }
    assert_eq!(run(&source), InterpretResult::CompileError);
}

#[test]
fn deeply_nested_for_loop_body_shape_does_not_corrupt_jumps() {
    let source = r#"
        var count = 0;
        for (var i = 0; i < 10; i = i + 1) {
            for (var j = 0; j < 10; j = j + 1) {
                count = count + 1;
            }
        }
        if (count != 100) { print "nested loop miscounted"; }
    "#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn recursion_up_to_the_frame_limit_succeeds_one_past_it_overflows() {
    // The implicit top-level script frame counts against the same
    // FRAMES_MAX budget as every call, so a chain of 63 nested calls
    // (64 frames total) is the deepest that fits.
    let source = r#"
        fun recurse(n) {
            if (n == 0) return 0;
            return recurse(n - 1) + 1;
        }
        var result = recurse(62);
    "#;
    assert_eq!(run(source), InterpretResult::Ok);

    let source = r#"
        fun recurse(n) {
            if (n == 0) return 0;
            return recurse(n - 1) + 1;
        }
        var result = recurse(63);
    "#;
    assert_eq!(run(source), InterpretResult::RuntimeError);
}

#[test]
fn multiple_independent_interpreters_do_not_share_state() {
    let mut a = Interpreter::new();
    let mut b = Interpreter::new();
    assert_eq!(a.interpret("var x = 1;"), InterpretResult::Ok);
    assert_eq!(b.interpret("print x;"), InterpretResult::RuntimeError);
}
