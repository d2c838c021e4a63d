// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The stack-based bytecode interpreter.

pub mod native;


use crate::chunk::OpCode;
use crate::compiler;
use crate::config::FRAMES_MAX;
use crate::heap::Heap;
use crate::object::{Obj, ObjBoundMethod, ObjClass, ObjClosure, ObjInstance, ObjNative, ObjUpvalue};
use crate::table::Table;
use crate::value::{ObjRef, Value};

/// Outcome of [`Interpreter::interpret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

struct CallFrame {
    closure: ObjRef,
    ip: usize,
    /// Index into the VM stack where this frame's slot 0 lives.
    slot_base: usize,
}

/// Owns the heap, the value stack, and the call-frame stack for one
/// independent run of the language. Holding interpreter state in an
/// explicit struct (rather than process-wide globals) means two
/// `Interpreter`s can run concurrently without interfering.
pub struct Interpreter {
    heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    /// Upvalues still aliasing a live stack slot, ascending by slot index
    /// so [`Interpreter::close_upvalues`] can close from the tail.
    open_upvalues: Vec<ObjRef>,
    init_string: ObjRef,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init");
        let mut vm = Self {
            heap,
            stack: Vec::with_capacity(crate::config::STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            open_upvalues: Vec::new(),
            init_string,
        };
        vm.define_native("clock", native::clock);
        vm
    }

    /// Compile and run one program from source, reusing this
    /// interpreter's globals and heap across calls (so a REPL can build
    /// up state across lines).
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let Some(function_ref) = compiler::compile(source, &mut self.heap) else {
            return InterpretResult::CompileError;
        };

        self.push(Value::Obj(function_ref));
        let closure_ref =
            self.heap.alloc(Obj::Closure(ObjClosure { function: function_ref, upvalues: Vec::new() }));
        self.pop();
        self.push(Value::Obj(closure_ref));
        self.call(closure_ref, 0);

        self.run()
    }

    fn define_native(&mut self, name: &'static str, function: crate::object::NativeFn) {
        let name_ref = self.heap.intern(name);
        let native_ref = self.heap.alloc(Obj::Native(ObjNative { name, function }));
        let hash = self.string_hash(name_ref);
        self.globals.set(name_ref, hash, Value::Obj(native_ref));
    }

    // --- stack helpers --------------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow: compiler emitted unbalanced bytecode")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn current_slot_base(&self) -> usize {
        self.frames.last().expect("call to current_slot_base outside any frame").slot_base
    }

    fn string_hash(&self, r: ObjRef) -> u32 {
        match self.heap.get(r) {
            Obj::String(s) => s.hash,
            other => unreachable!("expected a string, got {}", other.type_name()),
        }
    }

    fn string_contents(&self, r: ObjRef) -> &str {
        match self.heap.get(r) {
            Obj::String(s) => s.chars.as_str(),
            other => unreachable!("expected a string, got {}", other.type_name()),
        }
    }

    fn is_string(&self, value: Value) -> bool {
        matches!(value, Value::Obj(r) if matches!(self.heap.get(r), Obj::String(_)))
    }

    // --- bytecode stream --------------------------------------------------

    fn current_closure(&self) -> &ObjClosure {
        match self.heap.get(self.frames.last().expect("no active frame").closure) {
            Obj::Closure(c) => c,
            other => unreachable!("frame closure slot held {}", other.type_name()),
        }
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active frame");
        let ip = frame.ip;
        frame.ip += 1;
        let closure_ref = frame.closure;
        let Obj::Closure(c) = self.heap.get(closure_ref) else { unreachable!() };
        let Obj::Function(f) = self.heap.get(c.function) else { unreachable!() };
        f.chunk.code[ip]
    }

    fn read_short(&mut self) -> u16 {
        let hi = u16::from(self.read_byte());
        let lo = u16::from(self.read_byte());
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte();
        let frame = self.frames.last().expect("no active frame");
        let Obj::Closure(c) = self.heap.get(frame.closure) else { unreachable!() };
        let Obj::Function(f) = self.heap.get(c.function) else { unreachable!() };
        f.chunk.constants[index as usize]
    }

    fn read_string(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Obj(r) => r,
            _ => unreachable!("compiler only ever loads strings as names"),
        }
    }

    // --- calls -----------------------------------------------------------

    fn call(&mut self, closure_ref: ObjRef, arg_count: u8) -> bool {
        let Obj::Closure(closure) = self.heap.get(closure_ref) else {
            unreachable!("call() invoked on a non-closure");
        };
        let Obj::Function(function) = self.heap.get(closure.function) else {
            unreachable!("closure's function handle is dangling");
        };

        if arg_count != function.arity {
            self.runtime_error(&format!(
                "Expected {} arguments but got {arg_count}.",
                function.arity
            ));
            return false;
        }
        if self.frames.len() >= FRAMES_MAX {
            self.runtime_error("Stack overflow.");
            return false;
        }

        let slot_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, slot_base });
        true
    }

    fn call_value(&mut self, callee: Value, arg_count: u8) -> bool {
        let Value::Obj(r) = callee else {
            self.runtime_error("Can only call functions and classes.");
            return false;
        };

        match self.heap.get(r).clone() {
            Obj::Closure(_) => self.call(r, arg_count),
            Obj::Native(native) => {
                let top = self.stack.len();
                let args = &self.stack[top - arg_count as usize..top];
                let result = (native.function)(args);
                self.stack.truncate(top - arg_count as usize - 1);
                self.push(result);
                true
            }
            Obj::Class(class) => {
                let instance = self.heap.alloc(Obj::Instance(ObjInstance::new(r)));
                let slot = self.stack.len() - arg_count as usize - 1;
                self.stack[slot] = Value::Obj(instance);

                if let Some(initializer) = class.methods.get(self.init_string, self.string_hash(self.init_string))
                {
                    let Value::Obj(init_ref) = initializer else { unreachable!() };
                    self.call(init_ref, arg_count)
                } else if arg_count != 0 {
                    self.runtime_error(&format!("Expected 0 arguments but got {arg_count}."));
                    false
                } else {
                    true
                }
            }
            Obj::BoundMethod(bound) => {
                let slot = self.stack.len() - arg_count as usize - 1;
                self.stack[slot] = bound.receiver;
                self.call(bound.method, arg_count)
            }
            _ => {
                self.runtime_error("Can only call functions and classes.");
                false
            }
        }
    }

    fn invoke_from_class(&mut self, class_ref: ObjRef, name: ObjRef, arg_count: u8) -> bool {
        let Obj::Class(class) = self.heap.get(class_ref) else {
            unreachable!("invoke_from_class given a non-class");
        };
        let hash = self.string_hash(name);
        match class.methods.get(name, hash) {
            Some(Value::Obj(method_ref)) => self.call(method_ref, arg_count),
            _ => {
                self.runtime_error(&format!("Undefined property '{}'.", self.string_contents(name)));
                false
            }
        }
    }

    fn invoke(&mut self, name: ObjRef, arg_count: u8) -> bool {
        let receiver = self.peek(arg_count as usize);
        let Value::Obj(receiver_ref) = receiver else {
            self.runtime_error("Only instances have methods.");
            return false;
        };
        let Obj::Instance(instance) = self.heap.get(receiver_ref) else {
            self.runtime_error("Only instances have methods.");
            return false;
        };

        let hash = self.string_hash(name);
        if let Some(value) = instance.fields.get(name, hash) {
            let slot = self.stack.len() - arg_count as usize - 1;
            self.stack[slot] = value;
            return self.call_value(value, arg_count);
        }

        let class_ref = instance.class;
        self.invoke_from_class(class_ref, name, arg_count)
    }

    fn bind_method(&mut self, class_ref: ObjRef, name: ObjRef) -> bool {
        let Obj::Class(class) = self.heap.get(class_ref) else {
            unreachable!("bind_method given a non-class");
        };
        let hash = self.string_hash(name);
        let Some(Value::Obj(method_ref)) = class.methods.get(name, hash) else {
            self.runtime_error(&format!("Undefined property '{}'.", self.string_contents(name)));
            return false;
        };

        let receiver = self.peek(0);
        let bound_ref = self.heap.alloc(Obj::BoundMethod(ObjBoundMethod { receiver, method: method_ref }));
        self.pop();
        self.push(Value::Obj(bound_ref));
        true
    }

    // --- upvalues ----------------------------------------------------------

    fn capture_upvalue(&mut self, slot: usize) -> ObjRef {
        let mut insert_at = self.open_upvalues.len();
        for (i, &r) in self.open_upvalues.iter().enumerate() {
            let Obj::Upvalue(up) = self.heap.get(r) else { unreachable!() };
            match up.location {
                Some(loc) if loc == slot => return r,
                Some(loc) if loc > slot => {
                    insert_at = i;
                    break;
                }
                _ => {}
            }
        }
        let upvalue = self.heap.alloc(Obj::Upvalue(ObjUpvalue::new(slot)));
        self.open_upvalues.insert(insert_at, upvalue);
        upvalue
    }

    fn close_upvalues(&mut self, from: usize) {
        while let Some(&last) = self.open_upvalues.last() {
            let Obj::Upvalue(up) = self.heap.get(last) else { unreachable!() };
            let Some(location) = up.location else { unreachable!("open_upvalues only holds open upvalues") };
            if location < from {
                break;
            }
            let value = self.stack[location];
            if let Obj::Upvalue(up_mut) = self.heap.get_mut(last) {
                up_mut.closed = value;
                up_mut.location = None;
            }
            self.open_upvalues.pop();
        }
    }

    // --- garbage collection -------------------------------------------------

    fn maybe_collect(&mut self) {
        if cfg!(feature = "stress_gc") || self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    fn collect_garbage(&mut self) {
        #[cfg(feature = "log_gc")]
        println!("-- gc begin");

        for &value in &self.stack {
            self.heap.mark_value(value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        for &upvalue in &self.open_upvalues {
            self.heap.mark_object(upvalue);
        }
        self.heap.mark_table(&self.globals);
        self.heap.mark_object(self.init_string);

        self.heap.trace_references();
        self.heap.sweep();
        self.heap.grow_next_gc();

        #[cfg(feature = "log_gc")]
        println!("-- gc end");
    }

    // --- errors --------------------------------------------------------

    fn runtime_error(&mut self, message: &str) {
        eprintln!("{message}");
        for frame in self.frames.iter().rev() {
            let Obj::Closure(c) = self.heap.get(frame.closure) else { continue };
            let Obj::Function(f) = self.heap.get(c.function) else { continue };
            let line = f.chunk.lines[frame.ip.saturating_sub(1)];
            match f.name {
                Some(name) => eprintln!("[line {line}] in {}()", self.heap.display_value(Value::Obj(name))),
                None => eprintln!("[line {line}] in script"),
            }
        }
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }

    #[cfg(feature = "trace_execution")]
    fn trace(&self) {
        print!("          ");
        for &slot in &self.stack {
            print!("[ {} ]", self.heap.display_value(slot));
        }
        println!();
        let frame = self.frames.last().expect("no active frame");
        let Obj::Closure(c) = self.heap.get(frame.closure) else { return };
        let Obj::Function(f) = self.heap.get(c.function) else { return };
        crate::compiler::disassemble::disassemble_instruction(&f.chunk, frame.ip, &self.heap);
    }

    // --- the dispatch loop ------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn run(&mut self) -> InterpretResult {
        loop {
            self.maybe_collect();
            #[cfg(feature = "trace_execution")]
            self.trace();

            let byte = self.read_byte();
            let Some(op) = OpCode::from_byte(byte) else {
                unreachable!("compiler only ever emits valid opcodes");
            };

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.stack[self.current_slot_base() + slot];
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0);
                    let base = self.current_slot_base();
                    self.stack[base + slot] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let hash = self.string_hash(name);
                    match self.globals.get(name, hash) {
                        Some(value) => self.push(value),
                        None => {
                            self.runtime_error(&format!(
                                "Undefined variable '{}'.",
                                self.string_contents(name)
                            ));
                            return InterpretResult::RuntimeError;
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let hash = self.string_hash(name);
                    let value = self.peek(0);
                    self.globals.set(name, hash, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let hash = self.string_hash(name);
                    let value = self.peek(0);
                    if self.globals.set(name, hash, value) {
                        self.globals.delete(name, hash);
                        self.runtime_error(&format!(
                            "Undefined variable '{}'.",
                            self.string_contents(name)
                        ));
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let upvalue_ref = self.current_closure().upvalues[slot];
                    let Obj::Upvalue(up) = self.heap.get(upvalue_ref) else { unreachable!() };
                    let value = match up.location {
                        Some(loc) => self.stack[loc],
                        None => up.closed,
                    };
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0);
                    let upvalue_ref = self.current_closure().upvalues[slot];
                    let Obj::Upvalue(up) = self.heap.get(upvalue_ref) else { unreachable!() };
                    match up.location {
                        Some(loc) => self.stack[loc] = value,
                        None => {
                            if let Obj::Upvalue(up_mut) = self.heap.get_mut(upvalue_ref) {
                                up_mut.closed = value;
                            }
                        }
                    }
                }
                OpCode::GetProperty => {
                    let name = self.read_string();
                    let Value::Obj(receiver_ref) = self.peek(0) else {
                        self.runtime_error("Only instances have properties.");
                        return InterpretResult::RuntimeError;
                    };
                    let Obj::Instance(instance) = self.heap.get(receiver_ref) else {
                        self.runtime_error("Only instances have properties.");
                        return InterpretResult::RuntimeError;
                    };
                    let hash = self.string_hash(name);
                    if let Some(value) = instance.fields.get(name, hash) {
                        self.pop();
                        self.push(value);
                    } else {
                        let class_ref = instance.class;
                        if !self.bind_method(class_ref, name) {
                            return InterpretResult::RuntimeError;
                        }
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string();
                    let Value::Obj(receiver_ref) = self.peek(1) else {
                        self.runtime_error("Only instances have fields.");
                        return InterpretResult::RuntimeError;
                    };
                    if !matches!(self.heap.get(receiver_ref), Obj::Instance(_)) {
                        self.runtime_error("Only instances have fields.");
                        return InterpretResult::RuntimeError;
                    }
                    let hash = self.string_hash(name);
                    let value = self.peek(0);
                    if let Obj::Instance(instance) = self.heap.get_mut(receiver_ref) {
                        instance.fields.set(name, hash, value);
                    }
                    let value = self.pop();
                    self.pop();
                    self.push(value);
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let Value::Obj(superclass_ref) = self.pop() else {
                        unreachable!("compiler always loads 'super' as the class value");
                    };
                    if !self.bind_method(superclass_ref, name) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a.values_equal(&b)));
                }
                OpCode::Greater => {
                    if !self.numeric_binary_op(|a, b| Value::Bool(a > b)) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Less => {
                    if !self.numeric_binary_op(|a, b| Value::Bool(a < b)) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Add => {
                    if self.peek(0).is_number() && self.peek(1).is_number() {
                        if !self.numeric_binary_op(|a, b| Value::Number(a + b)) {
                            return InterpretResult::RuntimeError;
                        }
                    } else if self.is_string(self.peek(0)) && self.is_string(self.peek(1)) {
                        self.concatenate();
                    } else {
                        self.runtime_error("Operands must be two numbers or two strings.");
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Subtract => {
                    if !self.numeric_binary_op(|a, b| Value::Number(a - b)) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Multiply => {
                    if !self.numeric_binary_op(|a, b| Value::Number(a * b)) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Divide => {
                    if !self.numeric_binary_op(|a, b| Value::Number(a / b)) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    if !self.peek(0).is_number() {
                        self.runtime_error("Operand must be a number.");
                        return InterpretResult::RuntimeError;
                    }
                    let Value::Number(n) = self.pop() else { unreachable!() };
                    self.push(Value::Number(-n));
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", self.heap.display_value(value));
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.frames.last_mut().expect("no active frame").ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().expect("no active frame").ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.frames.last_mut().expect("no active frame").ip -= offset as usize;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize);
                    if !self.call_value(callee, arg_count) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    if !self.invoke(name, arg_count) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let Value::Obj(superclass_ref) = self.pop() else {
                        unreachable!("compiler always loads 'super' as the class value");
                    };
                    if !self.invoke_from_class(superclass_ref, name, arg_count) {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Closure => {
                    let Value::Obj(function_ref) = self.read_constant() else {
                        unreachable!("OP_CLOSURE constant must be a function");
                    };
                    let Obj::Function(function) = self.heap.get(function_ref) else {
                        unreachable!()
                    };
                    let upvalue_count = function.upvalue_count;
                    let mut upvalues = Vec::with_capacity(upvalue_count);
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte();
                        let index = self.read_byte();
                        if is_local == 1 {
                            let slot = self.current_slot_base() + index as usize;
                            upvalues.push(self.capture_upvalue(slot));
                        } else {
                            upvalues.push(self.current_closure().upvalues[index as usize]);
                        }
                    }
                    let closure_ref =
                        self.heap.alloc(Obj::Closure(ObjClosure { function: function_ref, upvalues }));
                    self.push(Value::Obj(closure_ref));
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("no active frame");
                    self.close_upvalues(frame.slot_base);
                    if self.frames.is_empty() {
                        self.pop();
                        return InterpretResult::Ok;
                    }
                    self.stack.truncate(frame.slot_base);
                    self.push(result);
                }
                OpCode::Class => {
                    let Value::Obj(name_ref) = self.read_constant() else {
                        unreachable!("OP_CLASS constant must be a name string");
                    };
                    let class_ref = self.heap.alloc(Obj::Class(ObjClass::new(name_ref)));
                    self.push(Value::Obj(class_ref));
                }
                OpCode::Inherit => {
                    let Value::Obj(superclass_ref) = self.peek(1) else {
                        self.runtime_error("Superclass must be a class.");
                        return InterpretResult::RuntimeError;
                    };
                    if !matches!(self.heap.get(superclass_ref), Obj::Class(_)) {
                        self.runtime_error("Superclass must be a class.");
                        return InterpretResult::RuntimeError;
                    }
                    let Value::Obj(subclass_ref) = self.peek(0) else {
                        unreachable!("compiler always loads the subclass before OP_INHERIT");
                    };
                    let methods_copy = match self.heap.get(superclass_ref) {
                        Obj::Class(c) => c.methods.clone(),
                        _ => unreachable!(),
                    };
                    if let Obj::Class(sub) = self.heap.get_mut(subclass_ref) {
                        sub.methods.add_all(&methods_copy);
                    }
                    self.pop();
                }
                OpCode::Method => {
                    let name = self.read_string();
                    let hash = self.string_hash(name);
                    let method_val = self.peek(0);
                    let Value::Obj(class_ref) = self.peek(1) else {
                        unreachable!("compiler always loads the class before OP_METHOD");
                    };
                    if let Obj::Class(class) = self.heap.get_mut(class_ref) {
                        class.methods.set(name, hash, method_val);
                    }
                    self.pop();
                }
            }
        }
    }

    fn numeric_binary_op(&mut self, op: impl Fn(f64, f64) -> Value) -> bool {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            self.runtime_error("Operands must be numbers.");
            return false;
        }
        let Value::Number(b) = self.pop() else { unreachable!() };
        let Value::Number(a) = self.pop() else { unreachable!() };
        self.push(op(a, b));
        true
    }

    fn concatenate(&mut self) {
        let Value::Obj(b_ref) = self.pop() else { unreachable!() };
        let Value::Obj(a_ref) = self.pop() else { unreachable!() };
        let mut joined = String::with_capacity(
            self.string_contents(a_ref).len() + self.string_contents(b_ref).len(),
        );
        joined.push_str(self.string_contents(a_ref));
        joined.push_str(self.string_contents(b_ref));
        let result = self.heap.intern(&joined);
        self.push(Value::Obj(result));
    }
}
