// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;
use crate::object::{ObjFunction, ObjInstance};

#[test]
fn interning_the_same_text_returns_the_same_handle() {
    let mut heap = Heap::new();
    let a = heap.intern("hello");
    let b = heap.intern("hello");
    assert_eq!(a, b);
}

#[test]
fn interning_different_text_returns_different_handles() {
    let mut heap = Heap::new();
    let a = heap.intern("hello");
    let b = heap.intern("world");
    assert_ne!(a, b);
}

#[test]
fn unreachable_objects_are_swept() {
    let mut heap = Heap::new();
    let garbage = heap.intern("garbage");
    heap.mark_value(Value::Nil); // no roots reach `garbage`
    heap.trace_references();
    heap.sweep();
    assert!(heap.strings.get(garbage, crate::object::fnv1a_hash(b"garbage")).is_none());
}

#[test]
fn marked_objects_survive_a_collection() {
    let mut heap = Heap::new();
    let kept = heap.intern("kept");
    heap.mark_object(kept);
    heap.trace_references();
    heap.sweep();
    assert_eq!(heap.display_object_for_test(kept), "kept");
}

#[test]
fn marking_a_function_traces_its_constant_pool() {
    let mut heap = Heap::new();
    let name = heap.intern("f");
    let referenced = heap.intern("referenced constant");
    let mut func = ObjFunction::new(Some(name));
    func.chunk.add_constant(Value::Obj(referenced));
    let func_ref = heap.alloc(Obj::Function(func));

    heap.mark_object(func_ref);
    heap.trace_references();
    heap.sweep();

    assert_eq!(heap.display_object_for_test(referenced), "referenced constant");
}

#[test]
fn marking_an_instance_traces_its_class_and_fields() {
    let mut heap = Heap::new();
    let class_name = heap.intern("Point");
    let class = crate::object::ObjClass::new(class_name);
    let class_ref = heap.alloc(Obj::Class(class));
    let mut instance = ObjInstance::new(class_ref);
    let field_value = heap.intern("field value");
    instance.fields.set(heap.intern("x"), 1, Value::Obj(field_value));
    let instance_ref = heap.alloc(Obj::Instance(instance));

    heap.mark_object(instance_ref);
    heap.trace_references();
    heap.sweep();

    assert_eq!(heap.display_object_for_test(field_value), "field value");
    assert_eq!(heap.display_object_for_test(class_name), "Point");
}

impl Heap {
    #[cfg(test)]
    fn display_object_for_test(&self, r: ObjRef) -> String {
        self.display_object(r)
    }
}
