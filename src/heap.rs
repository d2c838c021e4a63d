// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The garbage-collected object arena.
//!
//! Objects never move once allocated: a [`crate::value::ObjRef`] is a
//! stable index into `self.objects`, so closures, classes, and the
//! intern pool can all hold handles to each other without lifetimes.
//! Collection is tri-color mark-sweep: the VM marks its roots by calling
//! [`Heap::mark_value`]/[`Heap::mark_object`], [`Heap::trace_references`]
//! blackens the resulting gray worklist, and [`Heap::sweep`] frees
//! everything left white.

use crate::config::{GC_HEAP_GROW_FACTOR, INITIAL_NEXT_GC};
use crate::object::{Obj, ObjString};
use crate::table::Table;
use crate::value::{ObjRef, Value};

#[cfg(test)]
mod heap_test;

/// Owns every heap object and runs the collector over them.
pub struct Heap {
    objects: Vec<Option<Obj>>,
    marked: Vec<bool>,
    free_list: Vec<u32>,
    gray_stack: Vec<ObjRef>,
    /// Interned strings, keyed by their own contents; every live
    /// `ObjString` handle in the heap is also reachable through here.
    pub strings: Table,
    bytes_allocated: usize,
    next_gc: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            marked: Vec::new(),
            free_list: Vec::new(),
            gray_stack: Vec::new(),
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: INITIAL_NEXT_GC,
        }
    }

    #[must_use]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc
    }

    fn insert(&mut self, obj: Obj, size: usize) -> ObjRef {
        self.bytes_allocated += size;
        if let Some(index) = self.free_list.pop() {
            let i = index as usize;
            self.objects[i] = Some(obj);
            self.marked[i] = false;
            return ObjRef::from_index(i);
        }
        self.objects.push(Some(obj));
        self.marked.push(false);
        ObjRef::from_index(self.objects.len() - 1)
    }

    #[must_use]
    pub fn get(&self, r: ObjRef) -> &Obj {
        self.objects[r.index()]
            .as_ref()
            .expect("dangling ObjRef: object already swept")
    }

    #[must_use]
    pub fn get_mut(&mut self, r: ObjRef) -> &mut Obj {
        self.objects[r.index()]
            .as_mut()
            .expect("dangling ObjRef: object already swept")
    }

    /// Intern a string, allocating a new `ObjString` only if an equal one
    /// isn't already interned.
    pub fn intern(&mut self, s: &str) -> ObjRef {
        let hash = crate::object::fnv1a_hash(s.as_bytes());
        let objects = &self.objects;
        if let Some(existing) = self.strings.find_string(s, hash, |r| {
            let Some(Obj::String(obj)) = &objects[r.index()] else {
                unreachable!("intern pool holds a non-string handle")
            };
            obj.chars.as_str()
        }) {
            return existing;
        }
        let obj_string = ObjString::new(s.to_owned());
        let size = core::mem::size_of::<ObjString>() + s.len();
        let r = self.insert(Obj::String(obj_string), size);
        self.strings.set(r, hash, Value::Bool(true));
        r
    }

    pub fn alloc(&mut self, obj: Obj) -> ObjRef {
        let size = core::mem::size_of::<Obj>();
        self.insert(obj, size)
    }

    // --- mark phase -----------------------------------------------------

    pub fn mark_object(&mut self, r: ObjRef) {
        let i = r.index();
        if self.marked[i] {
            return;
        }
        self.marked[i] = true;
        self.gray_stack.push(r);
    }

    pub fn mark_value(&mut self, v: Value) {
        if let Value::Obj(r) = v {
            self.mark_object(r);
        }
    }

    pub fn mark_table(&mut self, table: &Table) {
        for (key, value) in table.iter() {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Blacken every object on the gray worklist, discovering and
    /// graying their referents as it goes, until none remain.
    pub fn trace_references(&mut self) {
        while let Some(r) = self.gray_stack.pop() {
            self.blacken(r);
        }
    }

    fn blacken(&mut self, r: ObjRef) {
        // Referents are collected into small, cheaply-`Copy`able locals
        // first so the recursive `mark_*` calls below can borrow `self`
        // mutably again; only method/field tables are cloned wholesale.
        match self.get(r) {
            Obj::String(_) | Obj::Native(_) => return,
            Obj::Upvalue(up) => {
                self.mark_value(up.closed);
                return;
            }
            Obj::Function(f) => {
                let name = f.name;
                let constants = f.chunk.constants.clone();
                if let Some(name) = name {
                    self.mark_object(name);
                }
                for constant in constants {
                    self.mark_value(constant);
                }
            }
            Obj::Closure(c) => {
                let function = c.function;
                let upvalues = c.upvalues.clone();
                self.mark_object(function);
                for up in upvalues {
                    self.mark_object(up);
                }
            }
            Obj::Class(class) => {
                let name = class.name;
                let methods = class.methods.clone();
                self.mark_object(name);
                self.mark_table(&methods);
            }
            Obj::Instance(inst) => {
                let class = inst.class;
                let fields = inst.fields.clone();
                self.mark_object(class);
                self.mark_table(&fields);
            }
            Obj::BoundMethod(bm) => {
                let receiver = bm.receiver;
                let method = bm.method;
                self.mark_value(receiver);
                self.mark_object(method);
            }
        }
    }

    /// Free every unmarked object and weakly sweep the intern pool of
    /// strings that turned out to be garbage. Must run after
    /// [`Heap::trace_references`] has finished blackening.
    pub fn sweep(&mut self) {
        let marked = &self.marked;
        self.strings.retain_keys(|r| marked[r.index()]);

        for i in 0..self.objects.len() {
            if self.marked[i] {
                self.marked[i] = false;
                continue;
            }
            if let Some(obj) = self.objects[i].take() {
                self.bytes_allocated -= Self::obj_size(&obj);
                self.free_list.push(i as u32);
            }
        }
    }

    fn obj_size(obj: &Obj) -> usize {
        match obj {
            Obj::String(s) => core::mem::size_of::<ObjString>() + s.chars.len(),
            _ => core::mem::size_of::<Obj>(),
        }
    }

    pub fn grow_next_gc(&mut self) {
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
    }

    /// Render a value for `print`/display purposes, resolving `Obj`
    /// handles into their actual content rather than a bare index.
    #[must_use]
    pub fn display_value(&self, value: Value) -> String {
        match value {
            Value::Obj(r) => self.display_object(r),
            other => other.to_string(),
        }
    }

    fn display_object(&self, r: ObjRef) -> String {
        match self.get(r) {
            Obj::String(s) => s.chars.clone(),
            Obj::Function(f) => match f.name {
                Some(name) => format!("<fn {}>", self.display_object(name)),
                None => "<script>".to_owned(),
            },
            Obj::Native(n) => format!("<native fn {}>", n.name),
            Obj::Closure(c) => self.display_object(c.function),
            Obj::Upvalue(_) => "<upvalue>".to_owned(),
            Obj::Class(class) => self.display_object(class.name),
            Obj::Instance(inst) => format!("{} instance", self.display_object(inst.class)),
            Obj::BoundMethod(bm) => self.display_object(bm.method),
        }
    }
}
