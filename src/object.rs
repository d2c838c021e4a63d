// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Heap object kinds.
//!
//! Every value that doesn't fit inline in a [`crate::value::Value`] lives
//! here, one variant per kind from the data model: strings, functions,
//! native functions, closures, upvalues, classes, instances, and bound
//! methods.

use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::{ObjRef, Value};


/// An interned, immutable string plus its cached hash.
#[derive(Debug, Clone)]
pub struct ObjString {
    pub chars: String,
    /// 32-bit FNV-1a hash, computed once at creation.
    pub hash: u32,
}

impl ObjString {
    #[must_use]
    pub fn new(chars: String) -> Self {
        let hash = fnv1a_hash(chars.as_bytes());
        Self { chars, hash }
    }
}

/// 32-bit FNV-1a, matching the reference implementation's string hash.
#[must_use]
pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// A compiled function: its arity, upvalue count, optional name, and the
/// chunk of bytecode implementing its body.
#[derive(Debug, Clone)]
pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    /// `None` for the implicit top-level script function.
    pub name: Option<ObjRef>,
    pub chunk: Chunk,
}

impl ObjFunction {
    #[must_use]
    pub fn new(name: Option<ObjRef>) -> Self {
        Self {
            arity: 0,
            upvalue_count: 0,
            name,
            chunk: Chunk::new(),
        }
    }
}

/// Signature of a host-provided native function.
pub type NativeFn = fn(args: &[Value]) -> Value;

/// A native function exposed to scripts (e.g. `clock`).
#[derive(Clone, Copy)]
pub struct ObjNative {
    pub name: &'static str,
    pub function: NativeFn,
}

impl std::fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjNative").field("name", &self.name).finish()
    }
}

/// A runtime closure: a non-owning reference to its [`ObjFunction`] plus
/// the upvalues it captured at creation time.
#[derive(Debug, Clone)]
pub struct ObjClosure {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

/// An indirection onto a captured variable.
///
/// While `location` points into the VM stack the upvalue is "open": it
/// borrows a slot owned by some active call frame. Once the frame that
/// owns that slot returns, the upvalue is "closed": `closed` holds the
/// value and `location` is `None`.
#[derive(Debug, Clone, Copy)]
pub struct ObjUpvalue {
    /// Stack index this upvalue aliases while open; `None` once closed.
    pub location: Option<usize>,
    pub closed: Value,
}

impl ObjUpvalue {
    #[must_use]
    pub const fn new(stack_slot: usize) -> Self {
        Self {
            location: Some(stack_slot),
            closed: Value::Nil,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.location.is_some()
    }
}

/// A class: its name and its methods table (name -> Closure).
#[derive(Debug, Clone)]
pub struct ObjClass {
    pub name: ObjRef,
    pub methods: Table,
}

impl ObjClass {
    #[must_use]
    pub fn new(name: ObjRef) -> Self {
        Self {
            name,
            methods: Table::new(),
        }
    }
}

/// An instance of a class: a pointer to its class and its own fields.
#[derive(Debug, Clone)]
pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: Table,
}

impl ObjInstance {
    #[must_use]
    pub fn new(class: ObjRef) -> Self {
        Self {
            class,
            fields: Table::new(),
        }
    }
}

/// A first-class value pairing a receiver with one of its class's
/// methods, produced by property access and `super.name`.
#[derive(Debug, Clone, Copy)]
pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

/// The tagged union of every heap object kind.
#[derive(Debug, Clone)]
pub enum Obj {
    String(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
}

impl Obj {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Native(_) => "native function",
            Self::Closure(_) => "closure",
            Self::Upvalue(_) => "upvalue",
            Self::Class(_) => "class",
            Self::Instance(_) => "instance",
            Self::BoundMethod(_) => "bound method",
        }
    }
}
