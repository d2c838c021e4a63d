// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Lumen
//!
//! A bytecode compiler and stack-based virtual machine for a small,
//! dynamically-typed, class-based scripting language.
//!
//! This crate provides:
//! - A hand-written scanner and single-pass Pratt compiler emitting
//!   bytecode directly, with no intermediate AST
//! - A stack-based VM with closures, classes, methods, and `super`
//! - A tri-color mark-and-sweep garbage collector over an arena-indexed
//!   heap
//! - An open-addressed hash table backing globals, instance fields,
//!   class methods, and the string intern pool
//!
//! ```
//! use lumen::{Interpreter, InterpretResult};
//!
//! let mut interpreter = Interpreter::new();
//! let result = interpreter.interpret("print 1 + 2;");
//! assert_eq!(result, InterpretResult::Ok);
//! ```

pub mod chunk;
pub mod compiler;
pub mod config;
pub mod heap;
pub mod object;
pub mod scanner;
pub mod table;
pub mod value;
pub mod vm;

pub use vm::{InterpretResult, Interpreter};

/// Crate version, as set by Cargo at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
