// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Human-readable bytecode listings, used by the `print_code` and
//! `trace_execution` debug features.

use crate::chunk::{Chunk, OpCode};
use crate::heap::Heap;

pub fn disassemble_chunk(chunk: &Chunk, name: &str, heap: &Heap) {
    println!("== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, heap);
    }
}

#[allow(clippy::too_many_lines)]
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, heap: &Heap) -> usize {
    print!("{offset:04} ");
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        print!("   | ");
    } else {
        print!("{:4} ", chunk.lines[offset]);
    }

    let Some(op) = OpCode::from_byte(chunk.code[offset]) else {
        println!("Unknown opcode {}", chunk.code[offset]);
        return offset + 1;
    };

    match op {
        OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, offset, heap),
        OpCode::Nil => simple_instruction("OP_NIL", offset),
        OpCode::True => simple_instruction("OP_TRUE", offset),
        OpCode::False => simple_instruction("OP_FALSE", offset),
        OpCode::Pop => simple_instruction("OP_POP", offset),
        OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset),
        OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, offset, heap),
        OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, offset, heap),
        OpCode::DefineGlobal => constant_instruction("OP_DEFINE_GLOBAL", chunk, offset, heap),
        OpCode::GetUpvalue => byte_instruction("OP_GET_UPVALUE", chunk, offset),
        OpCode::SetUpvalue => byte_instruction("OP_SET_UPVALUE", chunk, offset),
        OpCode::GetProperty => constant_instruction("OP_GET_PROPERTY", chunk, offset, heap),
        OpCode::SetProperty => constant_instruction("OP_SET_PROPERTY", chunk, offset, heap),
        OpCode::GetSuper => constant_instruction("OP_GET_SUPER", chunk, offset, heap),
        OpCode::Equal => simple_instruction("OP_EQUAL", offset),
        OpCode::Greater => simple_instruction("OP_GREATER", offset),
        OpCode::Less => simple_instruction("OP_LESS", offset),
        OpCode::Add => simple_instruction("OP_ADD", offset),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction("OP_DIVIDE", offset),
        OpCode::Not => simple_instruction("OP_NOT", offset),
        OpCode::Negate => simple_instruction("OP_NEGATE", offset),
        OpCode::Print => simple_instruction("OP_PRINT", offset),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, offset),
        OpCode::Call => byte_instruction("OP_CALL", chunk, offset),
        OpCode::Invoke => invoke_instruction("OP_INVOKE", chunk, offset, heap),
        OpCode::SuperInvoke => invoke_instruction("OP_SUPER_INVOKE", chunk, offset, heap),
        OpCode::Closure => closure_instruction(chunk, offset, heap),
        OpCode::CloseUpvalue => simple_instruction("OP_CLOSE_UPVALUE", offset),
        OpCode::Return => simple_instruction("OP_RETURN", offset),
        OpCode::Class => constant_instruction("OP_CLASS", chunk, offset, heap),
        OpCode::Inherit => simple_instruction("OP_INHERIT", offset),
        OpCode::Method => constant_instruction("OP_METHOD", chunk, offset, heap),
    }
}

fn simple_instruction(name: &str, offset: usize) -> usize {
    println!("{name}");
    offset + 1
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    println!("{name:-16} {slot:4}");
    offset + 2
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize) -> usize {
    let hi = u16::from(chunk.code[offset + 1]);
    let lo = u16::from(chunk.code[offset + 2]);
    let jump = (hi << 8) | lo;
    let target = offset as i32 + 3 + sign * i32::from(jump);
    println!("{name:-16} {offset:4} -> {target}");
    offset + 3
}

fn constant_instruction(name: &str, chunk: &Chunk, offset: usize, heap: &Heap) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let value = heap.display_value(chunk.constants[index]);
    println!("{name:-16} {index:4} '{value}'");
    offset + 2
}

fn invoke_instruction(name: &str, chunk: &Chunk, offset: usize, heap: &Heap) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let arg_count = chunk.code[offset + 2];
    let value = heap.display_value(chunk.constants[index]);
    println!("{name:-16} ({arg_count} args) {index:4} '{value}'");
    offset + 3
}

fn closure_instruction(chunk: &Chunk, offset: usize, heap: &Heap) -> usize {
    let mut offset = offset + 1;
    let index = chunk.code[offset] as usize;
    offset += 1;
    let value = heap.display_value(chunk.constants[index]);
    println!("{:-16} {index:4} '{value}'", "OP_CLOSURE");

    let crate::object::Obj::Function(function) = heap.get(
        chunk.constants[index].as_obj().expect("OP_CLOSURE constant must be a function"),
    ) else {
        return offset;
    };
    for _ in 0..function.upvalue_count {
        let is_local = chunk.code[offset];
        let index = chunk.code[offset + 1];
        offset += 2;
        let kind = if is_local == 1 { "local" } else { "upvalue" };
        println!("{:04}      |                     {kind} {index}", offset - 2);
    }
    offset
}
