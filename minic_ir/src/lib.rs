//! The SSA IR: data model, AST-to-IR lowering, mem2reg, and the textual
//! printer. [`interp`] is test-only scaffolding, not part of the compiler
//! pipeline proper.

pub mod codegen;
pub mod interp;
pub mod ir;
pub mod mem2reg;
pub mod printer;

pub use codegen::Codegen;
pub use ir::{BinOp, Block, BlockRef, Function, GlobalDef, Instr, InstrRef, Operand, Program, Terminator, Ty};
