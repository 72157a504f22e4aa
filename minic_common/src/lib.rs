//! Shared error type for the MiniC compiler.
//!
//! This crate is deliberately tiny: diagnostics have no source position,
//! so there is no `Span`/`Position` machinery here, unlike a
//! general-purpose compiler support crate. Every stage (lexer, parser,
//! codegen, mem2reg) shares the one `CompileError` enum defined here.

pub mod error;

pub use error::{CompileError, CompileResult};
