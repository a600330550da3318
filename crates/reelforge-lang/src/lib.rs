//! # reelforge-lang
//!
//! The declarative scene-module language generated by the code generator.
//! Source → tokens → AST → compiled scene artifact. The validator runs cheap
//! static checks on raw source before any compilation is attempted.

pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod validator;

pub use compiler::{compile_scene, CompileOutput, CompileWarning, CompiledScene};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use validator::validate_source;
