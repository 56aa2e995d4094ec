//! Script front end and interpreter.
//!
//! `lexer` → `script_parser` → `check` produce a syntax tree and its
//! diagnostics; `vm` runs the tree against an [`ExecutionContext`], and
//! `runner` ties the stages together for one script.
pub mod ast;
pub mod check;
pub mod context;
pub mod globals;
pub mod lexer;
pub mod runner;
pub mod script_parser;
pub mod value;
pub mod vm;

pub use context::ExecutionContext;
pub use runner::{RunOutcome, RunState, ScriptRunner};
