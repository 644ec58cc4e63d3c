//! A small Unix-like shell.
//!
//! Command lines support single, double and back quotes, command
//! substitution, `*` globbing, `<`/`>` redirection, `|` pipelines whose
//! stages run concurrently, and `;` sequencing. Every application is a
//! builtin implemented in Rust; nothing is spawned as an external process.
//!
//! The main entry point is [`Shell`], which evaluates whole lines against a
//! shared [`Environment`]. The [`command`] module exposes the call and pipe
//! forms a line is broken into.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod glob;
mod io_adapters;
pub mod lexer;
pub mod redirect;
pub mod repl;
mod shell;
pub mod text;

pub use builtin::AppKind;
pub use env::Environment;
pub use error::{AppError, ExitCode, ShellError};
pub use shell::Shell;
pub use text::CommandText;
