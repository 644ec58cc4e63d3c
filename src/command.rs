//! The two shapes a `;`-separated segment can take.

mod call;
mod pipe;

use crate::error::ShellError;
use std::io::{Read, Write};

pub use call::CallCommand;
pub use pipe::PipeCommand;

/// A parsed segment that can be run against a pair of streams.
///
/// [`Command::parse`] does everything that can fail before any application
/// runs (quote checks, redirection syntax, command substitution, globbing);
/// [`Command::evaluate`] opens redirection files and dispatches. The streams
/// are `Send` so pipeline stages can hand them to their own threads.
pub trait Command {
    fn parse(&mut self) -> Result<(), ShellError>;

    fn evaluate(
        &self,
        stdin: &mut (dyn Read + Send),
        stdout: &mut (dyn Write + Send),
    ) -> Result<(), ShellError>;
}
