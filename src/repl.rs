use crate::error::{ExitCode, ShellError};
use crate::shell::Shell;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io;

/// Interactive read-eval-print loop.
///
/// The prompt shows the working directory. Errors are printed and the loop
/// goes on; `exit` ends it with that status, end of input with 0.
pub fn run(shell: &Shell) -> rustyline::Result<ExitCode> {
    let mut rl = DefaultEditor::new()?;

    loop {
        let prompt = format!("{}> ", shell.env().current_dir().display());
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str())?;
                match shell.evaluate(&line, &mut io::stdin(), &mut io::stdout()) {
                    Ok(()) => {}
                    Err(ShellError::Exit(code)) => return Ok(code),
                    Err(err) => eprintln!("{err}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                log::debug!("interrupted");
                continue;
            }
            Err(ReadlineError::Eof) => return Ok(0),
            Err(err) => return Err(err),
        }
    }
}
