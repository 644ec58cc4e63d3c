//! Top-level evaluation of a command line.

use crate::command::{CallCommand, Command, PipeCommand};
use crate::env::Environment;
use crate::error::ShellError;
use crate::lexer::CommandSubstitution;
use crate::text::CommandText;
use std::io::{self, Read, Write};

/// Evaluates command lines against a shared working directory.
///
/// A line is split on unquoted `;` and the segments run strictly left to
/// right. A segment containing an unquoted `|` runs as a pipeline, anything
/// else as a single call.
///
/// ```
/// use quotesh::{Environment, Shell};
///
/// let shell = Shell::new(Environment::new());
/// let mut out = Vec::new();
/// shell.evaluate("echo hello; echo 'big   world'", &mut std::io::empty(), &mut out).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "hello\nbig   world\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Shell {
    env: Environment,
}

impl Shell {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Evaluate `line`, reading from `stdin` and writing to `stdout`.
    ///
    /// A failing segment does not stop the ones after it. Every failure but
    /// the last is written to stderr as it is superseded; the last one is
    /// returned. `exit` stops evaluation at once and comes back as
    /// [`ShellError::Exit`].
    pub fn evaluate(
        &self,
        line: &str,
        stdin: &mut (dyn Read + Send),
        stdout: &mut (dyn Write + Send),
    ) -> Result<(), ShellError> {
        let text = CommandText::new(line);
        text.check_quotes()?;
        log::debug!("evaluate {:?}", line);

        let mut last_error: Option<ShellError> = None;
        for segment in text.split_unquoted(';')? {
            match self.evaluate_segment(segment, stdin, stdout) {
                Ok(()) => {}
                Err(err) if err.is_exit() => {
                    stdout.flush()?;
                    return Err(err);
                }
                Err(err) => {
                    log::debug!("segment failed: {err}");
                    if let Some(previous) = last_error.replace(err) {
                        stdout.flush()?;
                        eprintln!("{previous}");
                    }
                }
            }
        }

        stdout.flush()?;
        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn evaluate_segment(
        &self,
        segment: CommandText,
        stdin: &mut (dyn Read + Send),
        stdout: &mut (dyn Write + Send),
    ) -> Result<(), ShellError> {
        let mut command: Box<dyn Command + '_> = if segment.contains_unquoted('|')? {
            Box::new(PipeCommand::new(self, segment))
        } else {
            Box::new(CallCommand::new(self, segment))
        };
        command.parse()?;
        command.evaluate(stdin, stdout)
    }

    /// Run `line` with empty input and return everything it wrote.
    ///
    /// `exit` inside the captured line ends the capture, not the shell.
    pub fn capture(&self, line: &str) -> Result<String, ShellError> {
        let mut output = Vec::new();
        match self.evaluate(line, &mut io::empty(), &mut output) {
            Ok(()) | Err(ShellError::Exit(_)) => {}
            Err(err) => return Err(err),
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

impl CommandSubstitution for Shell {
    fn substitute(&self, command: &str) -> Result<String, ShellError> {
        log::debug!("substitute {:?}", command);
        self.capture(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Shell) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file1.txt"), "asdf\n").unwrap();
        fs::create_dir(dir.path().join("folder1")).unwrap();
        fs::write(dir.path().join("folder1").join("inner.txt"), "inner\n").unwrap();
        let shell = Shell::new(Environment::with_dir(dir.path()));
        (dir, shell)
    }

    fn run(shell: &Shell, line: &str) -> (Result<(), ShellError>, String) {
        let mut out = Vec::new();
        let result = shell.evaluate(line, &mut io::empty(), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_sequence_runs_every_segment() {
        let (_dir, shell) = fixture();
        let (result, out) = run(&shell, "echo a; nope; echo b");
        assert_eq!(result.unwrap_err().to_string(), "shell: nope: Invalid app");
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn test_cd_is_seen_by_later_segments() {
        let (_dir, shell) = fixture();
        let (result, out) = run(&shell, "cd folder1; cat inner.txt");
        result.unwrap();
        assert_eq!(out, "inner\n");
    }

    #[test]
    fn test_exit_stops_evaluation() {
        let (_dir, shell) = fixture();
        let (result, out) = run(&shell, "echo before; exit 7; echo after");
        assert!(matches!(result, Err(ShellError::Exit(7))));
        assert_eq!(out, "before\n");
    }

    #[test]
    fn test_unterminated_quote_runs_nothing() {
        let (_dir, shell) = fixture();
        let (result, out) = run(&shell, "echo ok; echo \"broken");
        assert!(matches!(result, Err(ShellError::UnterminatedQuote { quote: '"', .. })));
        assert_eq!(out, "");
    }

    #[test]
    fn test_capture_returns_raw_output() {
        let (_dir, shell) = fixture();
        assert_eq!(shell.capture("echo a; echo b").unwrap(), "a\nb\n");
        assert_eq!(shell.capture("echo x; exit 3; echo y").unwrap(), "x\n");
    }

    #[test]
    fn test_nested_substitution() {
        let (_dir, shell) = fixture();
        let (result, out) = run(&shell, "echo \"`echo a; echo b`\" `cat file1.txt`");
        result.unwrap();
        assert_eq!(out, "a b asdf\n");
    }

    #[test]
    fn test_semicolon_inside_quotes_is_literal() {
        let (_dir, shell) = fixture();
        let (result, out) = run(&shell, "echo 'a;b' \"c;d\"");
        result.unwrap();
        assert_eq!(out, "a;b c;d\n");
    }
}
