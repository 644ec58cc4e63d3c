use super::{CallCommand, Command};
use crate::error::ShellError;
use crate::io_adapters;
use crate::shell::Shell;
use crate::text::CommandText;
use std::io::{Read, Write};
use std::mem;
use std::thread::{self, Scope, ScopedJoinHandle};

type StageInput<'a> = Box<dyn Read + Send + 'a>;
type StageOutput<'a> = Box<dyn Write + Send + 'a>;

/// Stages joined by `|`, run concurrently.
///
/// Every stage gets its own scoped thread; adjacent stages are connected by a
/// bounded in-memory pipe, so a long stream flows through without being
/// buffered whole. The first stage reads the segment's stdin and the last one
/// writes the segment's stdout.
#[derive(Debug)]
pub struct PipeCommand<'s> {
    shell: &'s Shell,
    text: CommandText,
    stages: Vec<CallCommand<'s>>,
}

impl<'s> PipeCommand<'s> {
    pub fn new(shell: &'s Shell, text: impl Into<CommandText>) -> Self {
        Self {
            shell,
            text: text.into(),
            stages: Vec::new(),
        }
    }

    pub fn stages(&self) -> &[CallCommand<'s>] {
        &self.stages
    }
}

fn spawn_stage<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    idx: usize,
    stage: &'scope CallCommand<'_>,
    mut input: StageInput<'scope>,
    mut output: StageOutput<'scope>,
) -> Result<ScopedJoinHandle<'scope, Result<(), ShellError>>, ShellError> {
    let handle = thread::Builder::new()
        .name(format!("stage-{idx}"))
        .spawn_scoped(scope, move || {
            let result = stage.evaluate(&mut *input, &mut *output);
            if let Err(err) = &result {
                log::debug!("stage {idx} failed: {err}");
            }
            // dropping `output` here is end-of-stream for the next stage
            result
        })?;
    Ok(handle)
}

/// Pick the error a pipeline reports: `exit` wins, then the earliest stage.
fn pipeline_result(results: Vec<Result<(), ShellError>>) -> Result<(), ShellError> {
    let mut errors: Vec<ShellError> = results.into_iter().filter_map(Result::err).collect();
    if let Some(pos) = errors.iter().position(ShellError::is_exit) {
        return Err(errors.swap_remove(pos));
    }
    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

impl Command for PipeCommand<'_> {
    /// Split on unquoted `|` and parse every stage up front, so substitution
    /// and redirection syntax errors surface before any stage starts.
    fn parse(&mut self) -> Result<(), ShellError> {
        self.stages.clear();
        let segments = self.text.split_unquoted('|')?;
        if self.text.is_blank() {
            return Ok(());
        }
        if segments.iter().any(CommandText::is_blank) {
            return Err(ShellError::InvalidPipe);
        }

        let mut stages = Vec::with_capacity(segments.len());
        for segment in segments {
            let mut stage = CallCommand::new(self.shell, segment);
            stage.parse()?;
            stages.push(stage);
        }
        log::debug!("pipeline of {} stage(s)", stages.len());
        self.stages = stages;
        Ok(())
    }

    fn evaluate(
        &self,
        stdin: &mut (dyn Read + Send),
        stdout: &mut (dyn Write + Send),
    ) -> Result<(), ShellError> {
        let Some((last, upstream)) = self.stages.split_last() else {
            return Ok(());
        };

        let results = thread::scope(|scope| -> Result<Vec<_>, ShellError> {
            let mut handles = Vec::with_capacity(self.stages.len());
            let mut input: StageInput<'_> = Box::new(stdin);

            for (idx, stage) in upstream.iter().enumerate() {
                let (writer, reader) = io_adapters::pipe();
                let stage_input = mem::replace(&mut input, Box::new(reader));
                handles.push(spawn_stage(scope, idx, stage, stage_input, Box::new(writer))?);
            }
            handles.push(spawn_stage(scope, upstream.len(), last, input, Box::new(stdout))?);

            Ok(handles
                .into_iter()
                .enumerate()
                .map(|(idx, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(ShellError::StagePanicked(idx)))
                })
                .collect())
        })?;

        pipeline_result(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Shell) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("text.txt"), "first\nsecond\nthird\n").unwrap();
        let shell = Shell::new(Environment::with_dir(dir.path()));
        (dir, shell)
    }

    fn run(shell: &Shell, line: &str, input: &str) -> Result<String, ShellError> {
        let mut pipe = PipeCommand::new(shell, line);
        pipe.parse()?;
        let mut out = Vec::new();
        pipe.evaluate(&mut Cursor::new(input.as_bytes().to_vec()), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_blank_segments_are_invalid() {
        let (_dir, shell) = fixture();
        for line in ["| cat text.txt", "cat text.txt |", "echo a || cat", "cat | | cat"] {
            let err = run(&shell, line, "").unwrap_err();
            assert_eq!(err.to_string(), "shell: Invalid pipe operator/s", "for {line:?}");
        }
    }

    #[test]
    fn test_blank_text_has_no_stages() {
        let (_dir, shell) = fixture();
        let mut pipe = PipeCommand::new(&shell, "   ");
        pipe.parse().unwrap();
        assert!(pipe.stages().is_empty());
        assert_eq!(run(&shell, "", "").unwrap(), "");
    }

    #[test]
    fn test_quoted_bar_is_not_a_pipe() {
        let (_dir, shell) = fixture();
        let mut pipe = PipeCommand::new(&shell, "echo 'a|b' | cat");
        pipe.parse().unwrap();
        assert_eq!(pipe.stages().len(), 2);
        assert_eq!(pipe.stages()[0].args(), ["a|b"]);
    }

    #[test]
    fn test_pipe_output_matches_direct_output() {
        let (_dir, shell) = fixture();
        assert_eq!(
            run(&shell, "cat text.txt | cat", "").unwrap(),
            "first\nsecond\nthird\n"
        );
        assert_eq!(
            run(&shell, "cat text.txt | grep s | cat", "").unwrap(),
            "first\nsecond\n"
        );
    }

    #[test]
    fn test_first_stage_reads_inherited_input() {
        let (_dir, shell) = fixture();
        assert_eq!(run(&shell, "cat | grep b", "a\nb\nc\n").unwrap(), "b\n");
    }

    #[test]
    fn test_large_stream_does_not_deadlock() {
        let (dir, shell) = fixture();
        let big: String = (0..50_000).map(|i| format!("line number {i}\n")).collect();
        fs::write(dir.path().join("big.txt"), &big).unwrap();
        let out = run(&shell, "cat big.txt | cat | cat", "").unwrap();
        assert_eq!(out.len(), big.len());
        assert_eq!(out, big);
    }

    #[test]
    fn test_consumer_ignoring_input_does_not_block() {
        let (dir, shell) = fixture();
        let big: String = "x".repeat(1 << 20);
        fs::write(dir.path().join("big.txt"), &big).unwrap();
        assert_eq!(run(&shell, "cat big.txt | echo done", "").unwrap(), "done\n");
    }

    #[test]
    fn test_stage_error_and_exit_precedence() {
        let (_dir, shell) = fixture();
        let err = run(&shell, "cat text.txt | nope", "").unwrap_err();
        assert_eq!(err.to_string(), "shell: nope: Invalid app");

        let err = run(&shell, "nope | exit 4", "").unwrap_err();
        assert!(matches!(err, ShellError::Exit(4)));
    }

    #[test]
    fn test_cd_in_pipeline_changes_shared_directory() {
        let (dir, shell) = fixture();
        fs::create_dir(dir.path().join("sub")).unwrap();
        run(&shell, "cd sub | echo x", "").unwrap();
        assert_eq!(
            shell.env().current_dir(),
            fs::canonicalize(dir.path().join("sub")).unwrap()
        );
    }
}
