use super::Command;
use crate::builtin::AppKind;
use crate::error::ShellError;
use crate::glob;
use crate::lexer;
use crate::redirect::{IoRedirection, RedirectPlan, Redirects};
use crate::shell::Shell;
use crate::text::CommandText;
use std::io::{BufReader, BufWriter, Read, Write};

/// A single application invocation with optional `<`/`>` redirections.
#[derive(Debug)]
pub struct CallCommand<'s> {
    shell: &'s Shell,
    text: CommandText,
    app: String,
    args: Vec<String>,
    plan: RedirectPlan,
}

impl<'s> CallCommand<'s> {
    pub fn new(shell: &'s Shell, text: impl Into<CommandText>) -> Self {
        Self {
            shell,
            text: text.into(),
            app: String::new(),
            args: Vec::new(),
            plan: RedirectPlan::default(),
        }
    }

    /// Application name after parsing; empty when the stage had no words.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Arguments after substitution and globbing.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Command for CallCommand<'_> {
    fn parse(&mut self) -> Result<(), ShellError> {
        let env = self.shell.env();
        let plan = IoRedirection::new(env.clone()).plan(&self.text)?;
        let words = lexer::split_into_words(plan.text.as_str())?;
        let fields = lexer::resolve_words(&words, self.shell)?;

        match fields.split_first() {
            Some((name, rest)) => {
                self.app = name.text();
                self.args = glob::expand_fields(rest, env);
            }
            None => {
                self.app.clear();
                self.args.clear();
            }
        }
        self.plan = plan;
        log::debug!("call {:?} {:?}", self.app, self.args);
        Ok(())
    }

    fn evaluate(
        &self,
        stdin: &mut (dyn Read + Send),
        stdout: &mut (dyn Write + Send),
    ) -> Result<(), ShellError> {
        let kind = AppKind::lookup(&self.app).ok_or_else(|| ShellError::InvalidApp(self.app.clone()))?;
        let env = self.shell.env();

        let Redirects {
            stdin: file_in,
            stdout: file_out,
        } = self.plan.open(env)?;
        let mut file_in = file_in.map(BufReader::new);
        let mut file_out = file_out.map(BufWriter::new);

        let input: &mut dyn Read = match file_in.as_mut() {
            Some(file) => file,
            None => stdin,
        };
        let output: &mut dyn Write = match file_out.as_mut() {
            Some(file) => file,
            None => stdout,
        };

        let result = kind.run(&self.args, input, output, env);
        output.flush()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Shell) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file1.txt"), "asdf").unwrap();
        let shell = Shell::new(Environment::with_dir(dir.path()));
        (dir, shell)
    }

    fn run(shell: &Shell, line: &str) -> Result<String, ShellError> {
        let mut call = CallCommand::new(shell, line);
        call.parse()?;
        let mut out = Vec::new();
        call.evaluate(&mut io::empty(), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_splits_app_and_args() {
        let (_dir, shell) = fixture();
        let mut call = CallCommand::new(&shell, "echo 'a b' \"c\"d  e");
        call.parse().unwrap();
        assert_eq!(call.app(), "echo");
        assert_eq!(call.args(), ["a b", "cd", "e"]);
    }

    #[test]
    fn test_evaluate_echo_and_cat() {
        let (_dir, shell) = fixture();
        assert_eq!(run(&shell, "echo abc def").unwrap(), "abc def\n");
        assert_eq!(run(&shell, "cat file1.txt").unwrap(), "asdf");
    }

    #[test]
    fn test_command_substitution_in_arguments() {
        let (_dir, shell) = fixture();
        assert_eq!(
            run(&shell, "echo `echo test command substitution`").unwrap(),
            "test command substitution\n"
        );
    }

    #[test]
    fn test_unknown_and_empty_app() {
        let (_dir, shell) = fixture();
        let err = run(&shell, "lsx -l").unwrap_err();
        assert_eq!(err.to_string(), "shell: lsx: Invalid app");
        let err = run(&shell, "   ").unwrap_err();
        assert_eq!(err.to_string(), "shell: : Invalid app");
    }

    #[test]
    fn test_redirections_apply_to_the_app() {
        let (dir, shell) = fixture();
        assert_eq!(run(&shell, "cat < file1.txt > copy.txt").unwrap(), "");
        assert_eq!(fs::read_to_string(dir.path().join("copy.txt")).unwrap(), "asdf");
    }

    #[test]
    fn test_unknown_app_opens_no_files() {
        let (dir, shell) = fixture();
        assert!(run(&shell, "nope > created.txt").is_err());
        assert!(!dir.path().join("created.txt").exists());
    }

    #[test]
    fn test_unterminated_quote_fails_in_parse() {
        let (_dir, shell) = fixture();
        let mut call = CallCommand::new(&shell, "echo 'oops");
        let err = call.parse().unwrap_err();
        assert!(matches!(err, ShellError::UnterminatedQuote { quote: '\'', .. }));
    }
}
