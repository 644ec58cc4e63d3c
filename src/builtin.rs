//! Builtin applications and the registry the shell dispatches through.

mod compare;
mod fs;
mod search;
mod text;

use crate::env::Environment;
use crate::error::{AppError, ExitCode, ShellError, describe_io};
use argh::{EarlyExit, FromArgs};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::sync::OnceLock;

pub use compare::{Cmp, Diff};
pub use fs::{Cd, Ls, Mkdir};
pub use search::{Grep, Sed};
pub use text::{Cat, Echo, Paste, Split};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) from a fresh argv
/// on every invocation, so no state survives between runs.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Flags that consume the following argument as their value.
    const VALUE_OPTIONS: &'static [&'static str] = &[];

    /// Rewrite argv into the shape argh expects. See [`normalize_args`].
    fn prepare_args(args: &[String]) -> Vec<String> {
        normalize_args(args, Self::VALUE_OPTIONS)
    }

    /// Executes the command using provided IO streams and environment.
    ///
    /// The streams belong to the caller and are never closed here.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &Environment,
    ) -> anyhow::Result<()>;
}

/// Move flags in front of operands and end them with `--`.
///
/// The applications accept flags after their operands (`cmp a b -l`) and
/// bundled switches (`-csl`), neither of which argh understands on its own.
/// Everything after the inserted `--` is positional, including `-` and words
/// argh would otherwise treat specially such as `help`.
pub(crate) fn normalize_args(args: &[String], value_options: &[&str]) -> Vec<String> {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            operands.extend(iter.by_ref().cloned());
            break;
        }
        if !arg.starts_with('-') || arg.len() == 1 {
            operands.push(arg.clone());
            continue;
        }
        if value_options.contains(&arg.as_str()) {
            flags.push(arg.clone());
            flags.extend(iter.next().cloned());
        } else if !arg.starts_with("--") && arg.chars().count() > 2 {
            flags.extend(arg.chars().skip(1).map(|c| format!("-{c}")));
        } else {
            flags.push(arg.clone());
        }
    }

    flags.push("--".to_string());
    flags.extend(operands);
    flags
}

fn run_builtin<T: BuiltinCommand>(
    args: &[String],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    env: &Environment,
) -> Result<(), ShellError> {
    let args = T::prepare_args(args);
    let argv: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &argv) {
        Ok(cmd) => cmd
            .execute(stdin, stdout, env)
            .map_err(|err| AppError::new(T::name(), format!("{err:#}")).into()),
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            stdout.write_all(output.as_bytes())?;
            Ok(())
        }
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => Err(AppError::new(T::name(), output.trim_end()).into()),
    }
}

#[derive(FromArgs)]
/// leave the shell.
pub struct Exit {
    #[argh(positional, default = "0")]
    /// exit status handed to the host process.
    pub code: ExitCode,
}

/// The closed set of applications the shell can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppKind {
    Echo,
    Cat,
    Ls,
    Mkdir,
    Paste,
    Diff,
    Cd,
    Split,
    Cmp,
    Grep,
    Sed,
    Exit,
}

impl AppKind {
    pub const ALL: [AppKind; 12] = [
        AppKind::Echo,
        AppKind::Cat,
        AppKind::Ls,
        AppKind::Mkdir,
        AppKind::Paste,
        AppKind::Diff,
        AppKind::Cd,
        AppKind::Split,
        AppKind::Cmp,
        AppKind::Grep,
        AppKind::Sed,
        AppKind::Exit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AppKind::Echo => "echo",
            AppKind::Cat => "cat",
            AppKind::Ls => "ls",
            AppKind::Mkdir => "mkdir",
            AppKind::Paste => "paste",
            AppKind::Diff => "diff",
            AppKind::Cd => "cd",
            AppKind::Split => "split",
            AppKind::Cmp => "cmp",
            AppKind::Grep => "grep",
            AppKind::Sed => "sed",
            AppKind::Exit => "exit",
        }
    }

    /// Exact-name lookup in the registry, which is built on first use and
    /// never modified afterwards.
    pub fn lookup(name: &str) -> Option<AppKind> {
        static REGISTRY: OnceLock<HashMap<&'static str, AppKind>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| AppKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect())
            .get(name)
            .copied()
    }

    /// Run the application with `args` (argv without the name).
    ///
    /// `exit` does not return normally: it yields [`ShellError::Exit`], which
    /// callers must propagate without evaluating anything further.
    pub fn run(
        self,
        args: &[String],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &Environment,
    ) -> Result<(), ShellError> {
        log::debug!("dispatch {} {:?}", self.name(), args);
        match self {
            AppKind::Echo => run_builtin::<Echo>(args, stdin, stdout, env),
            AppKind::Cat => run_builtin::<Cat>(args, stdin, stdout, env),
            AppKind::Ls => run_builtin::<Ls>(args, stdin, stdout, env),
            AppKind::Mkdir => run_builtin::<Mkdir>(args, stdin, stdout, env),
            AppKind::Paste => run_builtin::<Paste>(args, stdin, stdout, env),
            AppKind::Diff => run_builtin::<Diff>(args, stdin, stdout, env),
            AppKind::Cd => run_builtin::<Cd>(args, stdin, stdout, env),
            AppKind::Split => run_builtin::<Split>(args, stdin, stdout, env),
            AppKind::Cmp => run_builtin::<Cmp>(args, stdin, stdout, env),
            AppKind::Grep => run_builtin::<Grep>(args, stdin, stdout, env),
            AppKind::Sed => run_builtin::<Sed>(args, stdin, stdout, env),
            AppKind::Exit => {
                let args = normalize_args(args, &[]);
                let argv: Vec<&str> = args.iter().map(String::as_str).collect();
                match Exit::from_args(&["exit"], &argv) {
                    Ok(exit) => Err(ShellError::Exit(exit.code)),
                    Err(EarlyExit { output, .. }) => Err(AppError::new("exit", output.trim_end()).into()),
                }
            }
        }
    }
}

/// Open `name` relative to the working directory for reading.
///
/// Errors read `<name>: <reason>`; directories are rejected up front because
/// opening one succeeds on Unix and only reading it fails.
pub(crate) fn open_file(env: &Environment, name: &str) -> anyhow::Result<File> {
    let path = env.resolve(name);
    if path.is_dir() {
        anyhow::bail!("{name}: Is a directory");
    }
    File::open(&path).map_err(|err| anyhow::anyhow!("{name}: {}", describe_io(&err)))
}

/// Read a whole operand into memory; `-` stands for stdin.
pub(crate) fn read_operand(
    env: &Environment,
    name: &str,
    stdin: &mut dyn Read,
) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    if name == "-" {
        stdin.read_to_end(&mut data)?;
    } else {
        open_file(env, name)?.read_to_end(&mut data)?;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(AppKind::lookup("echo"), Some(AppKind::Echo));
        assert_eq!(AppKind::lookup("ECHO"), None);
        assert_eq!(AppKind::lookup("echo "), None);
        assert_eq!(AppKind::lookup(""), None);
        for kind in AppKind::ALL {
            assert_eq!(AppKind::lookup(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_normalize_moves_flags_and_splits_bundles() {
        assert_eq!(
            normalize_args(&strings(&["a", "b", "-csl"]), &[]),
            strings(&["-c", "-s", "-l", "--", "a", "b"])
        );
        assert_eq!(
            normalize_args(&strings(&["file", "-l", "6"]), &["-l"]),
            strings(&["-l", "6", "--", "file"])
        );
        assert_eq!(
            normalize_args(&strings(&["-", "help", "--", "-x"]), &[]),
            strings(&["--", "-", "help", "-x"])
        );
    }

    #[test]
    fn test_exit_yields_control_transfer() {
        let env = Environment::new();
        let mut out = Vec::new();
        let err = AppKind::Exit
            .run(&strings(&["3"]), &mut Cursor::new(Vec::new()), &mut out, &env)
            .unwrap_err();
        assert!(matches!(err, ShellError::Exit(3)));

        let err = AppKind::Exit
            .run(&[], &mut Cursor::new(Vec::new()), &mut out, &env)
            .unwrap_err();
        assert!(matches!(err, ShellError::Exit(0)));
    }

    #[test]
    fn test_argh_errors_become_app_errors() {
        let env = Environment::new();
        let mut out = Vec::new();
        let err = AppKind::Cmp
            .run(&strings(&["-z", "a", "b"]), &mut Cursor::new(Vec::new()), &mut out, &env)
            .unwrap_err();
        assert!(err.to_string().starts_with("cmp: "), "{err}");
    }
}
