use argh::FromArgs;
use log::LevelFilter;
use quotesh::{Environment, Shell, ShellError, repl};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(FromArgs)]
/// A small Unix-like shell with quoting, command substitution, globbing,
/// redirection and pipelines over a fixed set of builtin applications.
struct ShellArgs {
    #[argh(option, short = 'c')]
    /// evaluate this command line and exit instead of starting the prompt.
    command: Option<String>,

    #[argh(option, default = "LevelFilter::Warn")]
    /// log verbosity written to stderr: off, error, warn, info, debug or trace.
    log_level: LevelFilter,

    #[argh(option)]
    /// start in this working directory instead of the current one.
    dir: Option<PathBuf>,
}

fn main() {
    let args: ShellArgs = argh::from_env();

    if let Err(err) = TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("shell: cannot set up logging: {err}");
    }

    let env = match &args.dir {
        Some(dir) => match dir.canonicalize() {
            Ok(dir) if dir.is_dir() => Environment::with_dir(dir),
            _ => {
                eprintln!("shell: {}: No such directory", dir.display());
                process::exit(2);
            }
        },
        None => Environment::new(),
    };
    let shell = Shell::new(env);

    let code = match args.command {
        Some(line) => match shell.evaluate(&line, &mut io::stdin(), &mut io::stdout()) {
            Ok(()) => 0,
            Err(ShellError::Exit(code)) => code,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        None => match repl::run(&shell) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("shell: {err}");
                1
            }
        },
    };
    process::exit(code);
}
