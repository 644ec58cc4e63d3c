use super::{BuiltinCommand, open_file, read_operand};
use crate::env::Environment;
use anyhow::{Context, Result, bail};
use argh::FromArgs;
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    /// Only leading `-n` switches are options; every other word is printed.
    fn prepare_args(args: &[String]) -> Vec<String> {
        let switches = args.iter().take_while(|arg| *arg == "-n").count();
        let mut prepared: Vec<String> = args[..switches].to_vec();
        prepared.push("--".to_string());
        prepared.extend_from_slice(&args[switches..]);
        prepared
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write, _env: &Environment) -> Result<()> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// concatenate files to standard output.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print in order; `-` or no operand reads standard input.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        if self.files.is_empty() {
            io::copy(stdin, stdout)?;
            return Ok(());
        }
        for fname in &self.files {
            if fname == "-" {
                io::copy(stdin, stdout)?;
                continue;
            }
            // a bad operand is reported in place and the rest still print
            match open_file(env, fname) {
                Ok(mut f) => {
                    io::copy(&mut f, stdout)?;
                }
                Err(e) => writeln!(stdout, "cat: {e}")?,
            }
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// merge corresponding lines of files, separated by tabs.
pub struct Paste {
    #[argh(positional, greedy)]
    /// files to merge; `-` reads standard input at that position.
    pub files: Vec<String>,
}

/// Where one paste column takes its lines from.
enum Column {
    File(VecDeque<String>),
    Stdin,
}

fn text_lines(data: &[u8]) -> VecDeque<String> {
    String::from_utf8_lossy(data).lines().map(str::to_string).collect()
}

impl BuiltinCommand for Paste {
    fn name() -> &'static str {
        "paste"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        if self.files.is_empty() {
            bail!("No files specified");
        }
        if self.files.iter().any(String::is_empty) {
            bail!("'': No such file or directory");
        }

        let mut columns = Vec::with_capacity(self.files.len());
        for name in &self.files {
            if name == "-" {
                columns.push(Column::Stdin);
            } else {
                columns.push(Column::File(text_lines(&read_operand(env, name, stdin)?)));
            }
        }
        // every `-` column draws from the same queue, in turn
        let mut shared_stdin = if columns.iter().any(|c| matches!(c, Column::Stdin)) {
            text_lines(&read_operand(env, "-", stdin)?)
        } else {
            VecDeque::new()
        };

        loop {
            let mut any = false;
            let row: Vec<String> = columns
                .iter_mut()
                .map(|column| {
                    let line = match column {
                        Column::File(lines) => lines.pop_front(),
                        Column::Stdin => shared_stdin.pop_front(),
                    };
                    any |= line.is_some();
                    line.unwrap_or_default()
                })
                .collect();
            if !any {
                break;
            }
            writeln!(stdout, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// split a file into pieces named PREFIXaa, PREFIXab, ...
pub struct Split {
    #[argh(option, short = 'l')]
    /// put this many lines into every output file (default 1000).
    pub lines: Option<usize>,

    #[argh(option, short = 'b')]
    /// put this many bytes into every output file; may end in b, k or m.
    pub bytes: Option<String>,

    #[argh(positional, greedy)]
    /// FILE to split (`-` or none reads standard input), then the PREFIX of
    /// the output file names (default "x").
    pub operands: Vec<String>,
}

const DEFAULT_SPLIT_LINES: usize = 1000;

/// Parse a byte count such as `512`, `2b`, `10k` or `1m`.
fn parse_size(size: &str) -> Result<usize> {
    let (digits, unit) = match size.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&size[..idx], Some(c)),
        _ => (size, None),
    };
    let multiplier = match unit {
        None => 1,
        Some('b') => 512,
        Some('k') => 1024,
        Some('m') => 1024 * 1024,
        Some(_) => bail!("invalid number of bytes: '{size}'"),
    };
    let count: usize = digits
        .parse()
        .with_context(|| format!("invalid number of bytes: '{size}'"))?;
    if count == 0 {
        bail!("invalid number of bytes: '{size}'");
    }
    count
        .checked_mul(multiplier)
        .with_context(|| format!("invalid number of bytes: '{size}'"))
}

/// Two-letter suffix for the `index`-th piece: aa, ab, ..., zz.
fn piece_suffix(index: usize) -> Option<String> {
    if index >= 26 * 26 {
        return None;
    }
    let first = (b'a' + (index / 26) as u8) as char;
    let second = (b'a' + (index % 26) as u8) as char;
    Some(format!("{first}{second}"))
}

impl BuiltinCommand for Split {
    fn name() -> &'static str {
        "split"
    }

    const VALUE_OPTIONS: &'static [&'static str] = &["-l", "-b", "--lines", "--bytes"];

    fn execute(self, stdin: &mut dyn Read, _stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        if self.lines.is_some() && self.bytes.is_some() {
            bail!("cannot split in more than one way");
        }
        if let Some(extra) = self.operands.get(2) {
            bail!("extra operand '{extra}'");
        }
        let source = self.operands.first().map_or("-", String::as_str);
        let data = read_operand(env, source, stdin)?;

        let pieces: Vec<&[u8]> = match &self.bytes {
            Some(size) => data.chunks(parse_size(size)?).collect(),
            None => {
                let per_piece = self.lines.unwrap_or(DEFAULT_SPLIT_LINES);
                if per_piece == 0 {
                    bail!("invalid number of lines: 0");
                }
                let mut pieces = Vec::new();
                let mut start = 0;
                let mut count = 0;
                for (idx, byte) in data.iter().enumerate() {
                    if *byte == b'\n' {
                        count += 1;
                        if count == per_piece {
                            pieces.push(&data[start..=idx]);
                            start = idx + 1;
                            count = 0;
                        }
                    }
                }
                if start < data.len() {
                    pieces.push(&data[start..]);
                }
                pieces
            }
        };

        let prefix = self.operands.get(1).map_or("x", String::as_str);
        for (index, piece) in pieces.into_iter().enumerate() {
            let suffix = piece_suffix(index).context("output file suffixes exhausted")?;
            let name = format!("{prefix}{suffix}");
            fs::write(env.resolve(&name), piece).with_context(|| format!("{name}: cannot write"))?;
        }
        Ok(())
    }
}
