use super::{BuiltinCommand, read_operand};
use crate::env::Environment;
use anyhow::Result;
use argh::FromArgs;
use std::io::{Read, Write};
use std::{iter, mem};

#[derive(FromArgs)]
/// compare two files line by line.
pub struct Diff {
    #[argh(switch, short = 's')]
    /// report when the two files are identical.
    pub report_identical: bool,

    #[argh(switch, short = 'B')]
    /// ignore blank lines.
    pub ignore_blank_lines: bool,

    #[argh(switch, short = 'q')]
    /// report only whether the files differ.
    pub brief: bool,

    #[argh(positional)]
    /// first file, or `-` for standard input.
    pub first: String,

    #[argh(positional)]
    /// second file, or `-` for standard input.
    pub second: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit<'a> {
    Keep,
    Remove(&'a str),
    Add(&'a str),
}

/// Common subsequence lengths of `a` against every prefix of `b`.
///
/// Only two rows are alive at a time, so memory is linear in `b`.
fn lcs_lengths(a: &[&str], b: &[&str]) -> Vec<usize> {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            row[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(row[j])
            };
        }
        mem::swap(&mut prev, &mut row);
    }
    prev
}

/// Hirschberg alignment: split `a` in half, find where `b` splits along a
/// longest common subsequence, and recurse on both sides.
fn align<'a>(a: &[&'a str], b: &[&'a str], edits: &mut Vec<Edit<'a>>) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    edits.extend(iter::repeat_n(Edit::Keep, prefix));
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() {
        edits.extend(b.iter().copied().map(Edit::Add));
    } else if b.is_empty() {
        edits.extend(a.iter().copied().map(Edit::Remove));
    } else if a.len() == 1 {
        match b.iter().position(|line| *line == a[0]) {
            Some(j) => {
                edits.extend(b[..j].iter().copied().map(Edit::Add));
                edits.push(Edit::Keep);
                edits.extend(b[j + 1..].iter().copied().map(Edit::Add));
            }
            None => {
                edits.push(Edit::Remove(a[0]));
                edits.extend(b.iter().copied().map(Edit::Add));
            }
        }
    } else {
        let mid = a.len() / 2;
        let front = lcs_lengths(&a[..mid], b);
        let back_a: Vec<&str> = a[mid..].iter().rev().copied().collect();
        let back_b: Vec<&str> = b.iter().rev().copied().collect();
        let back = lcs_lengths(&back_a, &back_b);
        let m = b.len();
        let split = (0..=m)
            .rev()
            .max_by_key(|&k| front[k] + back[m - k])
            .unwrap_or(0);
        align(&a[..mid], &b[..split], edits);
        align(&a[mid..], &b[split..], edits);
    }

    edits.extend(iter::repeat_n(Edit::Keep, suffix));
}

/// Edit script turning `a` into `b` along a longest common subsequence.
fn line_diff<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Edit<'a>> {
    let mut edits = Vec::with_capacity(a.len().max(b.len()));
    align(a, b, &mut edits);
    edits
}

impl BuiltinCommand for Diff {
    fn name() -> &'static str {
        "diff"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        let first = read_operand(env, &self.first, stdin)?;
        let second = read_operand(env, &self.second, stdin)?;
        let first = String::from_utf8_lossy(&first);
        let second = String::from_utf8_lossy(&second);

        let keep = |line: &&str| !self.ignore_blank_lines || !line.trim().is_empty();
        let a: Vec<&str> = first.lines().filter(keep).collect();
        let b: Vec<&str> = second.lines().filter(keep).collect();

        let edits = line_diff(&a, &b);
        if edits.iter().all(|edit| *edit == Edit::Keep) {
            if self.report_identical {
                writeln!(stdout, "Files {} and {} are identical", self.first, self.second)?;
            }
            return Ok(());
        }
        if self.brief {
            writeln!(stdout, "Files {} and {} differ", self.first, self.second)?;
            return Ok(());
        }

        // within one run of changes, removals are listed before additions
        for hunk in edits.split(|edit| *edit == Edit::Keep) {
            for edit in hunk {
                if let Edit::Remove(line) = edit {
                    writeln!(stdout, "< {line}")?;
                }
            }
            for edit in hunk {
                if let Edit::Add(line) = edit {
                    writeln!(stdout, "> {line}")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// compare two files byte by byte.
pub struct Cmp {
    #[argh(switch, short = 'c')]
    /// print the differing bytes as characters.
    pub print_chars: bool,

    #[argh(switch, short = 's')]
    /// print only whether the files differ.
    pub simplify: bool,

    #[argh(switch, short = 'l')]
    /// list the byte number and values of every difference.
    pub list: bool,

    #[argh(positional)]
    /// first file, or `-` for standard input.
    pub first: String,

    #[argh(positional)]
    /// second file, or `-` for standard input.
    pub second: String,
}

/// Printable form of a byte: caret notation for controls, `M-` for the high half.
fn show_byte(byte: u8) -> String {
    match byte {
        0..=31 => format!("^{}", (byte + 64) as char),
        127 => "^?".to_string(),
        128..=255 => format!("M-{}", show_byte(byte - 128)),
        _ => (byte as char).to_string(),
    }
}

impl BuiltinCommand for Cmp {
    fn name() -> &'static str {
        "cmp"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        let a = read_operand(env, &self.first, stdin)?;
        let b = read_operand(env, &self.second, stdin)?;

        if self.simplify {
            if a != b {
                writeln!(stdout, "Files differ")?;
            }
            return Ok(());
        }

        let diffs = a.iter().zip(&b).enumerate().filter(|(_, (x, y))| x != y);
        if self.list {
            for (idx, (x, y)) in diffs {
                if self.print_chars {
                    writeln!(
                        stdout,
                        "{} {:3o} {:<4} {:3o} {}",
                        idx + 1,
                        x,
                        show_byte(*x),
                        y,
                        show_byte(*y)
                    )?;
                } else {
                    writeln!(stdout, "{} {:3o} {:3o}", idx + 1, x, y)?;
                }
            }
        } else if let Some((idx, (x, y))) = diffs.into_iter().next() {
            let line = a[..idx].iter().filter(|b| **b == b'\n').count() + 1;
            write!(
                stdout,
                "{} {} differ: char {}, line {}",
                self.first,
                self.second,
                idx + 1,
                line
            )?;
            if self.print_chars {
                write!(
                    stdout,
                    " is {:3o} {} {:3o} {}",
                    x,
                    show_byte(*x),
                    y,
                    show_byte(*y)
                )?;
            }
            writeln!(stdout)?;
            return Ok(());
        }

        if a.len() != b.len() {
            let (shorter, len) = if a.len() < b.len() {
                (&self.first, a.len())
            } else {
                (&self.second, b.len())
            };
            writeln!(stdout, "cmp: EOF on {shorter} after byte {len}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, Environment) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let env = Environment::with_dir(dir.path());
        (dir, env)
    }

    fn run<T: BuiltinCommand>(cmd: T, input: &str, env: &Environment) -> Result<String> {
        let mut out = Vec::new();
        cmd.execute(&mut Cursor::new(input.as_bytes().to_vec()), &mut out, env)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn diff(first: &str, second: &str) -> Diff {
        Diff {
            report_identical: false,
            ignore_blank_lines: false,
            brief: false,
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    fn cmp(first: &str, second: &str) -> Cmp {
        Cmp {
            print_chars: false,
            simplify: false,
            list: false,
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    const DIFF_FILES: [(&str, &str); 2] = [
        ("file1.txt", "line1\nline2\nline3\nline4\nline5\n"),
        ("file2.txt", "line1\nline3\nline4\nline5\nline6\n"),
    ];

    #[test]
    fn test_diff_lists_removed_then_added() {
        let (_dir, env) = setup(&DIFF_FILES);
        assert_eq!(
            run(diff("file1.txt", "file2.txt"), "", &env).unwrap(),
            "< line2\n> line6\n"
        );
    }

    #[test]
    fn test_diff_replacement_hunk_order() {
        let (_dir, env) = setup(&[("a", "x\nold1\nold2\ny\n"), ("b", "x\nnew\ny\n")]);
        assert_eq!(
            run(diff("a", "b"), "", &env).unwrap(),
            "< old1\n< old2\n> new\n"
        );
    }

    #[test]
    fn test_line_diff_rebuilds_target_with_longest_common_part() {
        let a = ["a", "b", "c", "a", "b", "b", "a"];
        let b = ["c", "b", "a", "b", "a", "c"];
        let edits = line_diff(&a, &b);

        let mut rebuilt = Vec::new();
        let mut source = a.iter();
        for edit in &edits {
            match edit {
                Edit::Keep => rebuilt.push(*source.next().unwrap()),
                Edit::Remove(line) => assert_eq!(source.next(), Some(line)),
                Edit::Add(line) => rebuilt.push(*line),
            }
        }
        assert!(source.next().is_none());
        assert_eq!(rebuilt, b);
        assert_eq!(edits.iter().filter(|e| **e == Edit::Keep).count(), 4);
    }

    #[test]
    fn test_diff_of_long_files_stays_small() {
        let first: String = (0..60_000).map(|i| format!("row {i}\n")).collect();
        let second = first.replace("row 30000\n", "changed\n");
        let (_dir, env) = setup(&[("big1", first.as_str()), ("big2", second.as_str())]);
        assert_eq!(
            run(diff("big1", "big2"), "", &env).unwrap(),
            "< row 30000\n> changed\n"
        );
    }

    #[test]
    fn test_diff_flags() {
        let (_dir, env) = setup(&[("a", "x\n\ny\n"), ("b", "x\ny\n"), ("c", "z\n")]);
        let mut d = diff("a", "b");
        d.ignore_blank_lines = true;
        d.report_identical = true;
        assert_eq!(run(d, "", &env).unwrap(), "Files a and b are identical\n");

        let mut d = diff("a", "c");
        d.brief = true;
        assert_eq!(run(d, "", &env).unwrap(), "Files a and c differ\n");

        assert_eq!(run(diff("-", "b"), "x\ny\n", &env).unwrap(), "");
    }

    #[test]
    fn test_diff_missing_file() {
        let (_dir, env) = setup(&[("a", "x\n")]);
        let err = run(diff("a", "ghost"), "", &env).unwrap_err();
        assert_eq!(err.to_string(), "ghost: No such file or directory");
    }

    #[test]
    fn test_cmp_first_difference() {
        let (_dir, env) = setup(&[("f1", "abc\nxyz\n"), ("f2", "abc\nxYz\n")]);
        assert_eq!(
            run(cmp("f1", "f2"), "", &env).unwrap(),
            "f1 f2 differ: char 6, line 2\n"
        );

        let mut c = cmp("f1", "f2");
        c.print_chars = true;
        assert_eq!(
            run(c, "", &env).unwrap(),
            "f1 f2 differ: char 6, line 2 is 171 y 131 Y\n"
        );
    }

    #[test]
    fn test_cmp_simplify_wins() {
        let (_dir, env) = setup(&[("f1", "abc"), ("f2", "abd")]);
        let c = Cmp {
            print_chars: true,
            simplify: true,
            list: true,
            first: "f1".to_string(),
            second: "f2".to_string(),
        };
        assert_eq!(run(c, "", &env).unwrap(), "Files differ\n");
    }

    #[test]
    fn test_cmp_list_and_eof() {
        let (_dir, env) = setup(&[("f1", "abcd"), ("f2", "aXcYZ")]);
        let mut c = cmp("f1", "f2");
        c.list = true;
        assert_eq!(
            run(c, "", &env).unwrap(),
            "2 142 130\n4 144 131\ncmp: EOF on f1 after byte 4\n"
        );

        let (_dir, env) = setup(&[("short", "ab"), ("long", "abc")]);
        assert_eq!(
            run(cmp("long", "short"), "", &env).unwrap(),
            "cmp: EOF on short after byte 2\n"
        );
        assert_eq!(run(cmp("short", "short"), "", &env).unwrap(), "");
    }

    #[test]
    fn test_show_byte() {
        assert_eq!(show_byte(b'a'), "a");
        assert_eq!(show_byte(b'\n'), "^J");
        assert_eq!(show_byte(127), "^?");
        assert_eq!(show_byte(0xC1), "M-A");
    }
}
