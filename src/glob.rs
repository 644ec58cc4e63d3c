//! Wildcard expansion against the working directory.

use crate::env::Environment;
use crate::lexer::Field;
use std::fs;

/// One element of a compiled wildcard pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobChar {
    /// Unquoted `*`: any run of characters, possibly empty.
    Any,
    Literal(char),
}

fn compile(field: &Field) -> Vec<GlobChar> {
    let mut pattern = Vec::new();
    for piece in &field.pieces {
        for ch in piece.text.chars() {
            if ch == '*' && !piece.quoted {
                pattern.push(GlobChar::Any);
            } else {
                pattern.push(GlobChar::Literal(ch));
            }
        }
    }
    pattern
}

/// Whole-string match with single-star backtracking.
fn matches(pattern: &[GlobChar], name: &str) -> bool {
    let txt: Vec<char> = name.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < txt.len() {
        match pattern.get(pi) {
            Some(GlobChar::Any) => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(GlobChar::Literal(c)) if *c == txt[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    star = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|c| *c == GlobChar::Any)
}

/// Expand one field into the sorted list of matching paths.
///
/// Only the last path component may hold wildcards; a pattern such as
/// `dir/*.txt` lists `dir` relative to the working directory and keeps the
/// `dir/` prefix on every match. Returns `None` when nothing matches.
fn expand_field(field: &Field, env: &Environment) -> Option<Vec<String>> {
    let pattern = compile(field);
    let split = pattern
        .iter()
        .rposition(|c| *c == GlobChar::Literal('/'))
        .map_or(0, |idx| idx + 1);
    let (dir_part, name_part) = pattern.split_at(split);
    if dir_part.contains(&GlobChar::Any) {
        return None;
    }

    let prefix: String = dir_part
        .iter()
        .map(|c| match c {
            GlobChar::Literal(ch) => *ch,
            GlobChar::Any => '*',
        })
        .collect();
    let dir = if prefix.is_empty() {
        env.current_dir()
    } else {
        env.resolve(&prefix)
    };
    let show_hidden = name_part.first() == Some(&GlobChar::Literal('.'));

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("glob: can't list {}: {}", dir.display(), err);
            return None;
        }
    };

    let mut found: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| show_hidden || !name.starts_with('.'))
        .filter(|name| matches(name_part, name))
        .map(|name| format!("{prefix}{name}"))
        .collect();

    if found.is_empty() {
        return None;
    }
    found.sort();
    Some(found)
}

/// Turn resolved fields into argv entries, expanding unquoted wildcards.
///
/// Matches replace the pattern in place; a pattern matching nothing is kept
/// as its literal text.
pub fn expand_fields(fields: &[Field], env: &Environment) -> Vec<String> {
    let mut args = Vec::with_capacity(fields.len());
    for field in fields {
        match field.is_glob().then(|| expand_field(field, env)).flatten() {
            Some(found) => {
                log::trace!("glob {:?} -> {} match(es)", field.text(), found.len());
                args.extend(found);
            }
            None => args.push(field.text()),
        }
    }
    args
}
