use super::BuiltinCommand;
use crate::env::Environment;
use crate::error::describe_io;
use anyhow::{Context, Result, bail};
use argh::FromArgs;
use std::borrow::Cow;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

#[derive(FromArgs)]
/// change the shell working directory.
pub struct Cd {
    #[argh(positional)]
    /// the directory to enter; $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdin: &mut dyn Read, _stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        let target = match self.target {
            Some(t) => t,
            None => env.get_var("HOME").context("HOME not set")?,
        };
        let path = env.resolve(&target);
        if !path.exists() {
            bail!("{}: No such file or directory", target);
        }
        if !path.is_dir() {
            bail!("{}: Not a directory", target);
        }
        let canonical = fs::canonicalize(&path)
            .map_err(|err| anyhow::anyhow!("{}: {}", target, describe_io(&err)))?;
        env.set_current_dir(canonical);
        Ok(())
    }
}

#[derive(FromArgs)]
/// list directory contents.
pub struct Ls {
    #[argh(switch, short = 'd')]
    /// list only directories.
    pub dirs_only: bool,

    #[argh(switch, short = 'R')]
    /// list subdirectories recursively.
    pub recursive: bool,

    #[argh(positional, greedy)]
    /// files or directories to list; the working directory when none.
    pub paths: Vec<String>,
}

/// Wrap names a user could not paste back into the shell as-is.
fn display_name(name: &str) -> Cow<'_, str> {
    const SPECIAL: &str = " \t\n'\"`$*?|;<>&()[]{}!#~\\";
    if !name.chars().any(|c| SPECIAL.contains(c)) {
        return Cow::Borrowed(name);
    }
    if name.contains('\'') {
        Cow::Owned(format!("\"{name}\""))
    } else {
        Cow::Owned(format!("'{name}'"))
    }
}

impl Ls {
    /// Visible entries of `dir`, sorted by name.
    fn entries(&self, dir: &Path) -> Result<Vec<(String, bool)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.path().is_dir();
            if self.dirs_only && !is_dir {
                continue;
            }
            entries.push((name, is_dir));
        }
        entries.sort();
        Ok(entries)
    }

    fn write_listing(&self, names: &[String], stdout: &mut dyn Write) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let shown: Vec<Cow<'_, str>> = names.iter().map(|name| display_name(name)).collect();
        writeln!(stdout, "{}", shown.join("  "))?;
        Ok(())
    }

    fn list_dir(
        &self,
        label: &str,
        dir: &Path,
        with_header: bool,
        first: &mut bool,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        let entries = self
            .entries(dir)
            .with_context(|| format!("cannot open directory '{label}'"))?;
        if with_header {
            if !*first {
                writeln!(stdout)?;
            }
            writeln!(stdout, "{label}:")?;
        }
        *first = false;

        let names: Vec<String> = entries.iter().map(|(name, _)| name.clone()).collect();
        self.write_listing(&names, stdout)?;

        if self.recursive {
            for (name, is_dir) in &entries {
                if *is_dir {
                    let child = format!("{}/{}", label.trim_end_matches('/'), name);
                    self.list_dir(&child, &dir.join(name), true, first, stdout)?;
                }
            }
        }
        Ok(())
    }
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        let targets = if self.paths.is_empty() {
            vec![".".to_string()]
        } else {
            self.paths.clone()
        };
        let with_header = targets.len() > 1 || self.recursive;

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for target in &targets {
            let path = env.resolve(target);
            if path.is_dir() {
                dirs.push((target, path));
            } else if path.exists() {
                if !self.dirs_only {
                    files.push(target.clone());
                }
            } else {
                writeln!(stdout, "ls: cannot access '{target}': No such file or directory")?;
            }
        }

        files.sort();
        self.write_listing(&files, stdout)?;
        let mut first = files.is_empty();
        for (label, path) in dirs {
            self.list_dir(label, &path, with_header, &mut first, stdout)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// create directories.
pub struct Mkdir {
    #[argh(switch, short = 'p')]
    /// create missing parent directories; existing directories are not an error.
    pub parents: bool,

    #[argh(positional, greedy)]
    /// directories to create.
    pub dirs: Vec<String>,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(self, _stdin: &mut dyn Read, _stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        if self.dirs.is_empty() {
            bail!("missing operand");
        }
        for dir in &self.dirs {
            let path = env.resolve(dir);
            let created = if self.parents {
                fs::create_dir_all(&path)
            } else {
                fs::create_dir(&path)
            };
            created.map_err(|err| {
                anyhow::anyhow!("cannot create directory '{}': {}", dir, describe_io(&err))
            })?;
            log::debug!("mkdir {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn run<T: BuiltinCommand>(cmd: T, env: &Environment) -> Result<String> {
        let mut out = Vec::new();
        cmd.execute(&mut Cursor::new(Vec::new()), &mut out, env)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn ls(paths: &[&str]) -> Ls {
        Ls {
            dirs_only: false,
            recursive: false,
            paths: paths.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ls_fixture() -> (TempDir, Environment) {
        let dir = TempDir::new().unwrap();
        for name in ["file name with space.txt", "file1.txt", "file2.txt", ".hidden"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        for name in ["folder name with space", "folder1", "folder2"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("folder1").join("inner.txt"), "x").unwrap();
        let env = Environment::with_dir(dir.path());
        (dir, env)
    }

    #[test]
    fn test_cd_changes_shared_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("folder1")).unwrap();
        let env = Environment::with_dir(dir.path());
        let observer = env.clone();

        run(Cd { target: Some("folder1".to_string()) }, &env).unwrap();
        let expected = fs::canonicalize(dir.path().join("folder1")).unwrap();
        assert_eq!(observer.current_dir(), expected);

        run(Cd { target: Some("..".to_string()) }, &env).unwrap();
        assert_eq!(observer.current_dir(), fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_cd_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();
        let env = Environment::with_dir(dir.path());

        let err = run(Cd { target: Some("nope".to_string()) }, &env).unwrap_err();
        assert_eq!(err.to_string(), "nope: No such file or directory");
        let err = run(Cd { target: Some("plain.txt".to_string()) }, &env).unwrap_err();
        assert_eq!(err.to_string(), "plain.txt: Not a directory");
        assert_eq!(env.current_dir(), dir.path());
    }

    #[test]
    fn test_ls_quotes_names_with_spaces() {
        let (_dir, env) = ls_fixture();
        assert_eq!(
            run(ls(&[]), &env).unwrap(),
            "'file name with space.txt'  file1.txt  file2.txt  'folder name with space'  folder1  folder2\n"
        );
    }

    #[test]
    fn test_ls_dirs_only() {
        let (_dir, env) = ls_fixture();
        let mut cmd = ls(&[]);
        cmd.dirs_only = true;
        assert_eq!(
            run(cmd, &env).unwrap(),
            "'folder name with space'  folder1  folder2\n"
        );
    }

    #[test]
    fn test_ls_several_paths_and_missing() {
        let (_dir, env) = ls_fixture();
        assert_eq!(
            run(ls(&["folder1", "ghost", "file1.txt", "folder2"]), &env).unwrap(),
            "ls: cannot access 'ghost': No such file or directory\nfile1.txt\n\nfolder1:\ninner.txt\n\nfolder2:\n"
        );
    }

    #[test]
    fn test_ls_recursive() {
        let (_dir, env) = ls_fixture();
        let mut cmd = ls(&["folder1"]);
        cmd.recursive = true;
        assert_eq!(run(cmd, &env).unwrap(), "folder1:\ninner.txt\n");
    }

    #[test]
    fn test_mkdir_plain_and_parents() {
        let dir = TempDir::new().unwrap();
        let env = Environment::with_dir(dir.path());

        run(Mkdir { parents: false, dirs: vec!["folder1".to_string()] }, &env).unwrap();
        assert!(dir.path().join("folder1").is_dir());

        let err = run(Mkdir { parents: false, dirs: vec!["folder1".to_string()] }, &env).unwrap_err();
        assert_eq!(err.to_string(), "cannot create directory 'folder1': File exists");

        let err = run(Mkdir { parents: false, dirs: vec!["a/b".to_string()] }, &env).unwrap_err();
        assert_eq!(err.to_string(), "cannot create directory 'a/b': No such file or directory");

        run(Mkdir { parents: true, dirs: vec!["a/b".to_string(), "folder1".to_string()] }, &env).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }

    #[test]
    fn test_mkdir_missing_operand() {
        let env = Environment::new();
        let err = run(Mkdir { parents: false, dirs: Vec::new() }, &env).unwrap_err();
        assert_eq!(err.to_string(), "missing operand");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("plain.txt"), "plain.txt");
        assert_eq!(display_name("a b"), "'a b'");
        assert_eq!(display_name("it's"), "\"it's\"");
    }
}
