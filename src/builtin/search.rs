use super::{BuiltinCommand, open_file, read_operand};
use crate::env::Environment;
use anyhow::{Context, Result, bail};
use argh::FromArgs;
use regex::{Regex, RegexBuilder};
use std::io::{BufRead, BufReader, Read, Write};

#[derive(FromArgs)]
/// print lines that match a regular expression.
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from stdin.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(switch, short = 'c')]
    /// print only the number of matching lines per source
    pub count: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &Regex,
    ) -> Result<()> {
        let reader = BufReader::new(reader);

        let mut lines = Vec::new();
        let mut match_indices = Vec::new();
        for (line_num, line) in reader.split(b'\n').enumerate() {
            let line = String::from_utf8_lossy(&line.context("read error")?).into_owned();
            if re.is_match(&line) {
                match_indices.push(line_num);
            }
            lines.push(line);
        }

        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();

        if self.count {
            writeln!(stdout, "{}{}", prefix, match_indices.len())?;
            return Ok(());
        }

        let total_lines = lines.len();
        let mut to_print = vec![false; total_lines];
        for &match_line in &match_indices {
            let end_print = match_line
                .saturating_add(self.after_context)
                .saturating_add(1)
                .min(total_lines);
            for flag in &mut to_print[match_line..end_print] {
                *flag = true;
            }
        }

        let mut last_printed_index: Option<usize> = None;
        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && last_printed_index.is_some_and(|last| i > last + 1) {
                writeln!(stdout, "--")?;
            }
            writeln!(stdout, "{}{}", prefix, line)?;
            last_printed_index = Some(i);
        }
        Ok(())
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    const VALUE_OPTIONS: &'static [&'static str] = &["-A", "--after-context"];

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("Invalid regex pattern: {}", self.pattern))?;

        if self.files.is_empty() {
            return self.process_source(stdin, stdout, None, &re);
        }

        let labelled = self.files.len() > 1;
        for file_name in &self.files {
            let label = labelled.then_some(file_name.as_str());
            if file_name == "-" {
                self.process_source(stdin, stdout, label, &re)?;
                continue;
            }
            match open_file(env, file_name) {
                Ok(mut f) => self.process_source(&mut f, stdout, label, &re)?,
                Err(e) => writeln!(stdout, "grep: {e}")?,
            }
        }
        Ok(())
    }
}

/// Which matches of a line a substitution rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occurrence {
    /// Only the n-th match, counting from 1.
    Nth(usize),
    All,
}

/// A parsed `s/REGEXP/REPLACEMENT/FLAGS` rule.
#[derive(Debug)]
struct Substitution {
    regex: Regex,
    replacement: String,
    occurrence: Occurrence,
}

impl Substitution {
    fn parse(rule: &str) -> Result<Self> {
        let chars: Vec<char> = rule.chars().collect();
        match chars.first() {
            None => bail!("char 0: no previous regular expression"),
            Some('s') => {}
            Some(other) => bail!("char 1: unknown command: '{other}'"),
        }
        let Some(&sep) = chars.get(1) else {
            bail!("char 1: unterminated `s' command");
        };
        if sep == '\n' || sep == '\\' {
            bail!("char 2: delimiter may not be a newline or backslash");
        }

        let body: String = chars[2..].iter().collect();
        let parts: Vec<&str> = body.split(sep).collect();
        if parts.len() < 3 {
            bail!("char {}: unterminated `s' command", chars.len());
        }
        if parts.len() > 3 {
            bail!("char {}: unknown option to `s'", chars.len());
        }
        let (source, replacement, flags) = (parts[0], parts[1], parts[2]);
        if source.is_empty() {
            bail!("char 0: no previous regular expression");
        }

        let occurrence = match flags {
            "" => Occurrence::Nth(1),
            "g" => Occurrence::All,
            digits if digits.chars().all(|c| c.is_ascii_digit()) => {
                let n: usize = digits
                    .parse()
                    .with_context(|| format!("char {}: invalid number option", chars.len()))?;
                if n == 0 {
                    bail!("char {}: number option to `s' command may not be zero", chars.len());
                }
                Occurrence::Nth(n)
            }
            _ => bail!("char {}: unknown option to `s'", chars.len()),
        };

        let regex = Regex::new(source)
            .with_context(|| format!("char {}: invalid regular expression", chars.len()))?;
        Ok(Self {
            regex,
            replacement: replacement.to_string(),
            occurrence,
        })
    }

    fn apply(&self, line: &str) -> String {
        match self.occurrence {
            Occurrence::All => self.regex.replace_all(line, self.replacement.as_str()).into_owned(),
            Occurrence::Nth(n) => match self.regex.captures_iter(line).nth(n - 1) {
                Some(caps) => {
                    let whole = caps.get(0).map_or(0..0, |m| m.range());
                    let mut out = String::with_capacity(line.len());
                    out.push_str(&line[..whole.start]);
                    caps.expand(&self.replacement, &mut out);
                    out.push_str(&line[whole.end..]);
                    out
                }
                None => line.to_string(),
            },
        }
    }
}

#[derive(FromArgs)]
/// replace matches of a regular expression line by line.
pub struct Sed {
    #[argh(positional, greedy)]
    /// the rule s/REGEXP/REPLACEMENT/[N|g] followed by files; stdin when there are none.
    pub args: Vec<String>,
}

impl Sed {
    fn rewrite(&self, rule: &Substitution, data: &[u8], stdout: &mut dyn Write) -> Result<()> {
        for line in String::from_utf8_lossy(data).lines() {
            writeln!(stdout, "{}", rule.apply(line))?;
        }
        Ok(())
    }
}

impl BuiltinCommand for Sed {
    fn name() -> &'static str {
        "sed"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write, env: &Environment) -> Result<()> {
        let Some((rule, files)) = self.args.split_first() else {
            bail!("REPLACEMENT is not specified");
        };
        let rule = Substitution::parse(rule)?;
        log::trace!("sed rule {:?} {:?}", rule.regex.as_str(), rule.occurrence);

        if files.is_empty() {
            let data = read_operand(env, "-", stdin)?;
            return self.rewrite(&rule, &data, stdout);
        }
        for file in files {
            if file == "-" {
                let data = read_operand(env, "-", stdin)?;
                self.rewrite(&rule, &data, stdout)?;
                continue;
            }
            let path = env.resolve(file);
            if path.is_dir() {
                writeln!(stdout, "sed: read error on {file}: Is a directory")?;
                continue;
            }
            match open_file(env, file) {
                Ok(mut f) => {
                    let mut data = Vec::new();
                    f.read_to_end(&mut data)?;
                    self.rewrite(&rule, &data, stdout)?;
                }
                Err(_) => writeln!(stdout, "sed: can't read {file}: No such file or directory")?,
            }
        }
        Ok(())
    }
}
