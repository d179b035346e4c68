use super::environment::Environment;
use itertools::Itertools;
use std::{
    borrow::Cow,
    fmt,
    path::{Path, PathBuf},
};

/// Shell script executed by the scheduler for a single job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub environment: Environment,
    /// skip the whole script if this file already exists and isn't empty
    pub guard: Option<PathBuf>,
    /// commands as argument vectors, run in order, aborting on the first failure
    pub commands: Vec<Vec<String>>,
}

impl Script {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            guard: None,
            commands: Vec::new(),
        }
    }

    pub fn guarded_by(mut self, artifact: &Path) -> Self {
        self.guard = Some(artifact.to_path_buf());
        self
    }

    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(args.into_iter().map(Into::into).collect());
        self
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#!/bin/sh")?;
        writeln!(f, "set -e")?;

        for (key, value) in self.environment.iter() {
            writeln!(f, "export {key}={}", quote_always(value))?;
        }

        if let Some(ref guard) = self.guard {
            let guard = path_arg(guard);
            writeln!(f, "if [ -s {} ]; then", quote(&guard))?;
            writeln!(f, "    echo {}", quote(&format!("{guard} already exists, skipping")))?;
            writeln!(f, "    exit 0")?;
            writeln!(f, "fi")?;
        }

        for command in self.commands.iter() {
            writeln!(f, "{}", command.iter().map(|arg| quote(arg)).join(" "))?;
        }

        Ok(())
    }
}

/// lossy string form of a path for use as a command argument
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// quote a shell word, plain words are left as they are to keep scripts readable
pub fn quote(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./+=:,@%".contains(c));

    if plain {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(quote_always(word))
    }
}

/// single quote a word, embedded single quotes are closed, escaped and reopened
pub fn quote_always(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
