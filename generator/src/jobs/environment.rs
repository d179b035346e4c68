use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, env};
use tracing::{debug, warn};

/// Which variables are exported at the top of every generated script
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    // names of variables copied from the invoking environment, if set there
    #[serde(default)]
    pub inherit: Vec<String>,
    // literal variables, these take precedence over inherited ones
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    // copy the whole invoking environment, mirrors `getenv` for the generated scripts
    #[serde(default)]
    pub inherit_all: bool,
}

/// Resolved, sorted set of variables to export
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment(BTreeMap<String, String>);

impl EnvironmentConfig {
    /// resolve against the environment of the current process
    pub fn capture(&self) -> Environment {
        self.resolve(env::vars_os().filter_map(|(key, value)| {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    debug!(key = ?key, "Skipping non-unicode environment variable");
                    None
                }
            }
        }))
    }

    /// Resolve against an explicit ambient environment
    ///
    /// Variables with a newline in their value or a name that isn't a valid shell
    /// identifier are dropped, they can't be exported on a single line.
    pub fn resolve<I>(&self, ambient: I) -> Environment
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut variables = BTreeMap::new();

        for (key, value) in ambient {
            if self.inherit_all || self.inherit.contains(&key) {
                variables.insert(key, value);
            }
        }

        for name in self.inherit.iter() {
            if !variables.contains_key(name) {
                debug!("Variable {name} is not set in the invoking environment");
            }
        }

        variables.extend(self.set.clone());
        variables.retain(|key, value| {
            if value.contains('\n') {
                debug!("Not exporting {key}, its value contains a newline");
                false
            } else if !is_identifier(key) {
                warn!("Not exporting {key}, it is not a valid shell identifier");
                false
            } else {
                true
            }
        });

        Environment(variables)
    }
}

impl Environment {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        Self(variables)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambient() -> Vec<(String, String)> {
        [
            ("PATH", "/usr/bin:/bin"),
            ("HOME", "/home/user"),
            ("MULTI", "first\nsecond"),
            ("SECRET", "hunter2"),
            ("BASH_FUNC_x%%", "() { :; }"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
    }

    #[test]
    fn only_allowlisted_variables_are_inherited() {
        let config = EnvironmentConfig {
            inherit: vec!["PATH".into(), "MULTI".into(), "MISSING".into()],
            ..Default::default()
        };
        let environment = config.resolve(ambient());

        assert_eq!(environment.len(), 1);
        assert_eq!(environment.get("PATH"), Some("/usr/bin:/bin"));
    }

    #[test]
    fn literal_variables_override_inherited_ones() {
        let config = EnvironmentConfig {
            inherit: vec!["HOME".into()],
            set: BTreeMap::from([("HOME".into(), "/scratch".into())]),
            inherit_all: false,
        };

        assert_eq!(config.resolve(ambient()).get("HOME"), Some("/scratch"));
    }

    #[test]
    fn inherit_all_drops_unexportable_variables() {
        let config = EnvironmentConfig {
            inherit_all: true,
            ..Default::default()
        };
        let environment = config.resolve(ambient());

        assert_eq!(
            environment.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>(),
            vec!["HOME", "PATH", "SECRET"]
        );
    }
}
