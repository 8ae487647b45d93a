use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::{null_default, read_yaml};
use crate::error::ConfigError;

pub const SOURCE_PREFIX: &str = "source ";
pub const EXPORT_PREFIX: &str = "export ";

/// Launch metadata for a single simulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdaTool {
    #[serde(default, deserialize_with = "null_default")]
    pub executable: String,
    #[serde(default, deserialize_with = "null_default")]
    pub launch_args: Vec<String>,
    /// Raw shell lines, either `source ...` or `export NAME=value`.
    #[serde(default, deserialize_with = "null_default")]
    pub environment_variables: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub options: IndexMap<String, Value>,
}

impl EdaTool {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Default::default()
        }
    }

    pub fn launch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launch_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn environment_variables<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_variables = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Lines that literally begin with `source `, in declaration order.
    pub fn source_commands(&self) -> Vec<String> {
        self.environment_variables
            .iter()
            .map(|line| line.trim())
            .filter(|line| is_source(line))
            .map(str::to_string)
            .collect()
    }

    /// Every non-`source` line, prefixed with `export ` if it is not already.
    pub fn export_commands(&self) -> Vec<String> {
        self.environment_variables
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !is_source(line))
            .map(|line| {
                if line.starts_with(EXPORT_PREFIX) {
                    line.to_string()
                } else {
                    format!("{EXPORT_PREFIX}{line}")
                }
            })
            .collect()
    }

    /// Overlays this tool's exported variables on top of `base`.
    ///
    /// `$NAME` and `${NAME}` references are expanded against the map as it is
    /// being built, so later lines see earlier exports. Lines without an `=`
    /// leave the map untouched.
    pub fn environment(&self, base: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = base.clone();
        for line in self.export_commands() {
            let assignment = line[EXPORT_PREFIX.len()..].trim();
            let Some((name, value)) = assignment.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = expand_vars(strip_quotes(value.trim()), &env);
            env.insert(name.to_string(), value);
        }
        env
    }
}

fn is_source(line: &str) -> bool {
    line.starts_with(SOURCE_PREFIX)
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn expand_vars(value: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }
        if braced {
            if chars.peek() == Some(&'}') {
                chars.next();
            } else {
                // Unterminated `${`; keep it verbatim.
                out.push_str("${");
                out.push_str(&name);
                continue;
            }
        }
        if name.is_empty() {
            out.push('$');
            if braced {
                out.push_str("{}");
            }
            continue;
        }
        if let Some(v) = env.get(&name) {
            out.push_str(v);
        }
    }
    out
}

/// Tool table keyed by simulator identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdaTools(IndexMap<String, EdaTool>);

impl EdaTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, simulator: &str) -> Result<&EdaTool, ConfigError> {
        self.0.get(simulator).ok_or_else(|| ConfigError::UnknownTool {
            simulator: simulator.to_string(),
        })
    }

    pub fn insert(&mut self, simulator: impl Into<String>, tool: EdaTool) -> Option<EdaTool> {
        self.0.insert(simulator.into(), tool)
    }

    /// Adds every entry of `other` whose simulator is not already configured.
    pub fn merge_missing(&mut self, other: &EdaTools) {
        for (name, tool) in other.0.iter() {
            self.0.entry(name.clone()).or_insert_with(|| tool.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, EdaTool)> for EdaTools {
    fn from_iter<T: IntoIterator<Item = (S, EdaTool)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ServerConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Site-wide settings: backend server and the tool table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default, deserialize_with = "null_default")]
    pub server: ServerConfig,
    #[serde(default, deserialize_with = "null_default")]
    pub eda_tools: EdaTools,
}

pub fn load_system_config(path: impl AsRef<Path>) -> Result<SystemConfig, ConfigError> {
    read_yaml(path.as_ref())
}
