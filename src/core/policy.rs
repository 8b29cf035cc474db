//! Placeholder rule tables.
//!
//! Rule tables are defined in YAML, one per content type, and map each
//! placeholder basename to exactly one category. The built-in tables ship in
//! `policies/` and can be overridden by files of the same name in the
//! configured policies directory.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_EMAIL: &str = include_str!("../../policies/email.yaml");
const BUILTIN_EDUCATION: &str = include_str!("../../policies/education.yaml");
const BUILTIN_LANDING: &str = include_str!("../../policies/landing.yaml");

/// Errors raised while loading rule tables
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to parse policy YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read policy file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Policy name cannot be empty")]
    EmptyName,

    #[error("Policy '{policy}' lists basename '{basename}' in more than one category")]
    DuplicateBasename { policy: String, basename: String },

    #[error("No placeholder policy named '{0}'")]
    Unknown(String),
}

/// How basenames are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasenameCase {
    /// Fold to ASCII upper case before every lookup
    #[default]
    Upper,

    /// Compare exactly as written
    Exact,
}

impl BasenameCase {
    pub fn normalize(&self, basename: &str) -> String {
        match self {
            BasenameCase::Upper => basename.trim().to_ascii_uppercase(),
            BasenameCase::Exact => basename.trim().to_string(),
        }
    }
}

/// What happens to a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Left for run-time substitution downstream
    Ignore,

    /// Removed with its nearest enclosing element
    Strip,

    /// Replaced with a context-supplied value
    Replace,

    /// Aborts processing
    Reject,
}

/// Rule table as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    /// Policy name (matches the content type's policy name)
    pub name: String,

    #[serde(default)]
    pub case: BasenameCase,

    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub strip: Vec<String>,

    #[serde(default)]
    pub replace: Vec<String>,

    #[serde(default)]
    pub reject: Vec<String>,
}

/// Validated rule table for one content type
#[derive(Debug, Clone)]
pub struct RuleTable {
    name: String,
    case: BasenameCase,
    rules: HashMap<String, RuleCategory>,
}

impl RuleTable {
    /// Parse and validate a rule table from YAML content
    pub fn from_yaml(content: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_yaml::from_str(content)?;
        Self::from_policy_file(file)
    }

    /// Load a rule table from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Validate that every basename sits in exactly one category
    pub fn from_policy_file(file: PolicyFile) -> Result<Self, PolicyError> {
        if file.name.trim().is_empty() {
            return Err(PolicyError::EmptyName);
        }

        let mut rules = HashMap::new();
        let categories = [
            (RuleCategory::Ignore, &file.ignore),
            (RuleCategory::Strip, &file.strip),
            (RuleCategory::Replace, &file.replace),
            (RuleCategory::Reject, &file.reject),
        ];

        for (category, basenames) in categories {
            for basename in basenames {
                let key = file.case.normalize(basename);
                if rules.insert(key.clone(), category).is_some() {
                    return Err(PolicyError::DuplicateBasename {
                        policy: file.name.clone(),
                        basename: key,
                    });
                }
            }
        }

        Ok(Self {
            name: file.name,
            case: file.case,
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn case(&self) -> BasenameCase {
        self.case
    }

    /// Category of a basename; anything not listed is rejected
    pub fn classify(&self, basename: &str) -> RuleCategory {
        self.rules
            .get(&self.case.normalize(basename))
            .copied()
            .unwrap_or(RuleCategory::Reject)
    }
}

/// All rule tables, keyed by policy name
#[derive(Debug, Clone)]
pub struct PolicySet {
    tables: HashMap<String, RuleTable>,
}

impl PolicySet {
    /// The tables compiled into the binary
    pub fn builtin() -> Result<Self, PolicyError> {
        let mut tables = HashMap::new();
        for content in [BUILTIN_EMAIL, BUILTIN_EDUCATION, BUILTIN_LANDING] {
            let table = RuleTable::from_yaml(content)?;
            tables.insert(table.name.clone(), table);
        }
        Ok(Self { tables })
    }

    /// Built-in tables, overridden by `<name>.yaml` files found in `dir`
    pub fn load(dir: Option<&Path>) -> Result<Self, PolicyError> {
        let mut set = Self::builtin()?;

        let Some(dir) = dir else {
            return Ok(set);
        };

        let names: Vec<String> = set.tables.keys().cloned().collect();
        for name in names {
            let path = dir.join(format!("{}.yaml", name));
            if path.exists() {
                let table = RuleTable::from_file(&path)?;
                tracing::info!(policy = %name, path = %path.display(), "Loaded placeholder policy override");
                set.tables.insert(name, table);
            }
        }

        Ok(set)
    }

    /// Rule table by policy name
    pub fn get(&self, name: &str) -> Result<&RuleTable, PolicyError> {
        self.tables
            .get(name)
            .ok_or_else(|| PolicyError::Unknown(name.to_string()))
    }
}
