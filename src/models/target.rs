// src/models/target.rs

//! Watched targets and the `targets.yml` loader.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use url::Url;

use crate::error::{AppError, Result};

/// A named resource under observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Unique name, used as the history key
    pub name: String,

    /// URL fetched on every run
    pub url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Load targets from a YAML file in file order.
    ///
    /// ```yaml
    /// targets:
    ///   blog: https://example.com/blog
    ///   api: https://api.example.com/status
    /// ```
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path)?;
        Self::parse_all(&content)
    }

    /// Parse the `targets:` mapping of a YAML document.
    pub fn parse_all(yaml: &str) -> Result<Vec<Self>> {
        #[derive(Deserialize)]
        struct TargetsFile {
            targets: Option<Mapping>,
        }

        let file: TargetsFile = serde_yaml::from_str(yaml)?;
        let mapping = file
            .targets
            .ok_or_else(|| AppError::config("targets file has no `targets` mapping"))?;

        let targets = mapping
            .into_iter()
            .map(|(name, url)| {
                let name = scalar_to_string(name)
                    .ok_or_else(|| AppError::config("target names must be strings"))?;
                let url = scalar_to_string(url).ok_or_else(|| {
                    AppError::config(format!("target '{name}' must map to a URL string"))
                })?;
                Ok(Target { name, url })
            })
            .collect::<Result<Vec<_>>>()?;

        validate(&targets)?;
        Ok(targets)
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Check the invariants the pipeline relies on: at least one target,
/// unique non-empty names, and absolute http(s) URLs.
pub fn validate(targets: &[Target]) -> Result<()> {
    if targets.is_empty() {
        return Err(AppError::validation("No targets defined"));
    }

    let mut seen = HashSet::new();
    for target in targets {
        if target.name.trim().is_empty() {
            return Err(AppError::validation("target name is empty"));
        }
        if !seen.insert(target.name.as_str()) {
            return Err(AppError::validation(format!(
                "duplicate target name '{}'",
                target.name
            )));
        }

        let url = Url::parse(&target.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "target '{}' uses unsupported scheme '{}'",
                target.name,
                url.scheme()
            )));
        }
    }
    Ok(())
}
