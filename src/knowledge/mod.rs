//! Business vocabulary used to ground query generation.
//!
//! Loaded once at start-up (built in, or from a TOML file) and shared read-only.

mod builtin;

use crate::config::KnowledgeConfig;
use config::{Config, ConfigError, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::info;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'’]*").unwrap());

/// A named margin metric and the formula that defines it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MarginTerm {
    pub term: String,
    pub formula: String,
    pub use_when: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FewShotExample {
    pub question: String,
    pub reasoning: String,
    pub sql: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KnowledgeBase {
    /// Reported to callers as `kpiVersion`.
    pub version: String,
    pub business_rules: Vec<String>,
    pub field_conventions: Vec<String>,
    pub entity_rules: Vec<String>,
    pub margin_terms: Vec<MarginTerm>,
    /// Lower-case nickname to lower-case base name.
    pub nicknames: BTreeMap<String, String>,
    pub examples: Vec<FewShotExample>,
    /// Financial metric column names tracked in the query log.
    pub kpi_fields: Vec<String>,
}

/// A person name in the question that should be matched by its base form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameHint {
    pub spoken: String,
    pub base: String,
}

impl NameHint {
    /// The case-insensitive substring predicate the query should use.
    pub fn pattern(&self) -> String {
        format!("ILIKE '%{}%'", self.base)
    }
}

impl KnowledgeBase {
    pub fn builtin() -> Self {
        builtin::construction()
    }

    pub fn load(config: &KnowledgeConfig) -> Result<Self, ConfigError> {
        match &config.path {
            Some(path) => {
                info!("Loading knowledge base from {}", path.display());
                Config::builder()
                    .add_source(File::from(path.as_path()).format(FileFormat::Toml))
                    .build()?
                    .try_deserialize()
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn base_name(&self, word: &str) -> Option<&str> {
        self.nicknames
            .get(&word.to_lowercase())
            .map(String::as_str)
    }

    /// Nicknames found in the question, in order of appearance, without repeats.
    pub fn name_hints(&self, question: &str) -> Vec<NameHint> {
        let mut hints: Vec<NameHint> = Vec::new();
        for word in WORD.find_iter(question) {
            let spoken = word
                .as_str()
                .trim_end_matches("'s")
                .trim_end_matches("’s");
            if let Some(base) = self.base_name(spoken) {
                if !hints.iter().any(|h| h.base == base) {
                    hints.push(NameHint {
                        spoken: spoken.to_string(),
                        base: base.to_string(),
                    });
                }
            }
        }
        hints
    }
}
