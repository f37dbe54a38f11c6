//! Language table mapping editor language names onto Judge0 language ids

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;

/// Configuration for a supported programming language
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageConfig {
    /// Canonical name as the editor sends it (e.g. "python")
    pub name: String,
    /// Judge0 language id
    pub language_id: u32,
    pub display_name: String,
    /// CPU time limit in seconds passed to Judge0 (None keeps the instance default)
    pub cpu_time_limit: Option<f32>,
    /// Memory limit in KB passed to Judge0 (None keeps the instance default)
    pub memory_limit_kb: Option<u32>,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    language_id: u32,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    cpu_time_limit: Option<f32>,
    #[serde(default)]
    memory_limit: Option<u32>,
    #[serde(default)]
    aliases: Vec<String>,
}

struct LanguageTable {
    by_name: HashMap<String, LanguageConfig>,
    canonical: Vec<String>,
}

static LANGUAGES: OnceLock<LanguageTable> = OnceLock::new();

const BUILTIN_LANGUAGES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// Initialize language configurations from the built-in TOML table
///
/// Calling this more than once is a no-op.
pub fn init_languages() -> anyhow::Result<usize> {
    if let Some(table) = LANGUAGES.get() {
        return Ok(table.canonical.len());
    }

    let table = parse_languages(BUILTIN_LANGUAGES).context("Invalid built-in language table")?;
    let count = table.canonical.len();
    // A concurrent initializer may have won; both parsed the same table.
    let _ = LANGUAGES.set(table);
    Ok(count)
}

fn parse_languages(content: &str) -> anyhow::Result<LanguageTable> {
    let raw_configs: BTreeMap<String, RawLanguageConfig> = toml::from_str(content)?;

    let mut by_name = HashMap::new();
    let mut canonical = Vec::with_capacity(raw_configs.len());

    for (name, raw) in raw_configs {
        let name = name.to_lowercase();
        if raw.cpu_time_limit.is_some_and(|t| t <= 0.0) {
            anyhow::bail!("Invalid cpu_time_limit for {}", name);
        }

        let config = LanguageConfig {
            name: name.clone(),
            language_id: raw.language_id,
            display_name: raw.display_name.unwrap_or_else(|| name.clone()),
            cpu_time_limit: raw.cpu_time_limit,
            memory_limit_kb: raw.memory_limit,
        };

        for alias in raw.aliases {
            let alias = alias.to_lowercase();
            if by_name.insert(alias.clone(), config.clone()).is_some() {
                anyhow::bail!("Duplicate language alias: {}", alias);
            }
        }
        if by_name.insert(name.clone(), config).is_some() {
            anyhow::bail!("Duplicate language name: {}", name);
        }
        canonical.push(name);
    }

    Ok(LanguageTable { by_name, canonical })
}

/// Get language configuration by language name or alias
pub fn get_language_config(language: &str) -> Option<LanguageConfig> {
    LANGUAGES
        .get()?
        .by_name
        .get(&language.trim().to_lowercase())
        .cloned()
}

/// Get all supported canonical language names, sorted
pub fn get_supported_languages() -> Vec<String> {
    LANGUAGES
        .get()
        .map(|table| table.canonical.clone())
        .unwrap_or_default()
}
