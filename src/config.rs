use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScribeError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Whether to add a generated description to the report
    pub enabled: bool,

    /// Narrative provider (anthropic, openai)
    pub provider: String,

    /// Model name passed to the provider
    pub model: String,

    /// API key; falls back to the provider's environment variable
    pub api_key: Option<String>,

    /// Base URL override for proxies or compatible endpoints
    pub base_url: Option<String>,

    /// Maximum tokens for the generated description
    pub max_tokens: Option<u32>,

    /// Temperature for the generated description (0.0 to 1.0)
    pub temperature: Option<f32>,

    /// Upper bound on a single narrative request, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source discovery and extraction settings
    pub scan: ScanConfig,

    /// Report rendering and output settings
    pub report: ReportConfig,

    /// Narrative generation settings
    pub narrative: NarrativeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, used when asking for a narrative
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root directory to scan
    pub root: PathBuf,

    /// File extensions to parse
    pub extensions: Vec<String>,

    /// Descend into subdirectories
    pub recursive: bool,

    /// Honour .gitignore files while walking
    pub respect_gitignore: bool,

    /// Extract declarations that are commented out
    pub include_commented: bool,

    /// Extract decorated record types (dataclasses and friends)
    pub include_record_types: bool,

    /// Decorator names that mark a class as a record type
    pub record_markers: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// Worker threads for parsing; rayon's default when unset
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report file; the report goes to stdout when unset
    pub output: Option<PathBuf>,

    /// Only include the first line of each docstring
    pub brief_docstring: bool,

    /// Emit a report even when nothing was found
    pub include_empty: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Project".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: vec!["py".to_string()],
            recursive: true,
            respect_gitignore: false,
            include_commented: false,
            include_record_types: false,
            record_markers: vec!["dataclass".to_string()],
            max_file_size: 1024 * 1024, // 1MB
            threads: None,
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "anthropic".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(1024),
            temperature: Some(0.3),
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ScribeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ScribeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(ScribeError::Config(format!(
                        "config file {} not found",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["Declscribe.toml", "declscribe.toml", ".declscribe.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scan.extensions.is_empty() {
            return Err(ScribeError::Config(
                "scan.extensions must list at least one extension".to_string(),
            ));
        }
        if self.scan.threads == Some(0) {
            return Err(ScribeError::Config("scan.threads must be positive".to_string()));
        }
        if self.narrative.timeout_secs == 0 {
            return Err(ScribeError::Config(
                "narrative.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
