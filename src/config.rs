// Configuration for the extraction engine
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// Extraction limits
pub const MAX_PAGES: usize = 50;
pub const MAX_CHARS: usize = 150_000;
pub const MIN_CHARS_FORCED: usize = 10;
pub const MIN_CHARS_NORMAL: usize = 50;

// Classifier sampling
pub const CLASSIFIER_SAMPLE_PAGES: usize = 3;
pub const CLASSIFIER_OPERATOR_PAGES: usize = 2;
pub const CLASSIFIER_MIN_CHARS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_min_chars_forced")]
    pub min_chars_forced: usize,
    #[serde(default = "default_min_chars_normal")]
    pub min_chars_normal: usize,
    #[serde(default = "default_classifier_sample_pages")]
    pub classifier_sample_pages: usize,
    #[serde(default = "default_classifier_operator_pages")]
    pub classifier_operator_pages: usize,
    #[serde(default = "default_classifier_min_chars")]
    pub classifier_min_chars: usize,
    /// Formats known to always carry a text layer; classified without decoding.
    #[serde(default = "default_always_text_extensions")]
    pub always_text_extensions: Vec<String>,
    /// Formats extracted by decoding the bytes as text.
    #[serde(default = "default_plain_text_extensions")]
    pub plain_text_extensions: Vec<String>,
}

fn default_max_pages() -> usize { MAX_PAGES }
fn default_max_chars() -> usize { MAX_CHARS }
fn default_min_chars_forced() -> usize { MIN_CHARS_FORCED }
fn default_min_chars_normal() -> usize { MIN_CHARS_NORMAL }
fn default_classifier_sample_pages() -> usize { CLASSIFIER_SAMPLE_PAGES }
fn default_classifier_operator_pages() -> usize { CLASSIFIER_OPERATOR_PAGES }
fn default_classifier_min_chars() -> usize { CLASSIFIER_MIN_CHARS }

fn default_always_text_extensions() -> Vec<String> {
    ["epub", "txt", "doc", "docx", "rtf"].iter().map(|s| s.to_string()).collect()
}

fn default_plain_text_extensions() -> Vec<String> {
    ["txt", "md", "csv"].iter().map(|s| s.to_string()).collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_chars: default_max_chars(),
            min_chars_forced: default_min_chars_forced(),
            min_chars_normal: default_min_chars_normal(),
            classifier_sample_pages: default_classifier_sample_pages(),
            classifier_operator_pages: default_classifier_operator_pages(),
            classifier_min_chars: default_classifier_min_chars(),
            always_text_extensions: default_always_text_extensions(),
            plain_text_extensions: default_plain_text_extensions(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then the optional TOML file (argument or `PAGESIFT_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("PAGESIFT_CONFIG").ok().map(PathBuf::from));

        let config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_usize("PAGESIFT_MAX_PAGES") {
            self.max_pages = v;
        }
        if let Some(v) = env_usize("PAGESIFT_MAX_CHARS") {
            self.max_chars = v;
        }
        if let Some(v) = env_usize("PAGESIFT_MIN_CHARS_FORCED") {
            self.min_chars_forced = v;
        }
        if let Some(v) = env_usize("PAGESIFT_MIN_CHARS_NORMAL") {
            self.min_chars_normal = v;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_pages", self.max_pages),
            ("max_chars", self.max_chars),
            ("classifier_sample_pages", self.classifier_sample_pages),
            ("classifier_operator_pages", self.classifier_operator_pages),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Acceptance threshold for the given mode.
    pub fn min_chars(&self, forced: bool) -> usize {
        if forced {
            self.min_chars_forced
        } else {
            self.min_chars_normal
        }
    }

    pub fn is_always_text(&self, extension: &str) -> bool {
        self.always_text_extensions.iter().any(|e| e == extension)
    }

    pub fn is_plain_text(&self, extension: &str) -> bool {
        self.plain_text_extensions.iter().any(|e| e == extension)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
