//! kgen Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! defaults matching the hosted extractor (DeepSeek, Chinese labels,
//! temperature 0.1).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider endpoints and credentials
    pub llm: LlmConfig,

    /// Defaults for each extraction request
    pub extraction: ExtractionDefaults,

    /// Graph display settings
    pub visual: VisualConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Layer environment variables on top (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Extraction defaults
        if let Some(supplier) = env("KGEN_SUPPLIER") {
            self.extraction.supplier = supplier.parse()?;
        }
        if let Some(language) = env("KGEN_LANGUAGE") {
            self.extraction.language = language.parse()?;
        }
        if let Some(temperature) = env("KGEN_TEMPERATURE") {
            self.extraction.temperature = parse_temperature("KGEN_TEMPERATURE", &temperature)?;
        }
        if let Some(key) = env("KGEN_API_KEY") {
            self.extraction.api_key = Some(key);
        }

        // Provider credentials
        if let Some(key) = env("DEEPSEEK_API_KEY") {
            self.llm.deepseek_api_key = Some(key);
        }
        if let Some(key) = env("ZHIPU_API_KEY") {
            self.llm.zhipu_api_key = Some(key);
        }
        if let Some(key) = env("AZURE_OPENAI_API_KEY") {
            self.llm.azure_api_key = Some(key);
        }
        if let Some(endpoint) = env("AZURE_OPENAI_ENDPOINT") {
            self.llm.azure_endpoint = Some(endpoint);
        }
        if let Some(deployment) = env("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.azure_deployment = Some(deployment);
        }
        if let Some(secs) = env("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LLM_TIMEOUT_SECS".to_string(),
                value: secs,
            })?;
        }

        // Logging
        if let Some(level) = env("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Build the per-request extraction config
    ///
    /// Key precedence: explicit override, then the generic `extraction.api_key`,
    /// then the supplier-specific key. A missing key is left empty and
    /// surfaces as a gateway error at call time.
    pub fn extraction_config(&self, api_key: Option<String>) -> Result<ExtractionConfig, ConfigError> {
        let supplier = self.extraction.supplier;
        let api_key = api_key
            .or_else(|| self.extraction.api_key.clone())
            .or_else(|| self.llm.api_key_for(supplier).map(str::to_string))
            .unwrap_or_default();

        let config = ExtractionConfig::new(supplier, api_key)
            .with_language(self.extraction.language)
            .with_temperature(self.extraction.temperature);
        config.validate()?;
        Ok(config)
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_temperature(key: &str, raw: &str) -> Result<f32, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    };
    let value: f32 = raw.trim().parse().map_err(|_| invalid())?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

// ============================================================================
// Per-request configuration
// ============================================================================

/// Parameters for one extraction request, owned by the caller
#[derive(Clone, PartialEq)]
pub struct ExtractionConfig {
    /// LLM backend to target
    pub supplier: Supplier,

    /// Credential for that backend
    pub api_key: String,

    /// Language of node and edge labels
    pub output_language: OutputLanguage,

    /// Response randomness in `[0, 1]`
    pub temperature: f32,
}

impl ExtractionConfig {
    pub fn new(supplier: Supplier, api_key: impl Into<String>) -> Self {
        Self {
            supplier,
            api_key: api_key.into(),
            output_language: OutputLanguage::default(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_language(mut self, language: OutputLanguage) -> Self {
        self.output_language = language;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Reject temperatures outside `[0, 1]` (NaN included)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature".to_string(),
                value: self.temperature.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("supplier", &self.supplier)
            .field("api_key", &"<redacted>")
            .field("output_language", &self.output_language)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Defaults used to build each `ExtractionConfig`
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionDefaults {
    pub supplier: Supplier,
    pub language: OutputLanguage,
    pub temperature: f32,
    /// Generic key used regardless of supplier
    pub api_key: Option<String>,
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            supplier: Supplier::DeepSeek,
            language: OutputLanguage::Chinese,
            temperature: DEFAULT_TEMPERATURE,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ExtractionDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionDefaults")
            .field("supplier", &self.supplier)
            .field("language", &self.language)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// LLM providers
// ============================================================================

/// Supported LLM backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supplier {
    Zhipu,
    Azure,
    #[default]
    DeepSeek,
}

impl Supplier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zhipu => "zhipu",
            Self::Azure => "azure",
            Self::DeepSeek => "deepseek",
        }
    }
}

impl std::fmt::Display for Supplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Supplier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zhipu" | "glm" => Ok(Self::Zhipu),
            "azure" => Ok(Self::Azure),
            "deepseek" => Ok(Self::DeepSeek),
            _ => Err(ConfigError::InvalidValue {
                key: "supplier".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Language for node and edge labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputLanguage {
    #[default]
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "en")]
    English,
}

impl OutputLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Chinese => "zh",
            Self::English => "en",
        }
    }

    /// Name used inside prompts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chinese => "Chinese (简体中文)",
            Self::English => "English",
        }
    }
}

impl std::fmt::Display for OutputLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for OutputLanguage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "cn" | "chinese" | "中文" => Ok(Self::Chinese),
            "en" | "english" => Ok(Self::English),
            _ => Err(ConfigError::InvalidValue {
                key: "language".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// LLM provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// DeepSeek API base URL
    pub deepseek_base_url: String,

    /// DeepSeek model name
    pub deepseek_model: String,

    pub deepseek_api_key: Option<String>,

    /// Zhipu (BigModel) API base URL
    pub zhipu_base_url: String,

    /// Zhipu model name
    pub zhipu_model: String,

    pub zhipu_api_key: Option<String>,

    /// Azure OpenAI resource endpoint, e.g. `https://my-res.openai.azure.com`
    pub azure_endpoint: Option<String>,

    /// Azure deployment name
    pub azure_deployment: Option<String>,

    /// Azure REST API version
    pub azure_api_version: String,

    pub azure_api_key: Option<String>,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Supplier-specific key, if configured
    pub fn api_key_for(&self, supplier: Supplier) -> Option<&str> {
        match supplier {
            Supplier::DeepSeek => self.deepseek_api_key.as_deref(),
            Supplier::Zhipu => self.zhipu_api_key.as_deref(),
            Supplier::Azure => self.azure_api_key.as_deref(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            deepseek_base_url: "https://api.deepseek.com/v1".to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            deepseek_api_key: None,
            zhipu_base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            zhipu_model: "glm-4-flash".to_string(),
            zhipu_api_key: None,
            azure_endpoint: None,
            azure_deployment: None,
            azure_api_version: "2024-06-01".to_string(),
            azure_api_key: None,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("LlmConfig")
            .field("deepseek_base_url", &self.deepseek_base_url)
            .field("deepseek_model", &self.deepseek_model)
            .field("deepseek_api_key", &redact(&self.deepseek_api_key))
            .field("zhipu_base_url", &self.zhipu_base_url)
            .field("zhipu_model", &self.zhipu_model)
            .field("zhipu_api_key", &redact(&self.zhipu_api_key))
            .field("azure_endpoint", &self.azure_endpoint)
            .field("azure_deployment", &self.azure_deployment)
            .field("azure_api_version", &self.azure_api_version)
            .field("azure_api_key", &redact(&self.azure_api_key))
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ============================================================================
// Display and logging
// ============================================================================

/// Graph display settings handed to the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,

    /// Node diameter
    pub node_size: u32,

    /// Color used for highlighted nodes
    pub highlight_color: String,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 500,
            node_size: 25,
            highlight_color: "#F7A7A6".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
