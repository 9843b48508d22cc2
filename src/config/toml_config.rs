use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EmissionError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_one_of, validate_path, validate_positive_number, validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SNAPSHOT_FILE: &str = "emissions.json";
const DEFAULT_TIMELINE_SPAN: u32 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    pub snapshot_file: Option<String>,
    pub pretty: Option<bool>,
}

fn default_store_path() -> String {
    "./data".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            snapshot_file: None,
            pretty: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub default_year: Option<i32>,
    pub max_timeline_span: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EmissionError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EmissionError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${EMISSION_DATA_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EmissionError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("store.path", &self.store.path)?;
        if let Some(file) = &self.store.snapshot_file {
            validate_path("store.snapshot_file", file)?;
        }

        if let Some(span) = self.reporting.max_timeline_span {
            validate_positive_number("reporting.max_timeline_span", span as usize, 1)?;
        }
        if let Some(year) = self.reporting.default_year {
            validate_range("reporting.default_year", year, 1, 9999)?;
        }

        if let Some(level) = &self.logging.level {
            validate_one_of(
                "logging.level",
                level,
                &["trace", "debug", "info", "warn", "error"],
            )?;
        }
        if let Some(format) = &self.logging.format {
            validate_one_of("logging.format", format, &["text", "json"])?;
        }

        Ok(())
    }

    pub fn log_format(&self) -> LogFormat {
        match self.logging.format.as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn default_year(&self) -> Option<i32> {
        self.reporting.default_year
    }
}

impl ConfigProvider for AppConfig {
    fn store_path(&self) -> &str {
        &self.store.path
    }

    fn snapshot_file(&self) -> &str {
        self.store
            .snapshot_file
            .as_deref()
            .unwrap_or(DEFAULT_SNAPSHOT_FILE)
    }

    fn pretty_snapshot(&self) -> bool {
        self.store.pretty.unwrap_or(true)
    }

    fn max_timeline_span(&self) -> u32 {
        self.reporting
            .max_timeline_span
            .unwrap_or(DEFAULT_TIMELINE_SPAN)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
