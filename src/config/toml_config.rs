use crate::adapters::json_catalog::CatalogPaths;
use crate::app::registrar::{RegistrarSettings, DEFAULT_MAILBOX_CAPACITY};
use crate::app::services::academic::{AcademicRules, DEFAULT_EQUIVALENCE_RATIO, DEFAULT_MAX_CREDITS};
use crate::core::orchestrator::{CoordinatorSettings, DEFAULT_REPLY_TIMEOUT};
use crate::core::schedule::{ParseMode, UnknownParseMode};
use crate::utils::error::{RegistrarError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const PARSE_MODES: [&str; 2] = ["strict", "lenient"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarConfig {
    pub registrar: RegistrarSection,
    pub data: DataConfig,
    pub coordinator: Option<CoordinatorConfig>,
    pub schedule: Option<ScheduleConfig>,
    pub academic: Option<AcademicConfig>,
    pub monitoring: Option<MonitoringConfig>,
    /// 設定檔所在目錄，相對路徑以此為基準
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub courses: String,
    pub students: String,
    pub statutes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub reply_timeout_seconds: Option<u64>,
    /// 優先於 reply_timeout_seconds
    pub reply_timeout_ms: Option<u64>,
    pub mailbox_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub parse_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicConfig {
    pub max_credits_per_semester: Option<u32>,
    pub equivalence_credit_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub json_logs: Option<bool>,
    pub log_level: Option<String>,
}

impl RegistrarConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(RegistrarError::IoError)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RegistrarError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RegistrarError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("registrar.name", &self.registrar.name)?;

        // 驗證資料檔路徑
        validation::validate_path("data.courses", &self.data.courses)?;
        validation::validate_path("data.students", &self.data.students)?;
        if let Some(statutes) = &self.data.statutes {
            validation::validate_path("data.statutes", statutes)?;
        }

        if let Some(coordinator) = &self.coordinator {
            if let Some(ms) = coordinator.reply_timeout_ms {
                validation::validate_range("coordinator.reply_timeout_ms", ms, 1, 600_000)?;
            }
            if let Some(seconds) = coordinator.reply_timeout_seconds {
                validation::validate_range("coordinator.reply_timeout_seconds", seconds, 1, 600)?;
            }
            if let Some(capacity) = coordinator.mailbox_capacity {
                validation::validate_positive_number("coordinator.mailbox_capacity", capacity, 1)?;
            }
        }

        if let Some(mode) = self.schedule.as_ref().and_then(|s| s.parse_mode.as_deref()) {
            validation::validate_one_of("schedule.parse_mode", mode, &PARSE_MODES)?;
        }

        if let Some(academic) = &self.academic {
            if let Some(max) = academic.max_credits_per_semester {
                validation::validate_range("academic.max_credits_per_semester", max, 1, 120)?;
            }
            if let Some(ratio) = academic.equivalence_credit_ratio {
                validation::validate_range("academic.equivalence_credit_ratio", ratio, 0.0, 1.0)?;
            }
        }

        if let Some(level) = self.log_level() {
            validation::validate_one_of("monitoring.log_level", level, &LOG_LEVELS)?;
        }

        Ok(())
    }

    /// 取得每個規則檢查的逾時
    pub fn reply_timeout(&self) -> Duration {
        let coordinator = self.coordinator.as_ref();
        match (
            coordinator.and_then(|c| c.reply_timeout_ms),
            coordinator.and_then(|c| c.reply_timeout_seconds),
        ) {
            (Some(ms), _) => Duration::from_millis(ms),
            (None, Some(seconds)) => Duration::from_secs(seconds),
            (None, None) => DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.coordinator
            .as_ref()
            .and_then(|c| c.mailbox_capacity)
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn parse_mode(&self) -> Result<ParseMode> {
        match self.schedule.as_ref().and_then(|s| s.parse_mode.as_deref()) {
            None => Ok(ParseMode::default()),
            Some(mode) => mode.parse().map_err(|e: UnknownParseMode| {
                RegistrarError::InvalidConfigValueError {
                    field: "schedule.parse_mode".to_string(),
                    value: mode.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    pub fn academic_rules(&self) -> AcademicRules {
        let academic = self.academic.as_ref();
        AcademicRules {
            max_credits_per_semester: academic
                .and_then(|a| a.max_credits_per_semester)
                .unwrap_or(DEFAULT_MAX_CREDITS),
            equivalence_credit_ratio: academic
                .and_then(|a| a.equivalence_credit_ratio)
                .unwrap_or(DEFAULT_EQUIVALENCE_RATIO),
        }
    }

    /// 組合執行期設定
    pub fn settings(&self) -> Result<RegistrarSettings> {
        Ok(RegistrarSettings {
            coordinator: CoordinatorSettings {
                reply_timeout: self.reply_timeout(),
            },
            mailbox_capacity: self.mailbox_capacity(),
            parse_mode: self.parse_mode()?,
            academic: self.academic_rules(),
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// 資料檔路徑；未指定 statutes 時使用 courses 同目錄下的 estatutos.json
    pub fn catalog_paths(&self) -> CatalogPaths {
        let courses = self.resolve(&self.data.courses);
        let statutes = match &self.data.statutes {
            Some(statutes) => self.resolve(statutes),
            None => courses
                .parent()
                .map(|dir| dir.join("estatutos.json"))
                .unwrap_or_else(|| PathBuf::from("estatutos.json")),
        };
        CatalogPaths {
            students: self.resolve(&self.data.students),
            courses,
            statutes,
        }
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl Validate for RegistrarConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
