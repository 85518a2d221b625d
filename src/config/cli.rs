use crate::utils::error::{RegistrarError, Result};
use crate::utils::validation;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "registrar")]
#[command(about = "Virtual university registrar: enrollment checks over message-driven services")]
pub struct CliConfig {
    #[arg(long, short, default_value = "registrar.toml")]
    pub config: PathBuf,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Override the per-check reply timeout (milliseconds)")]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Enroll a student in a course
    Enroll { student: String, course: String },
    /// Send one raw JSON request to the coordinator
    Request { json: String },
    /// Send every request in a JSON file (one object or an array), concurrently
    Submit { file: PathBuf },
    /// Show a student's weekly timetable
    Schedule { student: String },
    /// Parse a timetable string and report its slots and problems
    ParseSchedule {
        spec: String,
        #[arg(long)]
        lenient: bool,
    },
}

impl CliConfig {
    /// `--timeout-ms`，與設定檔的 reply_timeout_ms 使用相同範圍
    pub fn timeout_override(&self) -> Result<Option<Duration>> {
        match self.timeout_ms {
            None => Ok(None),
            Some(ms) => {
                validation::validate_range("timeout_ms", ms, 1, 600_000)?;
                Ok(Some(Duration::from_millis(ms)))
            }
        }
    }
}

impl Command {
    /// 將子命令轉換為送往協調者的請求
    pub fn requests(&self) -> Result<Vec<Value>> {
        let requests = match self {
            Command::Enroll { student, course } => vec![json!({
                "tipo": "inscricao",
                "estudante_id": student,
                "disciplina": course,
            })],
            Command::Request { json } => vec![serde_json::from_str(json)?],
            Command::Submit { file } => {
                let content = std::fs::read_to_string(file)?;
                match serde_json::from_str::<Value>(&content)? {
                    Value::Array(items) => items,
                    single => vec![single],
                }
            }
            Command::Schedule { student } => vec![json!({
                "tipo": "consulta_horario",
                "estudante_id": student,
            })],
            Command::ParseSchedule { .. } => Vec::new(),
        };

        if requests.is_empty() && !matches!(self, Command::ParseSchedule { .. }) {
            return Err(RegistrarError::InvalidConfigValueError {
                field: "requests".to_string(),
                value: "[]".to_string(),
                reason: "No requests to send".to_string(),
            });
        }
        Ok(requests)
    }
}
