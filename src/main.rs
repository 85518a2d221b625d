use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinSet;
use virtual_registrar::adapters::load_catalog;
use virtual_registrar::config::Command;
use virtual_registrar::core::schedule::{parse_schedule, ParseMode};
use virtual_registrar::utils::error::{ErrorSeverity, RegistrarError};
use virtual_registrar::utils::{logger, validation::Validate};
use virtual_registrar::{CliConfig, Registrar, RegistrarConfig};

/// 記錄錯誤並依嚴重程度決定退出碼
fn fail(e: &RegistrarError) -> ! {
    tracing::error!(
        "❌ Registrar failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("rendering reply")?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 時刻表解析不需要設定檔
    if let Command::ParseSchedule { spec, lenient } = &cli.command {
        logger::init_cli_logger(cli.verbose, None);
        let mode = if *lenient {
            ParseMode::Lenient
        } else {
            ParseMode::Strict
        };
        let parsed = parse_schedule(spec, mode);
        return print_json(&json!({
            "slots": parsed.slots.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "errors": parsed.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }));
    }

    let loaded = RegistrarConfig::from_file(&cli.config);

    // 初始化日誌
    let (json_logs, level) = match &loaded {
        Ok(config) => (cli.json_logs || config.json_logs(), config.log_level()),
        Err(_) => (cli.json_logs, None),
    };
    if json_logs {
        logger::init_json_logger(cli.verbose, level);
    } else {
        logger::init_cli_logger(cli.verbose, level);
    }

    let config = loaded.unwrap_or_else(|e| fail(&e));
    tracing::info!("Starting {}", config.registrar.name);
    if cli.verbose {
        tracing::debug!("Registrar config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let requests = cli.command.requests().unwrap_or_else(|e| fail(&e));
    let catalog = load_catalog(&config.catalog_paths()).unwrap_or_else(|e| fail(&e));

    let mut settings = config.settings().unwrap_or_else(|e| fail(&e));
    if let Some(timeout) = cli.timeout_override().unwrap_or_else(|e| fail(&e)) {
        settings.coordinator.reply_timeout = timeout;
    }

    let registrar = Registrar::builder(settings)
        .with_catalog(Arc::new(catalog))
        .start()
        .unwrap_or_else(|e| fail(&e));
    let registrar = Arc::new(registrar);

    // 每個請求各自一個任務，互不阻塞
    let mut pending = JoinSet::new();
    for (index, request) in requests.into_iter().enumerate() {
        let registrar = registrar.clone();
        pending.spawn(async move {
            let reply = registrar.submit(request).await.unwrap_or_else(|e| {
                tracing::warn!("⚠️ Request {} got no reply: {}", index, e);
                json!({"status": "erro", "motivo": "unavailable", "mensagem": e.to_string()})
            });
            (index, reply)
        });
    }

    let mut replies = Vec::new();
    while let Some(joined) = pending.join_next().await {
        replies.push(joined.context("request task panicked")?);
    }
    replies.sort_by_key(|(index, _)| *index);

    let mut replies: Vec<Value> = replies.into_iter().map(|(_, reply)| reply).collect();
    if replies.len() == 1 {
        print_json(&replies.remove(0))?;
    } else {
        print_json(&Value::Array(replies))?;
    }

    if let Ok(registrar) = Arc::try_unwrap(registrar) {
        registrar.shutdown();
    }
    Ok(())
}
