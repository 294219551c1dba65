//! 积分服务命令行入口
//!
//! 默认连接 PostgreSQL；`--in-memory` 时使用进程内存储，便于演示和本地联调。

use std::fs;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sqlx::migrate::Migrator;
use tracing::{error, info};

use loyalty::cli::{Cli, CommandRunner, Commands, ErrorBody};
use loyalty::ledger_id::LedgerIdGenerator;
use loyalty::repository::InMemoryStore;
use loyalty::seed::SeedData;
use loyalty::{LoyaltyError, MemoryLoyaltyService, PgLoyaltyService};
use loyalty_shared::config::AppConfig;
use loyalty_shared::database::Database;
use loyalty_shared::observability;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 1. 加载 .env 与配置
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load("loyalty-service").context("加载配置失败")?;
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    // 2. 初始化可观测性
    let guard = observability::init(&config.service_name, &config.observability)
        .context("初始化可观测性失败")?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        in_memory = cli.in_memory,
        "Starting loyalty command"
    );

    // 3. 执行命令
    let result = if cli.in_memory {
        run_in_memory(&cli, &config).await
    } else {
        run_with_database(&cli, &config).await
    };

    // 4. 输出结果
    let code = match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if err.is_business_error() {
                info!(code = err.error_code(), "命令被拒绝");
            } else {
                error!(error = %err, "命令执行失败");
            }
            println!("{}", serde_json::to_string_pretty(&ErrorBody::from(&err))?);
            ExitCode::FAILURE
        }
    };

    if cli.print_metrics {
        if let Some(rendered) = guard.render_metrics() {
            println!("{}", rendered);
        }
    }

    Ok(code)
}

/// 进程内存储：数据只在本次进程内有效
async fn run_in_memory(cli: &Cli, config: &AppConfig) -> loyalty::Result<serde_json::Value> {
    let store = InMemoryStore::new(LedgerIdGenerator::from_config(&config.ledger));

    if let Some(path) = &cli.data {
        read_seed(path)?.load_into_memory(&store);
    }

    match &cli.command {
        Commands::Migrate => Ok(serde_json::json!({ "migrated": false, "reason": "in-memory" })),
        Commands::Seed { file } => {
            let stats = read_seed(file)?.load_into_memory(&store);
            Ok(serde_json::to_value(stats)?)
        }
        command => {
            let service = MemoryLoyaltyService::in_memory(store, config.loyalty.clone());
            CommandRunner::new(service).run(command).await
        }
    }
}

async fn run_with_database(cli: &Cli, config: &AppConfig) -> loyalty::Result<serde_json::Value> {
    let db = Database::connect(&config.database).await?;

    let result = match &cli.command {
        Commands::Migrate => {
            db.run_migrations(&MIGRATOR).await?;
            Ok(serde_json::json!({ "migrated": true }))
        }
        Commands::Seed { file } => {
            let stats = read_seed(file)?.load_into_postgres(db.pool()).await?;
            Ok(serde_json::to_value(stats)?)
        }
        command => {
            let service = PgLoyaltyService::with_pool(
                db.pool().clone(),
                config.loyalty.clone(),
                &config.ledger,
            );
            CommandRunner::new(service).run(command).await
        }
    };

    db.close().await;
    result
}

fn read_seed(path: &std::path::Path) -> loyalty::Result<SeedData> {
    let json = fs::read_to_string(path).map_err(|e| {
        LoyaltyError::Internal(format!("读取数据文件 {} 失败: {}", path.display(), e))
    })?;
    SeedData::from_json(&json)
}
