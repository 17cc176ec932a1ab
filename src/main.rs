// ==========================================
// 库存批量导入 - 命令行入口
// ==========================================
// 用法: inventory-import [--db PATH] <command>
// 输出: 标准输出为 JSON，日志写入标准错误
// ==========================================

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use inventory_import::config::ConfigManager;
use inventory_import::db::{default_db_path, init_schema, open_sqlite_connection};
use inventory_import::importer::batch_file_from_path;
use inventory_import::logging::{self, LogFormat};
use inventory_import::repository::{
    SqliteCatalogRepository, SqliteImportSessionRepository, SqliteStockRepository,
};
use inventory_import::{CorrectionAction, ExecutionMode, InventoryImportApi};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(name = "inventory-import", version, about = "库存批量导入：上传、预览、修正、提交")]
struct Cli {
    /// SQLite 数据库路径
    #[arg(long, global = true, env = "INVENTORY_IMPORT_DB_PATH")]
    db: Option<String>,

    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 上传批次文件（.csv / .xlsx / .xls），返回会话与预览
    Upload { file: PathBuf },
    /// 重新查看会话预览
    Preview { session: String },
    /// 查看会话状态与提交结果
    Status { session: String },
    /// 接受某行的全部建议
    Accept { session: String, row: usize },
    /// 为某行绑定产品
    Bind {
        session: String,
        row: usize,
        product_id: i64,
    },
    /// 为某行绑定仓库
    BindWarehouse {
        session: String,
        row: usize,
        warehouse_id: i64,
    },
    /// 检索产品目录
    Search {
        text: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// 提交会话
    Execute {
        session: String,
        #[arg(long, value_enum, default_value_t = ModeArg::OnlyValid)]
        mode: ModeArg,
    },
    /// 放弃会话
    Abandon { session: String },
    /// 清理过期会话
    Purge,
    /// 新增或更新产品
    AddProduct {
        code: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        unit: Option<String>,
    },
    /// 新增或更新仓库
    AddWarehouse { code: String, name: String },
    /// 设置全局配置项
    ConfigSet { key: String, value: String },
    /// 查看全局配置
    ConfigShow,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    OnlyValid,
    AllPerfect,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::OnlyValid => ExecutionMode::OnlyValid,
            ModeArg::AllPerfect => ExecutionMode::AllPerfect,
        }
    }
}

#[derive(Serialize)]
struct Created {
    id: i64,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_with_format(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    let db_path = cli.db.unwrap_or_else(default_db_path);
    tracing::info!(db_path = %db_path, version = inventory_import::VERSION, "启动");

    let conn = open_sqlite_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    init_schema(&conn).context("数据库初始化失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let config = Arc::new(ConfigManager::from_connection(conn.clone()));
    let catalog = Arc::new(SqliteCatalogRepository::from_connection(conn.clone()));
    let api = InventoryImportApi::with_components(
        config.clone(),
        catalog.clone(),
        Arc::new(SqliteStockRepository::from_connection(conn.clone())),
        Arc::new(SqliteImportSessionRepository::from_connection(conn)),
    );

    match cli.command {
        Command::Upload { file } => {
            let batch = batch_file_from_path(&file)
                .with_context(|| format!("无法读取文件: {}", file.display()))?;
            print_json(&api.upload_batch(batch).await?)?;
        }
        Command::Preview { session } => print_json(&api.preview(&session).await?)?,
        Command::Status { session } => print_json(&api.session_info(&session).await?)?,
        Command::Accept { session, row } => {
            let action = CorrectionAction::AcceptSuggestion { row_index: row };
            print_json(&api.correct(&session, action).await?)?;
        }
        Command::Bind {
            session,
            row,
            product_id,
        } => {
            let action = CorrectionAction::ManualBind {
                row_index: row,
                product_id,
            };
            print_json(&api.correct(&session, action).await?)?;
        }
        Command::BindWarehouse {
            session,
            row,
            warehouse_id,
        } => {
            let action = CorrectionAction::ManualBindWarehouse {
                row_index: row,
                warehouse_id,
            };
            print_json(&api.correct(&session, action).await?)?;
        }
        Command::Search { text, limit } => print_json(&api.search_catalog(&text, limit).await?)?,
        Command::Execute { session, mode } => {
            print_json(&api.execute(&session, mode.into()).await?)?
        }
        Command::Abandon { session } => {
            api.abandon(&session).await?;
            print_json(&api.session_info(&session).await?)?;
        }
        Command::Purge => print_json(&serde_json::json!({
            "deleted": api.purge_stale_sessions().await?
        }))?,
        Command::AddProduct {
            code,
            description,
            brand,
            unit,
        } => {
            let id = catalog.upsert_product(
                &code,
                description.as_deref(),
                brand.as_deref(),
                unit.as_deref(),
            )?;
            print_json(&Created { id })?;
        }
        Command::AddWarehouse { code, name } => {
            let id = catalog.upsert_warehouse(&code, &name)?;
            print_json(&Created { id })?;
        }
        Command::ConfigSet { key, value } => {
            config.set_global_config_value(&key, &value)?;
            print_json(&config.get_config_snapshot()?)?;
        }
        Command::ConfigShow => print_json(&config.get_config_snapshot()?)?,
    }

    Ok(())
}
