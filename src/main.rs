use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use fapiao_desk::models::RecordId;
use fapiao_desk::terminal::TerminalView;
use fapiao_desk::view::{ArchiveSink, DirectorySink};
use fapiao_desk::{ApiClient, AppConfig, AppError, ListController};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// 发票管理命令行客户端
#[derive(Debug, Parser)]
#[command(name = "fapiao-desk", version, about = "Invoice desk client")]
struct Cli {
    /// 后端 API 地址，覆盖配置文件与环境变量
    #[arg(long, global = true, env = "FAPIAO_BASE_URL")]
    base_url: Option<String>,

    /// 当前搜索词 (列表与改动后的刷新都使用它)
    #[arg(long, short, global = true, default_value = "")]
    search: String,

    /// 跳过破坏性操作的确认
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 列出 (搜索) 发票
    List,
    /// 上传 ZIP 并等待后台处理完成
    Upload { zip: PathBuf },
    /// 修改单张发票，未给出的字段保持原值
    Update {
        id: String,
        #[arg(long)]
        buyer: Option<String>,
        #[arg(long)]
        seller: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        number: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        amount: Option<BigDecimal>,
        #[arg(long)]
        total_amount: Option<BigDecimal>,
    },
    /// 删除单张发票
    Delete { id: String },
    /// 打包下载选中的发票
    Export {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 下载单张发票文件
    Download {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 清空全部数据
    ClearAll,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 加载配置
    let mut config = AppConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
        config.validate()?;
    }
    info!("Starting with config: {:?}", config);

    let client = Arc::new(ApiClient::from_config(&config)?);
    let view = Arc::new(TerminalView::new(cli.yes));
    let controller = ListController::new(client.clone(), view.clone(), view.clone(), view, &config);

    let ok = match run(&cli, &config, &client, &controller).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!("Command failed: {}", e);
            false
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// 执行子命令。错误已经以提示形式输出，这里只决定退出码
async fn run(
    cli: &Cli,
    config: &AppConfig,
    client: &ApiClient,
    controller: &ListController,
) -> Result<bool, AppError> {
    match &cli.command {
        Command::List => {
            controller.load(&cli.search).await?;
        }
        Command::Upload { zip } => {
            // 记下搜索词供完成后刷新；列表拉取失败不影响上传
            if let Err(e) = controller.load(&cli.search).await {
                warn!("Initial list load failed, continuing with upload: {}", e);
            }

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let outcome = controller.upload(zip, &cancel).await?;
            return Ok(outcome.is_success());
        }
        Command::Update {
            id,
            buyer,
            seller,
            code,
            number,
            date,
            amount,
            total_amount,
        } => {
            controller.load(&cli.search).await?;
            let id = RecordId::new(id.as_str());
            let Some(mut fields) = controller.edit_defaults(&id) else {
                return Err(AppError::Validation(format!(
                    "Invoice {} is not in the current list",
                    id
                )));
            };

            if let Some(v) = buyer {
                fields.buyer_name = v.clone();
            }
            if let Some(v) = seller {
                fields.seller_name = v.clone();
            }
            if let Some(v) = code {
                fields.invoice_code = v.clone();
            }
            if let Some(v) = number {
                fields.invoice_number = v.clone();
            }
            if let Some(v) = date {
                fields.issue_date = v.clone();
            }
            if let Some(v) = amount {
                fields.amount = v.clone();
            }
            if let Some(v) = total_amount {
                fields.total_amount = v.clone();
            }
            controller.update(&id, &fields).await?;
        }
        Command::Delete { id } => {
            controller.load(&cli.search).await?;
            return controller.delete(&RecordId::new(id.as_str())).await;
        }
        Command::Export { ids, out } => {
            controller.load(&cli.search).await?;
            for id in ids {
                controller.set_checked(&RecordId::new(id.as_str()), true);
            }
            let sink = DirectorySink::new(out.clone().unwrap_or_else(|| config.export.output_dir.clone()));
            controller.export_selected(&sink).await?;
        }
        Command::Download { id, out } => {
            let (file_name, bytes) = client.download_invoice(&RecordId::new(id.as_str())).await?;
            let sink = DirectorySink::new(out.clone().unwrap_or_else(|| config.export.output_dir.clone()));
            let path = sink.save(&file_name, bytes).await?;
            println!("Saved {}", path.display());
        }
        Command::ClearAll => {
            controller.load(&cli.search).await?;
            return controller.clear_all().await;
        }
    }
    Ok(true)
}
