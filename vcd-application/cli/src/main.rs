//! vCD CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "vcd")]
#[command(about = "vCloud Director 资源模块 - 声明式、幂等的资源管理", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别（设置 RUST_LOG 时以其为准）
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// 连接档案名称
    #[arg(short = 'P', long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 按 Ansible 模块约定执行：参数来自文件，结果以 JSON 输出
    Module {
        /// 模块名称，如 vcd_org
        name: String,
        /// 参数文件（JSON 或 YAML）
        args_file: String,
    },

    /// 以命令行参数执行模块
    Run {
        /// 模块名称，可省略 vcd_ 前缀
        name: String,

        /// 模块参数 key=value，可重复
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// JSON 形式的模块参数，与 --param 合并
        #[arg(long)]
        args_json: Option<String>,

        /// 输出格式 (json/yaml)
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
    },

    /// 列出全部模块
    Modules,

    /// 配置文件管理
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// 显示当前配置（密码已隐藏）
    Show,

    /// 生成配置文件模板
    Init {
        /// 覆盖已存在的配置文件
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 日志写入 stderr，stdout 只输出模块结果
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("vCD CLI 启动");

    match cli.command {
        Commands::Module { name, args_file } => {
            commands::module::handle(&name, &args_file, cli.profile.as_deref()).await
        }
        Commands::Run { name, params, args_json, format } => {
            commands::run::handle(&name, &params, args_json.as_deref(), &format, cli.profile.as_deref())
                .await
        }
        Commands::Modules => commands::modules::handle(),
        Commands::Config { action } => commands::config::handle(action),
    }
}
