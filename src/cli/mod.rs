//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::Config;
use crate::record::Category;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// 成功
pub const EXIT_OK: u8 = 0;
/// 硬失败（任务失败或无法建立连接）
pub const EXIT_FAILURE: u8 = 1;
/// 部分成功（任务完成但有类别中止）
pub const EXIT_PARTIAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "oxwarm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "warm", about = "Run a cache warming job")]
    Warm(WarmArgs),

    #[command(name = "cutover", about = "Deploy, warm, validate and switch traffic")]
    Cutover(CutoverArgs),

    #[command(name = "report", about = "Query persisted warming reports and cutover decisions")]
    Report(ReportArgs),
}

#[derive(Parser, Debug)]
pub struct WarmArgs {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Categories to warm, comma separated (default: all)"
    )]
    pub categories: Vec<String>,

    #[arg(long, help = "Rows per source page")]
    pub batch_size: Option<u64>,

    #[arg(long, help = "Maximum retries for source reads and cache writes")]
    pub max_retries: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct CutoverArgs {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Categories to warm, comma separated (default: all)"
    )]
    pub categories: Vec<String>,

    #[arg(
        long,
        help = "Cut over even if validation fails; explicit operator override"
    )]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct ReportArgs {
    #[arg(long, help = "Job id to query (default: latest)")]
    pub job_id: Option<String>,

    #[arg(long, help = "Output in JSON format")]
    pub json: bool,
}

mod cutover;
mod report;
mod warm;

/// 解析类别参数，未指定时预热全部类别
pub(crate) fn parse_categories(raw: &[String]) -> crate::error::Result<Vec<Category>> {
    if raw.is_empty() {
        return Ok(Category::ALL.to_vec());
    }
    raw.iter().map(|s| Category::parse(s)).collect()
}

pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    crate::telemetry::init_tracing("oxwarm");

    let config = Config::load_or_default(cli.config.as_deref())?;

    match &cli.command {
        Commands::Warm(args) => warm::execute(args, &config).await,
        Commands::Cutover(args) => cutover::execute(args, &config).await,
        Commands::Report(args) => report::execute(args, &config).await,
    }
}
