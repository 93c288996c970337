//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块是预热与切流服务的入口点。

use anyhow::Result;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    oxwarm::cli::run().await
}
