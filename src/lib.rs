//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! oxwarm - 缓存预热与切流校验服务
//!
//! 在新环境承接生产流量之前，从关系型数据源按类别批量预热
//! 分布式缓存，并以可测量的缓存健康度决定是否切流。

#![doc(html_root_url = "https://docs.rs/oxwarm/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod audit;
pub mod cli;
pub mod config;
pub mod cutover;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod record;
pub mod report;
pub mod retry;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod ttl;
pub mod warmer;
pub mod writer;

// Re-export commonly used items
pub use config::Config;
pub use cutover::{CutoverController, CutoverOutcome, CutoverState, Provisioner, TrafficRouter};
pub use error::{Result, WarmError};
pub use gate::ValidationGate;
pub use orchestrator::WarmingOrchestrator;
pub use record::{CacheRecord, Category, SourceRow};
pub use report::{CacheTelemetry, CutoverDecision, JobStatus, WarmingJob, WarmingReport};
pub use source::{RowBatch, SourceReader};
pub use store::{CacheStore, MemoryInfo};
pub use ttl::TtlPolicy;
pub use warmer::{CategoryOutcome, CategoryStats, CategoryWarmer};

/// oxwarm 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
