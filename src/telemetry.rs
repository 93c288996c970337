//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了预热系统的遥测和链路追踪功能。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化 tracing 与 OpenTelemetry
///
/// 应用启动时调用一次。默认以 RUST_LOG 过滤控制台输出；
/// tracer provider 未配置 exporter 时为 no-op。
pub fn init_tracing(service_name: &str) {
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());

    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let subscriber = Registry::default().with(filter).with(fmt_layer).with(telemetry);

    // 可能与测试环境中既有的 subscriber 冲突，忽略重复设置
    let _ = tracing::subscriber::set_global_default(subscriber);
}
