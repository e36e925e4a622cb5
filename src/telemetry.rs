//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志和链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化 tracing
///
/// 此函数应该在应用程序启动时调用一次。安装控制台日志层和 OpenTelemetry 层，
/// 日志级别优先读取 `RUST_LOG`，否则使用 `default_filter`。
///
/// # 参数
///
/// * `service_name` - 服务名称
/// * `default_filter` - 默认过滤规则，例如 "info" 或 "oxquery=debug"
pub fn init_tracing(service_name: &str, default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // 未配置导出器时 provider 为 no-op
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(telemetry);

    // 可能已由应用层初始化
    let _ = tracing::subscriber::set_global_default(subscriber);
}
