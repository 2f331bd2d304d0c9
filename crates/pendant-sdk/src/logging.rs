//! 日志初始化
//!
//! `tracing-subscriber` 的 fmt 输出 + `EnvFilter`（`RUST_LOG`，默认 `info`），
//! 同时把 `log` crate 的记录桥接到 `tracing`。

use tracing_subscriber::EnvFilter;

/// 默认日志级别初始化，可以用 `RUST_LOG` 覆盖
///
/// 重复调用是安全的：已经安装过全局 subscriber 时直接返回。
pub fn init_logger() {
    init_logger_with("info");
}

/// 指定默认过滤规则（`RUST_LOG` 仍然优先）
pub fn init_logger_with(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    // log → tracing；已有 logger 时忽略
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
