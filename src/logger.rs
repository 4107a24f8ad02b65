use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::plugins::worker::Strategy;

pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("site_cache=info"));

    // 重复初始化时忽略错误（测试和 demo 会多次调用）
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

pub fn log_request(path: &str, strategy: Option<Strategy>, duration: std::time::Duration) {
    let strategy = strategy.map(|s| s.as_str()).unwrap_or("passthrough");
    info!(
        target: "request",
        path = %path,
        strategy = %strategy,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );
}
