use tracing_appender::non_blocking::WorkerGuard;

/// 日志目录环境变量，设置后日志写入按天滚动的文件
pub const LOG_DIR_ENV: &str = "VIP_LOG_DIR";

const LOG_FILE_PREFIX: &str = "vip-cli.log";

/// 设置日志记录系统
///
/// - 库代码只使用 tracing 宏记录日志
/// - 支持 RUST_LOG 环境变量控制日志级别
/// - 终端输出简洁格式，文件输出详细格式
///
/// 返回的 guard 必须在进程退出前一直持有，否则文件日志可能丢失。
pub fn setup_logging(verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match std::env::var(LOG_DIR_ENV) {
        Ok(log_dir) if !log_dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .init();
            Some(guard)
        }
        _ => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(false)
                .with_line_number(false)
                .without_time()
                .compact()
                .init();
            None
        }
    }
}

/// 字节数转换为便于阅读的格式
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// 秒数转换为 `1天 2小时 3分钟` 形式
pub fn format_uptime(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    match (days, hours) {
        (0, 0) => format!("{minutes}分钟"),
        (0, h) => format!("{h}小时 {minutes}分钟"),
        (d, h) => format!("{d}天 {h}小时 {minutes}分钟"),
    }
}
