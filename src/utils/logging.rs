//! 日志初始化（tracing-subscriber fmt 输出）

use tracing_subscriber::fmt::SubscriberBuilder;

/// 读取配置之前使用的日志级别
pub const BOOTSTRAP_LEVEL: tracing::Level = tracing::Level::INFO;

/// 安装全局日志订阅者；重复调用时保留第一次的设置
pub fn init_logging(level: tracing::Level) {
    let _ = SubscriberBuilder::default().with_max_level(level).try_init();
}

/// 在全局订阅者安装之前执行 f（例如读取配置），期间的日志按 BOOTSTRAP_LEVEL 输出
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = SubscriberBuilder::default()
        .with_max_level(BOOTSTRAP_LEVEL)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_logging_is_active_inside_closure() {
        let (info, debug) = with_bootstrap_logging(|| {
            (
                tracing::enabled!(tracing::Level::INFO),
                tracing::enabled!(tracing::Level::DEBUG),
            )
        });
        assert!(info, "读取配置期间的 info 日志应当输出");
        assert!(!debug);
    }

    #[test]
    fn test_bootstrap_logging_returns_value() {
        let config = with_bootstrap_logging(|| {
            crate::utils::config::EditorConfig::load_or_default(std::path::Path::new(
                "/nonexistent/dir/novel_editor.json",
            ))
        });
        assert_eq!(config.unwrap(), crate::utils::config::EditorConfig::default());
    }
}
