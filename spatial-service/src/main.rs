//! 空间数据服务
//!
//! 提供基于 PostGIS 的空间数据功能，包括：
//! - 点与多边形的增删改查
//! - 半径搜索、包含与相交查询
//! - 健康检查与 OpenAPI 文档

use common::config::{AppConfig, LogFormat};
use common::errors::AppError;
use common::SERVICE_NAME;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // .env 文件可选，已存在的环境变量优先
    dotenvy::dotenv().ok();

    // 加载配置（失败时仍先初始化日志，再退出）
    let config = AppConfig::from_env();
    let log_format = config
        .as_ref()
        .map(|c| c.log_format)
        .unwrap_or_default();
    init_tracing(log_format);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            let err = AppError::from(e);
            tracing::error!(code = err.code(), error = %err, "配置加载失败");
            std::process::exit(1);
        }
    };

    tracing::info!(
        service = SERVICE_NAME,
        database = %config.database.redacted(),
        "配置加载完成"
    );

    if let Err(e) = spatial_service::run(config).await {
        tracing::error!(code = e.code(), error = %e, "服务异常退出");
        std::process::exit(1);
    }
}

/// 初始化日志追踪
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
