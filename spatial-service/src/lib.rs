//! 空间数据服务库
//!
//! `run` 负责完整的进程生命周期；`app` 只构建路由，测试可以用
//! 任意 [`store::SpatialStore`] 驱动整个 HTTP 接口。

pub mod db;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::middleware::request_id_middleware;
use common::SERVICE_NAME;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

pub use db::Database;
pub use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "空间数据服务 API",
        version = "0.1.0",
        description = "基于 PostGIS 的点与多边形存储和空间查询"
    ),
    paths(
        handlers::create_point,
        handlers::create_points_batch,
        handlers::list_points,
        handlers::get_point,
        handlers::update_point,
        handlers::delete_point,
        handlers::search_points_by_radius,
        handlers::create_polygon,
        handlers::create_polygons_batch,
        handlers::list_polygons,
        handlers::get_polygon,
        handlers::update_polygon,
        handlers::delete_polygon,
        handlers::points_within_polygon,
        handlers::polygons_containing,
        handlers::intersecting_polygons,
        handlers::health_check,
    ),
    components(schemas(
        common::models::CreatePointRequest,
        common::models::UpdatePointRequest,
        common::models::BatchCreatePointsRequest,
        common::models::CreatePolygonRequest,
        common::models::UpdatePolygonRequest,
        common::models::BatchCreatePolygonsRequest,
        common::models::Feature,
        common::models::FeatureProperties,
        common::models::FeatureCollection,
        handlers::HealthResponse,
    )),
    tags(
        (name = "points", description = "点管理与半径搜索"),
        (name = "polygons", description = "多边形管理与空间关系查询"),
        (name = "geo", description = "通用几何查询"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// 构建完整的 HTTP 应用
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// 运行服务：连接数据库、确保表结构、提供 HTTP 服务直到收到停止信号。
///
/// 连接成功后，无论后续步骤成功与否，连接池都会被关闭。
pub async fn run(config: AppConfig) -> AppResult<()> {
    let database = Database::connect(&config).await?;
    let result = serve(&config, &database).await;
    database.close().await;
    result
}

async fn serve(config: &AppConfig, database: &Database) -> AppResult<()> {
    let latency = database.ping().await?;
    info!(latency_ms = latency.as_millis() as u64, "数据库连接可用");

    let store = store::PgSpatialStore::new(database.pool().clone());
    store.ensure_schema().await?;

    let app = app(AppState::new(Arc::new(store)));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Server(format!("failed to bind {}: {}", addr, e)))?;
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("收到停止信号，开始优雅关闭");
}
