//! 空间服务路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

/// 创建空间数据路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/points", get(list_points).post(create_point))
        .route("/api/points/", get(list_points).post(create_point))
        .route("/api/points/batch", post(create_points_batch))
        .route("/api/points/search/radius", get(search_points_by_radius))
        .route(
            "/api/points/{id}",
            get(get_point).put(update_point).delete(delete_point),
        )
        .route("/api/polygons", get(list_polygons).post(create_polygon))
        .route("/api/polygons/", get(list_polygons).post(create_polygon))
        .route("/api/polygons/batch", post(create_polygons_batch))
        .route("/api/polygons/contains", get(polygons_containing))
        .route("/api/polygons/intersect", get(intersecting_polygons))
        .route(
            "/api/polygons/{id}",
            get(get_polygon).put(update_polygon).delete(delete_polygon),
        )
        .route("/api/polygons/{id}/points", get(points_within_polygon))
        .route("/api/geo/intersect", get(intersecting_polygons))
        .route("/api/health", get(health_check))
}
