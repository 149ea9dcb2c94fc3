//! Handler模块

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::extract::{AppJson, AppPath, AppQuery};
use common::models::{
    BatchCreatePointsRequest, BatchCreatePolygonsRequest, CreatePointRequest,
    CreatePolygonRequest, Feature, FeatureCollection, IntersectParams, ListParams,
    LocationParams, RadiusParams, UpdatePointRequest, UpdatePolygonRequest,
};
use common::response::ApiResponse;
use common::SERVICE_NAME;

use crate::service::SpatialService;
use crate::state::AppState;

/// 创建点
#[utoipa::path(
    post,
    path = "/api/points",
    tag = "points",
    request_body = CreatePointRequest,
    responses(
        (status = 201, description = "点已创建", body = Feature),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn create_point(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreatePointRequest>,
) -> Result<(StatusCode, Json<Feature>), AppError> {
    let service = SpatialService::new(state.store);
    let feature = service.create_point(req).await?;
    Ok((StatusCode::CREATED, Json(feature)))
}

/// 批量创建点
#[utoipa::path(
    post,
    path = "/api/points/batch",
    tag = "points",
    request_body = BatchCreatePointsRequest,
    responses(
        (status = 201, description = "点已批量创建", body = FeatureCollection),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn create_points_batch(
    State(state): State<AppState>,
    AppJson(req): AppJson<BatchCreatePointsRequest>,
) -> Result<(StatusCode, Json<FeatureCollection>), AppError> {
    let service = SpatialService::new(state.store);
    let collection = service.create_points(req).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

/// 分页列出点
#[utoipa::path(
    get,
    path = "/api/points",
    tag = "points",
    params(ListParams),
    responses(
        (status = 200, description = "点列表", body = FeatureCollection)
    )
)]
pub async fn list_points(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.list_points(&params).await?))
}

/// 根据 ID 获取点
#[utoipa::path(
    get,
    path = "/api/points/{id}",
    tag = "points",
    params(
        ("id" = i64, Path, description = "点 ID")
    ),
    responses(
        (status = 200, description = "点详情", body = Feature),
        (status = 404, description = "点未找到")
    )
)]
pub async fn get_point(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Feature>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.get_point(id).await?))
}

/// 更新点（仅更新请求中出现的字段）
#[utoipa::path(
    put,
    path = "/api/points/{id}",
    tag = "points",
    params(
        ("id" = i64, Path, description = "点 ID")
    ),
    request_body = UpdatePointRequest,
    responses(
        (status = 200, description = "点已更新", body = Feature),
        (status = 404, description = "点未找到"),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn update_point(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdatePointRequest>,
) -> Result<Json<Feature>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.update_point(id, req).await?))
}

/// 删除点
#[utoipa::path(
    delete,
    path = "/api/points/{id}",
    tag = "points",
    params(
        ("id" = i64, Path, description = "点 ID")
    ),
    responses(
        (status = 204, description = "点已删除"),
        (status = 404, description = "点未找到")
    )
)]
pub async fn delete_point(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    let service = SpatialService::new(state.store);
    service.delete_point(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 半径搜索
#[utoipa::path(
    get,
    path = "/api/points/search/radius",
    tag = "points",
    params(RadiusParams),
    responses(
        (status = 200, description = "半径内的点，按距离排序", body = FeatureCollection),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn search_points_by_radius(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<RadiusParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.search_points_by_radius(&params).await?))
}

/// 创建多边形
#[utoipa::path(
    post,
    path = "/api/polygons",
    tag = "polygons",
    request_body = CreatePolygonRequest,
    responses(
        (status = 201, description = "多边形已创建", body = Feature),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn create_polygon(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreatePolygonRequest>,
) -> Result<(StatusCode, Json<Feature>), AppError> {
    let service = SpatialService::new(state.store);
    let feature = service.create_polygon(req).await?;
    Ok((StatusCode::CREATED, Json(feature)))
}

/// 批量创建多边形
#[utoipa::path(
    post,
    path = "/api/polygons/batch",
    tag = "polygons",
    request_body = BatchCreatePolygonsRequest,
    responses(
        (status = 201, description = "多边形已批量创建", body = FeatureCollection),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn create_polygons_batch(
    State(state): State<AppState>,
    AppJson(req): AppJson<BatchCreatePolygonsRequest>,
) -> Result<(StatusCode, Json<FeatureCollection>), AppError> {
    let service = SpatialService::new(state.store);
    let collection = service.create_polygons(req).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

#[utoipa::path(
    get,
    path = "/api/polygons",
    tag = "polygons",
    params(ListParams),
    responses(
        (status = 200, description = "多边形列表", body = FeatureCollection)
    )
)]
pub async fn list_polygons(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.list_polygons(&params).await?))
}

#[utoipa::path(
    get,
    path = "/api/polygons/{id}",
    tag = "polygons",
    params(
        ("id" = i64, Path, description = "多边形 ID")
    ),
    responses(
        (status = 200, description = "多边形详情", body = Feature),
        (status = 404, description = "多边形未找到")
    )
)]
pub async fn get_polygon(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Feature>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.get_polygon(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/polygons/{id}",
    tag = "polygons",
    params(
        ("id" = i64, Path, description = "多边形 ID")
    ),
    request_body = UpdatePolygonRequest,
    responses(
        (status = 200, description = "多边形已更新", body = Feature),
        (status = 404, description = "多边形未找到"),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn update_polygon(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdatePolygonRequest>,
) -> Result<Json<Feature>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.update_polygon(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/api/polygons/{id}",
    tag = "polygons",
    params(
        ("id" = i64, Path, description = "多边形 ID")
    ),
    responses(
        (status = 204, description = "多边形已删除"),
        (status = 404, description = "多边形未找到")
    )
)]
pub async fn delete_polygon(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    let service = SpatialService::new(state.store);
    service.delete_polygon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 多边形内部的点
#[utoipa::path(
    get,
    path = "/api/polygons/{id}/points",
    tag = "polygons",
    params(
        ("id" = i64, Path, description = "多边形 ID")
    ),
    responses(
        (status = 200, description = "多边形内部的点", body = FeatureCollection),
        (status = 404, description = "多边形未找到")
    )
)]
pub async fn points_within_polygon(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<FeatureCollection>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.points_within_polygon(id).await?))
}

/// 包含指定位置的多边形
#[utoipa::path(
    get,
    path = "/api/polygons/contains",
    tag = "polygons",
    params(LocationParams),
    responses(
        (status = 200, description = "包含该位置的多边形", body = FeatureCollection),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn polygons_containing(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<LocationParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.polygons_containing(&params).await?))
}

/// 与查询多边形相交的多边形
///
/// 同时挂载在 `/api/polygons/intersect`。
#[utoipa::path(
    get,
    path = "/api/geo/intersect",
    tag = "geo",
    params(IntersectParams),
    responses(
        (status = 200, description = "相交的多边形", body = FeatureCollection),
        (status = 400, description = "coordinates 不是合法的 JSON"),
        (status = 422, description = "参数校验失败")
    )
)]
pub async fn intersecting_polygons(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<IntersectParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let service = SpatialService::new(state.store);
    Ok(Json(service.intersecting_polygons(&params).await?))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = ApiResponse<HealthResponse>),
        (status = 503, description = "数据库不可用", body = ApiResponse<HealthResponse>)
    )
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let service = SpatialService::new(state.store);
    let (status, code, database) = match service.ping().await {
        Ok(()) => ("healthy", StatusCode::OK, "up"),
        Err(e) => {
            tracing::warn!(error = %e, "健康检查：数据库不可用");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    let health = HealthResponse {
        status: status.to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database: database.to_string(),
    };
    (code, Json(ApiResponse::success(health)))
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态（healthy / degraded）
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 数据库状态（up / down）
    pub database: String,
}
