//! 空间数据服务模块

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::{
    BatchCreatePointsRequest, BatchCreatePolygonsRequest, CreatePointRequest,
    CreatePolygonRequest, Feature, FeatureCollection, IntersectParams, ListParams,
    LocationParams, RadiusParams, UpdatePointRequest, UpdatePolygonRequest,
};
use validator::Validate;

use crate::store::SpatialStore;

/// 点与多边形的业务逻辑，请求校验后交给存储层执行
pub struct SpatialService {
    store: Arc<dyn SpatialStore>,
}

impl SpatialService {
    /// 创建新的空间服务实例
    pub fn new(store: Arc<dyn SpatialStore>) -> Self {
        Self { store }
    }

    /// 创建点
    pub async fn create_point(&self, req: CreatePointRequest) -> AppResult<Feature> {
        let point = req.into_new_point()?;
        let record = self.store.insert_point(point).await?;
        tracing::info!(id = record.id, name = %record.name, "点已创建");
        Ok(record.into())
    }

    /// 批量创建点，全部成功或全部失败
    pub async fn create_points(&self, req: BatchCreatePointsRequest) -> AppResult<FeatureCollection> {
        let points = req.into_new_points()?;
        let records = self.store.insert_points(points).await?;
        tracing::info!(count = records.len(), "批量点已创建");
        Ok(records.into_iter().map(Feature::from).collect())
    }

    /// 分页列出点
    pub async fn list_points(&self, params: &ListParams) -> AppResult<FeatureCollection> {
        params.validate()?;
        let records = self.store.list_points(params).await?;
        Ok(records.into_iter().map(Feature::from).collect())
    }

    /// 根据 ID 获取点
    pub async fn get_point(&self, id: i64) -> AppResult<Feature> {
        self.store
            .get_point(id)
            .await?
            .map(Feature::from)
            .ok_or(AppError::PointNotFound(id))
    }

    /// 部分更新点
    pub async fn update_point(&self, id: i64, req: UpdatePointRequest) -> AppResult<Feature> {
        let changes = req.into_changes()?;
        let record = self
            .store
            .update_point(id, changes)
            .await?
            .ok_or(AppError::PointNotFound(id))?;
        tracing::info!(id, "点已更新");
        Ok(record.into())
    }

    /// 删除点
    pub async fn delete_point(&self, id: i64) -> AppResult<()> {
        if !self.store.delete_point(id).await? {
            return Err(AppError::PointNotFound(id));
        }
        tracing::info!(id, "点已删除");
        Ok(())
    }

    /// 半径搜索，按距离由近及远排序，结果带 `distance`（米）
    pub async fn search_points_by_radius(&self, params: &RadiusParams) -> AppResult<FeatureCollection> {
        let (centre, radius) = params.resolve()?;
        let hits = self.store.points_within_radius(centre, radius).await?;
        tracing::debug!(
            lon = centre.lon(),
            lat = centre.lat(),
            radius,
            count = hits.len(),
            "半径搜索完成"
        );
        Ok(hits
            .into_iter()
            .map(|(record, distance)| record.into_feature_with_distance(distance))
            .collect())
    }

    /// 多边形内部的点（边界上的点不计入）
    pub async fn points_within_polygon(&self, polygon_id: i64) -> AppResult<FeatureCollection> {
        if self.store.get_polygon(polygon_id).await?.is_none() {
            return Err(AppError::PolygonNotFound(polygon_id));
        }
        let records = self.store.points_within_polygon(polygon_id).await?;
        Ok(records.into_iter().map(Feature::from).collect())
    }

    /// 创建多边形
    pub async fn create_polygon(&self, req: CreatePolygonRequest) -> AppResult<Feature> {
        let polygon = req.into_new_polygon()?;
        let record = self.store.insert_polygon(polygon).await?;
        tracing::info!(id = record.id, name = %record.name, "多边形已创建");
        Ok(record.into())
    }

    /// 批量创建多边形
    pub async fn create_polygons(
        &self,
        req: BatchCreatePolygonsRequest,
    ) -> AppResult<FeatureCollection> {
        let polygons = req.into_new_polygons()?;
        let records = self.store.insert_polygons(polygons).await?;
        tracing::info!(count = records.len(), "批量多边形已创建");
        Ok(records.into_iter().map(Feature::from).collect())
    }

    pub async fn list_polygons(&self, params: &ListParams) -> AppResult<FeatureCollection> {
        params.validate()?;
        let records = self.store.list_polygons(params).await?;
        Ok(records.into_iter().map(Feature::from).collect())
    }

    pub async fn get_polygon(&self, id: i64) -> AppResult<Feature> {
        self.store
            .get_polygon(id)
            .await?
            .map(Feature::from)
            .ok_or(AppError::PolygonNotFound(id))
    }

    pub async fn update_polygon(&self, id: i64, req: UpdatePolygonRequest) -> AppResult<Feature> {
        let changes = req.into_changes()?;
        let record = self
            .store
            .update_polygon(id, changes)
            .await?
            .ok_or(AppError::PolygonNotFound(id))?;
        tracing::info!(id, "多边形已更新");
        Ok(record.into())
    }

    pub async fn delete_polygon(&self, id: i64) -> AppResult<()> {
        if !self.store.delete_polygon(id).await? {
            return Err(AppError::PolygonNotFound(id));
        }
        tracing::info!(id, "多边形已删除");
        Ok(())
    }

    /// 与查询多边形相交（含接触）的多边形
    pub async fn intersecting_polygons(&self, params: &IntersectParams) -> AppResult<FeatureCollection> {
        let ring = params.resolve()?;
        let records = self.store.polygons_intersecting(&ring).await?;
        Ok(records.into_iter().map(Feature::from).collect())
    }

    /// 包含给定位置的多边形
    pub async fn polygons_containing(&self, params: &LocationParams) -> AppResult<FeatureCollection> {
        let location = params.resolve()?;
        let records = self.store.polygons_containing(location).await?;
        Ok(records.into_iter().map(Feature::from).collect())
    }

    /// 检查存储是否可达
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> SpatialService {
        SpatialService::new(Arc::new(MemoryStore::new()))
    }

    fn point_req(name: &str, lon: f64, lat: f64) -> CreatePointRequest {
        serde_json::from_value(json!({"name": name, "coordinates": [lon, lat]})).unwrap()
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let service = service();
        assert!(matches!(service.get_point(1).await, Err(AppError::PointNotFound(1))));
        assert!(matches!(service.delete_polygon(2).await, Err(AppError::PolygonNotFound(2))));
        assert!(matches!(
            service.points_within_polygon(3).await,
            Err(AppError::PolygonNotFound(3))
        ));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let service = service();
        let feature = service.create_point(point_req("tmp", 1.0, 1.0)).await.unwrap();
        service.delete_point(feature.id).await.unwrap();
        assert!(matches!(
            service.get_point(feature.id).await,
            Err(AppError::PointNotFound(_))
        ));
    }

    #[tokio::test]
    async fn radius_results_carry_distance() {
        let service = service();
        service.create_point(point_req("centre", 0.0, 0.0)).await.unwrap();

        let params = RadiusParams {
            lon: 0.0,
            lat: 0.0,
            radius: 10.0,
        };
        let collection = service.search_points_by_radius(&params).await.unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.features[0].properties.distance, Some(0.0));
    }

    #[tokio::test]
    async fn invalid_list_limit_is_rejected() {
        let params = ListParams {
            limit: 5000,
            ..Default::default()
        };
        assert!(matches!(
            service().list_points(&params).await,
            Err(AppError::InvalidFields(_))
        ));
    }
}
