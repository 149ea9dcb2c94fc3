use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use spatial_service::{app, store::MemoryStore, AppState};
use tower::ServiceExt;

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (app(AppState::new(store.clone())), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request");

    let resp = app.clone().oneshot(request).await.expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body was not JSON")
    };
    (status, value)
}

/// Percent-encodes a query value.
fn encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

async fn create_point(app: &Router, name: &str, coordinates: [f64; 2]) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/points/",
        Some(json!({"name": name, "coordinates": coordinates})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().expect("feature id")
}

async fn create_polygon(app: &Router, name: &str, coordinates: Value) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/polygons/",
        Some(json!({"name": name, "coordinates": coordinates})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().expect("feature id")
}

fn square(min: f64, max: f64) -> Value {
    json!([[min, min], [min, max], [max, max], [max, min], [min, min]])
}

fn feature_ids(collection: &Value) -> Vec<i64> {
    collection["features"]
        .as_array()
        .expect("features array")
        .iter()
        .map(|f| f["id"].as_i64().expect("feature id"))
        .collect()
}

#[tokio::test]
async fn create_point_returns_feature() {
    let (app, _) = test_app();
    let (status, point) = send(
        &app,
        "POST",
        "/api/points/",
        Some(json!({
            "name": "Test Point",
            "description": "A test point",
            "attributes": {"test": "value"},
            "coordinates": [10.0, 20.0]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(point["type"], "Feature");
    assert_eq!(point["geometry"]["type"], "Point");
    assert_eq!(point["geometry"]["coordinates"], json!([10.0, 20.0]));
    assert_eq!(point["properties"]["name"], "Test Point");
    assert_eq!(point["properties"]["description"], "A test point");
    assert_eq!(point["properties"]["attributes"]["test"], "value");
    assert!(point["properties"]["created_at"].is_string());
}

#[tokio::test]
async fn batch_points_are_created_together() {
    let (app, _) = test_app();
    let (status, result) = send(
        &app,
        "POST",
        "/api/points/batch",
        Some(json!({"points": [
            {"name": "Batch Point 1", "coordinates": [1.0, 1.0]},
            {"name": "Batch Point 2", "coordinates": [2.0, 2.0]}
        ]})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["type"], "FeatureCollection");
    assert_eq!(result["features"].as_array().map(Vec::len), Some(2));
    assert_eq!(result["features"][1]["properties"]["name"], "Batch Point 2");
}

#[tokio::test]
async fn invalid_batch_stores_nothing() {
    let (app, _) = test_app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/points/batch",
        Some(json!({"points": [
            {"name": "fine", "coordinates": [1.0, 1.0]},
            {"name": "broken", "coordinates": [1.0, 100.0]}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list) = send(&app, "GET", "/api/points", None).await;
    assert!(feature_ids(&list).is_empty());
}

#[tokio::test]
async fn list_points_filters_and_limits() {
    let (app, _) = test_app();
    for i in 0..3 {
        create_point(&app, &format!("Test Point {i}"), [i as f64, 0.0]).await;
    }
    create_point(&app, "Other", [0.0, 0.0]).await;

    let (status, all) = send(&app, "GET", "/api/points/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&all).len(), 4);

    let (_, named) = send(&app, "GET", "/api/points/?name=test%20point", None).await;
    let names: Vec<_> = named["features"]
        .as_array()
        .expect("features array")
        .iter()
        .map(|f| f["properties"]["name"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|n| n.contains("Test Point")));

    let (_, limited) = send(&app, "GET", "/api/points/?limit=1", None).await;
    assert_eq!(feature_ids(&limited).len(), 1);

    let (_, skipped) = send(&app, "GET", "/api/points?skip=3", None).await;
    assert_eq!(feature_ids(&skipped).len(), 1);
}

#[tokio::test]
async fn list_limit_out_of_range_is_rejected() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/api/points?limit=0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn get_point_and_missing_point() {
    let (app, _) = test_app();
    let id = create_point(&app, "Test Point", [5.0, 5.0]).await;

    let (status, point) = send(&app, "GET", &format!("/api/points/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(point["id"], id);
    assert_eq!(point["geometry"]["coordinates"], json!([5.0, 5.0]));

    let (status, body) = send(&app, "GET", "/api/points/99999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Point not found");
}

#[tokio::test]
async fn update_point_changes_given_fields() {
    let (app, _) = test_app();
    let id = create_point(&app, "Test Point", [5.0, 5.0]).await;

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/points/{id}"),
        Some(json!({
            "name": "Updated Point",
            "description": "An updated test point",
            "coordinates": [6.0, 6.0],
            "attributes": {"test": "updated value"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["properties"]["name"], "Updated Point");
    assert_eq!(updated["geometry"]["coordinates"], json!([6.0, 6.0]));
    assert_eq!(updated["properties"]["attributes"]["test"], "updated value");

    let (_, partial) = send(
        &app,
        "PUT",
        &format!("/api/points/{id}"),
        Some(json!({"description": "only this"})),
    )
    .await;
    assert_eq!(partial["properties"]["name"], "Updated Point");
    assert_eq!(partial["properties"]["description"], "only this");

    let (status, _) = send(&app, "PUT", "/api/points/99999", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_point_returns_no_content() {
    let (app, _) = test_app();
    let id = create_point(&app, "Doomed", [0.0, 0.0]).await;

    let (status, body) = send(&app, "DELETE", &format!("/api/points/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(&app, "GET", &format!("/api/points/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/api/points/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn radius_search_is_sorted_with_distance() {
    let (app, _) = test_app();
    let far = create_point(&app, "far", [0.0, 0.5]).await;
    let near = create_point(&app, "near", [0.0, 0.1]).await;
    create_point(&app, "outside", [3.0, 3.0]).await;

    let (status, result) = send(
        &app,
        "GET",
        "/api/points/search/radius?lon=0&lat=0&radius=100000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&result), [near, far]);

    let distance = result["features"][0]["properties"]["distance"]
        .as_f64()
        .expect("distance");
    assert!((distance - 11_119.5).abs() < 10.0, "distance was {distance}");
}

#[tokio::test]
async fn radius_search_rejects_bad_input() {
    let (app, _) = test_app();
    let (status, _) = send(
        &app,
        "GET",
        "/api/points/search/radius?lon=0&lat=0&radius=-5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "GET",
        "/api/points/search/radius?lon=200&lat=0&radius=5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_polygon_closes_open_ring() {
    let (app, _) = test_app();
    let (status, polygon) = send(
        &app,
        "POST",
        "/api/polygons",
        Some(json!({
            "name": "Test Polygon",
            "description": "A test polygon",
            "coordinates": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(polygon["type"], "Feature");
    assert_eq!(polygon["geometry"]["type"], "Polygon");
    let ring = polygon["geometry"]["coordinates"][0]
        .as_array()
        .expect("exterior ring");
    assert_eq!(ring.len(), 5);
    assert_eq!(ring.first(), ring.last());
}

#[tokio::test]
async fn polygon_with_two_positions_is_rejected() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/polygons/",
        Some(json!({"name": "line", "coordinates": [[0.0, 0.0], [1.0, 1.0]]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("at least 3 coordinates"));
}

#[tokio::test]
async fn polygon_crud_round() {
    let (app, _) = test_app();
    let (status, batch) = send(
        &app,
        "POST",
        "/api/polygons/batch",
        Some(json!({"polygons": [
            {"name": "Batch Polygon 1", "coordinates": square(0.0, 1.0)},
            {"name": "Batch Polygon 2", "coordinates": square(2.0, 3.0)}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let ids = feature_ids(&batch);
    assert_eq!(ids.len(), 2);

    let (_, named) = send(&app, "GET", "/api/polygons/?name=Polygon%202", None).await;
    assert_eq!(feature_ids(&named), [ids[1]]);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/polygons/{}", ids[0]),
        Some(json!({"name": "Updated Polygon", "coordinates": square(0.0, 2.0)})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["properties"]["name"], "Updated Polygon");
    assert_eq!(updated["geometry"]["coordinates"][0][2], json!([2.0, 2.0]));

    let (status, _) = send(&app, "DELETE", &format!("/api/polygons/{}", ids[0]), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/polygons/{}", ids[0]), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Polygon not found");
}

#[tokio::test]
async fn points_within_polygon() {
    let (app, _) = test_app();
    let polygon = create_polygon(&app, "Area", square(0.0, 10.0)).await;
    let inside = create_point(&app, "inside", [5.0, 5.0]).await;
    let outside = create_point(&app, "outside", [15.0, 15.0]).await;

    let (status, result) = send(&app, "GET", &format!("/api/polygons/{polygon}/points"), None).await;
    assert_eq!(status, StatusCode::OK);
    let found = feature_ids(&result);
    assert!(found.contains(&inside));
    assert!(!found.contains(&outside));

    let (status, _) = send(&app, "GET", "/api/polygons/99999/points", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn intersecting_polygons() {
    let (app, _) = test_app();
    let first = create_polygon(&app, "Polygon 1", square(0.0, 10.0)).await;
    let second = create_polygon(&app, "Polygon 2", square(5.0, 15.0)).await;
    let third = create_polygon(&app, "Polygon 3", square(20.0, 30.0)).await;

    let query = encode(&square(7.0, 12.0).to_string());
    for base in ["/api/geo/intersect", "/api/polygons/intersect"] {
        let (status, result) = send(&app, "GET", &format!("{base}?coordinates={query}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let found = feature_ids(&result);
        assert!(found.contains(&first));
        assert!(found.contains(&second));
        assert!(!found.contains(&third));
    }
}

#[tokio::test]
async fn malformed_intersect_coordinates_are_bad_request() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/api/geo/intersect?coordinates=invalid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn polygons_containing_location() {
    let (app, _) = test_app();
    let big = create_polygon(&app, "big", square(0.0, 10.0)).await;
    let small = create_polygon(&app, "small", square(4.0, 6.0)).await;
    create_polygon(&app, "elsewhere", square(20.0, 30.0)).await;

    let (status, result) = send(&app, "GET", "/api/polygons/contains?lon=5&lat=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&result), [big, small]);
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/api/points/", Some(json!({"invalid": "data"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, "POST", "/api/polygons/", Some(json!({"invalid": "data"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "POST",
        "/api/points",
        Some(json!({"name": "Far", "coordinates": [181.0, 0.0]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["meta"]["service"], "spatial-service");
}

#[tokio::test]
async fn malformed_requests_use_the_error_envelope() {
    let (app, _) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/points")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let resp = app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let request = Request::builder()
        .method("POST")
        .uri("/api/points")
        .body(Body::from("name=x"))
        .unwrap();
    let resp = app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(&app, "GET", "/api/points?skip=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(&app, "GET", "/api/points/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["meta"]["service"], "spatial-service");
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let (app, _) = test_app();
    let points: Vec<Value> = (0..=1000)
        .map(|i| json!({"name": format!("p{i}"), "coordinates": [0.0, 0.0]}))
        .collect();

    let (status, body) = send(&app, "POST", "/api/points/batch", Some(json!({"points": points}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, list) = send(&app, "GET", "/api/points", None).await;
    assert!(feature_ids(&list).is_empty());
}

#[tokio::test]
async fn health_reports_database_state() {
    let (app, store) = test_app();
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "up");

    store.set_offline(true);
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["database"], "down");
}

#[tokio::test]
async fn unreachable_store_maps_to_503() {
    let (app, store) = test_app();
    store.set_offline(true);
    let (status, body) = send(&app, "GET", "/api/points", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "DATABASE_UNAVAILABLE");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(
        resp.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("abc-123")
    );
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let (app, _) = test_app();
    let (status, doc) = send(&app, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/points/{id}"].is_object());
    assert!(doc["paths"]["/api/geo/intersect"].is_object());
}
