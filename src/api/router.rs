//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layers (outermost → innermost): CORS → `Cache-Control: no-store` →
//! request logging → handler.

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::error::ApiError;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/status/scan", get(endpoints::status::scan))
        .route("/status/backend", get(endpoints::status::backend))
        .route("/status/system", get(endpoints::status::system))
        .route("/status/metrics", get(endpoints::status::metrics))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/predictions",
            get(endpoints::predictions::list).post(endpoints::predictions::create),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .fallback(route_not_found)
        // Innermost first, outermost last
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::repository::test_support::{make_patient, temp_database};
    use crate::db::{self, Database};
    use crate::models::ScanRecord;
    use crate::prediction::mock::MockPredictionBackend;

    fn test_core(backend: MockPredictionBackend) -> (Arc<CoreState>, tempfile::TempDir) {
        let (db, tmp) = temp_database();
        let config = Config {
            prediction_url: "http://127.0.0.1:9".into(),
            db_path: db.path().to_path_buf(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        };
        (Arc::new(CoreState::new(config, db, Arc::new(backend))), tmp)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(core: &Arc<CoreState>, req: Request<Body>) -> (StatusCode, Value) {
        let response = api_router(core.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn seed_processing_scan(db: &Database, session_id: &str) {
        let conn = db.connect().unwrap();
        let patient = make_patient(&conn, "ana@example.com");
        let mut scan = ScanRecord::new_processing(patient.id, session_id.into(), None);
        scan.created_at = Utc::now();
        db::insert_scan(&conn, &scan).unwrap();
    }

    fn registration(email: &str) -> Value {
        json!({
            "firstName": "Ana",
            "lastName": "Lima",
            "email": email,
            "phone": "+1 555 0100",
            "dateOfBirth": "1990-04-12",
            "gender": "female"
        })
    }

    #[tokio::test]
    async fn health_returns_envelope_and_no_store() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let response = api_router(core).oneshot(get_request("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (status, json) = send(&core, get_request("/api/nothing-here")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn scan_status_requires_a_key() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (status, json) = send(&core, get_request("/api/status/scan")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn scan_status_unknown_session_is_404() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (status, _) = send(&core, get_request("/api/status/scan?sessionId=BG00000000")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scan_status_reconciles_completed_scan() {
        let backend = MockPredictionBackend::unreachable().with_status(json!({
            "status": "completed",
            "blood_group": "O-",
            "confidence": 94,
            "processing_time": 3
        }));
        let (core, _tmp) = test_core(backend);
        seed_processing_scan(&core.db, "BG12345678");

        let (status, json) =
            send(&core, get_request("/api/status/scan?sessionId=BG12345678")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &json["data"];
        assert_eq!(data["status"], "completed");
        assert_eq!(data["bloodGroup"], "O-");
        assert_eq!(data["confidence"], 94.0);
        assert_eq!(data["patient"]["name"], "Ana Lima");
        assert!(data["processingDetails"].is_null());
    }

    #[tokio::test]
    async fn backend_status_reports_unhealthy_service() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (status, json) = send(&core, get_request("/api/status/backend")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "unhealthy");
        assert!(json["data"]["error"].is_string());
    }

    #[tokio::test]
    async fn system_status_is_degraded_without_service() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (status, json) = send(&core, get_request("/api/status/system")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["system"]["status"], "degraded");
        assert_eq!(json["data"]["statistics"]["totalScans"], 0);
    }

    #[tokio::test]
    async fn metrics_fallback_is_200_with_success_false() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (status, json) = send(&core, get_request("/api/status/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["apiVersion"], "Unknown");
    }

    #[tokio::test]
    async fn patient_registration_and_conflict() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());

        let (status, json) = send(
            &core,
            post_json("/api/patients", &registration("ana@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["firstName"], "Ana");
        assert_eq!(json["data"]["dateOfBirth"], "1990-04-12");

        let (status, json) = send(
            &core,
            post_json("/api/patients", &registration("ana@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn patient_registration_rejects_bad_input() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());

        let mut bad_gender = registration("ana@example.com");
        bad_gender["gender"] = json!("robot");
        let (status, _) = send(&core, post_json("/api/patients", &bad_gender)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) =
            send(&core, post_json("/api/patients", &json!({"firstName": "Ana"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn patient_listing_paginates_and_validates_limit() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            let (status, _) = send(&core, post_json("/api/patients", &registration(email))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, json) = send(&core, get_request("/api/patients?limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["pagination"]["total"], 3);
        assert_eq!(json["pagination"]["hasMore"], true);

        let (status, _) = send(&core, get_request("/api/patients?limit=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&core, get_request("/api/patients?offset=-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn prediction_with_unreachable_service_is_502() {
        let (core, _tmp) = test_core(MockPredictionBackend::unreachable());
        let (_, created) = send(
            &core,
            post_json("/api/patients", &registration("ana@example.com")),
        )
        .await;
        let patient_id = created["data"]["id"].as_str().unwrap().to_string();

        let submission = json!({
            "patientId": patient_id,
            "fingerprintData": {
                "imageData": "ZmluZ2VycHJpbnQ=",
                "quality": 88,
                "timestamp": "2026-10-18T09:00:00Z"
            }
        });
        let (status, json) = send(&core, post_json("/api/predictions", &submission)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "UPSTREAM_UNAVAILABLE");

        let (status, json) = send(
            &core,
            get_request(&format!("/api/predictions?patientId={patient_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["data"][0]["status"], "failed");
    }

    #[tokio::test]
    async fn prediction_is_created_with_metadata() {
        let backend = MockPredictionBackend::unreachable().with_submit(json!({
            "status": "completed",
            "blood_group": "B-",
            "confidence": 91,
            "processing_time": 1.5
        }));
        let (core, _tmp) = test_core(backend);
        let (_, created) = send(
            &core,
            post_json("/api/patients", &registration("ana@example.com")),
        )
        .await;

        let submission = json!({
            "patientId": created["data"]["id"],
            "fingerprintData": {
                "imageData": "ZmluZ2VycHJpbnQ=",
                "quality": 70,
                "timestamp": "2026-10-18T09:00:00Z"
            }
        });
        let (status, json) = send(&core, post_json("/api/predictions", &submission)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["bloodGroup"], "B-");
        assert_eq!(json["data"]["apiMetadata"]["algorithmVersion"], "1.0");
        assert_eq!(json["data"]["apiMetadata"]["qualityScore"], 70.0);
        assert_eq!(json["data"]["apiMetadata"]["modelAccuracy"], 98.5);
    }
}
