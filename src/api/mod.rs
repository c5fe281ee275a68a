pub mod handlers;
pub mod types;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::ScoringPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: ScoringPipeline,
}

pub fn router(pipeline: ScoringPipeline, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    pipeline: ScoringPipeline,
    host: &str,
    port: u16,
    max_upload_bytes: usize,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> eyre::Result<()> {
    let app = router(pipeline, max_upload_bytes);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyModel, FitParams};
    use crate::config::ServingConfig;
    use crate::features::{FeatureMatrix, FeatureSchema, FeatureSet};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pulseguard-test-boundary";

    fn test_router() -> Router {
        // Everyday spends: log amounts around 3-4, spread over the week and year.
        let rows: Vec<Vec<f64>> = (0..300)
            .map(|i| {
                let dow = (i % 7) as f64;
                vec![
                    (20.0 + (i * 13 % 60) as f64).ln_1p(),
                    if dow >= 5.0 { 1.0 } else { 0.0 },
                    dow,
                    (i % 12 + 1) as f64,
                ]
            })
            .collect();
        let matrix = FeatureMatrix::from_rows(FeatureSchema::spending(), &rows).unwrap();
        let params = FitParams {
            n_estimators: 50,
            ..Default::default()
        };
        let model = AnomalyModel::fit(&matrix, FeatureSet::Spending, &params).unwrap();
        let pipeline = ScoringPipeline::new(Arc::new(model), &ServingConfig::default());
        router(pipeline, 1024 * 1024)
    }

    fn multipart_request(field: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"tx.csv\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = field,
            c = content
        );
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_home() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "PulseGuard API is running");
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"]["feature_set"], "spending");
        assert_eq!(body["model"]["features"][0], "log_amount");
        assert_eq!(body["model"]["training_rows"], 300);
    }

    #[tokio::test]
    async fn test_predict_without_multipart() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .body(Body::from("Transaction Date,Total Spent\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Upload a CSV with 'file' field");
    }

    #[tokio::test]
    async fn test_predict_wrong_field_name() {
        let response = test_router()
            .oneshot(multipart_request("upload", "Transaction Date,Total Spent\n2024-01-06,5\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_scores_upload() {
        let csv = "Transaction Date,Total Spent,Category\n\
                   2024-01-06,35,Food\n\
                   2024-01-08,-5,Refund\n\
                   not-a-date,50,Food\n\
                   2024-02-14,48000,Jewelry\n\
                   2024-03-01,42,Bills\n";
        let response = test_router()
            .oneshot(multipart_request("file", csv))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_transactions"], 3);
        let anomalies = body["anomalies"].as_array().unwrap();
        assert_eq!(body["anomalies_found"].as_u64().unwrap() as usize, anomalies.len());
        for anomaly in anomalies {
            assert_eq!(anomaly["is_anomaly"], 1);
            assert!(anomaly["anomaly_score"].as_f64().unwrap() < 0.0);
            assert!(anomaly["Transaction Date"].is_string());
        }
    }

    #[tokio::test]
    async fn test_predict_missing_column() {
        let response = test_router()
            .oneshot(multipart_request("file", "Date,Spent\n2024-01-06,5\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("Transaction Date"));
    }
}
