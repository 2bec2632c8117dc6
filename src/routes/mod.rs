pub mod health;
pub mod model;
pub mod prediction;

pub use health::{health_check, HealthResponse};
pub use model::{model_info, ModelInfoResponse};
pub use prediction::{index, predict_image_file};

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Write};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tower::ServiceExt;
    use tracing::Level;
    use tract_onnx::prelude::tract_ndarray::Array4;

    use crate::config::ServerConfig;
    use crate::error::PredictError;
    use crate::model::{Classifier, Labels, ModelInfo};
    use crate::preprocess::InputSpec;
    use crate::{app, AppState};

    const BOUNDARY: &str = "handsign-test-boundary";

    struct FixedScores {
        scores: Vec<f32>,
        info: ModelInfo,
    }

    impl Classifier for FixedScores {
        fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, PredictError> {
            assert_eq!(input.shape(), &[1, 224, 224, 3]);
            Ok(self.scores.clone())
        }

        fn info(&self) -> &ModelInfo {
            &self.info
        }
    }

    fn state_with(scores: Vec<f32>) -> AppState {
        let classifier = FixedScores {
            scores,
            info: ModelInfo {
                id: "digits".to_string(),
                path: PathBuf::from("model/digits.onnx"),
                size_bytes: 1024,
                input_shape: vec![1, 224, 224, 3],
                num_classes: Some(10),
                loaded_at: Utc::now(),
            },
        };
        AppState::new(Arc::new(classifier), InputSpec::default())
    }

    fn router(scores: Vec<f32>) -> Router {
        app(state_with(scores), &ServerConfig::default())
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 255])))
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    fn upload(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/prediction")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_main_route() {
        let (status, body) = send(router(vec![0.1, 0.9]), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Hand Sign Digit Language Detection"));
        assert!(body.contains(r#"<form action="/prediction""#));
        assert!(body.contains("A webapp to detect a digit using hand sign language."));
        assert!(body.contains("custom.css"));
        assert!(body.contains("bootstrap.min.js"));
        assert!(body.contains("jquery-3.3.1.slim.min.js"));
    }

    #[tokio::test]
    async fn test_prediction_route() {
        let request = upload("file", "test_image.jpg", &jpeg(300, 300));
        let (status, body) = send(router(vec![0.1, 0.9]), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Prediction: 1"));
        assert!(body.contains("Hand Sign Digit Language Detection"));
    }

    #[tokio::test]
    async fn test_prediction_with_labels() {
        let state = state_with(vec![0.0, 0.1, 0.7, 0.2]).with_labels(Labels::parse("zero\none\ntwo\nthree"));
        let request = upload("file", "two.jpg", &jpeg(64, 48));
        let (status, body) = send(app(state, &ServerConfig::default()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Prediction: 2 (two)"));
    }

    #[tokio::test]
    async fn test_non_image_upload() {
        let request = upload("file", "invalid.txt", b"This is not a valid image file");
        let (status, body) = send(router(vec![0.1, 0.9]), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("File cannot be processed."));
    }

    #[tokio::test]
    async fn test_empty_model_output_is_unexpected() {
        let request = upload("file", "test_image.jpg", &jpeg(32, 32));
        let (status, body) = send(router(vec![]), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("An unexpected error occurred: model returned an empty prediction"));
    }

    #[tokio::test]
    async fn test_nan_scores_render_value_error() {
        let request = upload("file", "test_image.jpg", &jpeg(32, 32));
        let (status, body) = send(router(vec![f32::NAN, f32::NAN]), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Value error: model produced only NaN scores"));
    }

    #[tokio::test]
    async fn test_oversize_upload_still_renders() {
        let config = ServerConfig {
            body_limit: 1024,
            ..ServerConfig::default()
        };
        let request = upload("file", "big.jpg", &jpeg(300, 300));
        let (status, body) = send(app(state_with(vec![0.1, 0.9]), &config), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("An unexpected error occurred: upload exceeds the server&#39;s size limit"));
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let request = upload("image", "test_image.jpg", &jpeg(32, 32));
        let (status, body) = send(router(vec![0.1, 0.9]), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("An unexpected error occurred: no multipart field named &#39;file&#39;"));
    }

    #[tokio::test]
    async fn test_non_multipart_body_still_renders() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/prediction")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let (status, body) = send(router(vec![0.1, 0.9]), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("An unexpected error occurred"));
    }

    #[tokio::test]
    async fn test_prediction_route_method() {
        let (status, _) = send(router(vec![0.1, 0.9]), get("/prediction")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health_reports_loaded_model() {
        let (status, body) = send(router(vec![0.1, 0.9]), get("/health")).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["model_id"], "digits");
        assert!(json["model_loaded_at"].is_string());
    }

    #[tokio::test]
    async fn test_model_info() {
        let (status, body) = send(router(vec![0.1, 0.9]), get("/model")).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["model"]["num_classes"], 10);
        assert_eq!(json["input"]["layout"], "nhwc");
        assert_eq!(json["labels"], 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_requests_are_traced_at_info() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (status, _) = send(router(vec![0.1, 0.9]), get("/")).await;
        assert_eq!(status, StatusCode::OK);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("finished processing request"), "{}", output);
    }

    #[tokio::test]
    async fn test_static_stylesheet_is_served() {
        let (status, body) = send(router(vec![0.1, 0.9]), get("/static/css/custom.css")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(".jumbotron"));
    }
}
