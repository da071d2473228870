use actix_multipart::form::bytes::Bytes;
use actix_multipart::form::text::Text;
use actix_multipart::form::{MultipartForm, MultipartFormConfig};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use pdf_qa_core::DocumentAnalyzer;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub struct AppState {
    static_dir: PathBuf,
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl AppState {
    pub fn new(static_dir: PathBuf, analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self {
            static_dir,
            analyzer,
        }
    }

    fn docs_dir(&self) -> PathBuf {
        self.static_dir.join("docs")
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

#[derive(MultipartForm)]
pub struct UploadForm {
    pdf_file: Bytes,
    filename: Text<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    msg: &'static str,
    pdf_filename: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    pdf_filename: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    status: &'static str,
    output_file: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        MultipartFormConfig::default()
            .total_limit(MAX_UPLOAD_BYTES)
            .memory_limit(MAX_UPLOAD_BYTES),
    )
    .route("/health", web::get().to(health_check))
    .route("/upload", web::post().to(upload_file))
    .route("/analyze", web::post().to(analyze_file))
    .route("/static/{tail:.*}", web::get().to(static_file));
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "success" }))
}

async fn upload_file(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> Result<HttpResponse, ApiError> {
    let file_name = Path::new(form.filename.as_str())
        .file_name()
        .ok_or_else(|| ApiError::BadRequest(format!("invalid filename: {}", *form.filename)))?;

    let docs_dir = state.docs_dir();
    let pdf_filename = docs_dir.join(file_name);

    let saved = async {
        tokio::fs::create_dir_all(&docs_dir).await?;
        tokio::fs::write(&pdf_filename, &form.pdf_file.data).await
    };
    saved.await.map_err(|error| {
        error!(path = %pdf_filename.display(), %error, "upload write failed");
        ApiError::Internal(format!("Error saving file: {error}"))
    })?;

    info!(
        path = %pdf_filename.display(),
        bytes = form.pdf_file.data.len(),
        "pdf uploaded"
    );
    Ok(HttpResponse::Ok().json(UploadResponse {
        msg: "success",
        pdf_filename: pdf_filename.display().to_string(),
    }))
}

async fn analyze_file(
    state: web::Data<AppState>,
    form: web::Form<AnalyzeForm>,
) -> Result<HttpResponse, ApiError> {
    let pdf_path = PathBuf::from(&form.pdf_filename);
    if !tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
        return Err(ApiError::NotFound("PDF file not found".to_string()));
    }

    let report = state.analyzer.analyze(&pdf_path).await.map_err(|error| {
        error!(path = %pdf_path.display(), %error, "analysis failed");
        ApiError::Internal(format!("Analysis failed: {error}"))
    })?;

    Ok(HttpResponse::Ok().json(AnalyzeResponse {
        status: "success",
        output_file: report.output_file.display().to_string(),
    }))
}

async fn static_file(
    state: web::Data<AppState>,
    tail: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let relative = Path::new(tail.as_str());
    let not_found = || ApiError::NotFound("file not found".to_string());

    if relative.as_os_str().is_empty()
        || !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(not_found());
    }

    let path = state.static_dir.join(relative);
    let body = tokio::fs::read(&path).await.map_err(|_| not_found())?;
    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&path))
        .body(body))
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => "text/csv; charset=utf-8",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use pdf_qa_core::{AnalysisReport, DocumentLoadError, PipelineError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const BOUNDARY: &str = "pdfqaboundary";

    #[derive(Default)]
    struct CountingAnalyzer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DocumentAnalyzer for CountingAnalyzer {
        async fn analyze(&self, pdf_path: &Path) -> Result<AnalysisReport, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::DocumentLoad(DocumentLoadError::NoText(
                    pdf_path.to_path_buf(),
                )));
            }
            Ok(AnalysisReport {
                output_file: PathBuf::from("static/output/QA.csv"),
                question_count: 2,
                failed_answers: 0,
            })
        }
    }

    fn state(static_dir: &Path, analyzer: Arc<CountingAnalyzer>) -> web::Data<AppState> {
        web::Data::new(AppState::new(static_dir.to_path_buf(), analyzer))
    }

    fn multipart_body(filename: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"filename\"\r\nContent-Type: text/plain\r\n\r\n{filename}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf_file\"; filename=\"upload.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(filename: &str, bytes: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(filename, bytes))
    }

    #[actix_web::test]
    async fn upload_writes_file_under_docs_dir() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path(), Arc::default()))
                .configure(configure),
        )
        .await;

        let payload = b"%PDF-1.4\n%fake body";
        let response = test::call_service(&app, upload_request("doc.pdf", payload).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(response).await;
        let expected = dir.path().join("docs").join("doc.pdf");
        assert_eq!(body["msg"], "success");
        assert_eq!(body["pdf_filename"], expected.display().to_string());
        assert_eq!(std::fs::read(&expected)?, payload);
        Ok(())
    }

    #[actix_web::test]
    async fn upload_strips_directory_components() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path(), Arc::default()))
                .configure(configure),
        )
        .await;

        let response = test::call_service(&app, upload_request("../../escape.pdf", b"%PDF-1.4").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("docs").join("escape.pdf").exists());
        Ok(())
    }

    #[actix_web::test]
    async fn analyze_missing_file_is_404_without_running_pipeline() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let analyzer = Arc::new(CountingAnalyzer::default());
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path(), analyzer.clone()))
                .configure(configure),
        )
        .await;

        let missing = dir.path().join("docs").join("missing.pdf");
        let request = test::TestRequest::post()
            .uri("/analyze")
            .set_form(vec![("pdf_filename", missing.display().to_string())])
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["detail"], "PDF file not found");
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[actix_web::test]
    async fn analyze_reports_output_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.4")?;
        let analyzer = Arc::new(CountingAnalyzer::default());
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path(), analyzer.clone()))
                .configure(configure),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/analyze")
            .set_form(vec![("pdf_filename", pdf.display().to_string())])
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["output_file"], "static/output/QA.csv");
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[actix_web::test]
    async fn fatal_pipeline_error_is_500_with_detail() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.4")?;
        let analyzer = Arc::new(CountingAnalyzer {
            fail: true,
            ..Default::default()
        });
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path(), analyzer))
                .configure(configure),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/analyze")
            .set_form(vec![("pdf_filename", pdf.display().to_string())])
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(response).await;
        let detail = body["detail"].as_str().unwrap_or_default();
        assert!(detail.starts_with("Analysis failed: "));
        Ok(())
    }

    #[actix_web::test]
    async fn static_route_serves_reports_and_blocks_traversal() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let output = dir.path().join("output");
        std::fs::create_dir_all(&output)?;
        std::fs::write(output.join("QA.csv"), "Question,Answer\n")?;
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path(), Arc::default()))
                .configure(configure),
        )
        .await;

        let request = test::TestRequest::get().uri("/static/output/QA.csv").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = test::read_body(response).await;
        assert_eq!(&body[..], b"Question,Answer\n");

        let request = test::TestRequest::get()
            .uri("/static/output/..%2F..%2Fetc%2Fpasswd")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
