//! HTTP handlers for browsing and downloading code archives.
//! Archive bodies are streamed from disk; tree and file lookups are
//! delegated to `CodeService`.

use crate::{
    errors::AppError,
    models::{archive::ArchiveRef, tree::TreeNode},
    services::code_service::CodeService,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::Metadata;
use tokio_util::io::ReaderStream;

/// Header carrying the inferred language of a served file.
pub const LANGUAGE_HEADER: HeaderName = HeaderName::from_static("x-code-language");

/// Body of `GET /api/code/{key}/structure`.
#[derive(Debug, Serialize)]
pub struct StructureResponse {
    pub files: Vec<TreeNode>,
}

/// `GET /api/code/{key}/structure` — file tree of the item's archive.
pub async fn get_structure(
    State(service): State<CodeService>,
    Path(item_key): Path<String>,
) -> Result<Json<StructureResponse>, AppError> {
    let files = service.get_structure(&item_key).await?;
    Ok(Json(StructureResponse { files }))
}

/// `GET /api/code/{key}/file/{*path}` — raw content of one file.
pub async fn get_file_content(
    State(service): State<CodeService>,
    Path((item_key, file_path)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let content = service.get_file_content(&item_key, &file_path).await?;

    let mut response = Response::new(Body::from(content.bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content.language.content_type()),
    );
    headers.insert(
        LANGUAGE_HEADER,
        HeaderValue::from_static(content.language.as_str()),
    );
    Ok(response)
}

/// `GET /api/code/{key}/download` — the stored archive, byte for byte.
pub async fn download_archive(
    State(service): State<CodeService>,
    Path(archive_key): Path<String>,
) -> Result<Response, AppError> {
    let (archive, file, metadata) = service.open_archive(&archive_key).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_archive_headers(response.headers_mut(), &archive, &metadata);

    Ok(response)
}

fn set_archive_headers(headers: &mut HeaderMap, archive: &ArchiveRef, metadata: &Metadata) {
    let content_type = match archive_extension(archive).as_deref() {
        Some("zip") => "application/zip",
        Some("gz" | "tgz") => "application/gzip",
        Some("tar") => "application/x-tar",
        _ => "application/octet-stream",
    };
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        archive.file_name.replace(['"', '\\'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    if let Ok(modified) = metadata.modified() {
        let modified: DateTime<Utc> = modified.into();
        if let Ok(value) = HeaderValue::from_str(&modified.to_rfc2822()) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

fn archive_extension(archive: &ArchiveRef) -> Option<String> {
    std::path::Path::new(&archive.file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use crate::{
        config::AppConfig,
        routes::routes::routes,
        services::{catalog::MemoryCatalog, code_service::CodeService},
    };
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::{fs, io::Write, path::Path, sync::Arc};
    use tower::ServiceExt;
    use zip::write::SimpleFileOptions;

    fn app(storage: &Path) -> (Router, CodeService) {
        let mut zip =
            zip::ZipWriter::new(fs::File::create(storage.join("shop-1700.zip")).unwrap());
        for (name, body) in [
            ("src/index.js", &b"console.log('shop');\n"[..]),
            ("src/components/Header.js", &b"export const Header = 1;\n"[..]),
        ] {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();

        let catalog = MemoryCatalog::default()
            .with_item("racket", Some("uploads/shop-1700.zip"))
            .with_item("no-code", None);
        let cfg = AppConfig::for_storage(storage);
        let service = CodeService::new(Arc::new(catalog), &cfg);
        (routes(cfg.request_timeout).with_state(service.clone()), service)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    #[tokio::test]
    async fn structure_endpoint_returns_ordered_tree() {
        let storage = tempfile::tempdir().unwrap();
        let (app, _) = app(storage.path());

        let (status, _, body) = get(app, "/api/code/racket/structure").await;
        assert_eq!(status, StatusCode::OK);

        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({ "files": [{
                "name": "src",
                "type": "folder",
                "path": "src",
                "children": [
                    {
                        "name": "components",
                        "type": "folder",
                        "path": "src/components",
                        "children": [{
                            "name": "Header.js",
                            "type": "file",
                            "path": "src/components/Header.js",
                            "language": "javascript"
                        }]
                    },
                    {
                        "name": "index.js",
                        "type": "file",
                        "path": "src/index.js",
                        "language": "javascript"
                    }
                ]
            }]})
        );
    }

    #[tokio::test]
    async fn concurrent_structure_requests_extract_once() {
        let storage = tempfile::tempdir().unwrap();
        let (app, service) = app(storage.path());

        let (a, b) = tokio::join!(
            get(app.clone(), "/api/code/racket/structure"),
            get(app, "/api/code/racket/structure"),
        );

        assert_eq!(a.0, StatusCode::OK);
        assert_eq!(a.2, b.2);
        assert_eq!(service.extractions().decompressions(), 1);
    }

    #[tokio::test]
    async fn file_endpoint_serves_bytes_with_language() {
        let storage = tempfile::tempdir().unwrap();
        let (app, _) = app(storage.path());

        let (status, headers, body) = get(app, "/api/code/racket/file/src/index.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"console.log('shop');\n");
        assert_eq!(headers["x-code-language"], "javascript");
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "text/javascript; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn file_endpoint_rejects_traversal() {
        let storage = tempfile::tempdir().unwrap();
        fs::write(storage.path().join("secret.txt"), b"nope").unwrap();
        let (app, _) = app(storage.path());

        let (status, _, body) = get(app, "/api/code/racket/file/..%2F..%2Fsecret.txt").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!String::from_utf8_lossy(&body).contains("nope"));
    }

    #[tokio::test]
    async fn missing_file_and_item_are_404() {
        let storage = tempfile::tempdir().unwrap();
        let (app, service) = app(storage.path());

        let (status, _, _) = get(app.clone(), "/api/code/racket/file/src/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = get(app, "/api/code/no-code/structure").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], 404);
        assert_eq!(service.extractions().decompressions(), 1);
    }

    #[tokio::test]
    async fn download_streams_original_archive() {
        let storage = tempfile::tempdir().unwrap();
        let (app, _) = app(storage.path());
        let stored = fs::read(storage.path().join("shop-1700.zip")).unwrap();

        let (status, headers, body) = get(app, "/api/code/shop-1700.zip/download").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, stored);
        assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shop-1700.zip\""
        );
    }

    #[tokio::test]
    async fn download_of_missing_archive_is_404() {
        let storage = tempfile::tempdir().unwrap();
        let (app, _) = app(storage.path());

        let (status, _, _) = get(app, "/api/code/other.zip/download").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
