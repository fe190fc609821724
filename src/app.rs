//! Router assembly: route table, access middleware, and shared state layers.

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Method;
use axum::routing::get;
use axum::{Router, middleware};
use std::sync::Arc;

use crate::access::access_middleware;
use crate::authz::NamespaceRegistry;
use crate::files;
use crate::http::build_cors_layer;
use crate::storage::SharedStorage;

/// Builds the application router.
///
/// Route table:
///   GET    /{ns}        — list namespace         (read)
///   DELETE /{ns}        — delete namespace       (write)
///   GET    /{ns}/{file} — fetch file             (read)
///   POST   /{ns}/{file} — upload file            (write)
///   DELETE /{ns}/{file} — delete file            (write)
pub fn build_app(
    storage: SharedStorage,
    registry: Arc<dyn NamespaceRegistry>,
    cors_origins: Option<&str>,
) -> Router {
    Router::new()
        .route(
            "/{ns}",
            get(files::list_namespace)
                .delete(files::delete_namespace)
                .layer(build_cors_layer(
                    cors_origins,
                    &[Method::GET, Method::DELETE],
                )),
        )
        .route(
            "/{ns}/{file}",
            get(files::fetch_file)
                .post(files::upload_file)
                .delete(files::delete_file)
                // the backend enforces the configured upload ceiling itself
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(build_cors_layer(
                    cors_origins,
                    &[Method::GET, Method::POST, Method::DELETE],
                )),
        )
        .layer(middleware::from_fn(access_middleware))
        .layer(Extension(storage))
        .layer(Extension(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    use crate::authz::{AccessLevel, RegistryError};
    use crate::localfs::LocalStorage;
    use crate::storage::Storage;

    const READER: &str = "Bearer reader-token";
    const ADMIN: &str = "Bearer admin-token";

    /// Registry resolving access purely from the bearer token.
    struct MockRegistry {
        levels: HashMap<String, AccessLevel>,
    }

    impl MockRegistry {
        fn with_defaults() -> Self {
            let mut levels = HashMap::new();
            levels.insert(READER.to_string(), AccessLevel::READ);
            levels.insert(ADMIN.to_string(), AccessLevel::ADMIN);
            Self { levels }
        }
    }

    #[async_trait]
    impl NamespaceRegistry for MockRegistry {
        async fn get(
            &self,
            _ns: &str,
            bearer: &str,
        ) -> Result<Option<AccessLevel>, RegistryError> {
            Ok(self.levels.get(bearer).copied())
        }
    }

    /// Registry remembering which namespaces it was asked about.
    struct RecordingRegistry {
        queried: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NamespaceRegistry for RecordingRegistry {
        async fn get(
            &self,
            ns: &str,
            _bearer: &str,
        ) -> Result<Option<AccessLevel>, RegistryError> {
            self.queried.lock().expect("lock").push(ns.to_string());
            Ok(Some(AccessLevel::READ))
        }
    }

    /// Registry whose every call fails at the transport level.
    struct BrokenRegistry {
        timed_out: bool,
    }

    #[async_trait]
    impl NamespaceRegistry for BrokenRegistry {
        async fn get(
            &self,
            _ns: &str,
            _bearer: &str,
        ) -> Result<Option<AccessLevel>, RegistryError> {
            if self.timed_out {
                Err(RegistryError::Timeout)
            } else {
                Err(RegistryError::Transport("connection refused".into()))
            }
        }
    }

    fn make_app_with(
        registry: Arc<dyn NamespaceRegistry>,
        limit: u64,
    ) -> (tempfile::TempDir, SharedStorage, Router) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("storage");
        std::fs::create_dir_all(&root).expect("create storage root");
        let mut local = LocalStorage::new(root);
        local.set_limit(limit);
        let storage: SharedStorage = Arc::new(local);
        let app = build_app(storage.clone(), registry, None);
        (temp, storage, app)
    }

    fn make_app() -> (tempfile::TempDir, SharedStorage, Router) {
        make_app_with(Arc::new(MockRegistry::with_defaults()), 0)
    }

    fn multipart_request(uri: &str, field: &str, content: &[u8], bearer: &str) -> Request<Body> {
        let boundary = "nsfs-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; \
                 name=\"{field}\"; filename=\"upload.bin\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::AUTHORIZATION, bearer)
            .body(Body::from(body))
            .expect("request")
    }

    fn simple_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, bearer);
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn unauthenticated_file_get_is_public() {
        let (_temp, storage, app) = make_app();
        storage.upload("ns", "hello.txt", b"hi").await.expect("seed");

        let response = app
            .oneshot(simple_request("GET", "/ns/hello.txt", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"hi");
    }

    #[tokio::test]
    async fn unauthenticated_listing_is_forbidden() {
        let (_temp, storage, app) = make_app();
        storage.upload("ns", "hello.txt", b"hi").await.expect("seed");

        let response = app
            .oneshot(simple_request("GET", "/ns", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn fetch_missing_file_is_not_found() {
        let (_temp, _storage, app) = make_app();

        let response = app
            .oneshot(simple_request("GET", "/ns/ghost.txt", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetch_detects_content_type() {
        let (_temp, storage, app) = make_app();
        storage.upload("ns", "page.html", b"<html></html>").await.expect("seed");

        let response = app
            .oneshot(simple_request("GET", "/ns/page.html", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        assert_eq!(content_type, "text/html");
    }

    #[tokio::test]
    async fn read_token_lists_but_cannot_write() {
        let (_temp, storage, app) = make_app();
        storage.upload("ns", "doc.txt", b"content").await.expect("seed");

        let response = app
            .clone()
            .oneshot(simple_request("GET", "/ns", Some(READER)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let listing: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).expect("json");
        assert_eq!(listing["files"][0]["name"], "doc.txt");
        assert_eq!(listing["files"][0]["size"], 7);

        let response = app
            .clone()
            .oneshot(multipart_request("/ns/new.txt", "file", b"x", READER))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(simple_request("DELETE", "/ns/doc.txt", Some(READER)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_token_uploads_and_deletes() {
        let (_temp, _storage, app) = make_app();

        let response = app
            .clone()
            .oneshot(multipart_request("/ns/data.bin", "file", b"payload", ADMIN))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(simple_request("GET", "/ns/data.bin", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"payload");

        let response = app
            .clone()
            .oneshot(simple_request("DELETE", "/ns/data.bin", Some(ADMIN)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(simple_request("GET", "/ns/data.bin", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_token_deletes_namespace() {
        let (_temp, storage, app) = make_app();
        storage.upload("ns", "a.txt", b"a").await.expect("seed");

        let response = app
            .clone()
            .oneshot(simple_request("DELETE", "/ns", Some(ADMIN)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(simple_request("DELETE", "/ns", Some(ADMIN)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_token_is_forbidden() {
        let (_temp, storage, app) = make_app();
        storage.upload("ns", "doc.txt", b"content").await.expect("seed");

        let response = app
            .oneshot(simple_request("GET", "/ns/doc.txt", Some("Bearer stranger")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn upload_without_file_field_writes_nothing() {
        let (_temp, storage, app) = make_app();

        let response = app
            .oneshot(multipart_request("/ns/new.txt", "attachment", b"x", ADMIN))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = String::from_utf8(body_bytes(response).await).expect("utf8");
        assert!(body.contains("file"), "body should name the missing field: {body}");

        let result = storage.fetch("ns", "new.txt").await;
        assert!(result.is_err(), "no backend write may have happened");
    }

    #[tokio::test]
    async fn upload_over_limit_reports_diagnostics() {
        let (_temp, _storage, app) =
            make_app_with(Arc::new(MockRegistry::with_defaults()), 4);

        let response = app
            .oneshot(multipart_request("/ns/big.bin", "file", b"0123456789", ADMIN))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = String::from_utf8(body_bytes(response).await).expect("utf8");
        assert!(body.contains("10 bytes"), "body: {body}");
        assert!(body.contains("limit is 4"), "body: {body}");
    }

    #[tokio::test]
    async fn listing_auto_provisions_namespace() {
        let (_temp, _storage, app) = make_app();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(simple_request("GET", "/brand-new", Some(READER)))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            let listing: serde_json::Value =
                serde_json::from_slice(&body_bytes(response).await).expect("json");
            assert_eq!(listing["files"].as_array().map(Vec::len), Some(0));
        }
    }

    #[tokio::test]
    async fn registry_outage_degrades_the_request() {
        let (_temp, _storage, app) =
            make_app_with(Arc::new(BrokenRegistry { timed_out: false }), 0);
        let response = app
            .oneshot(simple_request("GET", "/ns", Some(READER)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let (_temp, _storage, app) =
            make_app_with(Arc::new(BrokenRegistry { timed_out: true }), 0);
        let response = app
            .oneshot(simple_request("GET", "/ns", Some(READER)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn encoded_namespace_is_decoded_before_lookup() {
        let registry = Arc::new(RecordingRegistry {
            queried: std::sync::Mutex::new(Vec::new()),
        });
        let (_temp, _storage, app) = make_app_with(registry.clone(), 0);

        let response = app
            .oneshot(simple_request("GET", "/my%20ns", Some(READER)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let queried = registry.queried.lock().expect("lock").clone();
        assert_eq!(queried, vec!["my ns".to_string()]);
    }

    async fn preflight_methods(app: Router, uri: &str, requested: &str) -> String {
        let request = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, requested)
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string()
    }

    #[tokio::test]
    async fn preflight_reports_per_route_methods() {
        let (_temp, _storage, app) = make_app();

        let methods = preflight_methods(app.clone(), "/ns/file.txt", "POST").await;
        assert!(methods.contains("GET"), "allow-methods: {methods}");
        assert!(methods.contains("POST"), "allow-methods: {methods}");
        assert!(methods.contains("DELETE"), "allow-methods: {methods}");

        let methods = preflight_methods(app, "/ns", "DELETE").await;
        assert!(methods.contains("GET"), "allow-methods: {methods}");
        assert!(methods.contains("DELETE"), "allow-methods: {methods}");
        assert!(!methods.contains("POST"), "allow-methods: {methods}");
    }
}
