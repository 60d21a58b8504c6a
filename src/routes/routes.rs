//! Defines the routes of the static website emulator.
//!
//! ## Structure
//! - **Probes**
//!   - `GET /healthz`: liveness
//!   - `GET /readyz` : catalog readiness and buffer pool usage
//!
//! - **Website** (fallback, every other path)
//!   - `GET     /{*path}`: resolve and stream the object, index document or 404 page
//!   - `OPTIONS /{*path}`: CORS preflight, 204
//!   - anything else     : 500 "Only GET is supported"
//!
//! Object names may contain any characters, so the website is mounted as the
//! router fallback rather than as a wildcard route.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        site_handlers::serve_site,
    },
    services::site_service::SiteService,
};
use axum::{Router, routing::get};

/// Build and return the router.
///
/// The router carries shared state (`SiteService`) to all handlers.
pub fn routes() -> Router<SiteService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .fallback(serve_site)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        services::{
            buffer_pool::BufferPool,
            catalog::SqliteCatalog,
            test_support::{memory_catalog, object_named, store_object},
        },
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    async fn app() -> (Router, SqliteCatalog, TempDir) {
        let catalog = memory_catalog().await;
        let service = SiteService::new(
            Arc::new(catalog.clone()),
            BufferPool::new(32, 4),
            SiteConfig::default(),
        );
        (routes().with_state(service), catalog, TempDir::new().unwrap())
    }

    async fn send(app: Router, method: Method, uri: &str, ims: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(ims) = ims {
            request = request.header(header::IF_MODIFIED_SINCE, ims);
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn streams_object_with_headers() {
        let (app, catalog, dir) = app().await;
        let mut object = object_named("site/app.js");
        object.content_type = Some("application/javascript".into());
        object.service_metadata = b"CacheControl:max-age=3600\r\n".to_vec();
        // larger than the pool's 32-byte chunks
        let part = "console.log('hello world');\n".repeat(8);
        store_object(&catalog, dir.path(), "blk", object, &[part.as_bytes(), b"//end"]).await;

        let response = send(app, Method::GET, "/site/app.js", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/javascript");
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=3600");
        assert_eq!(headers[header::LAST_MODIFIED], "Tue, 05 03 2024 10:00:00 GMT");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert_eq!(body_string(response).await, format!("{}//end", part));
    }

    #[tokio::test]
    async fn decodes_percent_encoded_paths() {
        let (app, catalog, dir) = app().await;
        store_object(&catalog, dir.path(), "blk", object_named("my page.html"), &[b"spaced"]).await;

        let response = send(app, Method::GET, "/my%20page.html", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "spaced");
    }

    #[tokio::test]
    async fn conditional_get_returns_304() {
        let (app, catalog, dir) = app().await;
        let mut object = object_named("logo.svg");
        object.last_modification_time += Duration::milliseconds(250);
        store_object(&catalog, dir.path(), "blk", object, &[b"<svg/>"]).await;

        let response = send(
            app,
            Method::GET,
            "/logo.svg",
            Some("Tue, 05 03 2024 10:00:00 GMT"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.headers().get(header::LAST_MODIFIED).is_none());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn missing_object_without_404_page() {
        let (app, _catalog, _dir) = app().await;

        let response = send(app, Method::GET, "/nowhere", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_string(response).await,
            "404 Not Found - No Default 404 Page was found either"
        );
    }

    #[tokio::test]
    async fn missing_object_with_404_page() {
        let (app, catalog, dir) = app().await;
        store_object(&catalog, dir.path(), "blk", object_named("404.html"), &[b"<h1>lost</h1>"]).await;

        let response = send(app, Method::GET, "/nowhere", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_string(response).await, "<h1>lost</h1>");
    }

    #[tokio::test]
    async fn unreadable_first_block_is_500() {
        let (app, catalog, dir) = app().await;
        let object = store_object(&catalog, dir.path(), "blk", object_named("x.html"), &[b"abc"]).await;
        std::fs::remove_file(dir.path().join("blk")).unwrap();

        let response = send(app, Method::GET, "/x.html", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(response).await,
            format!("File backing blocks were not found for '{}'", object.name)
        );
    }

    #[tokio::test]
    async fn options_is_no_content() {
        let (app, _catalog, _dir) = app().await;
        let response = send(app, Method::OPTIONS, "/anything", None).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let (app, _catalog, _dir) = app().await;
        let response = send(app, Method::PUT, "/index.html", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Only GET is supported");
    }

    #[tokio::test]
    async fn catalog_outage_is_json_500() {
        let (app, catalog, _dir) = app().await;
        catalog.db.close().await;

        let response = send(app, Method::GET, "/index.html", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], 500);
        assert!(body["error"].as_str().unwrap().contains("catalog unavailable"));
    }

    #[tokio::test]
    async fn probes_report_catalog_state() {
        let (app, catalog, _dir) = app().await;

        let response = send(app.clone(), Method::GET, "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(app.clone(), Method::GET, "/readyz", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["catalog"]["ok"], true);
        assert_eq!(body["buffers"]["outstanding"], 0);

        catalog.db.close().await;
        let response = send(app, Method::GET, "/readyz", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
