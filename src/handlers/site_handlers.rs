//! Catch-all website handler.
//!
//! Every request that is not a probe lands here. GET requests are resolved by
//! [`SiteService`] and streamed; OPTIONS answers the CORS preflight; other
//! methods are rejected. All responses allow cross-origin GETs.

use crate::{
    errors::AppError,
    handlers::streaming::streaming_response,
    services::{
        assembler::StreamError,
        response::ResponseSink,
        site_service::{Outcome, SiteError, SiteService},
    },
};
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::borrow::Cow;
use tracing::{debug, error};

/// Any method on any path not claimed by another route.
pub async fn serve_site(
    State(service): State<SiteService>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut response = match method {
        Method::GET => {
            let if_modified_since = headers
                .get(header::IF_MODIFIED_SINCE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            match get_object(service, request_path(&uri), if_modified_since).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            }
        }
        Method::OPTIONS => StatusCode::NO_CONTENT.into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Only GET is supported").into_response(),
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Percent-decoded request path; undecodable paths are used as sent.
fn request_path(uri: &Uri) -> String {
    let raw = uri.path();
    urlencoding::decode(raw)
        .unwrap_or(Cow::Borrowed(raw))
        .into_owned()
}

/// Run the engine in its own task and answer as soon as it commits a head.
async fn get_object(
    service: SiteService,
    path: String,
    if_modified_since: Option<String>,
) -> Result<Response, AppError> {
    let (mut sink, pending) = streaming_response();

    tokio::spawn(async move {
        match service
            .serve(&path, if_modified_since.as_deref(), &mut sink)
            .await
        {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Served { name, stats } => {
                        debug!("`{}` -> `{}` ({} bytes)", path, name, stats.bytes_written)
                    }
                    Outcome::NotModified { name } => debug!("`{}` -> `{}` not modified", path, name),
                    Outcome::NotFoundDocument { name, stats } => {
                        debug!("`{}` not found, sent `{}` ({} bytes)", path, name, stats.bytes_written)
                    }
                    Outcome::NotFound => debug!("`{}` not found", path),
                    Outcome::BackingStoreFailed {
                        name,
                        error,
                        truncated: true,
                    } => debug!("`{}` -> `{}` truncated: {}", path, name, error),
                    Outcome::BackingStoreFailed { name, error, .. } => {
                        debug!("`{}` -> `{}` failed before any body: {}", path, name, error)
                    }
                }
                if let Err(err) = sink.finish().await {
                    debug!("client went away while finishing `{}`: {}", path, err);
                }
            }
            Err(SiteError::Stream(StreamError::Sink(err))) => {
                debug!("client went away while streaming `{}`: {}", path, err);
            }
            Err(err) => {
                error!("serving `{}` failed: {}", path, err);
                if sink.has_started() {
                    // status already sent; closing the body is all that is left
                    let _ = sink.finish().await;
                } else {
                    sink.fail(err.into());
                }
            }
        }
    });

    pending.into_response().await
}
