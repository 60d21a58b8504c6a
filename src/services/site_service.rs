//! SiteService: static website resolution over the blob catalog.
//!
//! A request path is served by trying, in order:
//! 1. the object named by the path (leading `/` removed),
//! 2. the index document below that path,
//! 3. the not-found document, with status 404,
//! 4. a plain-text 404 body.
//!
//! Found objects go through the conditional-GET check, then header
//! composition, then block reassembly into the response sink.

use crate::{
    config::SiteConfig,
    models::object::Object,
    services::{
        assembler::{BodySource, StreamError, StreamStats},
        buffer_pool::BufferPool,
        catalog::{Catalog, CatalogError},
        conditional::{self, Freshness},
        headers::apply_object_headers,
        response::ResponseSink,
    },
};
use axum::http::{HeaderValue, StatusCode, header};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const NOT_FOUND_TEXT: &str = "404 Not Found - No Default 404 Page was found either";

#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

pub type SiteResult<T> = Result<T, SiteError>;

/// How a request ended.
#[derive(Debug)]
pub enum Outcome {
    /// Object streamed with status 200.
    Served { name: String, stats: StreamStats },
    /// Conditional request matched; 304 without a body.
    NotModified { name: String },
    /// Not-found document streamed with status 404.
    NotFoundDocument { name: String, stats: StreamStats },
    /// Nothing matched and no not-found document exists.
    NotFound,
    /// The backing store failed while streaming `name`. When `truncated` is
    /// false nothing had been sent and the response is a plain 500; otherwise
    /// the body already holds part of the object.
    BackingStoreFailed {
        name: String,
        error: StreamError,
        truncated: bool,
    },
}

#[derive(Clone)]
pub struct SiteService {
    catalog: Arc<dyn Catalog>,
    buffers: BufferPool,
    site: SiteConfig,
}

impl SiteService {
    pub fn new(catalog: Arc<dyn Catalog>, buffers: BufferPool, site: SiteConfig) -> Self {
        Self {
            catalog,
            buffers,
            site,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    /// Resolve `request_path` and write the response into `sink`.
    ///
    /// Only catalog outages and sink/OS I/O failures are errors; every other
    /// condition ends in an [`Outcome`] with the status already set on `sink`.
    pub async fn serve<S>(
        &self,
        request_path: &str,
        if_modified_since: Option<&str>,
        sink: &mut S,
    ) -> SiteResult<Outcome>
    where
        S: ResponseSink + ?Sized,
    {
        if let Some(object) = self.lookup(request_path).await? {
            if conditional::evaluate(if_modified_since, object.last_modification_time)
                == Freshness::NotModified
            {
                debug!("`{}` not modified since {:?}", object.name, if_modified_since);
                sink.set_status(StatusCode::NOT_MODIFIED);
                return Ok(Outcome::NotModified { name: object.name });
            }
            return self.write_object(object, sink).await;
        }

        self.write_not_found(sink).await
    }

    /// Exact name first, then the index document below it.
    async fn lookup(&self, request_path: &str) -> SiteResult<Option<Object>> {
        let name = request_path.strip_prefix('/').unwrap_or(request_path);
        if !name.is_empty() {
            if let Some(object) = self.resolve(name).await? {
                return Ok(Some(object));
            }
        }

        let index_name = index_document_name(name, &self.site.index_document);
        debug!("`{}` not found, trying index document `{}`", name, index_name);
        self.resolve(&index_name).await
    }

    async fn resolve(&self, name: &str) -> SiteResult<Option<Object>> {
        Ok(self
            .catalog
            .resolve_object(&self.site.container_name, name)
            .await?)
    }

    async fn write_not_found<S>(&self, sink: &mut S) -> SiteResult<Outcome>
    where
        S: ResponseSink + ?Sized,
    {
        sink.set_status(StatusCode::NOT_FOUND);

        match self.resolve(&self.site.not_found_document).await? {
            Some(document) => match self.write_object(document, sink).await? {
                Outcome::Served { name, stats } => Ok(Outcome::NotFoundDocument { name, stats }),
                other => Ok(other),
            },
            None => {
                debug!("no not-found document `{}`", self.site.not_found_document);
                write_text(sink, NOT_FOUND_TEXT)
                    .await
                    .map_err(StreamError::Sink)?;
                Ok(Outcome::NotFound)
            }
        }
    }

    /// Compose headers and stream the object's body, keeping the status
    /// already set on `sink` unless the backing store fails.
    async fn write_object<S>(&self, object: Object, sink: &mut S) -> SiteResult<Outcome>
    where
        S: ResponseSink + ?Sized,
    {
        apply_object_headers(sink.headers_mut(), &object);

        let segments = self.catalog.list_segments(&object).await?;
        let source = BodySource::select(&object, segments);

        match source.copy_to(&self.buffers, sink).await {
            Ok(stats) => {
                info!(
                    "served `{}` with {} ({} bytes, {} ranges, {} files opened)",
                    object.name,
                    sink.status(),
                    stats.bytes_written,
                    stats.ranges_copied,
                    stats.files_opened
                );
                Ok(Outcome::Served {
                    name: object.name,
                    stats,
                })
            }
            Err(err) if err.is_backing_store() => {
                warn!("streaming `{}` failed: {}", object.name, err);
                let truncated = sink.has_started();
                if truncated {
                    warn!("`{}` response already started; body is truncated", object.name);
                } else {
                    sink.headers_mut().clear();
                }
                sink.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                let message = format!("File backing blocks were not found for '{}'", object.name);
                write_text(sink, &message).await.map_err(StreamError::Sink)?;
                Ok(Outcome::BackingStoreFailed {
                    name: object.name,
                    error: err,
                    truncated,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Name of the index document for a directory-style request.
///
/// The document name is joined with `/` onto the path as requested, so
/// `a/` becomes `a//index.html`. The site root maps to the bare document name.
fn index_document_name(name: &str, index_document: &str) -> String {
    if name.is_empty() {
        index_document.to_string()
    } else {
        format!("{}/{}", name, index_document)
    }
}

async fn write_text<S>(sink: &mut S, text: &str) -> std::io::Result<()>
where
    S: ResponseSink + ?Sized,
{
    if !sink.has_started() {
        sink.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    sink.write_all(text.as_bytes()).await?;
    sink.flush().await
}
