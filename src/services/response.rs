//! Output side of the website engine.
//!
//! The engine writes status, headers and body bytes into a [`ResponseSink`].
//! Like an HTTP response, a sink may be "started": once body bytes have been
//! handed to the client the status line can no longer change, which is why a
//! backing-store failure part way through a body is best effort only.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use std::io;

#[async_trait]
pub trait ResponseSink: Send {
    fn status(&self) -> StatusCode;

    /// Set the response status. Ignored by sinks that already sent their head.
    fn set_status(&mut self, status: StatusCode);

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Whether body bytes have been emitted.
    fn has_started(&self) -> bool;

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;
}

/// Sink that collects the whole response in memory.
#[cfg(test)]
#[derive(Debug)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[cfg(test)]
impl BufferedResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Default for BufferedResponse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[async_trait]
impl ResponseSink for BufferedResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn has_started(&self) -> bool {
        !self.body.is_empty()
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
