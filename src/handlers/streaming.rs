//! Bridges the website engine's [`ResponseSink`] to an axum streaming body.
//!
//! The engine runs in its own task and writes into a [`StreamingResponse`].
//! Status and headers are held back until the first body write (or until the
//! response is finished), then handed to the waiting handler through a
//! oneshot channel; body bytes flow through an in-memory pipe that the
//! handler exposes as the response body.

use crate::{errors::AppError, services::response::ResponseSink};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use std::io;
use tokio::{
    io::{AsyncWriteExt, DuplexStream},
    sync::oneshot,
};
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Bytes buffered between the engine task and the HTTP connection.
const BODY_PIPE_CAPACITY: usize = 64 * 1024;

type Head = Result<(StatusCode, HeaderMap), AppError>;

/// Engine-side half: a sink whose head is committed on first write.
pub struct StreamingResponse {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body: DuplexStream,
}

/// Handler-side half: resolves to the response once the head is committed.
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body: DuplexStream,
}

pub fn streaming_response() -> (StreamingResponse, PendingResponse) {
    let (writer, reader) = tokio::io::duplex(BODY_PIPE_CAPACITY);
    let (head_tx, head_rx) = oneshot::channel();

    (
        StreamingResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body: writer,
        },
        PendingResponse {
            head_rx,
            body: reader,
        },
    )
}

impl StreamingResponse {
    fn commit(&mut self) {
        if let Some(tx) = self.head_tx.take() {
            let headers = std::mem::take(&mut self.headers);
            // a dropped receiver means the client is gone; the next write reports it
            let _ = tx.send(Ok((self.status, headers)));
        }
    }

    /// Commit the head if nothing was written yet and close the body.
    pub async fn finish(mut self) -> io::Result<()> {
        self.commit();
        self.body.shutdown().await
    }

    /// Report `err` in place of the response. Once the head is committed the
    /// client already has a status line, so the error can only be logged.
    pub fn fail(mut self, err: AppError) {
        match self.head_tx.take() {
            Some(tx) => {
                let _ = tx.send(Err(err));
            }
            None => warn!("response already started, dropping error: {}", err),
        }
    }
}

#[async_trait]
impl ResponseSink for StreamingResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.head_tx.is_none() {
            warn!("status {} ignored: response already started", status);
            return;
        }
        self.status = status;
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn has_started(&self) -> bool {
        self.head_tx.is_none()
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.commit();
        self.body.write_all(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.commit();
        self.body.flush().await
    }
}

impl PendingResponse {
    /// Wait for the engine to commit a head and build the streaming response.
    pub async fn into_response(self) -> Result<Response, AppError> {
        let (status, headers) = self
            .head_rx
            .await
            .map_err(|_| AppError::internal("response task ended without a response"))??;

        let mut response = Response::new(Body::from_stream(ReaderStream::new(self.body)));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
