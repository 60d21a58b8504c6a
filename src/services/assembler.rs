//! Segment stream assembler.
//!
//! Reconstructs an object's content by copying its committed byte ranges out
//! of the backing block files, in catalog order, into a [`ResponseSink`].
//! Consecutive ranges in the same file share one open handle; a change of
//! file closes the previous handle before the next one is opened. Ranges are
//! copied through a buffer borrowed from the shared [`BufferPool`], chunk by
//! chunk when a range is larger than the pool's chunk size.

use crate::{
    models::{object::Object, segment::Segment},
    services::{buffer_pool::BufferPool, response::ResponseSink},
};
use std::{
    io::{self, ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tracing::debug;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("backing file `{}` not found", path.display())]
    BackingFileMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backing file `{}` is inconsistent with the catalog: {detail}", path.display())]
    BackingStoreCorrupt { path: PathBuf, detail: String },
    #[error("reading backing file `{}` failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("response sink closed: {0}")]
    Sink(#[source] io::Error),
}

impl StreamError {
    /// Failures caused by the backing store rather than the client or the OS.
    pub fn is_backing_store(&self) -> bool {
        matches!(
            self,
            StreamError::BackingFileMissing { .. } | StreamError::BackingStoreCorrupt { .. }
        )
    }
}

/// Counters describing one reconstruction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub bytes_written: u64,
    pub files_opened: usize,
    pub ranges_copied: usize,
}

/// A validated byte range inside a backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub file_path: PathBuf,
    pub start_offset: u64,
    pub length: u64,
}

impl TryFrom<&Segment> for ByteRange {
    type Error = StreamError;

    fn try_from(segment: &Segment) -> Result<Self, Self::Error> {
        let file_path = PathBuf::from(&segment.file_path);
        let (Ok(start_offset), Ok(length)) = (
            u64::try_from(segment.start_offset),
            u64::try_from(segment.length),
        ) else {
            return Err(StreamError::BackingStoreCorrupt {
                path: file_path,
                detail: format!(
                    "block `{}` has offset {} and length {}",
                    segment.block_id, segment.start_offset, segment.length
                ),
            });
        };
        Ok(Self {
            file_path,
            start_offset,
            length,
        })
    }
}

/// Where an object's bytes come from.
#[derive(Debug, Clone)]
pub enum BodySource {
    /// Committed block list from the catalog.
    Segments(Vec<Segment>),
    /// Object stored as a single whole file.
    File { path: PathBuf, length: i64 },
}

impl BodySource {
    /// Pick the body source for `object`: its committed blocks when there are
    /// any, otherwise its whole-file payload if one is recorded, otherwise an
    /// empty body.
    pub fn select(object: &Object, segments: Vec<Segment>) -> Self {
        if segments.is_empty() && !object.has_block {
            if let Some(path) = object.payload_path() {
                return BodySource::File {
                    path,
                    length: object.content_length,
                };
            }
        }
        BodySource::Segments(segments)
    }

    fn ranges(&self) -> Result<Vec<ByteRange>, StreamError> {
        match self {
            BodySource::Segments(segments) => segments.iter().map(ByteRange::try_from).collect(),
            BodySource::File { path, length } => {
                let length = u64::try_from(*length).map_err(|_| StreamError::BackingStoreCorrupt {
                    path: path.clone(),
                    detail: format!("negative content length {}", length),
                })?;
                Ok(vec![ByteRange {
                    file_path: path.clone(),
                    start_offset: 0,
                    length,
                }])
            }
        }
    }

    /// Copy the whole body into `sink` and flush it.
    pub async fn copy_to<S>(&self, pool: &BufferPool, sink: &mut S) -> Result<StreamStats, StreamError>
    where
        S: ResponseSink + ?Sized,
    {
        let ranges = self.ranges()?;
        stream_ranges(&ranges, pool, sink).await
    }
}

/// Copy `ranges` in order into `sink`, then flush it.
///
/// The open file handle and the borrowed buffer are owned by this future, so
/// they are released on every exit path, including cancellation.
pub async fn stream_ranges<S>(
    ranges: &[ByteRange],
    pool: &BufferPool,
    sink: &mut S,
) -> Result<StreamStats, StreamError>
where
    S: ResponseSink + ?Sized,
{
    let mut stats = StreamStats::default();
    let mut current: Option<(PathBuf, File)> = None;

    for range in ranges {
        let (_, file) = match current.take() {
            Some((path, file)) if path == range.file_path => current.insert((path, file)),
            previous => {
                drop(previous);
                let file = open_backing_file(&range.file_path).await?;
                stats.files_opened += 1;
                current.insert((range.file_path.clone(), file))
            }
        };

        stats.bytes_written += copy_range(file, range, pool, sink).await?;
        stats.ranges_copied += 1;
    }

    drop(current);
    sink.flush().await.map_err(StreamError::Sink)?;
    Ok(stats)
}

async fn open_backing_file(path: &Path) -> Result<File, StreamError> {
    debug!("opening backing file {}", path.display());
    File::open(path).await.map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => StreamError::BackingFileMissing {
            path: path.to_path_buf(),
            source: err,
        },
        _ => StreamError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    })
}

async fn copy_range<S>(
    file: &mut File,
    range: &ByteRange,
    pool: &BufferPool,
    sink: &mut S,
) -> Result<u64, StreamError>
where
    S: ResponseSink + ?Sized,
{
    if range.length == 0 {
        return Ok(0);
    }

    let io_error = |source: io::Error| StreamError::Io {
        path: range.file_path.clone(),
        source,
    };

    file.seek(SeekFrom::Start(range.start_offset))
        .await
        .map_err(io_error)?;

    let mut buf = pool.acquire(usize::try_from(range.length).unwrap_or(usize::MAX));
    let mut remaining = range.length;
    while remaining > 0 {
        let n = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let chunk = &mut buf[..n];
        file.read_exact(chunk).await.map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                StreamError::BackingStoreCorrupt {
                    path: range.file_path.clone(),
                    detail: format!(
                        "fewer than {} bytes available at offset {}",
                        range.length, range.start_offset
                    ),
                }
            } else {
                io_error(err)
            }
        })?;
        sink.write_all(chunk).await.map_err(StreamError::Sink)?;
        remaining -= n as u64;
    }

    Ok(range.length)
}
