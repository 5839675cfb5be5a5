use crate::state::{ByteCounter, ProgressRegistry, TransferState};
use crate::utils::filename_from_url;
use futures_util::TryStreamExt;
use reqwest::{Client, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::io::StreamReader;

/// Size of each read from the response body.
pub const CHUNK_SIZE: usize = 1024;

/// Why a single URL could not be downloaded.
///
/// These never stop the pool; the worker logs them and moves on.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("received non-success status code {0}")]
    Status(StatusCode),
    #[error("error creating output file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error reading response body: {0}")]
    Read(#[source] io::Error),
    #[error("error writing to output file: {0}")]
    Write(#[source] io::Error),
}

impl TransferError {
    /// Short name of the step that failed, for log context.
    pub fn phase(&self) -> &'static str {
        match self {
            TransferError::Request(_) => "request",
            TransferError::Status(_) => "status",
            TransferError::Create { .. } => "create",
            TransferError::Read(_) => "read",
            TransferError::Write(_) => "write",
        }
    }
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub url: String,
    pub path: PathBuf,
    pub state: TransferState,
    /// Wall-clock time from issuing the request until the file is flushed.
    pub elapsed: Duration,
}

/// Downloads `url` into `out_dir/<basename>`, streaming it in [`CHUNK_SIZE`] reads.
///
/// Each chunk is written straight to the destination file and only then
/// recorded in `registry` under the URL. Nothing is created on disk unless the server answers
/// with a success status.
///
/// # Errors
///
/// Returns an error if the request fails, the status is not 2xx, or the
/// destination cannot be created or written. Bytes already written stay on disk.
pub async fn download_url(
    client: &Client,
    url: &str,
    out_dir: &Path,
    registry: &ProgressRegistry,
) -> Result<TransferSummary, TransferError> {
    let started = Instant::now();

    let response = client
        .get(url)
        .send()
        .await
        .map_err(TransferError::Request)?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::Status(status));
    }

    let counter = registry.counter(url);
    counter.set_total(
        response
            .content_length()
            .map_or(-1, |len| i64::try_from(len).unwrap_or(i64::MAX)),
    );

    let path = out_dir.join(filename_from_url(url));
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|source| TransferError::Create {
            path: path.clone(),
            source,
        })?;

    let stream = response.bytes_stream().map_err(io::Error::other);
    let mut body = pin!(StreamReader::new(stream));

    let copied = copy_chunks(&mut body, &mut file, &counter).await;
    // tokio's File completes writes in the background; wait for the last
    // one even when the copy stopped early, so counted bytes are on disk.
    let flushed = file.flush().await.map_err(TransferError::Write);
    copied?;
    flushed?;

    Ok(TransferSummary {
        url: url.to_string(),
        path,
        state: counter.snapshot(),
        elapsed: started.elapsed(),
    })
}

/// Moves `body` into `out` one [`CHUNK_SIZE`] read at a time, counting each
/// chunk once `out` has accepted it.
async fn copy_chunks<R, W>(
    body: &mut R,
    out: &mut W,
    counter: &ByteCounter,
) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = body.read(&mut buf).await.map_err(TransferError::Read)?;
        if n == 0 {
            return Ok(());
        }
        out.write_all(&buf[..n]).await.map_err(TransferError::Write)?;
        counter.record(n);
    }
}
