// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Buffer fetcher — retrieves a template's raw bytes from a URL or an
// inline `data:` reference, reporting progress per received chunk.
//
// Fetching occupies the first half of the overall progress range (0–50);
// parsing owns the second half.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use layerdeck_core::error::{LoadError, Result};
use layerdeck_core::types::{Stage, TemplateRef};

use crate::progress::ProgressReporter;

/// Upper bound of the fetch share of the progress range.
pub const FETCH_PROGRESS_END: u8 = 50;

/// Timeout for establishing the connection (the body itself is not timed).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Body of a successful response.
pub enum Body {
    /// Whole body read at once (server sent no length).
    Whole(Vec<u8>),
    /// Incremental body with the server-reported total length.
    Chunked {
        total: u64,
        stream: BoxStream<'static, std::io::Result<Vec<u8>>>,
    },
}

/// Network access used by the fetcher.
///
/// Implementations report non-success statuses as
/// [`LoadError::FetchStatus`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Body>;
}

/// HTTP transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("layerdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoadError::Fetch(format!("HTTP client setup: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<Body> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::FetchStatus {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        match response.content_length() {
            Some(total) if total > 0 => {
                let stream = response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|b| b.to_vec()).map_err(std::io::Error::other))
                    .boxed();
                Ok(Body::Chunked { total, stream })
            }
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| LoadError::Fetch(format!("reading body of {url}: {e}")))?;
                Ok(Body::Whole(bytes.to_vec()))
            }
        }
    }
}

/// Retrieve the bytes behind `reference`.
///
/// Inline references are decoded synchronously and emit no progress.
#[instrument(skip_all, fields(inline = TemplateRef::parse(reference).is_inline()))]
pub async fn fetch_bytes(
    transport: &dyn Transport,
    reference: &str,
    progress: &ProgressReporter<'_>,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let url = match TemplateRef::parse(reference) {
        TemplateRef::Inline(data) => return decode_data_url(data),
        TemplateRef::Url(url) => url,
    };

    progress.emit(Stage::Fetching, "Downloading template...", 0);
    info!(url, "fetching template");

    let body = tokio::select! {
        body = transport.get(url) => body?,
        _ = cancel.cancelled() => return Err(LoadError::Cancelled),
    };
    read_body(body, progress, cancel).await
}

/// Drain a response body into one contiguous buffer in arrival order.
///
/// The stream is owned here, so it is released on every exit path.
pub async fn read_body(
    body: Body,
    progress: &ProgressReporter<'_>,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let (total, mut stream) = match body {
        Body::Whole(bytes) => {
            progress.emit(Stage::Fetching, "Download complete", FETCH_PROGRESS_END);
            return Ok(bytes);
        }
        Body::Chunked { total, stream } => (total, stream),
    };

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut received: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            None => break,
            Some(Ok(chunk)) => {
                received += chunk.len() as u64;
                chunks.push(chunk);
                let percent = fetch_percent(received, total);
                debug!(received, total, percent, "chunk received");
                progress.emit(
                    Stage::Fetching,
                    format!("Downloading template... {}%", percent * 2),
                    percent,
                );
            }
            Some(Err(e)) => return Err(LoadError::FetchInterrupted(e.to_string())),
        }
    }

    info!(bytes = received, "download complete");
    Ok(chunks.concat())
}

/// `round(received / total * 50)`, capped at 50 for servers that under-report.
fn fetch_percent(received: u64, total: u64) -> u8 {
    let ratio = received as f64 / total.max(1) as f64;
    let percent = (ratio * FETCH_PROGRESS_END as f64).round();
    percent.min(FETCH_PROGRESS_END as f64) as u8
}

/// Decode `data:[<media-type>][;base64],<payload>`.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>> {
    let rest = data
        .strip_prefix("data:")
        .ok_or_else(|| LoadError::Fetch("inline reference is not a data URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::Fetch("inline reference has no payload".into()))?;

    if header.ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| LoadError::Fetch(format!("invalid inline data: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::testing::{ProgressLog, StaticTransport};

    fn chunked(chunks: Vec<std::io::Result<Vec<u8>>>, total: u64) -> Body {
        Body::Chunked {
            total,
            stream: stream::iter(chunks).boxed(),
        }
    }

    #[tokio::test]
    async fn chunks_are_concatenated_in_order_with_progress() {
        let log = ProgressLog::new();
        let sink = log.sink();
        let progress = ProgressReporter::new(&sink);
        let body = chunked(vec![Ok(vec![1; 25]), Ok(vec![2; 25]), Ok(vec![3; 50])], 100);

        let bytes = read_body(body, &progress, &CancellationToken::new()).await.unwrap();

        assert_eq!(bytes.len(), 100);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[30], 2);
        assert_eq!(bytes[99], 3);
        assert_eq!(log.percents(), vec![13, 25, 50]);
    }

    #[tokio::test]
    async fn interrupted_stream_is_wrapped() {
        let log = ProgressLog::new();
        let sink = log.sink();
        let progress = ProgressReporter::new(&sink);
        let body = chunked(
            vec![
                Ok(vec![0; 10]),
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
            ],
            100,
        );

        let err = read_body(body, &progress, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LoadError::FetchInterrupted(_)));
        assert!(err.to_string().contains("stream interrupted"));
    }

    #[tokio::test]
    async fn whole_body_jumps_to_half() {
        let log = ProgressLog::new();
        let sink = log.sink();
        let progress = ProgressReporter::new(&sink);

        let bytes = read_body(Body::Whole(vec![7; 64]), &progress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(log.percents(), vec![50]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_read() {
        let log = ProgressLog::new();
        let sink = log.sink();
        let progress = ProgressReporter::new(&sink);
        let token = CancellationToken::new();
        token.cancel();

        let err = read_body(chunked(vec![Ok(vec![0; 10])], 10), &progress, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Cancelled));
    }

    #[tokio::test]
    async fn inline_reference_skips_transport_and_progress() {
        let log = ProgressLog::new();
        let sink = log.sink();
        let progress = ProgressReporter::new(&sink);
        let transport = StaticTransport::new();

        let bytes = fetch_bytes(&transport, "data:application/octet-stream;base64,OEJQUw==", &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bytes, b"8BPS");
        assert_eq!(transport.requests(), 0);
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn error_status_surfaces_from_transport() {
        let log = ProgressLog::new();
        let sink = log.sink();
        let progress = ProgressReporter::new(&sink);
        let transport = StaticTransport::new();

        let err = fetch_bytes(&transport, "https://cdn.example.com/missing.psd", &progress, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::FetchStatus { status: 404, .. }));
    }

    #[test]
    fn plain_data_url_is_taken_verbatim() {
        assert_eq!(decode_data_url("data:text/plain,hello").unwrap(), b"hello");
        assert!(decode_data_url("data:;base64").is_err());
    }

    #[test]
    fn percent_is_rounded_and_capped() {
        assert_eq!(fetch_percent(1, 3), 17);
        assert_eq!(fetch_percent(500, 100), 50);
    }
}
