//! Streamed compute logs.
//!
//! Unlike every other provider call, log retrieval keeps one HTTP response
//! open and yields its body as it arrives. The stream ends when the provider
//! closes the body, or yields a single [`ProviderError::Cancelled`] once the
//! caller's token fires.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::{ProviderError, Result};
use crate::transport;

// Cap on how much of an error body is read from a failed log request
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Open byte stream of a job's logs.
pub struct LogStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    // Bytes received so far
    received: u64,
    // Set once the peer closed, an error surfaced, or the caller cancelled
    finished: bool,
}

impl LogStream {
    /// Issue the log request and hand back the open body.
    ///
    /// Only the status line and headers are awaited here; the body is read
    /// lazily by the caller.
    pub(crate) async fn open(request: reqwest::RequestBuilder, cancel: CancellationToken) -> Result<Self> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                text = read_error_body(response) => text,
            };
            return Err(ProviderError::from_response_body(status.as_u16(), &text));
        }

        Ok(Self::from_response(response, cancel))
    }

    /// Wrap an HTTP response body.
    pub fn from_response(response: reqwest::Response, cancel: CancellationToken) -> Self {
        Self::from_stream(response.bytes_stream().boxed(), cancel)
    }

    /// Wrap an arbitrary byte stream.
    pub fn from_stream(
        inner: BoxStream<'static, reqwest::Result<Bytes>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            cancelled: Box::pin(cancel.cancelled_owned()),
            received: 0,
            finished: false,
        }
    }

    /// Bytes received so far.
    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    /// Whether the stream has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read the stream to its end and decode it as UTF-8 (lossy).
    pub async fn read_to_string(mut self) -> Result<String> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("received", &self.received)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

// Reads at most ERROR_BODY_LIMIT bytes; the rest of the body is never pulled.
async fn read_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while body.len() < ERROR_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(ERROR_BODY_LIMIT - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => return transport::body_or_read_error::<reqwest::Error>(Err(e)),
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

impl Stream for LogStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.finished = true;
            return Poll::Ready(Some(Err(ProviderError::Cancelled)));
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.received += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(ProviderError::Transport(e))))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
