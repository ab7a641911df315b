//! Re-frames upstream provider streams into the canonical SSE format
//!
//! The adapter never buffers: each upstream chunk is pulled, formatted and
//! framed on demand. Dropping the adapted body (client disconnect) drops the
//! upstream stream with it, so no further chunks are read.

use crate::domain::route::ProviderType;
use crate::muxing::constants::{SSE_DATA_PREFIX, SSE_FRAME_END};
use crate::muxing::error::{MuxingError, MuxingResult};
use crate::muxing::formatter::StreamChunkFormatter;
use crate::muxing::response::{BoxError, StreamingResponse, UpstreamResponse};
use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tracing::debug;

/// Wrap a formatted payload in the client-facing SSE frame
pub fn format_as_openai_chunk(payload: &str) -> String {
    format!("{SSE_DATA_PREFIX}{payload}{SSE_FRAME_END}")
}

pin_project! {
    /// Body stream emitting one SSE frame per non-empty formatted upstream chunk
    pub struct FormattedStream<S> {
        #[pin]
        inner: S,
        formatter: Arc<StreamChunkFormatter>,
        provider: ProviderType,
    }
}

impl<S> FormattedStream<S> {
    pub fn new(inner: S, formatter: Arc<StreamChunkFormatter>, provider: ProviderType) -> Self {
        Self {
            inner,
            formatter,
            provider,
        }
    }
}

impl<S> Stream for FormattedStream<S>
where
    S: Stream<Item = Result<Bytes, BoxError>>,
{
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let text = String::from_utf8_lossy(&chunk);
                    let formatted = match this.formatter.format(&text, *this.provider) {
                        Ok(formatted) => formatted,
                        Err(e) => return Poll::Ready(Some(Err(Box::new(e)))),
                    };

                    match formatted.into_payload() {
                        Some(payload) => {
                            return Poll::Ready(Some(Ok(Bytes::from(format_as_openai_chunk(
                                &payload,
                            )))))
                        }
                        // Nothing to forward; keep pulling from upstream
                        None => continue,
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Formats upstream responses for the client
#[derive(Clone)]
pub struct ResponseAdapter {
    stream_formatter: Arc<StreamChunkFormatter>,
}

impl ResponseAdapter {
    pub fn new() -> Self {
        Self::with_formatter(Arc::new(StreamChunkFormatter::new()))
    }

    pub fn with_formatter(stream_formatter: Arc<StreamChunkFormatter>) -> Self {
        Self { stream_formatter }
    }

    /// Lazily format a raw upstream body for the given destination provider
    pub fn format_streaming_body<S>(&self, body: S, provider: ProviderType) -> FormattedStream<S>
    where
        S: Stream<Item = Result<Bytes, BoxError>>,
    {
        FormattedStream::new(body, Arc::clone(&self.stream_formatter), provider)
    }

    /// Re-frame an upstream response, keeping status, headers and background work
    pub fn format_response_to_client(
        &self,
        response: UpstreamResponse,
        provider: ProviderType,
    ) -> MuxingResult<StreamingResponse> {
        let streaming = match response {
            UpstreamResponse::Streaming(streaming) => streaming,
            other => return Err(MuxingError::UnsupportedResponseKind(other.kind().to_string())),
        };

        if !self.stream_formatter.supports(provider) {
            return Err(MuxingError::UnsupportedProvider(provider));
        }

        debug!(%provider, status = %streaming.status, "Formatting streaming response for client");

        let StreamingResponse {
            status,
            headers,
            media_type,
            body,
            background,
        } = streaming;

        Ok(StreamingResponse {
            status,
            headers,
            media_type,
            body: self.format_streaming_body(body, provider).boxed(),
            background,
        })
    }
}

impl Default for ResponseAdapter {
    fn default() -> Self {
        Self::new()
    }
}
