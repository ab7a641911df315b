//! Upstream response representations handed to the stream adapter

use axum::body::Body;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures_core::Stream;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::Value;
use std::fmt;
use std::future::Future;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of a streaming response, one item per upstream chunk
pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Work to run once the response body has been fully sent
pub type BackgroundTask = BoxFuture<'static, ()>;

pub const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";

/// A chunked upstream response
pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub media_type: Option<String>,
    pub body: ByteStream,
    pub background: Option<BackgroundTask>,
}

impl StreamingResponse {
    pub fn new<S>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            media_type: Some(EVENT_STREAM_MEDIA_TYPE.to_string()),
            body: body.boxed(),
            background: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_background<F>(mut self, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background = Some(task.boxed());
        self
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("media_type", &self.media_type)
            .field("background", &self.background.is_some())
            .finish_non_exhaustive()
    }
}

impl IntoResponse for StreamingResponse {
    fn into_response(self) -> Response {
        let StreamingResponse {
            status,
            mut headers,
            media_type,
            body,
            background,
        } = self;

        if let Some(value) = media_type.and_then(|mt| HeaderValue::from_str(&mt).ok()) {
            headers.insert(CONTENT_TYPE, value);
        }

        let body = match background {
            Some(task) => body
                .chain(
                    futures_util::stream::once(task)
                        .filter_map(|()| async { None::<Result<Bytes, BoxError>> }),
                )
                .boxed(),
            None => body,
        };

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// A fully buffered JSON upstream response
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Json(self.body)).into_response()
    }
}

#[derive(Debug)]
pub enum UpstreamResponse {
    Streaming(StreamingResponse),
    Json(JsonResponse),
}

impl UpstreamResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamResponse::Streaming(_) => "streaming",
            UpstreamResponse::Json(_) => "json",
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        match self {
            UpstreamResponse::Streaming(streaming) => streaming.into_response(),
            UpstreamResponse::Json(json) => json.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn chunks(items: &[&'static str]) -> impl Stream<Item = Result<Bytes, BoxError>> + Send {
        futures_util::stream::iter(
            items
                .iter()
                .copied()
                .map(|s| Ok::<_, BoxError>(Bytes::from_static(s.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_into_response_keeps_status_headers_and_media_type() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let response = StreamingResponse::new(chunks(&["a", "b"]))
            .with_status(StatusCode::ACCEPTED)
            .with_headers(headers)
            .into_response();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-request-id"], "abc");
        assert_eq!(response.headers()[CONTENT_TYPE], EVENT_STREAM_MEDIA_TYPE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ab");
    }

    #[tokio::test]
    async fn test_background_task_runs_after_body_is_drained() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        let response = StreamingResponse::new(chunks(&["x"]))
            .with_background(async move { flag.store(true, Ordering::SeqCst) })
            .into_response();

        assert!(!ran.load(Ordering::SeqCst));
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"x");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_kind_names_the_variant() {
        let json = UpstreamResponse::Json(JsonResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Value::Null,
        });
        assert_eq!(json.kind(), "json");
        assert_eq!(
            UpstreamResponse::Streaming(StreamingResponse::new(chunks(&[]))).kind(),
            "streaming"
        );
    }
}
