// Chunked frame streaming utilities
use crate::infrastructure::http_response::{brotli_compress, SVG_CONTENT_TYPE};
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::watch;

/// Create a chunked streaming response where every chunk is one length-prefixed frame
pub async fn chunked_frame_stream<S>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = String> + Send + 'static,
{
    let byte_stream = stream.then(move |frame| async move { encode_chunk(frame, compress).await });

    let body = Body::from_stream(byte_stream);

    // Chunks are compressed one by one, so the response itself carries no
    // Content-Encoding.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header("x-frame-type", SVG_CONTENT_TYPE)
        .header("x-frame-encoding", if compress { "br" } else { "identity" })
        .header(header::CACHE_CONTROL, "no-store")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// 4-byte big-endian payload length followed by the payload.
pub async fn encode_chunk(frame: String, compress: bool) -> Result<Bytes, std::io::Error> {
    let payload = if compress {
        brotli_compress(frame.as_bytes()).await?
    } else {
        frame.into_bytes()
    };

    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too large"))?;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Latest frame first (if one was drawn), then every newly presented frame.
/// Ends when the publishing surface is dropped.
pub fn frames_from_watch(mut rx: watch::Receiver<String>) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        let current = rx.borrow_and_update().clone();
        if !current.is_empty() {
            yield current;
        }

        while rx.changed().await.is_ok() {
            let frame = rx.borrow_and_update().clone();
            if !frame.is_empty() {
                yield frame;
            }
        }
    }
}

/// Helper to create a streaming response from a frame receiver
pub async fn stream_from_watch(rx: watch::Receiver<String>, compress: bool) -> impl IntoResponse {
    match chunked_frame_stream(frames_from_watch(rx), compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
