//! Resumable downloads.
//!
//! A download body can fail halfway through (connection reset, read timeout).
//! [`DownloadResponse`] tracks how much of the requested range has been
//! handed to the caller and, while the retry budget lasts, issues a new ranged
//! GET for the remainder, pinned to the original ETag. The caller sees one
//! uninterrupted byte stream.

use azsdk_core::error::{AzureError, AzureResult};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use std::sync::Arc;

/// Default number of resume requests per download.
pub const DEFAULT_MAX_RETRY_REQUESTS: u32 = 5;

/// Position of a download: where to resume and how much is left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpGetterInfo {
    /// Offset of the next byte to fetch.
    pub offset: u64,
    /// Bytes still expected; `None` reads to the end of the resource.
    pub count: Option<u64>,
    /// ETag the resumed request must match.
    pub etag: Option<String>,
}

impl HttpGetterInfo {
    pub fn new(offset: u64, count: Option<u64>, etag: Option<String>) -> Self {
        Self {
            offset,
            count,
            etag,
        }
    }

    /// Record that `consumed` bytes were delivered.
    pub fn advance(&mut self, consumed: u64) {
        self.offset = self.offset.saturating_add(consumed);
        if let Some(count) = self.count.as_mut() {
            *count = count.saturating_sub(consumed);
        }
    }

    /// Whether every requested byte has been delivered.
    pub fn is_complete(&self) -> bool {
        self.count == Some(0)
    }

    /// `bytes=<start>-<end>` (or open-ended) for the remaining range.
    ///
    /// Returns `None` when the whole resource is wanted from the start.
    pub fn range_header(&self) -> Option<String> {
        match self.count {
            Some(count) if count > 0 => match self.offset.checked_add(count - 1) {
                Some(end) => Some(format!("bytes={}-{}", self.offset, end)),
                // Past the addressable end; equivalent to reading to the end.
                None => Some(format!("bytes={}-", self.offset)),
            },
            Some(_) => None,
            None if self.offset == 0 => None,
            None => Some(format!("bytes={}-", self.offset)),
        }
    }
}

/// Retry budget for resuming an interrupted body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRetryOptions {
    max_retry_requests: u32,
}

impl Default for DownloadRetryOptions {
    fn default() -> Self {
        Self {
            max_retry_requests: DEFAULT_MAX_RETRY_REQUESTS,
        }
    }
}

impl DownloadRetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume requests allowed over the whole download. Zero disables resuming.
    pub fn max_retry_requests(mut self, max: u32) -> Self {
        self.max_retry_requests = max;
        self
    }

    pub fn retry_requests(&self) -> u32 {
        self.max_retry_requests
    }
}

/// A body stream in the SDK's error type.
pub type BodyStream = BoxStream<'static, AzureResult<Bytes>>;

/// Issues the ranged request for a resume and returns its body.
pub type RangeGetter = Arc<dyn Fn(HttpGetterInfo) -> BoxFuture<'static, AzureResult<BodyStream>> + Send + Sync>;

/// Adapt a reqwest response body.
pub(crate) fn body_stream(response: reqwest::Response) -> BodyStream {
    response.bytes_stream().map_err(AzureError::from).boxed()
}

struct ResumeState {
    body: BodyStream,
    info: HttpGetterInfo,
    retries: u32,
    options: DownloadRetryOptions,
    getter: RangeGetter,
}

/// Wrap `body` so that mid-stream failures resume through `getter`.
pub fn resumable(
    body: BodyStream,
    info: HttpGetterInfo,
    options: DownloadRetryOptions,
    getter: RangeGetter,
) -> BodyStream {
    let state = ResumeState {
        body,
        info,
        retries: 0,
        options,
        getter,
    };

    stream::try_unfold(state, |mut st| async move {
        loop {
            if st.info.is_complete() {
                return Ok(None);
            }

            let failure = match st.body.next().await {
                Some(Ok(mut chunk)) => {
                    if let Some(remaining) = st.info.count {
                        if chunk.len() as u64 > remaining {
                            chunk.truncate(remaining as usize);
                        }
                    }
                    st.info.advance(chunk.len() as u64);
                    return Ok(Some((chunk, st)));
                }
                Some(Err(e)) => e,
                None => match st.info.count {
                    Some(remaining) if remaining > 0 => AzureError::Stream(format!(
                        "body ended with {} bytes outstanding",
                        remaining
                    )),
                    _ => return Ok::<_, AzureError>(None),
                },
            };

            if st.retries >= st.options.max_retry_requests {
                tracing::warn!(
                    offset = st.info.offset,
                    retries = st.retries,
                    "download retry budget exhausted"
                );
                return Err(failure);
            }
            st.retries += 1;
            tracing::debug!(
                error = %failure,
                offset = st.info.offset,
                remaining = ?st.info.count,
                retry = st.retries,
                "resuming interrupted download"
            );
            st.body = (st.getter)(st.info.clone()).await?;
        }
    })
    .boxed()
}

/// A successful download: response metadata plus a resumable body.
pub struct DownloadResponse {
    status: u16,
    headers: HeaderMap,
    body: BodyStream,
}

impl DownloadResponse {
    pub fn new(status: u16, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status of the initial response (200 or 206).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Headers of the initial response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Take the body as a byte stream.
    pub fn into_stream(self) -> BodyStream {
        self.body
    }

    /// Read the entire body into memory.
    pub async fn collect(self) -> AzureResult<Bytes> {
        let mut buf = BytesMut::new();
        let mut body = self.body;
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Mutex;

    fn chunks(items: Vec<AzureResult<&'static str>>) -> BodyStream {
        stream::iter(
            items
                .into_iter()
                .map(|r| r.map(|s| Bytes::from_static(s.as_bytes()))),
        )
        .boxed()
    }

    fn reset() -> AzureError {
        AzureError::Stream("connection reset".into())
    }

    /// Getter that serves pre-baked continuation streams and records each request.
    fn scripted_getter(
        continuations: Vec<BodyStream>,
    ) -> (RangeGetter, Arc<Mutex<Vec<HttpGetterInfo>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(Mutex::new(continuations.into_iter()));
        let recorded = calls.clone();
        let getter: RangeGetter = Arc::new(move |info: HttpGetterInfo| {
            recorded.lock().unwrap().push(info);
            let next = queue.lock().unwrap().next();
            async move { next.ok_or_else(|| AzureError::Stream("no continuation scripted".into())) }
                .boxed()
        });
        (getter, calls)
    }

    #[test]
    fn range_header_shapes() {
        assert_eq!(HttpGetterInfo::new(0, None, None).range_header(), None);
        assert_eq!(
            HttpGetterInfo::new(512, None, None).range_header().as_deref(),
            Some("bytes=512-")
        );
        assert_eq!(
            HttpGetterInfo::new(10, Some(5), None).range_header().as_deref(),
            Some("bytes=10-14")
        );
        assert_eq!(
            HttpGetterInfo::new(u64::MAX - 1, Some(10), None).range_header().as_deref(),
            Some("bytes=18446744073709551614-")
        );
    }

    #[test]
    fn advance_tracks_offset_and_count() {
        let mut info = HttpGetterInfo::new(100, Some(50), Some("\"0x1\"".into()));
        info.advance(20);
        assert_eq!(info.offset, 120);
        assert_eq!(info.count, Some(30));
        info.advance(30);
        assert!(info.is_complete());
    }

    #[test]
    fn default_retry_budget() {
        assert_eq!(DownloadRetryOptions::default().retry_requests(), 5);
        assert_eq!(DownloadRetryOptions::new().max_retry_requests(0).retry_requests(), 0);
    }

    #[tokio::test]
    async fn uninterrupted_body_passes_through() {
        let (getter, calls) = scripted_getter(vec![]);
        let body = resumable(
            chunks(vec![Ok("hello "), Ok("world")]),
            HttpGetterInfo::new(0, Some(11), None),
            DownloadRetryOptions::default(),
            getter,
        );

        let data = DownloadResponse::new(200, HeaderMap::new(), body)
            .collect()
            .await
            .unwrap();

        assert_eq!(&data[..], b"hello world");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_resumes_from_last_consumed_byte() {
        let (getter, calls) = scripted_getter(vec![chunks(vec![Ok(" world")])]);
        let body = resumable(
            chunks(vec![Ok("hello"), Err(reset())]),
            HttpGetterInfo::new(0, Some(11), Some("\"0x8D\"".into())),
            DownloadRetryOptions::default(),
            getter,
        );

        let data = DownloadResponse::new(200, HeaderMap::new(), body)
            .collect()
            .await
            .unwrap();

        assert_eq!(&data[..], b"hello world");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            HttpGetterInfo::new(5, Some(6), Some("\"0x8D\"".into()))
        );
        assert_eq!(calls[0].range_header().as_deref(), Some("bytes=5-10"));
    }

    #[tokio::test]
    async fn retry_budget_is_shared_across_resumes() {
        let (getter, calls) = scripted_getter(vec![
            chunks(vec![Ok("b"), Err(reset())]),
            chunks(vec![Ok("c"), Err(reset())]),
        ]);
        let body = resumable(
            chunks(vec![Ok("a"), Err(reset())]),
            HttpGetterInfo::new(0, None, None),
            DownloadRetryOptions::new().max_retry_requests(2),
            getter,
        );

        let err = DownloadResponse::new(200, HeaderMap::new(), body)
            .collect()
            .await
            .unwrap_err();

        assert!(matches!(err, AzureError::Stream(_)));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].offset, 2);
        assert_eq!(calls[1].range_header().as_deref(), Some("bytes=2-"));
    }

    #[tokio::test]
    async fn zero_budget_surfaces_first_failure() {
        let (getter, calls) = scripted_getter(vec![]);
        let mut body = resumable(
            chunks(vec![Ok("partial"), Err(reset())]),
            HttpGetterInfo::new(0, Some(20), None),
            DownloadRetryOptions::new().max_retry_requests(0),
            getter,
        );

        assert_eq!(&body.next().await.unwrap().unwrap()[..], b"partial");
        assert!(body.next().await.unwrap().is_err());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_request_failure_is_propagated() {
        let (getter, _calls) = scripted_getter(vec![]);
        let body = resumable(
            chunks(vec![Ok("abc"), Err(reset())]),
            HttpGetterInfo::new(0, Some(6), Some("\"etag\"".into())),
            DownloadRetryOptions::default(),
            getter,
        );

        let err = DownloadResponse::new(200, HeaderMap::new(), body)
            .collect()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no continuation scripted"));
    }

    #[tokio::test]
    async fn short_body_is_resumed() {
        let (getter, calls) = scripted_getter(vec![chunks(vec![Ok("6789")])]);
        let body = resumable(
            chunks(vec![Ok("012345")]),
            HttpGetterInfo::new(0, Some(10), None),
            DownloadRetryOptions::default(),
            getter,
        );

        let data = DownloadResponse::new(200, HeaderMap::new(), body)
            .collect()
            .await
            .unwrap();

        assert_eq!(&data[..], b"0123456789");
        assert_eq!(calls.lock().unwrap()[0].range_header().as_deref(), Some("bytes=6-9"));
    }

    #[tokio::test]
    async fn oversized_body_is_cut_at_requested_count() {
        let (getter, _calls) = scripted_getter(vec![]);
        let body = resumable(
            chunks(vec![Ok("0123456789"), Ok("extra")]),
            HttpGetterInfo::new(0, Some(4), None),
            DownloadRetryOptions::default(),
            getter,
        );

        let data = DownloadResponse::new(206, HeaderMap::new(), body)
            .collect()
            .await
            .unwrap();
        assert_eq!(&data[..], b"0123");
    }
}
