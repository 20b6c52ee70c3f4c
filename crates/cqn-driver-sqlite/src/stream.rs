use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::{Bytes, BytesMut};
use cqn_core::Result;
use std::{
    io, mem,
    pin::Pin,
    task::{ready, Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

/// Result of [`Statement::stream`](crate::Statement::stream).
#[derive(Debug)]
pub enum StreamOutput {
    /// The query matched no row
    NoContent,

    /// The single column of the matching row is null
    Null,

    /// Decoded bytes of a single binary column
    Blob(BlobReader),

    /// JSON row payloads
    Json(JsonRows),
}

impl StreamOutput {
    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reads the whole output into memory. `None` for no content and null.
    pub async fn into_bytes(self) -> Result<Option<Bytes>> {
        match self {
            Self::NoContent | Self::Null => Ok(None),
            Self::Blob(mut reader) => Ok(Some(reader.next_chunk(usize::MAX).unwrap_or_default())),
            Self::Json(rows) => rows.concat().await.map(Some),
        }
    }
}

/// Pull-based reader over an in-memory binary payload.
#[derive(Debug)]
pub struct BlobReader {
    data: Bytes,
}

impl BlobReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Decodes base64 text as written for binary columns. Payloads that are
    /// not valid base64 are served as they are.
    pub fn from_base64(text: Vec<u8>) -> Self {
        match STANDARD.decode(&text) {
            Ok(decoded) => Self::new(decoded),
            Err(_) => Self::new(text),
        }
    }

    /// Next chunk of at most `size` bytes, `None` once exhausted.
    pub fn next_chunk(&mut self, size: usize) -> Option<Bytes> {
        if self.data.is_empty() {
            return None;
        }

        let size = size.clamp(1, self.data.len());
        Some(self.data.split_to(size))
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl io::Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.next_chunk(buf.len()) {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => Ok(0),
        }
    }
}

/// Row payloads of a JSON-mode query, pulled from the cursor on demand.
///
/// A blocking task steps the cursor and hands payloads over a bounded
/// channel, so only rows the consumer asks for (plus one in flight) are read.
/// Without `one`, the payloads are framed as a JSON array: `[`, the first
/// payload, `,`-prefixed payloads, `]`. Zero rows produce no chunks at all.
/// With `one`, only the first payload is yielded and the cursor is released
/// right after it.
///
/// The cursor holds the connection until the rows are drained, closed or
/// dropped. Other statements on the same connection wait until then.
#[derive(Debug)]
pub struct JsonRows {
    state: State,
    one: bool,
}

#[derive(Debug)]
enum State {
    Ready {
        rows: mpsc::Receiver<Result<String>>,
        first: Option<String>,
        opened: bool,
    },
    Exhausted,
    Released,
}

impl JsonRows {
    /// Wraps the receiving end of a cursor task whose first payload, if any,
    /// has already been received.
    pub(crate) fn new(
        rows: mpsc::Receiver<Result<String>>,
        first: Option<String>,
        one: bool,
    ) -> Self {
        let state = match first {
            Some(first) => State::Ready {
                rows,
                first: Some(first),
                opened: false,
            },
            None => State::Exhausted,
        };

        Self { state, one }
    }

    /// Releases the cursor. Calling it again has no effect.
    pub fn close(&mut self) {
        if let State::Ready { .. } = self.state {
            self.state = State::Released;
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, State::Released)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// Next chunk, `None` once the rows are exhausted or released.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        self.next().await
    }

    /// Concatenates all remaining chunks.
    pub async fn concat(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for JsonRows {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let State::Ready {
            rows,
            first,
            opened,
        } = &mut this.state
        else {
            return Poll::Ready(None);
        };

        if this.one {
            let payload = first.take();
            this.state = State::Released;
            return Poll::Ready(payload.map(|payload| Ok(Bytes::from(payload))));
        }

        if !mem::replace(opened, true) {
            return Poll::Ready(Some(Ok(Bytes::from_static(b"["))));
        }

        if let Some(payload) = first.take() {
            return Poll::Ready(Some(Ok(Bytes::from(payload))));
        }

        let chunk = match ready!(rows.poll_recv(cx)) {
            Some(Ok(payload)) => Ok(Bytes::from(format!(",{payload}"))),
            Some(Err(err)) => {
                this.state = State::Released;
                Err(err)
            }
            None => {
                this.state = State::Exhausted;
                Ok(Bytes::from_static(b"]"))
            }
        };
        Poll::Ready(Some(chunk))
    }
}

impl Drop for JsonRows {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn rows(payloads: &[&str], one: bool) -> JsonRows {
        let (tx, mut rx) = mpsc::channel(payloads.len().max(1));
        for payload in payloads {
            tx.try_send(Ok(payload.to_string())).unwrap();
        }
        drop(tx);

        let first = rx.try_recv().ok().map(|payload| payload.unwrap());
        JsonRows::new(rx, first, one)
    }

    #[tokio::test]
    async fn frames_rows_as_array() {
        let chunks: Vec<_> = rows(&[r#"{"a":1}"#, r#"{"a":2}"#], false)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(
            chunks,
            [
                Bytes::from_static(b"["),
                Bytes::from_static(br#"{"a":1}"#),
                Bytes::from_static(br#",{"a":2}"#),
                Bytes::from_static(b"]"),
            ]
        );
    }

    #[tokio::test]
    async fn zero_rows_produce_no_chunks() {
        let mut all = rows(&[], false);
        assert!(all.is_exhausted());
        assert!(all.next().await.is_none());
        assert_eq!(rows(&[], false).concat().await.unwrap(), Bytes::new());

        let mut one = rows(&[], true);
        assert!(one.next().await.is_none());
        assert!(one.is_exhausted());
    }

    #[tokio::test]
    async fn one_releases_after_first_payload() {
        let mut one = rows(&["1", "2"], true);
        assert_eq!(one.next().await.unwrap().unwrap(), Bytes::from_static(b"1"));
        assert!(one.is_released());
        assert!(one.next().await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut all = rows(&["1", "2"], false);
        assert_eq!(all.next().await.unwrap().unwrap(), Bytes::from_static(b"["));
        all.close();
        all.close();
        assert!(all.is_released());
        assert!(all.next().await.is_none());
    }

    #[tokio::test]
    async fn cursor_errors_end_the_rows() {
        let (tx, mut rx) = mpsc::channel(2);
        tx.try_send(Ok("1".to_string())).unwrap();
        tx.try_send(Err(cqn_core::err!("disk I/O error"))).unwrap();
        drop(tx);
        let first = rx.try_recv().ok().map(|payload| payload.unwrap());

        let err = JsonRows::new(rx, first, false).concat().await.unwrap_err();
        assert_eq!(err.to_string(), "disk I/O error");
    }

    #[test]
    fn blob_reader_serves_chunks() {
        let mut reader = BlobReader::from_base64(b"AQIDBAU=".to_vec());
        assert_eq!(reader.remaining(), 5);
        assert_eq!(reader.next_chunk(2), Some(Bytes::from_static(&[1, 2])));
        assert_eq!(reader.next_chunk(2), Some(Bytes::from_static(&[3, 4])));
        assert_eq!(reader.next_chunk(2), Some(Bytes::from_static(&[5])));
        assert_eq!(reader.next_chunk(2), None);

        let mut reader = BlobReader::from_base64(b"AQIDBAU=".to_vec());
        let mut buf = vec![];
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn blob_reader_keeps_non_base64_payloads() {
        let mut reader = BlobReader::from_base64(b"not base64!".to_vec());
        assert_eq!(
            reader.next_chunk(64),
            Some(Bytes::from_static(b"not base64!"))
        );
    }
}
