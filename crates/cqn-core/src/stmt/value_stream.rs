use crate::{err, Error, Result};

use std::{
    fmt,
    pin::Pin,
    sync::{Arc, Mutex},
};
use tokio::io::{AsyncRead, AsyncReadExt};

type DynReader = Pin<Box<dyn AsyncRead + Send + Sync + 'static>>;

/// A deferred, single-use byte source used for large or binary payloads.
///
/// Clones share the same underlying reader; whichever clone drains it first
/// receives the bytes.
#[derive(Clone)]
pub struct ValueStream {
    reader: Arc<Mutex<Option<DynReader>>>,
    binary: bool,
}

impl ValueStream {
    /// Wraps `reader`. `binary` is true when the declared element type is binary.
    pub fn new(reader: impl AsyncRead + Send + Sync + 'static, binary: bool) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Some(Box::pin(reader)))),
            binary,
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, binary: bool) -> Self {
        Self::new(std::io::Cursor::new(bytes.into()), binary)
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Reads the stream to its end.
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| err!("stream parameter lock poisoned"))?
            .take();

        let Some(mut reader) = reader else {
            return Err(err!("stream parameter has already been consumed"));
        };

        let mut buf = vec![];
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(Error::stream_drain)?;
        Ok(buf)
    }
}

impl PartialEq for ValueStream {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.reader, &other.reader)
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStream")
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}
