use super::Error;

/// Error while buffering a stream-typed bind parameter.
#[derive(Debug)]
pub(super) struct StreamDrainError {
    pub(super) inner: Box<dyn std::error::Error + Send + Sync>,
}

impl std::error::Error for StreamDrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl core::fmt::Display for StreamDrainError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "failed to read stream parameter: {}", self.inner)
    }
}

impl Error {
    /// Creates an error for a stream parameter that could not be drained.
    pub fn stream_drain(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::from(super::ErrorKind::StreamDrain(StreamDrainError {
            inner: Box::new(err),
        }))
    }

    /// Returns `true` if this error happened while draining a stream parameter.
    pub fn is_stream_drain(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::StreamDrain(_))
    }
}
