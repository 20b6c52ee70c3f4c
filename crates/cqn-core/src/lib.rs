mod error;
pub use error::{Error, IntoError, WriteKind};

pub mod schema;
pub use schema::Model;

pub mod stmt;

/// A Result type alias that uses the crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
