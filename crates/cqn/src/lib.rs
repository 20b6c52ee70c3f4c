pub mod deep;

mod event;
pub use event::Event;

pub mod keys;

mod service;
pub use service::{Outcome, Service, Session};

pub use cqn_core::{schema, stmt, Error, Model, Result, WriteKind};
pub use cqn_driver_sqlite::{PoolOptions, SqliteConfig, StreamOutput};
