mod compiler;
pub use compiler::{CompiledStatement, Compiler, OutputColumn, Param, Placeholder};

pub mod convert;

mod reserved;
pub use reserved::is_reserved;
