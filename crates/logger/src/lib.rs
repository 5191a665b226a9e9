//! Tracing subscriber setup shared by the workspace binaries.

mod tracing;

pub use self::tracing::{init_tracing, init_with, parse_level};
