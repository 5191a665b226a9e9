//! Check execution engine.
//!
//! Checks are kept on a schedule by the [`Scheduler`], resolved into concrete
//! targets and handed to runners as [`CheckWithTargets`] envelopes. A
//! [`Runner`] fans one task per target out through the [`Dispatcher`]'s
//! bounded worker pools and folds the finished tasks back into
//! [`CheckResponse`]s.

pub mod checker;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod heart;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod slate;
pub mod stats;
pub mod transport;
pub mod types;
pub mod workers;

pub use checker::Checker;
pub use context::{ContextError, RunContext};
pub use dispatcher::{Dispatcher, Worker, WorkerRegistry};
pub use envelope::CheckWithTargets;
pub use error::{CheckerError, TaskError, handle_error};
pub use resolver::{InventoryResolver, Resolver};
pub use runner::Runner;
pub use scheduler::Scheduler;
pub use service::RunnerService;
pub use stats::CheckerStats;
pub use transport::{MemoryBus, Publisher};
pub use types::*;

/// Version stamped on every published [`CheckResult`].
pub const PROTO_VERSION: i32 = 2;

pub type Result<T> = std::result::Result<T, CheckerError>;
