//! Execution Supervisor Subsystem
//!
//! Runs tool handlers under one contract regardless of kind. External
//! handlers become bounded child processes: output fully captured, a hard
//! wall-clock timeout enforced, the child killed on expiry, and exit codes
//! folded into the pipeline error taxonomy. Internal handlers are called
//! directly inside the same bound with panic isolation.
//!
//! Commands are always executed as argv lists, never through a shell: the
//! payload travels as a single argument and cannot be re-interpreted. The
//! validator checks the command template itself (interpreter allow-list,
//! no absolute paths or traversal, no metacharacters) and deliberately
//! not the payload.
//!
//! Per invocation the lifecycle is `Pending -> Running -> {Completed,
//! TimedOut, Crashed, ExecutableMissing}`; `Running` is the only state in
//! which the child may be killed, and there is no retry.

mod executor;
mod validator;

pub use executor::{ExecutionSupervisor, RawResult};
pub use validator::{CommandValidationError, CommandValidator};
