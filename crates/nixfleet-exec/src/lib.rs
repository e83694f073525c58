//! nixfleet-exec: Command execution abstraction
//!
//! Provides the `CommandRunner` trait and a process-backed implementation that
//! runs commands locally or on a remote host through `ssh`.

pub mod error;
pub mod local;
pub mod result;
pub mod spec;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use local::ProcessRunner;
pub use result::CommandResult;
pub use spec::{CommandSpec, Target};
pub use traits::CommandRunner;
