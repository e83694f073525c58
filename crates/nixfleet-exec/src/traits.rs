//! Command runner trait

use async_trait::async_trait;

use crate::result::CommandResult;
use crate::spec::CommandSpec;

/// Runs one command to completion and reports how it went
///
/// Implementations spawn exactly one process per call and collect all output
/// before returning. They never terminate the host process.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> CommandResult;

    /// Short name for logs
    fn runner_type(&self) -> &'static str;
}
