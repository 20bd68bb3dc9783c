use crate::cli::Args;
use std::env;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Commands typed at a terminal.
    LocalDev,
    /// `--quiet` runs whose console must stay clean.
    Quiet,
    /// Runs driven by another host through `BIZFLOW_REMOTE_AGENT=1`.
    RemoteAgent,
}

impl ExecutionContext {
    /// Returns `true` when console sinks should be disabled by default.
    pub fn disables_console(self) -> bool {
        matches!(self, ExecutionContext::Quiet | ExecutionContext::RemoteAgent)
    }
}

/// Derive the active execution context from parsed CLI arguments plus overrides.
pub fn detect_context(args: &Args) -> ExecutionContext {
    if args.quiet {
        return ExecutionContext::Quiet;
    }
    if remote_override_enabled() {
        return ExecutionContext::RemoteAgent;
    }
    ExecutionContext::LocalDev
}

fn remote_override_enabled() -> bool {
    env::var("BIZFLOW_REMOTE_AGENT")
        .map(|value| value.trim() == "1")
        .unwrap_or(false)
}
