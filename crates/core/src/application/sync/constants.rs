// Synchronizer constants (No magic values)
use std::time::Duration;

/// Full reload period while the synchronizer is active (10s)
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

/// Pending tutor actions buffered before callers wait
pub const COMMAND_BUFFER: usize = 32;
