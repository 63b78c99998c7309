//! Remote API limits

/// Maximum number of commands the portal accepts in one `batch` call
pub const MAX_BATCH_COMMANDS: usize = 50;

/// Fixed page size of every listing method
pub const PAGE_SIZE: usize = 50;

/// Prefix for auto-generated command ids (`cmd_0`, `cmd_1`, ...)
pub const COMMAND_ID_PREFIX: &str = "cmd_";

/// Method name of the batch endpoint
pub const BATCH_METHOD: &str = "batch";
