//! Exit codes for CLI operations
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// Lint found danger warnings (or any warning in strict mode)
pub const LINT_FAILED: i32 = 1;

/// Graph snapshot missing or malformed
pub const SNAPSHOT_ERROR: i32 = 2;

/// `kanvas.yaml` or schema catalog invalid
pub const CONFIG_ERROR: i32 = 3;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments (sysexits.h EX_USAGE)
pub const USAGE_ERROR: i32 = 64;
