/// Exit codes for CI/automation.
pub const SUCCESS: i32 = 0;
/// Parse, resolution or hook compile failure.
pub const VALIDATION_FAILED: i32 = 2;
/// A leaf failed, or the run was aborted or cancelled.
pub const RUN_FAILED: i32 = 3;
/// I/O errors and bad flags.
pub const RUNTIME_ERROR: i32 = 4;
