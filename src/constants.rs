//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Provider chain constants
pub mod chain {
    /// Default maximum retries per provider
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    /// Timeout for provider health checks (seconds)
    pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;
}

/// Generation pipeline constants
pub mod generation {
    /// Minimum chapter content length, in characters
    pub const MIN_CHAPTER_CONTENT_CHARS: usize = 100;

    /// Minimum outline field length after trimming, in characters
    pub const MIN_OUTLINE_FIELD_CHARS: usize = 10;

    /// Prior summary handed to the first volume
    pub const FIRST_VOLUME_SUMMARY: &str = "This is the first volume.";

    /// Checkpoint schema version, bumped on breaking changes
    pub const CHECKPOINT_VERSION: u32 = 1;
}

/// Workspace layout constants
pub mod layout {
    /// Per-run checkpoint directory
    pub const CHECKPOINTS_DIR: &str = "checkpoints";

    /// Checkpoint file name inside the checkpoint directory
    pub const CHECKPOINT_FILE: &str = "checkpoint.json";

    /// Per-run directory holding chapter text files
    pub const NOVEL_DIR: &str = "novel";

    /// Assembled novel written after the run completes
    pub const NOVEL_FILE: &str = "novel.md";
}
