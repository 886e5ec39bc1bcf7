//! Region constants.
//!
//! These define the fixed record widths and the backing-object naming rule.
//! They are the single source of truth for every layout computation.

/// Width of a keyword name field in bytes (including the terminating NUL).
pub const KEYWORD_NAME_LEN: usize = 16;

/// Width of a string keyword value in bytes (including the terminating NUL).
pub const KEYWORD_TEXT_LEN: usize = 8;

/// Width of a keyword comment field in bytes (including the terminating NUL).
pub const KEYWORD_COMMENT_LEN: usize = 80;

/// Prefix applied to a logical region name to form the OS object name.
pub const SHM_NAME_PREFIX: &str = "/";

/// Suffix applied to a logical region name to form the OS object name.
pub const SHM_NAME_SUFFIX: &str = ".shm";

/// Maximum length of the OS object name (prefix + name + suffix).
pub const MAX_NAME_LEN: usize = 255;

/// Permission bits for newly created backing objects (owner read/write).
pub const SHM_MODE: u32 = 0o600;
